//! Definition fixups applied to every rebuilt table.
//!
//! Each feature inspects a definition and, when it recognizes a shape that
//! won't replay cleanly on the target, rewrites it. Order matters: later
//! features see the output of earlier ones.

use crate::core::ddl::{
    self, index_of, OUTPUTFORMAT, ROW_FORMAT_DELIMITED, ROW_FORMAT_SERDE, STORED_AS_INPUTFORMAT,
    WITH_SERDEPROPERTIES,
};

const ORC_INPUT_FORMAT: &str = "'org.apache.hadoop.hive.ql.io.orc.OrcInputFormat'";
const ORC_OUTPUT_FORMAT: &str = "'org.apache.hadoop.hive.ql.io.orc.OrcOutputFormat'";
const PARQUET_INPUT_FORMAT: &str = "'org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat'";
const PARQUET_OUTPUT_FORMAT: &str =
    "'org.apache.hadoop.hive.ql.io.parquet.MapredParquetOutputFormat'";
const LAZY_SERDE: &str = "'org.apache.hadoop.hive.serde2.lazy.LazySimpleSerDe'";
const SPARK_SCHEMA_PART: &str = "spark.sql.sources.schema.part";

/// A single definition fixup.
pub trait Feature: Send + Sync {
    /// Name used in issues and logs.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn applies(&self, definition: &[String]) -> bool;

    /// Rewrite the definition. Returns true when the feature applied.
    fn apply(&self, definition: &mut Vec<String>) -> bool;
}

/// The fixup chain, in application order.
pub fn chain() -> [&'static dyn Feature; 4] {
    [&BadOrcDef, &BadParquetDef, &BadTextFileDef, &SparkSqlPart]
}

fn line_is(definition: &[String], idx: usize, value: &str) -> bool {
    definition
        .get(idx)
        .map(|l| l.trim() == value)
        .unwrap_or(false)
}

/// Index of OUTPUTFORMAT when the definition declares exactly this input/output format pair.
fn format_pair(definition: &[String], input: &str, output: &str) -> Option<(usize, usize)> {
    let sai = index_of(definition, STORED_AS_INPUTFORMAT)?;
    if !line_is(definition, sai + 1, input) {
        return None;
    }
    let of = index_of(definition, OUTPUTFORMAT)?;
    if of > sai + 1 && line_is(definition, of + 1, output) {
        Some((sai, of))
    } else {
        None
    }
}

/// Replace `definition[start..end]` with a single line.
fn collapse(definition: &mut Vec<String>, start: usize, end: usize, line: &str) {
    let end = end.min(definition.len());
    definition.splice(start..end, std::iter::once(line.to_string()));
}

/// ORC tables declared with ROW FORMAT DELIMITED.
pub struct BadOrcDef;

impl Feature for BadOrcDef {
    fn name(&self) -> &'static str {
        "BAD_ORC_DEF"
    }

    fn description(&self) -> &'static str {
        "Table schema definitions for ORC files that include ROW FORMAT DELIMITED declarations are invalid.  \
         This process will remove the invalid declarations and set STORED AS ORC"
    }

    fn applies(&self, definition: &[String]) -> bool {
        match index_of(definition, ROW_FORMAT_DELIMITED) {
            Some(rfd) if rfd > 0 => format_pair(definition, ORC_INPUT_FORMAT, ORC_OUTPUT_FORMAT)
                .map(|(sai, _)| sai > rfd)
                .unwrap_or(false),
            _ => false,
        }
    }

    fn apply(&self, definition: &mut Vec<String>) -> bool {
        if !self.applies(definition) {
            return false;
        }
        let (Some(rfd), Some((_, of))) = (
            index_of(definition, ROW_FORMAT_DELIMITED),
            format_pair(definition, ORC_INPUT_FORMAT, ORC_OUTPUT_FORMAT),
        ) else {
            return false;
        };
        collapse(definition, rfd, of + 2, "STORED AS ORC");
        true
    }
}

/// Parquet tables declared by input/output format classes.
pub struct BadParquetDef;

impl Feature for BadParquetDef {
    fn name(&self) -> &'static str {
        "BAD_PARQUET_DEF"
    }

    fn description(&self) -> &'static str {
        "Table schema definitions for Parquet files that don't include include INPUT and OUTPUT format but \
         no ROW FORMAT SERDE will not translate correctly.  This process will remove the invalid declarations \
         and set STORED AS PARQUET"
    }

    fn applies(&self, definition: &[String]) -> bool {
        matches!(
            format_pair(definition, PARQUET_INPUT_FORMAT, PARQUET_OUTPUT_FORMAT),
            Some((sai, _)) if sai > 0
        )
    }

    fn apply(&self, definition: &mut Vec<String>) -> bool {
        if !self.applies(definition) {
            return false;
        }
        let start = [ROW_FORMAT_DELIMITED, ROW_FORMAT_SERDE, STORED_AS_INPUTFORMAT]
            .iter()
            .filter_map(|marker| index_of(definition, marker))
            .find(|idx| *idx > 0);
        let end = index_of(definition, OUTPUTFORMAT).map(|of| of + 2);
        if let (Some(start), Some(end)) = (start, end) {
            if start < end {
                collapse(definition, start, end, "STORED AS PARQUET");
            }
        }
        true
    }
}

/// Text tables carrying both ROW FORMAT DELIMITED and SERDEPROPERTIES.
pub struct BadTextFileDef;

impl BadTextFileDef {
    fn clause_value(definition: &[String], clause: &str) -> Option<String> {
        definition.iter().rev().find_map(|line| {
            line.find(clause)
                .map(|i| line[i + clause.len()..].trim().to_string())
        })
    }
}

impl Feature for BadTextFileDef {
    fn name(&self) -> &'static str {
        "BAD_TEXTFILE_DEF"
    }

    fn description(&self) -> &'static str {
        "Table schema definitions that include both ROW FORMAT DELIMITED BY and WITH SERDEPROPERTIES in the \
         declaration aren't valid as a new schema when you attempt to replay the schema.  This happens when \
         tables are ALTERED with SERDEPROPERTIES after initial creation.  This process will migrate the FIELDS \
         TERMINATED BY and LINES TERMINATED BY values into the SERDEPROPERTIES so the schema can be successfully \
         created."
    }

    fn applies(&self, definition: &[String]) -> bool {
        index_of(definition, ROW_FORMAT_DELIMITED).is_some()
            && index_of(definition, WITH_SERDEPROPERTIES).is_some()
    }

    fn apply(&self, definition: &mut Vec<String>) -> bool {
        let (Some(rfd), Some(ws)) = (
            index_of(definition, ROW_FORMAT_DELIMITED),
            index_of(definition, WITH_SERDEPROPERTIES),
        ) else {
            return false;
        };
        if rfd >= ws {
            return false;
        }
        let fields = Self::clause_value(definition, "FIELDS TERMINATED BY ");
        let lines = Self::clause_value(definition, "LINES TERMINATED BY ");

        let mut replacement = vec![ROW_FORMAT_SERDE.to_string(), format!("  {}", LAZY_SERDE)];
        replacement.push(definition[ws].clone());
        if let Some(fields) = fields {
            replacement.push(format!("  'field.delim'={},", fields));
        }
        if let Some(lines) = lines {
            replacement.push(format!("  'line.delim'={},", lines));
        }
        definition.splice(rfd..=ws, replacement);
        true
    }
}

/// Spark schema properties captured with escaped double quotes.
pub struct SparkSqlPart;

impl SparkSqlPart {
    fn keys() -> impl Iterator<Item = String> {
        (0..10).map(|i| format!("{}.{}", SPARK_SCHEMA_PART, i))
    }
}

impl Feature for SparkSqlPart {
    fn name(&self) -> &'static str {
        "SPARK_SQL_PART"
    }

    fn description(&self) -> &'static str {
        "Tables created by Spark will embed additional schema element in the table properties. The extraction \
         from Hive via 'show create table' adds escape sequences for double quotes. This process will remove \
         those escapes so Spark can read the schema."
    }

    fn applies(&self, definition: &[String]) -> bool {
        Self::keys().any(|key| {
            ddl::get_property(definition, &key)
                .map(|v| v.contains('\\'))
                .unwrap_or(false)
        })
    }

    fn apply(&self, definition: &mut Vec<String>) -> bool {
        let mut applied = false;
        for key in Self::keys() {
            if let Some(value) = ddl::get_property(definition, &key) {
                if value.contains('\\') {
                    ddl::upsert_property(definition, &key, &value.replace("\\\"", "\""));
                    applied = true;
                }
            }
        }
        applied
    }
}

/// Contrib SerDe classes that moved into the core SerDe package in Hive 3.
const LEGACY_ROW_SERDES: &[(&str, &str)] = &[
    (
        "'org.apache.hadoop.hive.contrib.serde2.MultiDelimitSerDe'",
        "'org.apache.hadoop.hive.serde2.MultiDelimitSerDe'",
    ),
    (
        "'org.apache.hadoop.hive.contrib.serde2.RegexSerDe'",
        "'org.apache.hadoop.hive.serde2.RegexSerDe'",
    ),
    (
        "'org.apache.hadoop.hive.contrib.serde2.TypedBytesSerDe'",
        "'org.apache.hadoop.hive.serde2.TypedBytesSerDe'",
    ),
];

/// Rewrite a legacy contrib SerDe class. Returns true when a class was replaced.
pub fn apply_legacy_translations(definition: &mut [String]) -> bool {
    let Some(rfs) = index_of(definition, ROW_FORMAT_SERDE) else {
        return false;
    };
    let Some(line) = definition.get(rfs + 1) else {
        return false;
    };
    let serde = line.trim().to_string();
    match LEGACY_ROW_SERDES.iter().find(|(from, _)| *from == serde) {
        Some((_, to)) => {
            definition[rfs + 1] = format!("  {}", to);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ddl::fixtures::{ddl, external_partitioned};

    #[test]
    fn test_bad_orc_def() {
        let mut def = ddl(r#"
CREATE EXTERNAL TABLE `t`(
  `id` int)
ROW FORMAT DELIMITED
  FIELDS TERMINATED BY '\t'
  LINES TERMINATED BY '\n'
STORED AS INPUTFORMAT
  'org.apache.hadoop.hive.ql.io.orc.OrcInputFormat'
OUTPUTFORMAT
  'org.apache.hadoop.hive.ql.io.orc.OrcOutputFormat'
LOCATION
  'hdfs://LEFT/t'
"#);
        assert!(BadOrcDef.applies(&def));
        assert!(BadOrcDef.apply(&mut def));
        assert_eq!(def[2], "STORED AS ORC");
        assert_eq!(def[3], "LOCATION");
        assert!(!BadOrcDef.applies(&def));
    }

    #[test]
    fn test_orc_with_serde_is_left_alone() {
        let mut def = external_partitioned();
        assert!(!BadOrcDef.apply(&mut def));
        assert_eq!(def, external_partitioned());
    }

    #[test]
    fn test_bad_parquet_def() {
        let mut def = ddl(r#"
CREATE EXTERNAL TABLE `t`(
  `id` int)
ROW FORMAT SERDE
  'org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe'
STORED AS INPUTFORMAT
  'org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat'
OUTPUTFORMAT
  'org.apache.hadoop.hive.ql.io.parquet.MapredParquetOutputFormat'
LOCATION
  'hdfs://LEFT/t'
"#);
        assert!(BadParquetDef.apply(&mut def));
        assert_eq!(def.len(), 5);
        assert_eq!(def[2], "STORED AS PARQUET");
    }

    #[test]
    fn test_bad_textfile_def_moves_delimiters() {
        let mut def = ddl(r#"
CREATE EXTERNAL TABLE `t`(
  `id` int)
ROW FORMAT DELIMITED
  FIELDS TERMINATED BY '|'
  LINES TERMINATED BY '\n'
WITH SERDEPROPERTIES (
  'escape.delim'='\\')
STORED AS INPUTFORMAT
  'org.apache.hadoop.mapred.TextInputFormat'
OUTPUTFORMAT
  'org.apache.hadoop.hive.ql.io.HiveIgnoreKeyTextOutputFormat'
"#);
        assert!(BadTextFileDef.apply(&mut def));
        assert_eq!(def[2], "ROW FORMAT SERDE");
        assert_eq!(def[3], format!("  {}", LAZY_SERDE));
        assert_eq!(def[4], "WITH SERDEPROPERTIES (");
        assert_eq!(def[5], "  'field.delim'='|',");
        assert_eq!(def[6], "  'line.delim'='\\n',");
        assert_eq!(def[7], "  'escape.delim'='\\\\')");
        assert!(!BadTextFileDef.applies(&def));
    }

    #[test]
    fn test_spark_sql_part_unescapes() {
        let mut def = ddl(r#"
CREATE EXTERNAL TABLE `t`(
  `id` int)
LOCATION
  'hdfs://LEFT/t'
TBLPROPERTIES (
  'spark.sql.sources.schema.part.0'='{\"type\":\"struct\"}')
"#);
        assert!(SparkSqlPart.applies(&def));
        assert!(SparkSqlPart.apply(&mut def));
        assert_eq!(
            ddl::get_property(&def, "spark.sql.sources.schema.part.0").as_deref(),
            Some("{\"type\":\"struct\"}")
        );
        assert!(!SparkSqlPart.applies(&def));
    }

    #[test]
    fn test_legacy_translation() {
        let mut def = ddl(r#"
CREATE TABLE `logs`(
  `line` string)
ROW FORMAT SERDE
  'org.apache.hadoop.hive.contrib.serde2.RegexSerDe'
LOCATION
  'hdfs://LEFT/logs'
"#);
        assert!(apply_legacy_translations(&mut def));
        assert_eq!(def[3], "  'org.apache.hadoop.hive.serde2.RegexSerDe'");
        assert!(!apply_legacy_translations(&mut def));
    }

    #[test]
    fn test_chain_order() {
        let names: Vec<&str> = chain().iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec!["BAD_ORC_DEF", "BAD_PARQUET_DEF", "BAD_TEXTFILE_DEF", "SPARK_SQL_PART"]
        );
    }
}
