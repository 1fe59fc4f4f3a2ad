//! Line-oriented helpers over captured `SHOW CREATE TABLE` output.
//!
//! A definition is the ordered list of lines Hive returns, e.g.
//!
//! ```text
//! CREATE EXTERNAL TABLE `sales`.`orders`(
//!   `id` string,
//!   `amount` double)
//! PARTITIONED BY (
//!   `dt` string)
//! ROW FORMAT SERDE
//!   'org.apache.hadoop.hive.ql.io.orc.OrcSerde'
//! STORED AS INPUTFORMAT
//!   'org.apache.hadoop.hive.ql.io.orc.OrcInputFormat'
//! OUTPUTFORMAT
//!   'org.apache.hadoop.hive.ql.io.orc.OrcOutputFormat'
//! LOCATION
//!   'hdfs://LEFT/warehouse/sales.db/orders'
//! TBLPROPERTIES (
//!   'transient_lastDdlTime'='1614637339')
//! ```
//!
//! `LOCATION` and `TBLPROPERTIES (` always sit on their own line with the
//! value(s) on the following line(s). Every helper here relies on that shape.

use sha1::{Digest, Sha1};

pub const CREATE: &str = "CREATE";
pub const CREATE_TABLE: &str = "CREATE TABLE";
pub const CREATE_EXTERNAL_TABLE: &str = "CREATE EXTERNAL TABLE";
pub const CREATE_VIEW: &str = "CREATE VIEW";
pub const PARTITIONED_BY: &str = "PARTITIONED BY";
pub const ROW_FORMAT_DELIMITED: &str = "ROW FORMAT DELIMITED";
pub const ROW_FORMAT_SERDE: &str = "ROW FORMAT SERDE";
pub const STORED_AS: &str = "STORED AS";
pub const STORED_AS_INPUTFORMAT: &str = "STORED AS INPUTFORMAT";
pub const OUTPUTFORMAT: &str = "OUTPUTFORMAT";
pub const LOCATION: &str = "LOCATION";
pub const WITH_SERDEPROPERTIES: &str = "WITH SERDEPROPERTIES (";
pub const PATH_PROP: &str = "'path'=";
pub const CLUSTERED_BY: &str = "CLUSTERED BY (";
pub const BUCKETS: &str = "BUCKETS";
pub const INTO: &str = "INTO";
pub const TBL_PROPERTIES: &str = "TBLPROPERTIES (";

/// Table property keys the planner reads or writes.
pub mod props {
    pub const METADATA_STAGE1: &str = "hms-mirror_Metadata_Stage1";
    pub const CONVERTED: &str = "hms-mirror_Converted";
    pub const LEGACY_MANAGED: &str = "hms-mirror_LegacyManaged";
    pub const TRANSFER_TABLE: &str = "hms-mirror_transfer_table";
    pub const SHADOW_TABLE: &str = "hms-mirror_shadow_table";
    pub const STORAGE_MIGRATED: &str = "hms-mirror-STORAGE_MIGRATED";
    pub const DOWNGRADED_FROM_ACID: &str = "downgraded_from_acid";
    pub const DISCOVER_PARTITIONS: &str = "discover.partitions";
    pub const TRANSLATED_TO_EXTERNAL: &str = "TRANSLATED_TO_EXTERNAL";
    pub const EXTERNAL_TABLE_PURGE: &str = "external.table.purge";
    pub const TRANSACTIONAL: &str = "transactional";
    pub const TRANSACTIONAL_PROPERTIES: &str = "transactional_properties";
    pub const BUCKETING_VERSION: &str = "bucketing_version";
    pub const AVRO_SCHEMA_URL: &str = "avro.schema.url";

    /// Statistics and bookkeeping that describe the source's physical state.
    pub const HOUSEKEEPING: &[&str] = &[
        "COLUMN_STATS_ACCURATE",
        "numFiles",
        "numRows",
        "rawDataSize",
        "totalSize",
        DISCOVER_PARTITIONS,
        "transient_lastDdlTime",
        "EXTERNAL",
        "last_modified_by",
        "last_modified_time",
    ];
}

/// Index of the first line whose trimmed text starts with `prefix` (ASCII case-insensitive).
pub fn index_of(lines: &[String], prefix: &str) -> Option<usize> {
    let prefix = prefix.to_ascii_uppercase();
    lines
        .iter()
        .position(|l| l.trim().to_ascii_uppercase().starts_with(&prefix))
}

/// Index of the first line whose trimmed text equals `token`.
pub fn index_of_exact(lines: &[String], token: &str) -> Option<usize> {
    lines.iter().position(|l| l.trim() == token)
}

fn create_index(lines: &[String]) -> Option<usize> {
    lines.iter().position(|l| l.trim_start().starts_with(CREATE))
}

pub fn is_view(lines: &[String]) -> bool {
    lines.iter().any(|l| l.trim().starts_with(CREATE_VIEW))
}

/// `CREATE TABLE` without `EXTERNAL`: legacy-managed or ACID.
pub fn is_managed(lines: &[String]) -> bool {
    lines.iter().any(|l| l.trim_start().starts_with(CREATE_TABLE))
}

pub fn is_external(lines: &[String]) -> bool {
    lines
        .iter()
        .any(|l| l.trim_start().starts_with(CREATE_EXTERNAL_TABLE))
}

/// Native Hive tables carry a storage location; connector tables (HBase, Kafka, JDBC) don't.
pub fn is_native(lines: &[String]) -> bool {
    lines.iter().any(|l| l.trim().starts_with(LOCATION))
}

pub fn is_acid(lines: &[String]) -> bool {
    is_managed(lines) && property_is_true(lines, props::TRANSACTIONAL)
}

pub fn is_external_purge(lines: &[String]) -> bool {
    is_external(lines) && property_is_true(lines, props::EXTERNAL_TABLE_PURGE)
}

pub fn is_partitioned(lines: &[String]) -> bool {
    lines
        .iter()
        .any(|l| l.trim_start().starts_with(PARTITIONED_BY))
}

/// Managed, non-transactional table on a legacy (Hive 1/2) cluster.
pub fn is_legacy_managed(legacy_cluster: bool, lines: &[String]) -> bool {
    legacy_cluster && is_managed(lines) && !is_acid(lines)
}

fn property_is_true(lines: &[String], key: &str) -> bool {
    get_property(lines, key)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Byte span of the object name on the CREATE line, including any `db.` qualifier.
fn name_span(line: &str) -> Option<(usize, usize)> {
    let upper = line.to_ascii_uppercase();
    let kw = [" TABLE ", " VIEW "]
        .iter()
        .filter_map(|k| upper.find(k).map(|i| i + k.len()))
        .min()?;
    let mut start = kw;
    let rest = &upper[start..];
    let skip = rest.len() - rest.trim_start().len();
    start += skip;
    if upper[start..].starts_with("IF NOT EXISTS ") {
        start += "IF NOT EXISTS ".len();
    }
    let end = line[start..]
        .find(|c: char| c == '(' || c.is_whitespace())
        .map(|i| start + i)
        .unwrap_or(line.len());
    if end > start {
        Some((start, end))
    } else {
        None
    }
}

/// Object name from the CREATE line, without backticks or database qualifier.
pub fn table_name(lines: &[String]) -> Option<String> {
    let line = &lines[create_index(lines)?];
    let (s, e) = name_span(line)?;
    let raw = line[s..e].replace('`', "");
    Some(raw.rsplit('.').next().unwrap_or(&raw).to_string())
}

/// Remove a `db.` qualifier from the CREATE line.
pub fn strip_database(lines: &mut [String]) -> bool {
    let Some(idx) = create_index(lines) else {
        return false;
    };
    let line = lines[idx].clone();
    let Some((s, e)) = name_span(&line) else {
        return false;
    };
    let raw = &line[s..e];
    if !raw.contains('.') {
        return false;
    }
    let name = raw.rsplit('.').next().unwrap_or(raw).replace('`', "");
    lines[idx] = format!("{}`{}`{}", &line[..s], name, &line[e..]);
    true
}

/// Replace the object name on the CREATE line.
pub fn change_table_name(lines: &mut [String], new_name: &str) -> bool {
    let Some(idx) = create_index(lines) else {
        return false;
    };
    let line = lines[idx].clone();
    let Some((s, e)) = name_span(&line) else {
        return false;
    };
    let raw = &line[s..e];
    let qualifier = raw
        .rfind('.')
        .map(|i| raw[..=i].to_string())
        .unwrap_or_default();
    lines[idx] = format!("{}{}`{}`{}", &line[..s], qualifier, new_name, &line[e..]);
    true
}

/// Convert a managed table to external and drop the transactional markers.
pub fn make_external(lines: &mut Vec<String>) -> bool {
    if !is_managed(lines) {
        return false;
    }
    if let Some(idx) = lines
        .iter()
        .position(|l| l.trim_start().starts_with(CREATE_TABLE))
    {
        lines[idx] = lines[idx].replacen(CREATE_TABLE, CREATE_EXTERNAL_TABLE, 1);
    }
    remove_property(lines, props::TRANSACTIONAL);
    remove_property(lines, props::TRANSACTIONAL_PROPERTIES);
    remove_property(lines, props::BUCKETING_VERSION);
    true
}

pub fn get_location(lines: &[String]) -> Option<String> {
    let idx = index_of_exact(lines, LOCATION)?;
    lines
        .get(idx + 1)
        .map(|l| l.trim().replace('\'', ""))
        .filter(|l| !l.is_empty())
}

pub fn strip_location(lines: &mut Vec<String>) -> bool {
    match index_of_exact(lines, LOCATION) {
        Some(idx) => {
            let end = (idx + 2).min(lines.len());
            lines.drain(idx..end);
            true
        }
        None => false,
    }
}

/// Point LOCATION (and a Spark `'path'` serde property, if present) at `location`.
/// Returns false when the definition has no LOCATION clause.
pub fn update_location(lines: &mut [String], location: &str) -> bool {
    let clean = location.replace('\'', "");
    let mut updated = false;
    if let Some(idx) = index_of_exact(lines, LOCATION) {
        if idx + 1 < lines.len() {
            lines[idx + 1] = format!("  '{}'", clean);
            updated = true;
        }
    }
    if let Some(ws) = index_of_exact(lines, WITH_SERDEPROPERTIES) {
        for i in ws + 1..lines.len() {
            let current = lines[i].trim().to_string();
            if current.starts_with(PATH_PROP) {
                let mut replaced = format!("  'path'='{}'", clean);
                if current.ends_with(',') {
                    replaced.push(',');
                } else if current.ends_with(')') {
                    replaced.push(')');
                }
                lines[i] = replaced;
                break;
            }
            if current.ends_with(')') {
                break;
            }
        }
    }
    updated
}

/// Bucket count from the `INTO n BUCKETS` line, 0 when unbucketed.
pub fn num_buckets(lines: &[String]) -> u32 {
    lines
        .iter()
        .map(|l| l.trim())
        .find(|l| l.starts_with(INTO) && l.contains(BUCKETS))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Remove the CLUSTERED BY .. INTO n BUCKETS block when `n <= threshold`.
/// A negative threshold disables removal.
pub fn remove_buckets(lines: &mut Vec<String>, threshold: i32) -> bool {
    if threshold < 0 || num_buckets(lines) as i64 > threshold as i64 {
        return false;
    }
    let Some(start) = index_of(lines, CLUSTERED_BY) else {
        return false;
    };
    let Some(end) = lines[start..]
        .iter()
        .position(|l| l.contains(BUCKETS))
        .map(|off| start + off)
    else {
        return false;
    };
    lines.drain(start..=end);
    true
}

fn is_section_boundary(line: &str) -> bool {
    let t = line.trim();
    [
        ROW_FORMAT_SERDE,
        ROW_FORMAT_DELIMITED,
        STORED_AS,
        OUTPUTFORMAT,
        CLUSTERED_BY,
        LOCATION,
        TBL_PROPERTIES,
    ]
    .iter()
    .any(|p| t.starts_with(p))
}

/// Comma-joined partition column names, e.g. "`dt`,`hr`".
pub fn partition_elements(lines: &[String]) -> Option<String> {
    let start = lines
        .iter()
        .position(|l| l.trim_start().starts_with(PARTITIONED_BY))?;
    let cols: Vec<&str> = lines[start + 1..]
        .iter()
        .take_while(|l| !is_section_boundary(l))
        .filter_map(|l| l.split_whitespace().next())
        .collect();
    if cols.is_empty() {
        None
    } else {
        Some(cols.join(","))
    }
}

/// `dt=2020-01-01/hr=1` -> `dt="2020-01-01",hr="1"`.
pub fn to_partition_spec(simple: &str) -> String {
    simple
        .split('/')
        .filter(|p| !p.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => format!("{}=\"{}\"", k, v),
            None => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Structural fingerprint: SHA-1 over the trimmed lines after the CREATE line, up to LOCATION.
///
/// Skipping the CREATE line makes the fingerprint blind to renames, database
/// qualifiers and managed/external flips; trimming makes it blind to indentation.
pub fn fingerprint(lines: &[String]) -> String {
    let mut hasher = Sha1::new();
    for line in lines.iter().skip(1) {
        let t = line.trim();
        if t == LOCATION {
            break;
        }
        hasher.update(t.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub fn schemas_equal(a: &[String], b: &[String]) -> bool {
    fingerprint(a) == fingerprint(b)
}

// ---------------------------------------------------------------------------
// TBLPROPERTIES block
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Property {
    key: String,
    value: Option<String>,
}

/// Location of the property block: (header index, index one past the last property line).
fn property_block(lines: &[String]) -> Option<(usize, usize)> {
    let header = index_of_exact(lines, TBL_PROPERTIES)?;
    let mut end = header + 1;
    while end < lines.len() {
        let t = lines[end].trim();
        end += 1;
        if t.ends_with(')') {
            break;
        }
    }
    Some((header, end))
}

fn parse_property(line: &str) -> Option<Property> {
    let mut t = line.trim();
    t = t.strip_suffix(',').unwrap_or(t).trim_end();
    if t.is_empty() || t == ")" {
        return None;
    }
    match t.split_once("'='") {
        Some((k, v)) => Some(Property {
            key: k.trim_start_matches('\'').to_string(),
            value: Some(v.strip_suffix('\'').unwrap_or(v).to_string()),
        }),
        None => Some(Property {
            key: t.trim_matches('\'').to_string(),
            value: None,
        }),
    }
}

fn read_properties(lines: &[String]) -> Vec<Property> {
    let Some((header, end)) = property_block(lines) else {
        return Vec::new();
    };
    let body = &lines[header + 1..end];
    body.iter()
        .enumerate()
        .filter_map(|(i, l)| {
            if i + 1 == body.len() {
                // Closing paren belongs to the block, not the value.
                let t = l.trim_end();
                parse_property(t.strip_suffix(')').unwrap_or(t))
            } else {
                parse_property(l)
            }
        })
        .collect()
}

fn write_properties(lines: &mut Vec<String>, properties: &[Property]) {
    let rendered: Vec<String> = properties
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let body = match &p.value {
                Some(v) => format!("  '{}'='{}'", p.key, v),
                None => format!("  '{}'", p.key),
            };
            if i + 1 == properties.len() {
                format!("{})", body)
            } else {
                format!("{},", body)
            }
        })
        .collect();

    match property_block(lines) {
        Some((header, end)) => {
            if rendered.is_empty() {
                lines.drain(header..end);
            } else {
                lines.splice(header + 1..end, rendered);
            }
        }
        None if !rendered.is_empty() => {
            lines.push(TBL_PROPERTIES.to_string());
            lines.extend(rendered);
        }
        None => {}
    }
}

pub fn get_property(lines: &[String], key: &str) -> Option<String> {
    read_properties(lines)
        .into_iter()
        .find(|p| p.key.eq_ignore_ascii_case(key))
        .map(|p| p.value.unwrap_or_default())
}

pub fn has_property(lines: &[String], key: &str) -> bool {
    read_properties(lines)
        .iter()
        .any(|p| p.key.eq_ignore_ascii_case(key))
}

/// Replace a property in place, or add it to the front of the block.
pub fn upsert_property(lines: &mut Vec<String>, key: &str, value: &str) {
    let mut properties = read_properties(lines);
    match properties.iter_mut().find(|p| p.key == key) {
        Some(p) => p.value = Some(value.to_string()),
        None => properties.insert(
            0,
            Property {
                key: key.to_string(),
                value: Some(value.to_string()),
            },
        ),
    }
    write_properties(lines, &properties);
}

pub fn remove_property(lines: &mut Vec<String>, key: &str) -> bool {
    let mut properties = read_properties(lines);
    let before = properties.len();
    properties.retain(|p| !p.key.eq_ignore_ascii_case(key));
    if properties.len() == before {
        return false;
    }
    write_properties(lines, &properties);
    true
}

/// Normalize the property block so it never ends on a dangling comma.
pub fn fix_definition(lines: &mut Vec<String>) {
    if property_block(lines).is_some() {
        let properties = read_properties(lines);
        write_properties(lines, &properties);
    }
}

/// Render an executable CREATE statement.
pub fn create_statement(lines: &[String], create_if_not_exists: bool) -> String {
    let mut def = lines.to_vec();
    fix_definition(&mut def);
    let mut stmt = def.join("\n");
    if create_if_not_exists && !stmt.contains("IF NOT EXISTS") {
        if stmt.starts_with(CREATE_EXTERNAL_TABLE) {
            stmt = stmt.replacen(CREATE_EXTERNAL_TABLE, "CREATE EXTERNAL TABLE IF NOT EXISTS", 1);
        } else if stmt.starts_with(CREATE_TABLE) {
            stmt = stmt.replacen(CREATE_TABLE, "CREATE TABLE IF NOT EXISTS", 1);
        }
    }
    stmt
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Split a DDL literal into lines, dropping the leading newline.
    pub fn ddl(text: &str) -> Vec<String> {
        text.trim_matches('\n').lines().map(str::to_string).collect()
    }

    pub fn external_partitioned() -> Vec<String> {
        ddl(r#"
CREATE EXTERNAL TABLE `sales`.`orders`(
  `id` string,
  `amount` double)
PARTITIONED BY (
  `dt` string)
ROW FORMAT SERDE
  'org.apache.hadoop.hive.ql.io.orc.OrcSerde'
STORED AS INPUTFORMAT
  'org.apache.hadoop.hive.ql.io.orc.OrcInputFormat'
OUTPUTFORMAT
  'org.apache.hadoop.hive.ql.io.orc.OrcOutputFormat'
LOCATION
  'hdfs://LEFT/warehouse/tablespace/external/hive/sales.db/orders'
TBLPROPERTIES (
  'numFiles'='12',
  'transient_lastDdlTime'='1614637339')
"#)
    }

    pub fn acid_bucketed(buckets: u32) -> Vec<String> {
        ddl(&format!(
            r#"
CREATE TABLE `sales`.`acid_orders`(
  `id` string,
  `amount` double)
CLUSTERED BY (
  id)
INTO {} BUCKETS
ROW FORMAT SERDE
  'org.apache.hadoop.hive.ql.io.orc.OrcSerde'
STORED AS INPUTFORMAT
  'org.apache.hadoop.hive.ql.io.orc.OrcInputFormat'
OUTPUTFORMAT
  'org.apache.hadoop.hive.ql.io.orc.OrcOutputFormat'
LOCATION
  'hdfs://LEFT/warehouse/tablespace/managed/hive/sales.db/acid_orders'
TBLPROPERTIES (
  'bucketing_version'='2',
  'transactional'='true',
  'transactional_properties'='default',
  'transient_lastDdlTime'='1614637339')
"#,
            buckets
        ))
    }

    pub fn legacy_managed() -> Vec<String> {
        ddl(r#"
CREATE TABLE `sales`.`customers`(
  `id` string,
  `name` string)
ROW FORMAT SERDE
  'org.apache.hadoop.hive.serde2.lazy.LazySimpleSerDe'
STORED AS INPUTFORMAT
  'org.apache.hadoop.mapred.TextInputFormat'
OUTPUTFORMAT
  'org.apache.hadoop.hive.ql.io.HiveIgnoreKeyTextOutputFormat'
LOCATION
  'hdfs://LEFT/apps/hive/warehouse/sales.db/customers'
TBLPROPERTIES (
  'COLUMN_STATS_ACCURATE'='true',
  'transient_lastDdlTime'='1614637339')
"#)
    }

    pub fn view() -> Vec<String> {
        ddl(r#"
CREATE VIEW `sales`.`big_orders` AS SELECT `orders`.`id` FROM `sales`.`orders` WHERE `orders`.`amount` > 100
"#)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_table_classification() {
        let ext = external_partitioned();
        assert!(is_external(&ext));
        assert!(!is_managed(&ext));
        assert!(is_native(&ext));
        assert!(is_partitioned(&ext));
        assert!(!is_acid(&ext));

        let acid = acid_bucketed(2);
        assert!(is_managed(&acid));
        assert!(is_acid(&acid));
        assert!(!is_partitioned(&acid));

        let legacy = legacy_managed();
        assert!(is_legacy_managed(true, &legacy));
        assert!(!is_legacy_managed(false, &legacy));
        assert!(is_view(&view()));
        assert!(!is_native(&view()));
    }

    #[test]
    fn test_strip_database_and_rename() {
        let mut def = external_partitioned();
        assert_eq!(table_name(&def).as_deref(), Some("orders"));
        assert!(strip_database(&mut def));
        assert_eq!(def[0], "CREATE EXTERNAL TABLE `orders`(");
        assert!(!strip_database(&mut def));

        assert!(change_table_name(&mut def, "hms_mirror_shadow_orders"));
        assert_eq!(def[0], "CREATE EXTERNAL TABLE `hms_mirror_shadow_orders`(");
        assert_eq!(table_name(&def).as_deref(), Some("hms_mirror_shadow_orders"));
    }

    #[test]
    fn test_make_external_drops_transactional() {
        let mut def = acid_bucketed(4);
        assert!(make_external(&mut def));
        assert!(def[0].starts_with("CREATE EXTERNAL TABLE"));
        assert!(!has_property(&def, props::TRANSACTIONAL));
        assert!(!has_property(&def, props::TRANSACTIONAL_PROPERTIES));
        assert!(!has_property(&def, props::BUCKETING_VERSION));
        assert!(has_property(&def, "transient_lastDdlTime"));
        assert!(!make_external(&mut def));
    }

    #[test]
    fn test_location_roundtrip() {
        let mut def = external_partitioned();
        assert_eq!(
            get_location(&def).as_deref(),
            Some("hdfs://LEFT/warehouse/tablespace/external/hive/sales.db/orders")
        );
        assert!(update_location(&mut def, "hdfs://RIGHT/data/orders"));
        assert_eq!(get_location(&def).as_deref(), Some("hdfs://RIGHT/data/orders"));
        assert!(strip_location(&mut def));
        assert_eq!(get_location(&def), None);
        assert!(!update_location(&mut def, "hdfs://RIGHT/x"));
    }

    #[test]
    fn test_update_location_rewrites_spark_path() {
        let mut def = ddl(r#"
CREATE EXTERNAL TABLE `t`(
  `id` int)
ROW FORMAT SERDE
  'org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe'
WITH SERDEPROPERTIES (
  'path'='hdfs://LEFT/data/t')
LOCATION
  'hdfs://LEFT/data/t'
"#);
        update_location(&mut def, "hdfs://RIGHT/data/t");
        assert!(def.iter().any(|l| l == "  'path'='hdfs://RIGHT/data/t')"));
    }

    #[test]
    fn test_buckets() {
        let mut def = acid_bucketed(2);
        assert_eq!(num_buckets(&def), 2);
        assert!(!remove_buckets(&mut def.clone(), 1));
        assert!(!remove_buckets(&mut def.clone(), -1));
        assert!(remove_buckets(&mut def, 2));
        assert_eq!(num_buckets(&def), 0);
        assert!(index_of(&def, CLUSTERED_BY).is_none());
    }

    #[test]
    fn test_partition_elements() {
        let def = external_partitioned();
        assert_eq!(partition_elements(&def).as_deref(), Some("`dt`"));
        assert_eq!(partition_elements(&legacy_managed()), None);
        assert_eq!(to_partition_spec("dt=2020-01-01/hr=1"), "dt=\"2020-01-01\",hr=\"1\"");
    }

    #[test]
    fn test_property_block_edits() {
        let mut def = external_partitioned();
        assert_eq!(get_property(&def, "numFiles").as_deref(), Some("12"));

        upsert_property(&mut def, props::EXTERNAL_TABLE_PURGE, "true");
        assert!(is_external_purge(&def));
        upsert_property(&mut def, props::EXTERNAL_TABLE_PURGE, "false");
        assert!(!is_external_purge(&def));

        assert!(remove_property(&mut def, "transient_lastDdlTime"));
        assert!(remove_property(&mut def, "numfiles"));
        assert_eq!(def.last().map(String::as_str), Some("  'external.table.purge'='false')"));

        assert!(remove_property(&mut def, props::EXTERNAL_TABLE_PURGE));
        assert!(index_of_exact(&def, TBL_PROPERTIES).is_none());

        upsert_property(&mut def, "a", "b");
        assert_eq!(def[def.len() - 2], TBL_PROPERTIES);
        assert_eq!(def[def.len() - 1], "  'a'='b')");
    }

    #[test]
    fn test_fix_definition_removes_dangling_comma() {
        let mut def = ddl(r#"
CREATE EXTERNAL TABLE `t`(
  `id` int)
LOCATION
  'hdfs://LEFT/t'
TBLPROPERTIES (
  'a'='1',
  'b'='2',
)
"#);
        fix_definition(&mut def);
        assert_eq!(def.last().map(String::as_str), Some("  'b'='2')"));
    }

    #[test]
    fn test_fingerprint_ignores_formatting_and_name() {
        let a = external_partitioned();
        let mut b: Vec<String> = a.iter().map(|l| format!("    {}   ", l.trim())).collect();
        change_table_name(&mut b, "other");
        assert!(schemas_equal(&a, &b));

        let mut c = a.clone();
        c[2] = "  `amount` decimal(10,2))".to_string();
        assert!(!schemas_equal(&a, &c));
    }

    #[test]
    fn test_fingerprint_stops_at_location() {
        let a = external_partitioned();
        let mut moved = a.clone();
        assert!(update_location(&mut moved, "hdfs://RIGHT/data/orders"));
        let last = moved.len() - 1;
        moved[last] = "  'transient_lastDdlTime'='1700000000')".to_string();
        assert!(schemas_equal(&a, &moved));
    }

    #[test]
    fn test_schemas_equal_reflexive_and_symmetric() {
        let tables = [external_partitioned(), legacy_managed(), acid_bucketed(4)];
        for one in &tables {
            assert!(schemas_equal(one, one));
            for two in &tables {
                assert_eq!(schemas_equal(one, two), schemas_equal(two, one));
            }
        }
        assert!(!schemas_equal(&tables[0], &tables[1]));
    }

    #[test]
    fn test_create_statement_if_not_exists() {
        let def = legacy_managed();
        let stmt = create_statement(&def, true);
        assert!(stmt.starts_with("CREATE TABLE IF NOT EXISTS `sales`.`customers`("));
        let plain = create_statement(&def, false);
        assert!(plain.starts_with("CREATE TABLE `sales`"));
        assert!(plain.contains("\nLOCATION\n"));
    }
}
