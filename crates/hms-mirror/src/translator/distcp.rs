//! Grouping of recorded translations into bulk distcp work.

use super::{reduce_url_by, LocationTranslation};
use crate::core::Environment;
use std::collections::{BTreeMap, BTreeSet};

/// Reduced target -> sources copied into it.
pub type DistcpPlan = BTreeMap<String, BTreeSet<String>>;

/// Group the translations of one database and environment by target folder.
///
/// Each pair is first trimmed by its own translation level. Pairs are then
/// keyed by the trimmed original (later entries win), and grouped under the
/// target reduced by a further `consolidation_level` segments.
pub fn build_distcp_list(
    translations: &[LocationTranslation],
    database: &str,
    environment: Environment,
    consolidation_level: usize,
) -> DistcpPlan {
    let adjusted: BTreeMap<String, String> = translations
        .iter()
        .filter(|t| t.database == database && t.environment == environment)
        .map(|t| (t.adjusted_original(), t.adjusted_target()))
        .collect();

    let mut plan = DistcpPlan::new();
    for (source, target) in adjusted {
        plan.entry(reduce_url_by(&target, consolidation_level))
            .or_default()
            .insert(source);
    }
    plan
}

/// Files describing one database's distcp work: a workbook, numbered source lists and a driver script.
pub fn render(database: &str, environment: Environment, plan: &DistcpPlan) -> Vec<(String, String)> {
    let mut files = Vec::new();
    let mut workbook = String::new();
    workbook.push_str("## WARNING\n");
    workbook.push_str(
        "Using 'distcp' to move data relies on the target folders having the same name as the source \
         folders. Tables whose target location doesn't end in the source folder name won't line up \
         with the copied data.\n\n",
    );
    workbook.push_str("| Database | Target | Sources |\n");
    workbook.push_str("|:---|:---|:---|\n");
    workbook.push_str(&format!("| {} | | |\n", database));

    let mut script = String::from(
        "#!/usr/bin/env sh\n\n\
         # 1. Copy the '*_distcp_source.txt' files to the distributed filesystem.\n\
         # 2. Export HCFS_BASE_DIR pointing at where they were placed.\n\
         # 3. Export DISTCP_OPTS with any settings the job needs.\n\n\
         if [ -z ${HCFS_BASE_DIR+x} ]; then\n  echo \"HCFS_BASE_DIR is unset\"\n  exit 1\nfi\n\n\
         hdfs dfs -mkdir -p $HCFS_BASE_DIR\n",
    );

    for (i, (target, sources)) in plan.iter().enumerate() {
        let source_file = format!("{}_{}_{}_distcp_source.txt", database, environment, i + 1);
        let listed: Vec<&str> = sources.iter().map(String::as_str).collect();
        workbook.push_str(&format!("| | {} | {}<br> |\n", target, listed.join("<br>")));

        let mut content = listed.join("\n");
        content.push('\n');
        files.push((source_file.clone(), content));

        script.push_str(&format!(
            "\nhdfs dfs -copyFromLocal -f {f} ${{HCFS_BASE_DIR}}\nhadoop distcp ${{DISTCP_OPTS}} -f ${{HCFS_BASE_DIR}}/{f} {t}\n",
            f = source_file,
            t = target
        ));
    }

    files.push((
        format!("{}_{}_distcp_workbook.md", database, environment),
        workbook,
    ));
    files.push((format!("{}_{}_distcp_script.sh", database, environment), script));
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translation(original: &str, translated: &str, level: usize) -> LocationTranslation {
        LocationTranslation {
            database: "db".into(),
            environment: Environment::Right,
            original: original.into(),
            translated: translated.into(),
            level,
        }
    }

    #[test]
    fn test_consolidates_sibling_tables() {
        let translations = vec![
            translation("hdfs://LEFT/db/t1", "hdfs://NEW/db/t1", 0),
            translation("hdfs://LEFT/db/t2", "hdfs://NEW/db/t2", 0),
        ];
        let plan = build_distcp_list(&translations, "db", Environment::Right, 1);
        assert_eq!(plan.len(), 1);
        let sources = &plan["hdfs://NEW/db"];
        assert_eq!(sources.len(), 2);
        assert!(sources.contains("hdfs://LEFT/db/t1"));
        assert!(sources.contains("hdfs://LEFT/db/t2"));
    }

    #[test]
    fn test_filters_database_and_environment() {
        let mut other = translation("hdfs://LEFT/x/t", "hdfs://NEW/x/t", 0);
        other.database = "other".into();
        let mut left = translation("hdfs://LEFT/db/t3", "hdfs://NEW/db/t3", 0);
        left.environment = Environment::Left;
        let translations = vec![translation("hdfs://LEFT/db/t1", "hdfs://NEW/db/t1", 0), other, left];
        let plan = build_distcp_list(&translations, "db", Environment::Right, 1);
        assert_eq!(plan.values().map(|s| s.len()).sum::<usize>(), 1);
    }

    #[test]
    fn test_level_dedupes_partitions() {
        let translations = vec![
            translation("hdfs://LEFT/db/t1/dt=1", "hdfs://NEW/db/t1/dt=1", 1),
            translation("hdfs://LEFT/db/t1/dt=2", "hdfs://NEW/db/t1/dt=2", 1),
        ];
        let plan = build_distcp_list(&translations, "db", Environment::Right, 0);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan["hdfs://NEW/db/t1"].len(), 1);
    }

    #[test]
    fn test_render_files() {
        let translations = vec![translation("hdfs://LEFT/db/t1", "hdfs://NEW/db/t1", 0)];
        let plan = build_distcp_list(&translations, "db", Environment::Right, 1);
        let files = render("db", Environment::Right, &plan);
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["db_RIGHT_1_distcp_source.txt", "db_RIGHT_distcp_workbook.md", "db_RIGHT_distcp_script.sh"]
        );
        assert_eq!(files[0].1, "hdfs://LEFT/db/t1\n");
        assert!(files[1].1.contains("| | hdfs://NEW/db | hdfs://LEFT/db/t1<br> |"));
    }
}
