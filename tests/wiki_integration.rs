//! End-to-end integration tests over a real wiki root: parse, search,
//! diagnostics, staging, and persistence working against the filesystem.

mod common;

use common::{create_bank_wiki, write_file};
use std::path::Path;
use taxon_core::{
    compiler::WikiCompiler,
    diagnostics::DiagnosticKind,
    staging::checksum,
};

#[test]
fn test_two_bank_wiki_end_to_end() {
    let dir = create_bank_wiki();
    let mut wiki = WikiCompiler::open(dir.path()).unwrap();

    let report = wiki.parse_path(Path::new("pages")).unwrap();
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.committed(), 3);
    assert_eq!(report.rejections().count(), 0);

    // Same name, two hierarchies, no collision.
    assert_eq!(
        wiki.taxonomy().classification_of("bank/financial").unwrap(),
        "institution/financial/bank"
    );
    assert_eq!(
        wiki.taxonomy().classification_of("bank/geology").unwrap(),
        "geological/formation/bank"
    );
    assert_eq!(
        wiki.taxonomy().classification_of("commbank").unwrap(),
        "institution/financial/bank/commbank"
    );

    // Search truncates the commbank descendant away and ranks
    // deterministically.
    let results = wiki.search("bank", false);
    let paths: Vec<&str> = results
        .iter()
        .map(|r| r.classification_path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec!["geological/formation/bank", "institution/financial/bank"]
    );

    // One incomplete_hierarchy finding per missing immediate parent;
    // commbank's parent exists so it contributes none.
    let findings = wiki.check();
    let incomplete: Vec<_> = findings
        .iter()
        .filter(|f| f.error_type == DiagnosticKind::IncompleteHierarchy)
        .collect();
    assert_eq!(incomplete.len(), 2);
    assert!(!findings
        .iter()
        .any(|f| f.error_type == DiagnosticKind::DuplicateConcept));
    assert!(!findings
        .iter()
        .any(|f| f.error_type == DiagnosticKind::CircularReference));
}

#[test]
fn test_staged_files_apply_with_changelog() {
    let dir = create_bank_wiki();
    let mut wiki = WikiCompiler::open(dir.path()).unwrap();
    wiki.parse_path(Path::new("pages")).unwrap();

    // One derived file per classified concept.
    let staged: Vec<&str> = wiki.staged().iter().map(|c| c.file.as_str()).collect();
    assert_eq!(
        staged,
        vec![
            "concepts/institution/financial/bank.md",
            "concepts/institution/financial/bank/commbank.md",
            "concepts/geological/formation/bank.md",
        ]
    );

    let applied = wiki.apply(false).unwrap();
    assert_eq!(applied.applied.len(), 3);
    assert!(applied.failures.is_empty());

    // Files landed with checksummed content and the changelog recorded each.
    let bank_file = dir.path().join("concepts/institution/financial/bank.md");
    assert!(bank_file.exists());
    let content = std::fs::read_to_string(&bank_file).unwrap();
    assert!(content.starts_with("# Bank\n"));
    assert!(content.contains("[[bank]]{is_a: institution/financial}"));
    assert_eq!(
        checksum(&content),
        applied.applied[0].checksum.clone().unwrap()
    );
    assert_eq!(wiki.stats().changelog_entries, 3);

    // Artifacts persisted alongside.
    assert!(dir.path().join("graph.json").exists());
    assert!(dir.path().join("taxonomy.json").exists());
    assert!(dir.path().join("changelog.json").exists());
}

#[test]
fn test_dry_run_then_real_apply() {
    let dir = create_bank_wiki();
    let mut wiki = WikiCompiler::open(dir.path()).unwrap();
    wiki.parse_path(Path::new("pages")).unwrap();

    let preview = wiki.apply(true).unwrap();
    assert!(preview.dry_run);
    assert_eq!(preview.applied.len(), 3);
    assert!(!dir
        .path()
        .join("concepts/institution/financial/bank.md")
        .exists());
    assert!(!dir.path().join("changelog.json").exists());
    // Batch survives the dry run.
    assert_eq!(wiki.staged().len(), 3);

    let real = wiki.apply(false).unwrap();
    assert_eq!(real.applied.len(), 3);
    assert!(dir
        .path()
        .join("concepts/institution/financial/bank.md")
        .exists());
}

#[test]
fn test_reparse_appends_nothing() {
    let dir = create_bank_wiki();
    let mut wiki = WikiCompiler::open(dir.path()).unwrap();
    wiki.parse_path(Path::new("pages")).unwrap();
    wiki.apply(false).unwrap();

    let graph_json = std::fs::read_to_string(dir.path().join("graph.json")).unwrap();
    let taxonomy_json = std::fs::read_to_string(dir.path().join("taxonomy.json")).unwrap();
    let stats = wiki.stats();
    drop(wiki);

    // Fresh session over the persisted artifacts, same sources.
    let mut wiki = WikiCompiler::open(dir.path()).unwrap();
    wiki.parse_path(Path::new("pages")).unwrap();
    // Derived files exist now, so nothing re-stages.
    assert!(wiki.staged().is_empty());
    wiki.apply(false).unwrap();

    assert_eq!(wiki.stats().nodes, stats.nodes);
    assert_eq!(wiki.stats().edges, stats.edges);
    assert_eq!(wiki.stats().changelog_entries, stats.changelog_entries);

    let taxonomy_again = std::fs::read_to_string(dir.path().join("taxonomy.json")).unwrap();
    assert_eq!(taxonomy_json, taxonomy_again);
    // Graph content is identical apart from the metadata update timestamp.
    let before: serde_json::Value = serde_json::from_str(&graph_json).unwrap();
    let after: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("graph.json")).unwrap())
            .unwrap();
    assert_eq!(before["nodes"], after["nodes"]);
    assert_eq!(before["edges"], after["edges"]);
}

#[test]
fn test_cycle_across_files_rejects_closing_edge_only() {
    common::init_logging();
    let dir = tempfile::TempDir::new().unwrap();
    write_file(dir.path(), "pages/a.md", "[[alpha]]{is_a: beta}\n");
    write_file(dir.path(), "pages/b.md", "[[beta]]{is_a: gamma}\n");
    write_file(dir.path(), "pages/c.md", "[[gamma]]{is_a: alpha}\n");

    let mut wiki = WikiCompiler::open(dir.path()).unwrap();
    let report = wiki.parse_path(Path::new("pages")).unwrap();

    let rejections: Vec<_> = report.rejections().collect();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].reference, "gamma");
    assert_eq!(
        rejections[0].cycle.first(),
        rejections[0].cycle.last()
    );

    // The first two declarations survive; the graph stays acyclic.
    assert!(wiki.graph().committed_cycles().is_empty());
    assert!(wiki
        .graph()
        .edges()
        .iter()
        .any(|e| e.source == "alpha" && e.relation == "is_a"));
    assert!(wiki
        .graph()
        .edges()
        .iter()
        .any(|e| e.source == "beta" && e.relation == "is_a"));
    assert!(!wiki
        .graph()
        .edges()
        .iter()
        .any(|e| e.source == "gamma" && e.relation == "is_a"));

    // gamma itself still resolved (every parent rejected leaves no
    // resolution, so it has no node).
    assert!(wiki.graph().node("gamma").is_none());
}

#[test]
fn test_hierarchy_search_after_full_parse() {
    let dir = create_bank_wiki();
    let mut wiki = WikiCompiler::open(dir.path()).unwrap();
    wiki.parse_path(Path::new("pages")).unwrap();

    let results = wiki.search("comm", true);
    assert_eq!(results.len(), 1);
    let chain = results[0].hierarchy.as_ref().unwrap();
    assert_eq!(
        chain,
        &vec![
            "institution/financial/bank/commbank".to_string(),
            "institution/financial/bank".to_string(),
            "institution/financial".to_string(),
        ]
    );
}

#[test]
fn test_report_export_artifact() {
    let dir = create_bank_wiki();
    let mut wiki = WikiCompiler::open(dir.path()).unwrap();
    wiki.parse_path(Path::new("pages")).unwrap();

    let report = wiki.report();
    assert_eq!(
        report.summary.total_errors,
        report.summary.critical + report.summary.warnings + report.summary.info
    );

    let out = dir.path().join("taxon_errors.json");
    wiki.export_report(&report, &out).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(
        value["summary"]["total_errors"].as_u64().unwrap() as usize,
        report.summary.total_errors
    );
    assert!(value["errors_by_type"]["incomplete_hierarchy"].is_array());
}

#[test]
fn test_config_controls_layout_and_auto_apply() {
    common::init_logging();
    let dir = tempfile::TempDir::new().unwrap();
    write_file(
        dir.path(),
        "taxon.toml",
        "concepts_dir = \"ontology\"\nauto_apply = true\n",
    );
    write_file(
        dir.path(),
        "pages/finance.md",
        "[[bank/financial]]{is_a: institution/financial}\n",
    );

    let mut wiki = WikiCompiler::open(dir.path()).unwrap();
    assert!(wiki.config().auto_apply);
    wiki.parse_path(Path::new("pages")).unwrap();
    assert_eq!(
        wiki.staged()[0].file,
        "ontology/institution/financial/bank.md"
    );
    wiki.apply(false).unwrap();
    assert!(dir
        .path()
        .join("ontology/institution/financial/bank.md")
        .exists());
}

#[test]
fn test_malformed_links_skip_without_aborting_file() {
    common::init_logging();
    let dir = tempfile::TempDir::new().unwrap();
    write_file(
        dir.path(),
        "pages/mixed.md",
        "[[Bad Name]]{is_a: thing}\n\n[[good_concept]]{is_a: thing}\n",
    );

    let mut wiki = WikiCompiler::open(dir.path()).unwrap();
    let report = wiki.parse_path(Path::new("pages")).unwrap();

    assert_eq!(report.committed(), 1);
    assert_eq!(report.files[0].diagnostics.len(), 1);
    assert!(wiki.graph().contains_node("good_concept"));
}
