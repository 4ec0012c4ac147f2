//! The wiki compiler: orchestrates extraction, resolution, graph commits,
//! staging, and persistence for one wiki root.
//!
//! A parse run is idempotent: re-parsing unchanged sources produces an
//! identical graph and taxonomy and appends nothing to the changelog.
//! Structural problems found along the way (rejected cycles, malformed
//! links) are collected per file and never abort the run.

use crate::{
    config::WikiConfig,
    diagnostics::{self, build_report, DiagnosticsEngine, ErrorReport, Finding},
    error::TaxonError,
    extract::{extract_links, ParseDiagnostic},
    graph::GraphStore,
    resolve::{resolve, CircularRejection},
    search::{SearchEngine, SearchResult},
    staging::{ApplyReport, ChangelogEntry, StagedChange, Stager},
    store::{GraphMetadata, WikiStore},
    taxonomy::TaxonomyIndex,
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Per-file outcome of a parse run.
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    pub path: String,
    /// Link statements found in the file.
    pub links: usize,
    /// Concepts committed to the graph.
    pub committed: usize,
    pub diagnostics: Vec<ParseDiagnostic>,
    pub rejections: Vec<CircularRejection>,
}

/// Outcome of a whole parse run.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub files: Vec<FileReport>,
}

impl ParseReport {
    pub fn links(&self) -> usize {
        self.files.iter().map(|f| f.links).sum()
    }

    pub fn committed(&self) -> usize {
        self.files.iter().map(|f| f.committed).sum()
    }

    pub fn rejections(&self) -> impl Iterator<Item = &CircularRejection> {
        self.files.iter().flat_map(|f| f.rejections.iter())
    }

    /// Critical findings for every `is_a` edge rejected during this run.
    /// Rejected edges never reach the graph, so the diagnostics pass cannot
    /// see them; the parse report is their only surface.
    pub fn rejection_findings(&self) -> Vec<Finding> {
        self.rejections()
            .map(|r| diagnostics::circular_reference_finding(&r.cycle))
            .collect()
    }
}

/// Wiki statistics summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WikiStats {
    pub nodes: usize,
    pub edges: usize,
    pub taxonomy_mappings: usize,
    pub changelog_entries: usize,
    pub staged_changes: usize,
}

/// Compiler over one wiki root. Holds the loaded artifacts, mutates them
/// through parse and apply, and persists them on [`WikiCompiler::save`].
pub struct WikiCompiler {
    root: PathBuf,
    config: WikiConfig,
    store: WikiStore,
    graph: GraphStore,
    metadata: GraphMetadata,
    taxonomy: TaxonomyIndex,
    changelog: Vec<ChangelogEntry>,
    stager: Stager,
}

impl WikiCompiler {
    /// Open a wiki root, loading config and any existing artifacts.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TaxonError> {
        let root = root.into();
        let config = WikiConfig::load(&root)?;
        let store = WikiStore::new(&root, config.clone());
        let (graph, metadata) = store.load_graph()?;
        let taxonomy = store.load_taxonomy()?;
        let changelog = store.load_changelog()?;
        tracing::info!(
            root = %root.display(),
            nodes = graph.node_count(),
            mappings = taxonomy.len(),
            "wiki opened"
        );
        Ok(WikiCompiler {
            stager: Stager::new(&root),
            root,
            config,
            store,
            graph,
            metadata,
            taxonomy,
            changelog,
        })
    }

    pub fn config(&self) -> &WikiConfig {
        &self.config
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn taxonomy(&self) -> &TaxonomyIndex {
        &self.taxonomy
    }

    pub fn staged(&self) -> &[StagedChange] {
        self.stager.preview()
    }

    /// Parse one file or every `*.md` under a directory, committing concepts
    /// and relations to the graph and staging any derived concept files.
    /// Files are visited in sorted order so runs are deterministic.
    pub fn parse_path(&mut self, path: &Path) -> Result<ParseReport, TaxonError> {
        let target = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        if !target.exists() {
            return Err(TaxonError::NotFound(format!(
                "no such file or directory: {}",
                target.display()
            )));
        }

        let files: Vec<PathBuf> = if target.is_file() {
            vec![target]
        } else {
            WalkDir::new(&target)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("md"))
                .map(|e| e.into_path())
                .collect()
        };

        let mut report = ParseReport::default();
        for file in files {
            report.files.push(self.parse_file(&file)?);
        }
        tracing::info!(
            files = report.files.len(),
            links = report.links(),
            committed = report.committed(),
            "parse run complete"
        );
        Ok(report)
    }

    fn parse_file(&mut self, path: &Path) -> Result<FileReport, TaxonError> {
        let relative = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let content = std::fs::read_to_string(path)?;
        let (links, diagnostics) = extract_links(&content);

        // A file inside the concepts directory classifies its bare links:
        // concepts/institution/financial.md puts them under
        // institution/financial.
        let context = relative
            .strip_prefix(&format!("{}/", self.config.concepts_dir))
            .and_then(|rest| rest.strip_suffix(".md"))
            .filter(|c| *c != ".index" && !c.ends_with("/.index"))
            .map(str::to_string);

        let mut report = FileReport {
            path: relative.clone(),
            links: links.len(),
            diagnostics,
            ..FileReport::default()
        };

        for link in links {
            let parents = link.is_a_values();
            let outcome = resolve(
                &link.reference,
                &parents,
                context.as_deref(),
                &self.taxonomy,
                &self.graph,
            );
            report.rejections.extend(outcome.rejections.iter().cloned());

            let Some(resolution) = outcome.resolution else {
                // Every declared parent closed a cycle; nothing commits for
                // this statement.
                continue;
            };

            let rejected: Vec<&String> =
                outcome.rejections.iter().map(|r| &r.parent).collect();

            self.taxonomy.register(&resolution);
            self.graph.upsert_node(
                &link.reference,
                &resolution.primary_path,
                Some(&relative),
                &link.properties(),
            );

            for parent in parents.iter().filter(|p| !rejected.contains(p)) {
                let target = self
                    .taxonomy
                    .reference_of(parent)
                    .cloned()
                    .unwrap_or_else(|| parent.clone());
                self.graph
                    .upsert_edge(&link.reference, crate::relations::IS_A, &target, Some(&relative));
            }
            for (relation, target) in link.relation_targets() {
                if relation == crate::relations::IS_A {
                    continue;
                }
                self.graph
                    .upsert_edge(&link.reference, relation, target, Some(&relative));
            }

            self.stage_derived_file(&resolution.reference, &resolution.primary_path, !parents.is_empty());
            report.committed += 1;
        }

        tracing::debug!(
            file = %relative,
            links = report.links,
            committed = report.committed,
            "file parsed"
        );
        Ok(report)
    }

    /// Stage creation of the concept file a committed classification implies,
    /// when it does not exist yet. Only classified concepts (those with a
    /// declared hierarchy) get generated files.
    fn stage_derived_file(&mut self, reference: &str, classification: &str, classified: bool) {
        if !classified || classification == reference {
            return;
        }
        let file = self.config.concept_file(classification);
        if self.root.join(&file).exists()
            || self.stager.preview().iter().any(|c| c.file == file)
        {
            return;
        }
        self.stager.stage_create(&self.config, classification, None);
    }

    /// Apply staged changes. A dry run validates without side effects; a
    /// real run writes files, appends to the changelog, and persists all
    /// artifacts.
    pub fn apply(&mut self, dry_run: bool) -> Result<ApplyReport, TaxonError> {
        let report = self.stager.apply(&mut self.changelog, dry_run);
        if !dry_run {
            self.save()?;
        }
        Ok(report)
    }

    /// Persist graph, taxonomy, and changelog.
    pub fn save(&mut self) -> Result<(), TaxonError> {
        self.store
            .save(&self.graph, &mut self.metadata, &self.taxonomy, &self.changelog)
    }

    /// Audit the changelog's checksums against on-disk content. A mismatch
    /// means an applied write was altered outside normal operation.
    pub fn verify_changelog(&self) -> Result<(), TaxonError> {
        crate::staging::verify_changelog(&self.root, &self.changelog)
    }

    /// Run the eight diagnostic checks.
    pub fn check(&self) -> Vec<Finding> {
        DiagnosticsEngine::new(&self.graph, &self.taxonomy, &self.config, &self.root).check_all()
    }

    /// Run diagnostics and build the structured report artifact.
    pub fn report(&self) -> ErrorReport {
        build_report(self.check())
    }

    pub fn export_report(&self, report: &ErrorReport, path: &Path) -> Result<(), TaxonError> {
        self.store.export_report(report, path)
    }

    /// Search the graph.
    pub fn search(&self, query: &str, include_hierarchy: bool) -> Vec<SearchResult> {
        SearchEngine::new(&self.graph, &self.taxonomy).search(query, include_hierarchy)
    }

    pub fn stats(&self) -> WikiStats {
        WikiStats {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            taxonomy_mappings: self.taxonomy.len(),
            changelog_entries: self.changelog.len(),
            staged_changes: self.stager.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn wiki_with(files: &[(&str, &str)]) -> (TempDir, WikiCompiler) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let compiler = WikiCompiler::open(dir.path()).unwrap();
        (dir, compiler)
    }

    #[test]
    fn test_parse_commits_nodes_edges_and_taxonomy() {
        let (_dir, mut compiler) = wiki_with(&[(
            "pages/banks.md",
            "# Banks\n\n[[bank/financial]]{is_a: institution/financial, offers: loans}\n",
        )]);

        let report = compiler.parse_path(Path::new("pages")).unwrap();
        assert_eq!(report.links(), 1);
        assert_eq!(report.committed(), 1);

        assert_eq!(
            compiler
                .taxonomy()
                .classification_of("bank/financial")
                .unwrap(),
            "institution/financial/bank"
        );
        let node = compiler.graph().node("bank/financial").unwrap();
        assert_eq!(node.sources, vec!["pages/banks.md"]);
        // is_a + offers, each with an inferred inverse.
        assert_eq!(compiler.graph().edge_count(), 4);
    }

    #[test]
    fn test_reparse_is_idempotent() {
        let (_dir, mut compiler) = wiki_with(&[(
            "pages/banks.md",
            "[[bank/financial]]{is_a: institution/financial}\n",
        )]);

        compiler.parse_path(Path::new("pages")).unwrap();
        let nodes = compiler.graph().node_count();
        let edges = compiler.graph().edge_count();
        let changelog = compiler.stats().changelog_entries;

        compiler.parse_path(Path::new("pages")).unwrap();
        assert_eq!(compiler.graph().node_count(), nodes);
        assert_eq!(compiler.graph().edge_count(), edges);
        assert_eq!(compiler.stats().changelog_entries, changelog);
    }

    #[test]
    fn test_cycle_closing_edge_rejected_earlier_links_survive() {
        let (_dir, mut compiler) = wiki_with(&[(
            "pages/cycle.md",
            "[[a]]{is_a: b}\n[[b]]{is_a: c}\n[[c]]{is_a: a}\n",
        )]);

        let report = compiler.parse_path(Path::new("pages")).unwrap();
        let rejections: Vec<_> = report.rejections().collect();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].reference, "c");

        // The first two edges stand; the closing edge never committed.
        let graph = compiler.graph();
        assert!(graph
            .edges()
            .iter()
            .any(|e| e.source == "a" && e.relation == "is_a" && e.target == "b"));
        assert!(graph
            .edges()
            .iter()
            .any(|e| e.source == "b" && e.relation == "is_a" && e.target == "c"));
        assert!(!graph
            .edges()
            .iter()
            .any(|e| e.source == "c" && e.relation == "is_a" && e.target == "a"));
        assert!(graph.committed_cycles().is_empty());
        assert_eq!(report.rejection_findings().len(), 1);
    }

    #[test]
    fn test_redeclared_reference_cannot_close_cycle() {
        // a is indexed by its first declaration; a later re-declaration
        // with a descendant as parent must be rejected, not committed.
        let (_dir, mut compiler) = wiki_with(&[
            ("pages/01_thing.md", "[[a]]{is_a: thing}\n"),
            ("pages/02_child.md", "[[c]]{is_a: a}\n"),
            ("pages/03_loop.md", "[[a]]{is_a: c}\n"),
        ]);

        let report = compiler.parse_path(Path::new("pages")).unwrap();
        let rejections: Vec<_> = report.rejections().collect();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].reference, "a");
        assert_eq!(rejections[0].parent, "c");

        let graph = compiler.graph();
        assert!(!graph
            .edges()
            .iter()
            .any(|e| e.source == "a" && e.relation == "is_a" && e.target == "c"));
        assert!(graph.committed_cycles().is_empty());
        // The original classification stands.
        assert_eq!(
            compiler.taxonomy().classification_of("a").unwrap(),
            "thing/a"
        );
    }

    #[test]
    fn test_concept_file_context_classifies_bare_links() {
        let (_dir, mut compiler) = wiki_with(&[
            (
                "concepts/institution/financial.md",
                "[[teller]]{part_of: counter}\n",
            ),
            ("pages/notes.md", "[[drifter]]{part_of: nothing}\n"),
        ]);

        compiler.parse_path(Path::new("concepts")).unwrap();
        compiler.parse_path(Path::new("pages")).unwrap();

        // Under the concepts directory the file's own classification is
        // inherited; elsewhere a bare link stands alone.
        assert_eq!(
            compiler.taxonomy().classification_of("teller").unwrap(),
            "institution/financial/teller"
        );
        assert_eq!(
            compiler.taxonomy().classification_of("drifter").unwrap(),
            "drifter"
        );
    }

    #[test]
    fn test_parse_stages_missing_concept_files() {
        let (dir, mut compiler) = wiki_with(&[(
            "pages/banks.md",
            "[[bank/financial]]{is_a: institution/financial}\n",
        )]);

        compiler.parse_path(Path::new("pages")).unwrap();
        let staged = compiler.staged();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].file, "concepts/institution/financial/bank.md");

        let apply = compiler.apply(false).unwrap();
        assert_eq!(apply.applied.len(), 1);
        assert!(dir
            .path()
            .join("concepts/institution/financial/bank.md")
            .exists());
        assert_eq!(compiler.stats().changelog_entries, 1);
        // Artifacts persisted.
        assert!(dir.path().join("graph.json").exists());
        assert!(dir.path().join("taxonomy.json").exists());
        assert!(dir.path().join("changelog.json").exists());
    }

    #[test]
    fn test_dry_run_apply_leaves_no_trace() {
        let (dir, mut compiler) = wiki_with(&[(
            "pages/banks.md",
            "[[bank/financial]]{is_a: institution/financial}\n",
        )]);

        compiler.parse_path(Path::new("pages")).unwrap();
        let apply = compiler.apply(true).unwrap();
        assert!(apply.dry_run);
        assert!(!dir
            .path()
            .join("concepts/institution/financial/bank.md")
            .exists());
        assert!(!dir.path().join("changelog.json").exists());
        assert_eq!(compiler.staged().len(), 1);
    }

    #[test]
    fn test_unclassified_reference_stages_nothing() {
        let (_dir, mut compiler) =
            wiki_with(&[("pages/notes.md", "[[commbank]]{located_in: australia}\n")]);

        compiler.parse_path(Path::new("pages")).unwrap();
        assert!(compiler.staged().is_empty());
        // The reference still resolves to itself and commits.
        assert_eq!(
            compiler.taxonomy().classification_of("commbank").unwrap(),
            "commbank"
        );
    }

    #[test]
    fn test_state_survives_reopen() {
        let (dir, mut compiler) = wiki_with(&[(
            "pages/banks.md",
            "[[bank/financial]]{is_a: institution/financial}\n",
        )]);
        compiler.parse_path(Path::new("pages")).unwrap();
        compiler.apply(false).unwrap();
        let stats = compiler.stats();
        drop(compiler);

        let reopened = WikiCompiler::open(dir.path()).unwrap();
        assert_eq!(reopened.stats().nodes, stats.nodes);
        assert_eq!(reopened.stats().edges, stats.edges);
        assert_eq!(reopened.stats().taxonomy_mappings, stats.taxonomy_mappings);
        assert_eq!(reopened.stats().changelog_entries, stats.changelog_entries);
    }

    #[test]
    fn test_search_via_compiler_end_to_end() {
        let (_dir, mut compiler) = wiki_with(&[(
            "pages/banks.md",
            "[[bank/financial]]{is_a: institution/financial}\n\
             [[bank/geology]]{is_a: geological/formation}\n",
        )]);
        compiler.parse_path(Path::new("pages")).unwrap();

        let results = compiler.search("bank", false);
        let paths: Vec<&str> = results
            .iter()
            .map(|r| r.classification_path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec!["geological/formation/bank", "institution/financial/bank"]
        );
    }

    #[test]
    fn test_check_reports_missing_parents() {
        let (_dir, mut compiler) = wiki_with(&[(
            "pages/banks.md",
            "[[bank/financial]]{is_a: institution/financial}\n\
             [[bank/geology]]{is_a: geological/formation}\n",
        )]);
        compiler.parse_path(Path::new("pages")).unwrap();

        let findings = compiler.check();
        let incomplete: Vec<_> = findings
            .iter()
            .filter(|f| {
                f.error_type == crate::diagnostics::DiagnosticKind::IncompleteHierarchy
            })
            .collect();
        assert_eq!(incomplete.len(), 2);
        let duplicates = findings
            .iter()
            .filter(|f| f.error_type == crate::diagnostics::DiagnosticKind::DuplicateConcept)
            .count();
        assert_eq!(duplicates, 0);
    }
}
