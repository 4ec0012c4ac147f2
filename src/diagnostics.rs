//! Diagnostics engine: cross-validates graph, taxonomy, and filesystem
//! state.
//!
//! Eight independent checks each produce zero or more [`Finding`]s. Findings
//! are recomputed fresh on every run and never persisted as authoritative
//! state; the error report is an export artifact. Every finding carries a
//! machine `fix_action` tag and a `fix_params` payload sufficient to drive
//! an automated fixer without re-deriving context.
//!
//! Findings are not exceptions: structural inconsistencies never block
//! parsing or search.

use crate::{
    config::WikiConfig,
    graph::GraphStore,
    relations,
    taxonomy::TaxonomyIndex,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::Path,
};
use walkdir::WalkDir;

/// Finding severity. Ordering is report order: critical first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// The eight structural inconsistency classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MissingReference,
    OrphanedFile,
    CircularReference,
    IncompleteHierarchy,
    ClassificationMismatch,
    MissingInverse,
    TaxonomyOrphan,
    DuplicateConcept,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::CircularReference => Severity::Critical,
            DiagnosticKind::MissingReference
            | DiagnosticKind::IncompleteHierarchy
            | DiagnosticKind::ClassificationMismatch
            | DiagnosticKind::TaxonomyOrphan
            | DiagnosticKind::DuplicateConcept => Severity::Warning,
            DiagnosticKind::OrphanedFile | DiagnosticKind::MissingInverse => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MissingReference => "missing_reference",
            DiagnosticKind::OrphanedFile => "orphaned_file",
            DiagnosticKind::CircularReference => "circular_reference",
            DiagnosticKind::IncompleteHierarchy => "incomplete_hierarchy",
            DiagnosticKind::ClassificationMismatch => "classification_mismatch",
            DiagnosticKind::MissingInverse => "missing_inverse",
            DiagnosticKind::TaxonomyOrphan => "taxonomy_orphan",
            DiagnosticKind::DuplicateConcept => "duplicate_concept",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine fix-action vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixAction {
    CreateConcept,
    ParseFile,
    RemoveCircular,
    CreateParent,
    MoveFile,
    AddInverse,
    RemoveStaleTaxonomy,
    MergeConcepts,
}

impl FixAction {
    /// Deterministic, reversible actions are safe to auto-apply; the rest
    /// require a judgment call the engine cannot make unambiguously.
    pub fn auto_applicable(&self) -> bool {
        matches!(
            self,
            FixAction::ParseFile | FixAction::AddInverse | FixAction::RemoveStaleTaxonomy
        )
    }
}

/// One structured diagnostic finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub error_type: DiagnosticKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
    pub message: String,
    /// What problems this causes.
    pub impact: String,
    /// Specific steps to fix.
    pub fix_instructions: String,
    pub fix_action: FixAction,
    pub fix_params: serde_json::Value,
}

/// Build the critical finding for a rejected or committed `is_a` cycle.
/// Also used by the parse pipeline to surface per-edge rejections.
pub fn circular_reference_finding(cycle: &[String]) -> Finding {
    let cycle_str = cycle.join(" -> ");
    // Suggested break point: the last edge that closed the loop.
    let suggested_break: Vec<&String> = if cycle.len() >= 2 {
        cycle[cycle.len() - 2..].iter().collect()
    } else {
        cycle.iter().collect()
    };
    Finding {
        error_type: DiagnosticKind::CircularReference,
        severity: Severity::Critical,
        file_path: None,
        concept: cycle.first().cloned(),
        message: format!("Circular inheritance detected: {cycle_str}"),
        impact: "Specificity cannot be measured. Hierarchy traversal would loop. \
                 Reasoning about types becomes impossible."
            .to_string(),
        fix_instructions: format!(
            "Remove one is_a relationship to break the cycle, e.g. '{}' should not be a '{}'.",
            suggested_break.first().map(|s| s.as_str()).unwrap_or(""),
            suggested_break.last().map(|s| s.as_str()).unwrap_or("")
        ),
        fix_action: FixAction::RemoveCircular,
        fix_params: json!({ "cycle": cycle, "suggested_break": suggested_break }),
    }
}

/// Read-only validator over graph, taxonomy, and the wiki filesystem.
pub struct DiagnosticsEngine<'a> {
    graph: &'a GraphStore,
    taxonomy: &'a TaxonomyIndex,
    config: &'a WikiConfig,
    root: &'a Path,
}

impl<'a> DiagnosticsEngine<'a> {
    pub fn new(
        graph: &'a GraphStore,
        taxonomy: &'a TaxonomyIndex,
        config: &'a WikiConfig,
        root: &'a Path,
    ) -> Self {
        DiagnosticsEngine {
            graph,
            taxonomy,
            config,
            root,
        }
    }

    /// Run all eight checks. Findings are sorted critical, warning, info.
    pub fn check_all(&self) -> Vec<Finding> {
        let mut findings = Vec::new();
        self.check_missing_references(&mut findings);
        self.check_orphaned_files(&mut findings);
        self.check_circular_references(&mut findings);
        self.check_incomplete_hierarchies(&mut findings);
        self.check_classification_mismatches(&mut findings);
        self.check_missing_inverses(&mut findings);
        self.check_taxonomy_orphans(&mut findings);
        self.check_duplicate_concepts(&mut findings);

        findings.sort_by_key(|f| f.severity);
        tracing::debug!(count = findings.len(), "diagnostics complete");
        findings
    }

    /// A declared, non-`is_a` edge whose target id has no node. Absent
    /// `is_a` parents are the incomplete_hierarchy check's concern.
    fn check_missing_references(&self, findings: &mut Vec<Finding>) {
        let mut seen: BTreeSet<(String, Option<String>)> = BTreeSet::new();
        for edge in self.graph.edges() {
            if edge.inferred
                || edge.relation == relations::IS_A
                || self.graph.contains_node(&edge.target)
            {
                continue;
            }
            if !seen.insert((edge.target.clone(), edge.source_file.clone())) {
                continue;
            }
            findings.push(Finding {
                error_type: DiagnosticKind::MissingReference,
                severity: DiagnosticKind::MissingReference.severity(),
                file_path: edge.source_file.clone(),
                concept: Some(edge.target.clone()),
                message: format!(
                    "Broken link: reference to non-existent concept '[[{}]]'",
                    edge.target
                ),
                impact: "Search will not find this concept and its relationships cannot be \
                         traversed; the graph is incomplete."
                    .to_string(),
                fix_instructions: format!(
                    "Create a concept file for '{}' with an appropriate is_a relationship, \
                     fix the reference to point at an existing concept, or remove it.",
                    edge.target
                ),
                fix_action: FixAction::CreateConcept,
                fix_params: json!({
                    "concept_name": edge.target,
                    "source_file": edge.source_file,
                }),
            });
        }
    }

    /// A file under the concept root that contributed no node.
    fn check_orphaned_files(&self, findings: &mut Vec<Finding>) {
        let concepts_path = self.config.concepts_path(self.root);
        if !concepts_path.exists() {
            return;
        }

        let referenced: BTreeSet<&str> = self
            .graph
            .nodes()
            .flat_map(|(_, node)| node.sources.iter().map(String::as_str))
            .collect();

        for entry in WalkDir::new(&concepts_path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(self.root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if relative.ends_with(".index.md") || referenced.contains(relative.as_str()) {
                continue;
            }
            findings.push(Finding {
                error_type: DiagnosticKind::OrphanedFile,
                severity: DiagnosticKind::OrphanedFile.severity(),
                file_path: Some(relative.clone()),
                concept: None,
                message: format!(
                    "Orphaned file: '{relative}' exists but is not connected to the knowledge graph"
                ),
                impact: "Content is unreachable through search and classification navigation."
                    .to_string(),
                fix_instructions: format!(
                    "Parse the file to add it to the graph, add [[concept]] link statements \
                     with is_a relationships to it, or remove '{relative}' if obsolete."
                ),
                fix_action: FixAction::ParseFile,
                fix_params: json!({ "file_path": relative }),
            });
        }
    }

    /// Cycles in committed `is_a` edges.
    fn check_circular_references(&self, findings: &mut Vec<Finding>) {
        for cycle in self.graph.committed_cycles() {
            findings.push(circular_reference_finding(&cycle));
        }
    }

    /// A node whose immediate primary parent path has no corresponding
    /// node.
    fn check_incomplete_hierarchies(&self, findings: &mut Vec<Finding>) {
        for (id, node) in self.graph.nodes() {
            let Some((parent_path, _)) = node.classification_path.rsplit_once('/') else {
                continue;
            };
            if self.concept_exists_at(parent_path) {
                continue;
            }
            let source = node.sources.first().cloned();
            findings.push(Finding {
                error_type: DiagnosticKind::IncompleteHierarchy,
                severity: DiagnosticKind::IncompleteHierarchy.severity(),
                file_path: source.clone(),
                concept: Some(id.clone()),
                message: format!(
                    "Missing parent: classification '{parent_path}' is referenced but no such \
                     concept exists"
                ),
                impact: "Hierarchy traversal stops short and search results may be incomplete."
                    .to_string(),
                fix_instructions: format!(
                    "Create the parent concept '{parent_path}', or reclassify '{id}' under an \
                     existing parent."
                ),
                fix_action: FixAction::CreateParent,
                fix_params: json!({
                    "parent_path": parent_path,
                    "child_classification": node.classification_path,
                    "child_file": source,
                }),
            });
        }
    }

    /// A node whose source file location does not mirror its classification
    /// path.
    fn check_classification_mismatches(&self, findings: &mut Vec<Finding>) {
        for (id, node) in self.graph.nodes() {
            if node.sources.is_empty() {
                continue;
            }
            let expected = self.config.concept_file(&node.classification_path);
            for source in &node.sources {
                if source == &expected {
                    continue;
                }
                findings.push(Finding {
                    error_type: DiagnosticKind::ClassificationMismatch,
                    severity: DiagnosticKind::ClassificationMismatch.severity(),
                    file_path: Some(source.clone()),
                    concept: Some(id.clone()),
                    message: format!(
                        "Location mismatch: file is at '{source}' but classification says it \
                         should be at '{expected}'"
                    ),
                    impact: "The file cannot be found through classification traversal; search \
                             and navigation become inconsistent."
                        .to_string(),
                    fix_instructions: format!(
                        "Move the file from '{source}' to '{expected}', or update the is_a \
                         relationship to match the current location."
                    ),
                    fix_action: FixAction::MoveFile,
                    fix_params: json!({
                        "current_path": source,
                        "expected_path": expected,
                        "classification": node.classification_path,
                    }),
                });
            }
        }
    }

    /// A declared edge whose inverse relation is absent from the target.
    fn check_missing_inverses(&self, findings: &mut Vec<Finding>) {
        let triples: BTreeSet<(&str, &str, &str)> = self
            .graph
            .edges()
            .iter()
            .map(|e| (e.source.as_str(), e.relation.as_str(), e.target.as_str()))
            .collect();

        for edge in self.graph.edges().iter().filter(|e| !e.inferred) {
            let Some(inverse) = relations::inverse_of(&edge.relation) else {
                continue;
            };
            if triples.contains(&(edge.target.as_str(), inverse, edge.source.as_str())) {
                continue;
            }
            findings.push(Finding {
                error_type: DiagnosticKind::MissingInverse,
                severity: DiagnosticKind::MissingInverse.severity(),
                file_path: edge.source_file.clone(),
                concept: Some(edge.source.clone()),
                message: format!(
                    "Missing inverse: '{}' should have '{inverse}' relation back to '{}'",
                    edge.target, edge.source
                ),
                impact: "Navigation is one-way only; the relationship cannot be traversed in \
                         reverse."
                    .to_string(),
                fix_instructions: format!(
                    "Add the relation: [[{}]]{{{inverse}: {}}}",
                    edge.target, edge.source
                ),
                fix_action: FixAction::AddInverse,
                fix_params: json!({
                    "source": edge.target,
                    "relation": inverse,
                    "target": edge.source,
                }),
            });
        }
    }

    /// A taxonomy mapping (primary or alias) whose node no longer exists.
    fn check_taxonomy_orphans(&self, findings: &mut Vec<Finding>) {
        let mut flagged: BTreeSet<&String> = BTreeSet::new();
        let mappings = self
            .taxonomy
            .mappings()
            .map(|(reference, path)| (reference, path.clone()))
            .chain(
                self.taxonomy
                    .alias_entries()
                    .map(|(reference, aliases)| (reference, aliases.join(", "))),
            );

        for (reference, classification) in mappings {
            if self.graph.contains_node(reference) || !flagged.insert(reference) {
                continue;
            }
            findings.push(Finding {
                error_type: DiagnosticKind::TaxonomyOrphan,
                severity: DiagnosticKind::TaxonomyOrphan.severity(),
                file_path: None,
                concept: Some(reference.clone()),
                message: format!(
                    "Stale mapping: taxonomy maps '{reference}' to '{classification}' but the \
                     concept no longer exists"
                ),
                impact: "Classification lookups fail and search may return incorrect results."
                    .to_string(),
                fix_instructions: format!(
                    "Remove the stale taxonomy mapping for '{reference}', or recreate the \
                     missing concept."
                ),
                fix_action: FixAction::RemoveStaleTaxonomy,
                fix_params: json!({
                    "search_path": reference,
                    "classification": classification,
                }),
            });
        }
    }

    /// Two or more distinct node ids resolving to the same classification
    /// path.
    fn check_duplicate_concepts(&self, findings: &mut Vec<Finding>) {
        let mut by_classification: BTreeMap<&str, Vec<&String>> = BTreeMap::new();
        for (id, node) in self.graph.nodes() {
            by_classification
                .entry(node.classification_path.as_str())
                .or_default()
                .push(id);
        }

        for (classification, ids) in by_classification {
            if ids.len() < 2 {
                continue;
            }
            findings.push(Finding {
                error_type: DiagnosticKind::DuplicateConcept,
                severity: DiagnosticKind::DuplicateConcept.severity(),
                file_path: None,
                concept: ids.first().map(|s| (*s).clone()),
                message: format!(
                    "Duplicate classification: multiple concepts share '{classification}': {}",
                    ids.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                ),
                impact: "Search results are ambiguous and graph traversal is non-deterministic."
                    .to_string(),
                fix_instructions: "Merge the duplicate concepts into one, or differentiate \
                                   their classifications."
                    .to_string(),
                fix_action: FixAction::MergeConcepts,
                fix_params: json!({ "classification": classification, "nodes": ids }),
            });
        }
    }

    /// Whether a concept node exists whose primary classification path is
    /// `path`.
    fn concept_exists_at(&self, path: &str) -> bool {
        if let Some(reference) = self.taxonomy.reference_of(path) {
            if self.graph.contains_node(reference) {
                return true;
            }
        }
        self.graph
            .nodes()
            .any(|(_, node)| node.classification_path == path)
    }
}

/// Report summary counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_errors: usize,
    pub critical: usize,
    pub warnings: usize,
    pub info: usize,
}

/// The exported error report artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub summary: ReportSummary,
    pub errors_by_type: BTreeMap<String, Vec<Finding>>,
    pub fixable_automatically: Vec<Finding>,
    pub requires_human_review: Vec<Finding>,
    pub all_errors: Vec<Finding>,
}

/// Partition findings into the structured report.
pub fn build_report(findings: Vec<Finding>) -> ErrorReport {
    let mut report = ErrorReport {
        summary: ReportSummary {
            total_errors: findings.len(),
            critical: findings
                .iter()
                .filter(|f| f.severity == Severity::Critical)
                .count(),
            warnings: findings
                .iter()
                .filter(|f| f.severity == Severity::Warning)
                .count(),
            info: findings
                .iter()
                .filter(|f| f.severity == Severity::Info)
                .count(),
        },
        errors_by_type: BTreeMap::new(),
        fixable_automatically: Vec::new(),
        requires_human_review: Vec::new(),
        all_errors: Vec::new(),
    };

    for finding in findings {
        report
            .errors_by_type
            .entry(finding.error_type.as_str().to_string())
            .or_default()
            .push(finding.clone());
        if finding.fix_action.auto_applicable() {
            report.fixable_automatically.push(finding.clone());
        } else {
            report.requires_human_review.push(finding.clone());
        }
        report.all_errors.push(finding);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_fixture() -> (GraphStore, TaxonomyIndex, WikiConfig) {
        (
            GraphStore::default(),
            TaxonomyIndex::default(),
            WikiConfig::default(),
        )
    }

    #[test]
    fn test_severity_order_is_report_order() {
        assert!(Severity::Critical < Severity::Warning);
        assert!(Severity::Warning < Severity::Info);
    }

    #[test]
    fn test_fix_action_partition() {
        assert!(FixAction::ParseFile.auto_applicable());
        assert!(FixAction::AddInverse.auto_applicable());
        assert!(FixAction::RemoveStaleTaxonomy.auto_applicable());
        for action in [
            FixAction::CreateConcept,
            FixAction::RemoveCircular,
            FixAction::CreateParent,
            FixAction::MoveFile,
            FixAction::MergeConcepts,
        ] {
            assert!(!action.auto_applicable());
        }
    }

    #[test]
    fn test_missing_reference_for_non_is_a_edge() {
        let (mut graph, taxonomy, config) = engine_fixture();
        let root = std::path::Path::new(".");
        graph.upsert_node("bank", "bank", Some("doc.md"), &[]);
        graph.upsert_edge("bank", "located_in", "australia", Some("doc.md"));

        let engine = DiagnosticsEngine::new(&graph, &taxonomy, &config, root);
        let mut findings = Vec::new();
        engine.check_missing_references(&mut findings);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].concept.as_deref(), Some("australia"));
        assert_eq!(findings[0].fix_action, FixAction::CreateConcept);
    }

    #[test]
    fn test_incomplete_hierarchy_checks_immediate_parent_only() {
        let (mut graph, taxonomy, config) = engine_fixture();
        let root = std::path::Path::new(".");
        graph.upsert_node(
            "bank/financial",
            "institution/financial/bank",
            Some("doc.md"),
            &[],
        );

        let engine = DiagnosticsEngine::new(&graph, &taxonomy, &config, root);
        let mut findings = Vec::new();
        engine.check_incomplete_hierarchies(&mut findings);
        // One finding for the missing immediate parent, not one per missing
        // ancestor.
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].fix_params["parent_path"],
            json!("institution/financial")
        );
    }

    #[test]
    fn test_classification_mismatch() {
        let (mut graph, taxonomy, config) = engine_fixture();
        let root = std::path::Path::new(".");
        graph.upsert_node("bank", "institution/bank", Some("pages/banks.md"), &[]);

        let engine = DiagnosticsEngine::new(&graph, &taxonomy, &config, root);
        let mut findings = Vec::new();
        engine.check_classification_mismatches(&mut findings);
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].fix_params["expected_path"],
            json!("concepts/institution/bank.md")
        );
    }

    #[test]
    fn test_missing_inverse_detected_on_hand_edited_graph() {
        let (mut graph, taxonomy, config) = engine_fixture();
        let root = std::path::Path::new(".");
        graph.upsert_edge("branch", "part_of", "bank", None);

        // Simulate a hand-edited graph document that lost the inferred
        // inverse.
        let (nodes, edges) = graph.into_parts();
        let edges = edges.into_iter().filter(|e| !e.inferred).collect();
        let graph = GraphStore::from_parts(nodes, edges);

        let engine = DiagnosticsEngine::new(&graph, &taxonomy, &config, root);
        let mut findings = Vec::new();
        engine.check_missing_inverses(&mut findings);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].fix_params["relation"], json!("has_part"));
    }

    #[test]
    fn test_taxonomy_orphan() {
        let (graph, mut taxonomy, config) = engine_fixture();
        let root = std::path::Path::new(".");
        taxonomy.register(&crate::resolve::Resolution {
            reference: "ghost".to_string(),
            primary_path: "spooky/ghost".to_string(),
            alias_paths: vec![],
        });

        let engine = DiagnosticsEngine::new(&graph, &taxonomy, &config, root);
        let mut findings = Vec::new();
        engine.check_taxonomy_orphans(&mut findings);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].fix_action, FixAction::RemoveStaleTaxonomy);
    }

    #[test]
    fn test_duplicate_concept() {
        let (mut graph, taxonomy, config) = engine_fixture();
        let root = std::path::Path::new(".");
        graph.upsert_node("bank/financial", "institution/bank", None, &[]);
        graph.upsert_node("bank/geology", "institution/bank", None, &[]);

        let engine = DiagnosticsEngine::new(&graph, &taxonomy, &config, root);
        let mut findings = Vec::new();
        engine.check_duplicate_concepts(&mut findings);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].error_type, DiagnosticKind::DuplicateConcept);
    }

    #[test]
    fn test_report_partitions_and_counts() {
        let findings = vec![
            circular_reference_finding(&["a".to_string(), "b".to_string(), "a".to_string()]),
            Finding {
                error_type: DiagnosticKind::MissingInverse,
                severity: Severity::Info,
                file_path: None,
                concept: None,
                message: "m".to_string(),
                impact: "i".to_string(),
                fix_instructions: "f".to_string(),
                fix_action: FixAction::AddInverse,
                fix_params: json!({}),
            },
        ];

        let report = build_report(findings);
        assert_eq!(report.summary.total_errors, 2);
        assert_eq!(report.summary.critical, 1);
        assert_eq!(report.summary.info, 1);
        assert_eq!(report.fixable_automatically.len(), 1);
        assert_eq!(report.requires_human_review.len(), 1);
        assert!(report.errors_by_type.contains_key("circular_reference"));
    }

    #[test]
    fn test_finding_serializes_with_snake_case_tags() {
        let finding =
            circular_reference_finding(&["a".to_string(), "b".to_string(), "a".to_string()]);
        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["error_type"], json!("circular_reference"));
        assert_eq!(value["severity"], json!("critical"));
        assert_eq!(value["fix_action"], json!("remove_circular"));
    }
}
