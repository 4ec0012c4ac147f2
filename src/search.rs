//! Hierarchical search over classification paths.
//!
//! An inverted index maps every path segment (including each concept's own
//! name and its reference segments) to the concepts containing it. Queries
//! return specificity-ranked, depth-truncated results:
//!
//! - a result's path is truncated at the matched segment, so searching
//!   `bank` surfaces `institution/financial/bank` rather than its
//!   descendants;
//! - any result whose path has another matching result as a strict
//!   segment-prefix is suppressed (only the shallowest match along a
//!   lineage is kept);
//! - survivors are ordered by depth descending (more specific first), ties
//!   broken lexicographically for determinism.
//!
//! The optional hierarchy mode walks `is_a` edges upward from each result.
//! The walk shares the cycle detector's traversal bound so an undetected
//! cycle cannot hang it.

use crate::{
    graph::{ConceptNode, GraphStore, MAX_TRAVERSAL},
    taxonomy::TaxonomyIndex,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub reference: String,
    /// Classification path truncated at the matched segment.
    pub classification_path: String,
    pub full_classification_path: String,
    /// Segment count of the truncated path; the specificity rank key.
    pub depth: usize,
    pub matched_term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<Vec<String>>,
}

/// Read-only search engine over a graph and taxonomy snapshot.
pub struct SearchEngine<'a> {
    graph: &'a GraphStore,
    taxonomy: &'a TaxonomyIndex,
    /// segment -> references whose classification path or reference
    /// contains the segment.
    index: BTreeMap<String, BTreeSet<String>>,
}

impl<'a> SearchEngine<'a> {
    pub fn new(graph: &'a GraphStore, taxonomy: &'a TaxonomyIndex) -> Self {
        let mut index: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (id, node) in graph.nodes() {
            for segment in node.classification_path.split('/') {
                index
                    .entry(segment.to_lowercase())
                    .or_default()
                    .insert(id.clone());
            }
            for segment in id.split('/') {
                index
                    .entry(segment.to_lowercase())
                    .or_default()
                    .insert(id.clone());
            }
        }
        SearchEngine {
            graph,
            taxonomy,
            index,
        }
    }

    /// Number of distinct indexed segments.
    pub fn segment_count(&self) -> usize {
        self.index.len()
    }

    /// Execute a query. With `include_hierarchy`, each result carries its
    /// ancestor chain from the matched path up to the hierarchy root.
    pub fn search(&self, query: &str, include_hierarchy: bool) -> Vec<SearchResult> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        // Candidate references come from index segments containing the term.
        let mut candidates: BTreeSet<&String> = BTreeSet::new();
        for (segment, references) in &self.index {
            if segment.contains(&query) {
                candidates.extend(references.iter());
            }
        }

        // Truncate each candidate at its matched segment; the first node to
        // claim a truncated path keeps it.
        let mut by_path: BTreeMap<String, SearchResult> = BTreeMap::new();
        for reference in candidates {
            let Some(node) = self.graph.node(reference) else {
                continue;
            };
            let Some((truncated, matched_term)) = truncate_at_match(node, &query) else {
                continue;
            };
            by_path.entry(truncated.clone()).or_insert_with(|| {
                let depth = truncated.split('/').count();
                SearchResult {
                    reference: reference.clone(),
                    classification_path: truncated,
                    full_classification_path: node.classification_path.clone(),
                    depth,
                    matched_term,
                    hierarchy: None,
                }
            });
        }

        // Truncation law: drop any path with another matching path as a
        // strict segment-prefix.
        let paths: Vec<String> = by_path.keys().cloned().collect();
        let mut results: Vec<SearchResult> = by_path
            .into_values()
            .filter(|result| {
                !paths.iter().any(|other| {
                    other != &result.classification_path
                        && is_segment_prefix(other, &result.classification_path)
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.depth
                .cmp(&a.depth)
                .then_with(|| a.classification_path.cmp(&b.classification_path))
        });

        if include_hierarchy {
            for result in &mut results {
                result.hierarchy = Some(self.ancestor_chain(result));
            }
        }

        tracing::debug!(%query, results = results.len(), "search complete");
        results
    }

    /// Walk `is_a` edges upward from a result's node, producing the chain of
    /// classification paths from the result to the root. Multi-parent nodes
    /// follow their primary lineage: the target owning the node's primary
    /// parent path. The walk stops at a node with no outgoing `is_a` edge,
    /// at [`MAX_TRAVERSAL`] hops, or on revisiting a path.
    fn ancestor_chain(&self, result: &SearchResult) -> Vec<String> {
        let mut chain = vec![result.classification_path.clone()];
        let mut visited: BTreeSet<String> =
            BTreeSet::from([result.classification_path.clone()]);

        let mut current = result.reference.clone();
        for _ in 0..MAX_TRAVERSAL {
            let Some(node) = self.graph.node(&current) else {
                break;
            };
            let Some(targets) = node.is_a_targets() else {
                break;
            };
            let primary_parent = node
                .classification_path
                .rsplit_once('/')
                .map(|(parent, _)| parent);
            let Some(target) = primary_parent
                .and_then(|parent| targets.iter().find(|t| self.target_path(t.as_str()) == parent))
                .or_else(|| targets.iter().next())
            else {
                break;
            };
            let target = self.target_reference(target);
            let parent_path = self
                .graph
                .node(&target)
                .map(|n| n.classification_path.clone())
                .unwrap_or_else(|| target.clone());
            if visited.insert(parent_path.clone()) {
                chain.push(parent_path);
            }
            current = target;
        }
        chain
    }

    /// An is_a target may be a node id or a classification path whose owner
    /// was declared later; map it back to its reference.
    fn target_reference(&self, target: &str) -> String {
        if self.graph.contains_node(target) {
            target.to_string()
        } else {
            self.taxonomy
                .reference_of(target)
                .cloned()
                .unwrap_or_else(|| target.to_string())
        }
    }

    /// The classification path an is_a target stands for.
    fn target_path(&self, target: &str) -> String {
        let reference = self.target_reference(target);
        self.graph
            .node(&reference)
            .map(|n| n.classification_path.clone())
            .unwrap_or(reference)
    }
}

/// Find the first segment of the node's classification path matching the
/// query and truncate there. A node matched only through its reference
/// keeps its full classification path.
fn truncate_at_match(node: &ConceptNode, query: &str) -> Option<(String, String)> {
    let segments: Vec<&str> = node.classification_path.split('/').collect();
    for (i, segment) in segments.iter().enumerate() {
        if segment.to_lowercase().contains(query) {
            return Some((segments[..=i].join("/"), segment.to_string()));
        }
    }
    if node
        .id
        .split('/')
        .any(|segment| segment.to_lowercase().contains(query))
    {
        let matched = segments.last().map(|s| s.to_string()).unwrap_or_default();
        return Some((node.classification_path.clone(), matched));
    }
    None
}

/// Whether `prefix` is a strict segment-wise prefix of `path`.
fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    let prefix: Vec<&str> = prefix.split('/').collect();
    let path: Vec<&str> = path.split('/').collect();
    prefix.len() < path.len() && path[..prefix.len()] == prefix[..]
}
