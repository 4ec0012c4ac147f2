//! Resolution engine: maps a concept reference and its declared `is_a`
//! parents to a canonical classification path plus alias paths.
//!
//! Primary selection is "deepest wins": the declared parent with the most
//! path segments owns the concept's canonical location. Ties break by
//! declaration order (first-listed wins). Both rules are fixed policy, not
//! heuristics; [`select_primary`] is the single testable implementation.
//!
//! Before anything is committed, each declared `is_a` edge is simulated
//! against the committed graph. An edge that would close a cycle is rejected
//! (reported in the outcome) while sibling parents and relations still
//! resolve. Resolution never partially commits a malformed primary path.

use crate::{
    error::TaxonError,
    graph::GraphStore,
    taxonomy::TaxonomyIndex,
};
use serde::{Deserialize, Serialize};

/// A committed resolution: one primary path, zero or more alias paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub reference: String,
    pub primary_path: String,
    /// Alias paths for non-primary parents, in declaration order.
    pub alias_paths: Vec<String>,
}

/// An `is_a` edge rejected because it would close a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircularRejection {
    pub reference: String,
    pub parent: String,
    /// Ordered cycle, first and last id equal.
    pub cycle: Vec<String>,
}

impl CircularRejection {
    pub fn to_error(&self) -> TaxonError {
        TaxonError::CircularReference {
            cycle: self.cycle.clone(),
        }
    }
}

/// The result of resolving one concept reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionOutcome {
    /// None when every declared parent was rejected.
    pub resolution: Option<Resolution>,
    /// Parents whose simulated `is_a` edge would close a cycle.
    pub rejections: Vec<CircularRejection>,
}

/// Number of segments in a classification path.
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

/// The concept's own name. References are search-endian: the concept's own
/// name comes first and any disambiguator follows, so `bank/financial`
/// names the concept `bank`.
pub fn own_name(reference: &str) -> &str {
    reference.split('/').next().unwrap_or(reference)
}

/// Select the primary parent: greatest segment depth wins, declaration
/// order breaks ties. A later parent must be strictly deeper to displace
/// an earlier one.
pub fn select_primary(parents: &[String]) -> Option<&String> {
    parents.iter().fold(None, |best: Option<&String>, parent| {
        match best {
            Some(current) if depth(parent) <= depth(current) => Some(current),
            _ => Some(parent),
        }
    })
}

/// Simulate each declared `is_a` edge against the committed graph, splitting
/// the parents into survivors and cycle-closing rejections.
fn simulate_parents(
    reference: &str,
    is_a_parents: &[String],
    taxonomy: &TaxonomyIndex,
    graph: &GraphStore,
) -> (Vec<String>, Vec<CircularRejection>) {
    let mut rejections = Vec::new();
    let mut survivors: Vec<String> = Vec::new();
    for parent in is_a_parents {
        // The is_a edge targets the parent concept's own reference; the
        // declared value is its classification path, whose owner may or may
        // not be indexed yet. Simulate against the path-derived id when no
        // owner exists.
        let target = taxonomy
            .reference_of(parent)
            .cloned()
            .unwrap_or_else(|| parent.clone());
        match graph.detect_cycle(reference, &target) {
            Some(cycle) => {
                tracing::warn!(
                    %reference,
                    %parent,
                    cycle = %cycle.join(" -> "),
                    "rejecting is_a edge that would close a cycle"
                );
                rejections.push(CircularRejection {
                    reference: reference.to_string(),
                    parent: parent.clone(),
                    cycle,
                });
            }
            None => survivors.push(parent.clone()),
        }
    }
    (survivors, rejections)
}

/// Resolve a reference against its declared `is_a` parents.
///
/// A reference already present in the taxonomy index resolves to its
/// existing classification (repeat parses are idempotent), but every newly
/// declared parent is still cycle-simulated: an indexed reference is not a
/// license to close a loop. Otherwise the surviving parents produce the
/// primary and alias paths; with no declared parents the reference inherits
/// the context classification when one is in scope, or stands alone as its
/// own classification path.
pub fn resolve(
    reference: &str,
    is_a_parents: &[String],
    context: Option<&str>,
    taxonomy: &TaxonomyIndex,
    graph: &GraphStore,
) -> ResolutionOutcome {
    let (survivors, rejections) = simulate_parents(reference, is_a_parents, taxonomy, graph);

    if let Some(existing) = taxonomy.classification_of(reference) {
        tracing::debug!(%reference, classification = %existing, "reference already indexed");
        return ResolutionOutcome {
            resolution: Some(Resolution {
                reference: reference.to_string(),
                primary_path: existing.clone(),
                alias_paths: taxonomy.aliases_of(reference).to_vec(),
            }),
            rejections,
        };
    }

    if survivors.is_empty() {
        if !is_a_parents.is_empty() {
            // Every declared parent closed a cycle; nothing commits.
            return ResolutionOutcome {
                resolution: None,
                rejections,
            };
        }
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            // A bare link inside a concept file inherits that file's
            // classification as its parent.
            let name = own_name(reference);
            return ResolutionOutcome {
                resolution: Some(Resolution {
                    reference: reference.to_string(),
                    primary_path: format!("{context}/{name}"),
                    alias_paths: Vec::new(),
                }),
                rejections,
            };
        }
        // No classification hierarchy declared: the reference stands alone.
        return ResolutionOutcome {
            resolution: Some(Resolution {
                reference: reference.to_string(),
                primary_path: reference.to_string(),
                alias_paths: Vec::new(),
            }),
            rejections,
        };
    }

    let name = own_name(reference);
    let primary_parent = select_primary(&survivors).expect("survivors is non-empty");
    let primary_path = format!("{primary_parent}/{name}");
    let alias_paths = survivors
        .iter()
        .filter(|p| *p != primary_parent)
        .map(|p| format!("{p}/{name}"))
        .collect();

    ResolutionOutcome {
        resolution: Some(Resolution {
            reference: reference.to_string(),
            primary_path,
            alias_paths,
        }),
        rejections,
    }
}
