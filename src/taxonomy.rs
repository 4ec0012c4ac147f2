//! Taxonomy index: the bidirectional mapping between user-facing references
//! and classification paths, plus alias paths for multi-parent concepts.
//!
//! The index is kept in lock-step with the graph store: every commit that
//! changes a node's classification or alias set updates the index in the
//! same logical transaction. It is not self-healing; divergence introduced
//! from outside (hand-edited artifacts) is surfaced by the diagnostics
//! engine as `taxonomy_orphan` and `classification_mismatch` findings.

use crate::resolve::Resolution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyIndex {
    /// reference -> primary classification path
    search_to_classification: BTreeMap<String, String>,
    /// primary classification path -> reference
    classification_to_search: BTreeMap<String, String>,
    /// reference -> ordered secondary classification paths
    aliases: BTreeMap<String, Vec<String>>,
    /// secondary classification path -> reference
    alias_to_search: BTreeMap<String, String>,
}

impl TaxonomyIndex {
    /// Register a resolution, replacing any stale mappings the reference
    /// held before. Forward/reverse and alias/alias-reverse entries are
    /// always inserted or removed as pairs.
    pub fn register(&mut self, resolution: &Resolution) {
        self.remove(&resolution.reference);

        self.search_to_classification.insert(
            resolution.reference.clone(),
            resolution.primary_path.clone(),
        );
        self.classification_to_search.insert(
            resolution.primary_path.clone(),
            resolution.reference.clone(),
        );
        if !resolution.alias_paths.is_empty() {
            self.aliases.insert(
                resolution.reference.clone(),
                resolution.alias_paths.clone(),
            );
            for alias in &resolution.alias_paths {
                self.alias_to_search
                    .insert(alias.clone(), resolution.reference.clone());
            }
        }
    }

    /// Remove every mapping owned by a reference. Must be called atomically
    /// with node removal.
    pub fn remove(&mut self, reference: &str) {
        if let Some(old_path) = self.search_to_classification.remove(reference) {
            self.classification_to_search.remove(&old_path);
        }
        if let Some(old_aliases) = self.aliases.remove(reference) {
            for alias in old_aliases {
                self.alias_to_search.remove(&alias);
            }
        }
    }

    /// Primary classification path for a reference.
    pub fn classification_of(&self, reference: &str) -> Option<&String> {
        self.search_to_classification.get(reference)
    }

    /// Reference owning a classification path, primary or alias.
    pub fn reference_of(&self, classification_path: &str) -> Option<&String> {
        self.classification_to_search
            .get(classification_path)
            .or_else(|| self.alias_to_search.get(classification_path))
    }

    pub fn aliases_of(&self, reference: &str) -> &[String] {
        self.aliases
            .get(reference)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn mappings(&self) -> impl Iterator<Item = (&String, &String)> {
        self.search_to_classification.iter()
    }

    pub fn alias_entries(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.aliases.iter()
    }

    pub fn len(&self) -> usize {
        self.search_to_classification.len()
    }

    pub fn is_empty(&self) -> bool {
        self.search_to_classification.is_empty()
    }
}
