//! Wiki configuration.
//!
//! A wiki root may carry an optional `taxon.toml`; every field has a default
//! so a bare directory of markdown files is a valid wiki.

use crate::error::TaxonError;
use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

pub const CONFIG_FILE: &str = "taxon.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiConfig {
    /// Directory under the wiki root that mirrors the classification
    /// hierarchy. Concept files live at `<concepts_dir>/<classification>.md`.
    pub concepts_dir: String,
    /// Persisted graph document.
    pub graph_file: String,
    /// Persisted taxonomy document.
    pub taxonomy_file: String,
    /// Append-only change history.
    pub changelog_file: String,
    /// Apply staged changes without interactive confirmation.
    pub auto_apply: bool,
}

impl Default for WikiConfig {
    fn default() -> Self {
        WikiConfig {
            concepts_dir: "concepts".to_string(),
            graph_file: "graph.json".to_string(),
            taxonomy_file: "taxonomy.json".to_string(),
            changelog_file: "changelog.json".to_string(),
            auto_apply: false,
        }
    }
}

impl WikiConfig {
    /// Load configuration from `<root>/taxon.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load(root: &Path) -> Result<Self, TaxonError> {
        let path = root.join(CONFIG_FILE);
        tracing::debug!("Attempting to read config from: {:?}", &path);
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(WikiConfig::default());
        }
        let content = read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn graph_path(&self, root: &Path) -> PathBuf {
        root.join(&self.graph_file)
    }

    pub fn taxonomy_path(&self, root: &Path) -> PathBuf {
        root.join(&self.taxonomy_file)
    }

    pub fn changelog_path(&self, root: &Path) -> PathBuf {
        root.join(&self.changelog_file)
    }

    pub fn concepts_path(&self, root: &Path) -> PathBuf {
        root.join(&self.concepts_dir)
    }

    /// Relative concept file path for a classification path, e.g.
    /// `concepts/institution/financial/bank.md`.
    pub fn concept_file(&self, classification_path: &str) -> String {
        format!("{}/{classification_path}.md", self.concepts_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WikiConfig::default();
        assert_eq!(config.concepts_dir, "concepts");
        assert_eq!(
            config.concept_file("institution/financial/bank"),
            "concepts/institution/financial/bank.md"
        );
        assert!(!config.auto_apply);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WikiConfig::load(dir.path()).unwrap();
        assert_eq!(config, WikiConfig::default());
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "concepts_dir = \"ontology\"\nauto_apply = true\n",
        )
        .unwrap();
        let config = WikiConfig::load(dir.path()).unwrap();
        assert_eq!(config.concepts_dir, "ontology");
        assert!(config.auto_apply);
        assert_eq!(config.graph_file, "graph.json");
    }
}
