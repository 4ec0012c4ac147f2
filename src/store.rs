//! Persistence for the three wiki artifacts: graph, taxonomy, and
//! changelog.
//!
//! Every artifact is human-auditable pretty-printed JSON, loaded
//! if-exists-else-default so a bare directory is a valid wiki. Writes go
//! through the same temp-then-rename scheme as staged concept files.

use crate::{
    config::WikiConfig,
    diagnostics::ErrorReport,
    error::TaxonError,
    graph::{ConceptEdge, ConceptNode, GraphStore},
    staging::ChangelogEntry,
    taxonomy::TaxonomyIndex,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

pub const GRAPH_VERSION: &str = "0.4.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphMetadata {
    pub created: String,
    pub updated: String,
    pub version: String,
    pub description: String,
    pub nodes_count: usize,
    pub edges_count: usize,
}

impl Default for GraphMetadata {
    fn default() -> Self {
        let now = Utc::now().to_rfc3339();
        GraphMetadata {
            created: now.clone(),
            updated: now,
            version: GRAPH_VERSION.to_string(),
            description: "Taxon semantic knowledge graph".to_string(),
            nodes_count: 0,
            edges_count: 0,
        }
    }
}

/// On-disk shape of the graph artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDocument {
    pub metadata: GraphMetadata,
    pub nodes: BTreeMap<String, ConceptNode>,
    pub edges: Vec<ConceptEdge>,
}

/// Loads and saves the wiki artifacts under one root.
#[derive(Debug, Clone)]
pub struct WikiStore {
    root: PathBuf,
    config: WikiConfig,
}

impl WikiStore {
    pub fn new(root: impl Into<PathBuf>, config: WikiConfig) -> Self {
        WikiStore {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_graph(&self) -> Result<(GraphStore, GraphMetadata), TaxonError> {
        let path = self.config.graph_path(&self.root);
        if !path.exists() {
            tracing::debug!(?path, "no graph artifact, starting empty");
            return Ok((GraphStore::default(), GraphMetadata::default()));
        }
        let document: GraphDocument = serde_json::from_str(&fs::read_to_string(&path)?)?;
        tracing::debug!(
            nodes = document.nodes.len(),
            edges = document.edges.len(),
            "loaded graph artifact"
        );
        Ok((
            GraphStore::from_parts(document.nodes, document.edges),
            document.metadata,
        ))
    }

    pub fn load_taxonomy(&self) -> Result<TaxonomyIndex, TaxonError> {
        let path = self.config.taxonomy_path(&self.root);
        if !path.exists() {
            return Ok(TaxonomyIndex::default());
        }
        Ok(serde_json::from_str(&fs::read_to_string(&path)?)?)
    }

    pub fn load_changelog(&self) -> Result<Vec<ChangelogEntry>, TaxonError> {
        let path = self.config.changelog_path(&self.root);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&fs::read_to_string(&path)?)?)
    }

    /// Persist all three artifacts, refreshing the graph metadata counts and
    /// update timestamp.
    pub fn save(
        &self,
        graph: &GraphStore,
        metadata: &mut GraphMetadata,
        taxonomy: &TaxonomyIndex,
        changelog: &[ChangelogEntry],
    ) -> Result<(), TaxonError> {
        metadata.updated = Utc::now().to_rfc3339();
        metadata.nodes_count = graph.node_count();
        metadata.edges_count = graph.edge_count();

        let document = GraphDocument {
            metadata: metadata.clone(),
            nodes: graph.nodes().map(|(k, v)| (k.clone(), v.clone())).collect(),
            edges: graph.edges().to_vec(),
        };

        write_json(&self.config.graph_path(&self.root), &document)?;
        write_json(&self.config.taxonomy_path(&self.root), taxonomy)?;
        write_json(&self.config.changelog_path(&self.root), &changelog)?;
        tracing::info!(
            nodes = metadata.nodes_count,
            edges = metadata.edges_count,
            changelog = changelog.len(),
            "artifacts saved"
        );
        Ok(())
    }

    /// Write a diagnostics report artifact.
    pub fn export_report(&self, report: &ErrorReport, path: &Path) -> Result<(), TaxonError> {
        write_json(path, report)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), TaxonError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
