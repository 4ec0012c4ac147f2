//! Graph store: concept nodes, typed edges, inverse generation, and the
//! `is_a` cycle detector.
//!
//! Nodes and edges are explicit records keyed by string handles. Cycle
//! detection and hierarchy traversal operate on an interned-id subgraph of
//! the `is_a` relation, so a cycle check is a bounded walk over explicit ids
//! rather than a recursive descent through self-referential structures.

use crate::relations::{self, IS_A};
use chrono::{DateTime, Utc};
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Traversal cutoff for cycle detection and upward hierarchy walks.
///
/// Exceeding the bound without finding a repeated id is "no cycle found",
/// not an error; the bound only guarantees termination if an inconsistency
/// survives prior checks.
pub const MAX_TRAVERSAL: usize = 10;

/// A concept node. The id is the user-facing reference string (e.g.
/// `bank/financial`); the classification path is derived by the resolution
/// engine and always equals `<primary-parent-path>/<own-name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub classification_path: String,
    pub created: DateTime<Utc>,
    /// Source documents that contributed to this node, in first-seen order.
    pub sources: Vec<String>,
    pub relations: BTreeMap<String, BTreeSet<String>>,
    pub properties: BTreeMap<String, String>,
}

impl ConceptNode {
    pub fn new(id: impl Into<String>, classification_path: impl Into<String>) -> Self {
        ConceptNode {
            id: id.into(),
            kind: "concept".to_string(),
            classification_path: classification_path.into(),
            created: Utc::now(),
            sources: Vec::new(),
            relations: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Targets of the node's `is_a` relation, if any.
    pub fn is_a_targets(&self) -> Option<&BTreeSet<String>> {
        self.relations.get(IS_A)
    }
}

/// A directional relation triple. `inferred` marks edges auto-generated as
/// the inverse of a user-declared edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptEdge {
    pub id: String,
    pub source: String,
    pub relation: String,
    pub target: String,
    pub inferred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    pub created: DateTime<Utc>,
}

impl ConceptEdge {
    /// Edge identity is derived from the triple, never assigned.
    pub fn edge_id(source: &str, relation: &str, target: &str) -> String {
        format!("{source}--{relation}--{target}")
    }
}

/// The mutable graph store. All mutations are serialized against a single
/// logical writer; readers (search, diagnostics) take `&self`.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: BTreeMap<String, ConceptNode>,
    edges: Vec<ConceptEdge>,
    edge_index: BTreeSet<String>,
}

impl GraphStore {
    /// Rebuild a store from persisted parts, reconstructing the edge index.
    pub fn from_parts(nodes: BTreeMap<String, ConceptNode>, edges: Vec<ConceptEdge>) -> Self {
        let edge_index = edges.iter().map(|e| e.id.clone()).collect();
        GraphStore {
            nodes,
            edges,
            edge_index,
        }
    }

    pub fn into_parts(self) -> (BTreeMap<String, ConceptNode>, Vec<ConceptEdge>) {
        (self.nodes, self.edges)
    }

    pub fn node(&self, id: &str) -> Option<&ConceptNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&String, &ConceptNode)> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> &[ConceptEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Create or merge a node. Re-insertion from a repeat parse is a no-op:
    /// sources use set semantics (order preserved), properties are unioned,
    /// and the creation timestamp is kept from the first insertion.
    pub fn upsert_node(
        &mut self,
        id: &str,
        classification_path: &str,
        source: Option<&str>,
        properties: &[(&str, &str)],
    ) -> &mut ConceptNode {
        let node = self
            .nodes
            .entry(id.to_string())
            .or_insert_with(|| ConceptNode::new(id, classification_path));
        node.classification_path = classification_path.to_string();
        if let Some(source) = source {
            if !node.sources.iter().any(|s| s == source) {
                node.sources.push(source.to_string());
            }
        }
        for (key, value) in properties {
            node.properties.insert((*key).to_string(), (*value).to_string());
        }
        node
    }

    /// Insert a user-declared edge, generating its inverse when the relation
    /// has one in the relation table.
    ///
    /// Set semantics throughout: re-inserting an identical edge is a no-op.
    /// A declared edge arriving where only the inferred inverse exists
    /// promotes that edge to declared; a declared edge is never downgraded
    /// to inferred. Unknown relation names are stored but generate no
    /// inverse.
    ///
    /// Returns true if a new declared edge was inserted.
    pub fn upsert_edge(
        &mut self,
        source: &str,
        relation: &str,
        target: &str,
        source_file: Option<&str>,
    ) -> bool {
        let inserted = self.insert_edge(source, relation, target, false, source_file);
        if let Some(inverse) = relations::inverse_of(relation) {
            self.insert_edge(target, inverse, source, true, source_file);
        }
        inserted
    }

    fn insert_edge(
        &mut self,
        source: &str,
        relation: &str,
        target: &str,
        inferred: bool,
        source_file: Option<&str>,
    ) -> bool {
        let id = ConceptEdge::edge_id(source, relation, target);
        if self.edge_index.contains(&id) {
            if !inferred {
                // Never leave a user-declared edge marked as inferred.
                if let Some(edge) = self.edges.iter_mut().find(|e| e.id == id) {
                    edge.inferred = false;
                }
            }
            return false;
        }

        tracing::debug!(%source, %relation, %target, inferred, "inserting edge");
        self.edges.push(ConceptEdge {
            id: id.clone(),
            source: source.to_string(),
            relation: relation.to_string(),
            target: target.to_string(),
            inferred,
            source_file: source_file.map(str::to_string),
            created: Utc::now(),
        });
        self.edge_index.insert(id);

        // Mirror the edge onto the source node's relation map when the node
        // exists. Inferred edges may target nodes that were never declared;
        // the relation map is only kept for materialized nodes.
        if let Some(node) = self.nodes.get_mut(source) {
            node.relations
                .entry(relation.to_string())
                .or_default()
                .insert(target.to_string());
        }
        true
    }

    /// The committed `is_a` subgraph as an interned-id adjacency structure.
    pub fn is_a_subgraph(&self) -> IsASubgraph {
        let mut subgraph = IsASubgraph::default();
        for edge in self.edges.iter().filter(|e| e.relation == IS_A) {
            subgraph.add_edge(&edge.source, &edge.target);
        }
        subgraph
    }

    /// Simulate adding `source --is_a--> target` and report the cycle it
    /// would close, if any, as an ordered id list with first and last equal.
    pub fn detect_cycle(&self, source: &str, target: &str) -> Option<Vec<String>> {
        let mut subgraph = self.is_a_subgraph();
        subgraph.add_edge(source, target);
        subgraph.cycle_from(source)
    }

    /// Find cycles already committed to the `is_a` subgraph. Each cycle is
    /// reported once, from the first participating node encountered.
    pub fn committed_cycles(&self) -> Vec<Vec<String>> {
        let subgraph = self.is_a_subgraph();
        let mut cycles = Vec::new();
        let mut checked: BTreeSet<String> = BTreeSet::new();
        for id in subgraph.ids() {
            if checked.contains(id) {
                continue;
            }
            if let Some(cycle) = subgraph.cycle_from(id) {
                checked.extend(cycle.iter().cloned());
                cycles.push(cycle);
            }
        }
        cycles
    }
}

/// Interned-id view of the `is_a` relation, backed by a petgraph
/// [`DiGraphMap`]. String ids are interned to `u32` handles once so the DFS
/// walks integers, not strings.
#[derive(Debug, Default)]
pub struct IsASubgraph {
    ids: Vec<String>,
    index: BTreeMap<String, u32>,
    graph: DiGraphMap<u32, ()>,
}

impl IsASubgraph {
    fn intern(&mut self, id: &str) -> u32 {
        if let Some(handle) = self.index.get(id) {
            return *handle;
        }
        let handle = self.ids.len() as u32;
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), handle);
        self.graph.add_node(handle);
        handle
    }

    pub fn add_edge(&mut self, source: &str, target: &str) {
        let s = self.intern(source);
        let t = self.intern(target);
        self.graph.add_edge(s, t, ());
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    /// Depth-first search from `start`, following `is_a` edges forward with
    /// a visited path stack. A repeated id on the stack within
    /// [`MAX_TRAVERSAL`] hops is a cycle, returned as an ordered id list
    /// whose first and last entries are equal.
    pub fn cycle_from(&self, start: &str) -> Option<Vec<String>> {
        let start = *self.index.get(start)?;
        let mut stack = Vec::new();
        let mut visited = BTreeSet::new();
        self.dfs(start, &mut stack, &mut visited)
            .map(|cycle| cycle.iter().map(|h| self.ids[*h as usize].clone()).collect())
    }

    fn dfs(
        &self,
        node: u32,
        stack: &mut Vec<u32>,
        visited: &mut BTreeSet<u32>,
    ) -> Option<Vec<u32>> {
        if let Some(position) = stack.iter().position(|n| *n == node) {
            let mut cycle: Vec<u32> = stack[position..].to_vec();
            cycle.push(node);
            return Some(cycle);
        }
        if stack.len() >= MAX_TRAVERSAL || visited.contains(&node) {
            return None;
        }
        visited.insert(node);
        stack.push(node);
        for neighbor in self
            .graph
            .neighbors_directed(node, petgraph::Direction::Outgoing)
        {
            if let Some(cycle) = self.dfs(neighbor, stack, visited) {
                return Some(cycle);
            }
        }
        stack.pop();
        None
    }
}
