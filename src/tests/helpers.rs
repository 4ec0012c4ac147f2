//! Shared test utilities for cross-module testing

use crate::{graph::GraphStore, resolve, taxonomy::TaxonomyIndex};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Resolve, register, and commit one concept declaration, the way a parse
/// run does.
pub fn declare(
    graph: &mut GraphStore,
    taxonomy: &mut TaxonomyIndex,
    reference: &str,
    parents: &[&str],
    source: &str,
) -> resolve::ResolutionOutcome {
    let parents: Vec<String> = parents.iter().map(|s| s.to_string()).collect();
    let outcome = resolve::resolve(reference, &parents, None, taxonomy, graph);

    if let Some(resolution) = &outcome.resolution {
        taxonomy.register(resolution);
        graph.upsert_node(reference, &resolution.primary_path, Some(source), &[]);
        let rejected: Vec<&String> = outcome.rejections.iter().map(|r| &r.parent).collect();
        for parent in parents.iter().filter(|p| !rejected.contains(p)) {
            let target = taxonomy
                .reference_of(parent)
                .cloned()
                .unwrap_or_else(|| parent.clone());
            graph.upsert_edge(reference, crate::relations::IS_A, &target, Some(source));
        }
    }
    outcome
}
