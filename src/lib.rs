//! # taxon-core
//!
//! A Rust library for compiling semantic wiki documents into a queryable
//! knowledge graph with deterministic classification.
//!
//! ## Overview
//!
//! taxon-core scans markdown documents for typed link statements
//! (`[[concept]]{relation: value}`) and maintains three derived artifacts: a
//! bidirectional concept graph, a taxonomy index, and an append-only
//! changelog. References are **dual-endian**: authors write search-endian
//! names (`bank/financial` reads "bank, the financial one") while the system
//! derives classification-endian paths (`institution/financial/bank`) from
//! declared `is_a` relationships.
//!
//! ### Key Features
//!
//! - **Deterministic classification**: deepest declared parent wins;
//!   multi-parent concepts keep alias paths for their other lineages
//! - **Bidirectional edges**: every known relation generates its inverse
//!   automatically, tagged as inferred
//! - **Cycle rejection**: an `is_a` edge that would close an inheritance
//!   loop is rejected before commit, without discarding its siblings
//! - **Specificity-ranked search**: results truncate at the matched segment
//!   and rank deeper (more specific) paths first
//! - **Diagnostics**: eight structural checks with machine-actionable fix
//!   metadata, split into auto-fixable and human-review buckets
//! - **Staged writes**: generated concept files are staged, previewable,
//!   checksummed, and applied atomically with changelog records
//!
//! ## Architecture
//!
//! - **[`extract`]**: link grammar and per-link error recovery
//! - **[`resolve`]**: reference to classification-path resolution
//! - **[`graph`]**: concept graph store and `is_a` cycle detection
//! - **[`taxonomy`]**: search-path / classification-path index
//! - **[`search`]**: inverted segment index and ranked queries
//! - **[`diagnostics`]**: structural checks and the error report
//! - **[`staging`]**: staged changes, checksums, and the changelog
//! - **[`compiler`]**: the orchestrating [`compiler::WikiCompiler`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taxon_core::compiler::WikiCompiler;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut wiki = WikiCompiler::open("./wiki")?;
//!     let report = wiki.parse_path(std::path::Path::new("pages"))?;
//!     println!("committed {} concepts", report.committed());
//!
//!     for result in wiki.search("bank", true) {
//!         println!("{} ({})", result.classification_path, result.reference);
//!     }
//!
//!     wiki.apply(false)?;
//!     Ok(())
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod graph;
pub mod relations;
pub mod resolve;
pub mod search;
pub mod staging;
pub mod store;
pub mod taxonomy;
#[cfg(test)]
mod tests;

pub use error::*;
