//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::Path;
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times — subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Write a file under the wiki root, creating parent directories.
#[allow(dead_code)]
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Create a test wiki with the two-bank disambiguation fixture: a financial
/// bank and a river bank declared from pages documents, plus an unrelated
/// relation with a known inverse.
#[allow(dead_code)]
pub fn create_bank_wiki() -> TempDir {
    init_logging();
    let dir = TempDir::new().unwrap();

    write_file(
        dir.path(),
        "pages/finance.md",
        "# Financial Institutions\n\n\
         [[bank/financial]]{is_a: institution/financial, offers: [loans, deposits]}\n\n\
         [[commbank]]{is_a: institution/financial/bank, located_in: australia}\n",
    );
    write_file(
        dir.path(),
        "pages/rivers.md",
        "# River Features\n\n[[bank/geology]]{is_a: geological/formation}\n",
    );

    dir
}
