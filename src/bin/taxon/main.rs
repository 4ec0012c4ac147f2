//! taxon CLI tool
//!
//! Command-line interface for compiling semantic wiki documents with
//! taxon-core.
//!
//! ## Commands
//!
//! - `parse <path>`: Parse documents, commit to the graph, stage derived files
//! - `search <query>`: Specificity-ranked search over the graph
//! - `stats`: Graph, taxonomy, and changelog counts
//! - `check`: Run the structural diagnostics and optionally export a report
//!
//! ## Staged Changes
//!
//! `parse` never writes concept files directly: derived files are staged and
//! listed, then applied only after confirmation (or `--yes`, or `auto_apply`
//! in `taxon.toml`). `--dry-run` previews the full run with zero side
//! effects: no files, no changelog entries, no artifact saves.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taxon_core::compiler::WikiCompiler;

#[derive(Parser)]
#[command(name = "taxon")]
#[command(author, version, about = "A semantic wiki knowledge graph compiler", long_about = None)]
struct Cli {
    /// Wiki root directory
    #[arg(long, default_value = ".", global = true)]
    base_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a document or directory, committing concepts to the graph
    Parse {
        /// Path to the document or directory to parse, relative to the wiki
        /// root
        path: PathBuf,

        /// Preview everything without writing files or artifacts
        #[arg(long)]
        dry_run: bool,

        /// Apply staged changes without prompting
        #[arg(short, long)]
        yes: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Search the knowledge graph
    Search {
        /// Search query (matched against path segments)
        query: String,

        /// Include each result's ancestor chain
        #[arg(short = 'H', long)]
        hierarchy: bool,
    },

    /// Show graph statistics
    Stats,

    /// Check the wiki for structural inconsistencies
    Check {
        /// Export the structured report to a JSON file
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            path,
            dry_run,
            yes,
            verbose,
        } => {
            let mut wiki = WikiCompiler::open(&cli.base_path)?;
            let report = wiki.parse_path(&path)?;

            for file in &report.files {
                println!("  {}", file.path);
                for diagnostic in &file.diagnostics {
                    println!("    {diagnostic}");
                }
                for rejection in &file.rejections {
                    println!(
                        "    Rejected is_a {} -> {}: cycle {}",
                        rejection.reference,
                        rejection.parent,
                        rejection.cycle.join(" -> ")
                    );
                }
                if verbose {
                    println!(
                        "    {} link(s), {} committed",
                        file.links, file.committed
                    );
                }
            }

            println!("\n=== Parse Results ===");
            println!("Files: {}", report.files.len());
            println!("Links: {}", report.links());
            println!("Committed: {}", report.committed());
            println!("Rejected edges: {}", report.rejections().count());

            if !wiki.staged().is_empty() {
                println!("\nStaged changes: {}", wiki.staged().len());
                for change in wiki.staged() {
                    println!("  {} {}", change.kind, change.file);
                }

                let confirmed = if dry_run {
                    true
                } else if yes || wiki.config().auto_apply {
                    true
                } else {
                    use std::io::Write;
                    print!("\nApply changes? (y/n): ");
                    std::io::stdout().flush()?;
                    let mut input = String::new();
                    std::io::stdin().read_line(&mut input)?;
                    input.trim().eq_ignore_ascii_case("y")
                };

                if confirmed {
                    let applied = wiki.apply(dry_run)?;
                    if dry_run {
                        println!(
                            "\nDry run: {} change(s) validated, nothing written",
                            applied.applied.len()
                        );
                    } else {
                        println!("\nApplied {} change(s)", applied.applied.len());
                    }
                    for failure in &applied.failures {
                        eprintln!("  Failed {}: {}", failure.file, failure.cause);
                    }
                } else {
                    println!("\nChanges staged but not applied");
                    wiki.save()?;
                }
            } else if !dry_run {
                wiki.save()?;
            }

            let stats = wiki.stats();
            println!("\nGraph: {} nodes, {} edges", stats.nodes, stats.edges);
            Ok(())
        }

        Commands::Search { query, hierarchy } => {
            let wiki = WikiCompiler::open(&cli.base_path)?;
            let results = wiki.search(&query, hierarchy);

            if results.is_empty() {
                println!("No results for '{query}'");
                return Ok(());
            }
            println!("{} result(s) for '{query}':\n", results.len());
            for result in &results {
                println!(
                    "  {} ({}) [depth {}]",
                    result.classification_path, result.reference, result.depth
                );
                if let Some(chain) = &result.hierarchy {
                    for ancestor in chain.iter().skip(1) {
                        println!("    ^ {ancestor}");
                    }
                }
            }
            Ok(())
        }

        Commands::Stats => {
            let wiki = WikiCompiler::open(&cli.base_path)?;
            let stats = wiki.stats();
            println!("Nodes: {}", stats.nodes);
            println!("Edges: {}", stats.edges);
            println!("Taxonomy mappings: {}", stats.taxonomy_mappings);
            println!("Changelog entries: {}", stats.changelog_entries);
            Ok(())
        }

        Commands::Check { report } => {
            let wiki = WikiCompiler::open(&cli.base_path)?;
            let error_report = wiki.report();

            if error_report.summary.total_errors == 0 {
                println!("No issues found.");
            } else {
                println!("{} issue(s) found\n", error_report.summary.total_errors);
                for finding in &error_report.all_errors {
                    println!(
                        "[{}] {} {}",
                        finding.severity,
                        finding.error_type,
                        finding.concept.as_deref().unwrap_or("-")
                    );
                    if let Some(file) = &finding.file_path {
                        println!("  File: {file}");
                    }
                    println!("  Problem: {}", finding.message);
                    println!("  Impact: {}", finding.impact);
                    println!("  Fix: {}", finding.fix_instructions);
                }
                println!("\nSummary:");
                println!("  Critical: {}", error_report.summary.critical);
                println!("  Warnings: {}", error_report.summary.warnings);
                println!("  Info: {}", error_report.summary.info);
                println!(
                    "  Auto-fixable: {}",
                    error_report.fixable_automatically.len()
                );
            }

            if let Some(path) = report {
                wiki.export_report(&error_report, &path)?;
                println!("\nReport exported to: {}", path.display());
            }
            Ok(())
        }
    }
}
