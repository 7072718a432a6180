//! xbrlint CLI - XBRL 2.1 instance loader and validator

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use colored::*;
use mimalloc::MiMalloc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use xbrlint::{ErrorKind, Fragment, FragmentEvents, Parser, ValidationConfig, ValidationError};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// XBRL 2.1 instance loader and rule-based validator
#[derive(ClapParser)]
#[command(name = "xbrlint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an XBRL file
    Parse {
        /// Input file
        input: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// Show statistics
        #[arg(short, long)]
        stats: bool,
    },

    /// Validate an XBRL file
    Validate {
        /// Input file
        input: PathBuf,

        /// Validation profile (full, facts, schema)
        #[arg(short, long, default_value = "full")]
        profile: String,

        /// Local directory serving http(s) schema references
        #[arg(long)]
        schema_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// Also report undefined context and unit references
        #[arg(long)]
        strict: bool,

        /// Print load and validation progress
        #[arg(short, long)]
        verbose: bool,
    },

    /// Benchmark parsing performance
    Bench {
        /// Input file
        input: PathBuf,

        /// Number of iterations
        #[arg(short, long, default_value = "100")]
        iterations: usize,
    },
}

/// Prints fragment lifecycle progress to stderr.
struct Progress;

impl FragmentEvents for Progress {
    fn loaded(&self, fragment: &Fragment) {
        eprintln!(
            "{} {} facts, {} contexts, {} units, {} schemas",
            "loaded".cyan().bold(),
            fragment.facts().len(),
            fragment.contexts().len(),
            fragment.units().len(),
            fragment.taxonomy().len()
        );
    }

    fn validated(&self, fragment: &Fragment) {
        eprintln!(
            "{} {} errors",
            "validated".cyan().bold(),
            fragment.validation_errors().len()
        );
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    file: String,
    fragments: usize,
    facts: usize,
    contexts: usize,
    units: usize,
    schemas: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<&'a ValidationError>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { input, json, stats } => {
            let start = Instant::now();
            let parser = Parser::new().with_validation(false);
            let doc = parser
                .parse_file(&input)
                .with_context(|| format!("Failed to parse {}", input.display()))?;
            let elapsed = start.elapsed();

            if json {
                let summary = Summary {
                    file: input.display().to_string(),
                    fragments: doc.fragments().len(),
                    facts: doc.fact_count(),
                    contexts: doc.context_count(),
                    units: doc.unit_count(),
                    schemas: doc.schema_count(),
                    elapsed_ms: stats.then(|| elapsed.as_secs_f64() * 1000.0),
                    errors: None,
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!("{} {}", "✓".green().bold(), input.display());
            println!("  Fragments: {}", doc.fragments().len());
            println!("  Facts: {}", doc.fact_count());
            println!("  Contexts: {}", doc.context_count());
            println!("  Units: {}", doc.unit_count());
            println!("  Schemas: {}", doc.schema_count());

            if stats {
                println!("  Time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
                println!(
                    "  Throughput: {:.0} facts/sec",
                    doc.fact_count() as f64 / elapsed.as_secs_f64()
                );
            }
        }

        Commands::Validate {
            input,
            profile,
            schema_dir,
            json,
            strict,
            verbose,
        } => {
            let config = ValidationConfig::profile(&profile)
                .with_context(|| format!("Unknown profile {profile}"))?
                .strict(strict);

            let mut parser = Parser::new().with_config(config);
            if let Some(dir) = schema_dir {
                parser = parser.with_schema_dir(dir);
            }
            if verbose {
                eprintln!("{} {}", "parsing".cyan().bold(), input.display());
                parser = parser.with_events(Arc::new(Progress));
            }

            let doc = parser
                .parse_file(&input)
                .with_context(|| format!("Failed to parse {}", input.display()))?;
            let errors: Vec<&ValidationError> = doc.validation_errors().collect();

            if json {
                let summary = Summary {
                    file: input.display().to_string(),
                    fragments: doc.fragments().len(),
                    facts: doc.fact_count(),
                    contexts: doc.context_count(),
                    units: doc.unit_count(),
                    schemas: doc.schema_count(),
                    elapsed_ms: None,
                    errors: Some(errors.clone()),
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else if errors.is_empty() {
                println!(
                    "{} {} - Document is valid",
                    "✓".green().bold(),
                    input.display()
                );
            } else {
                println!(
                    "{} {} - Validation failed",
                    "✗".red().bold(),
                    input.display()
                );
                for kind in [ErrorKind::Item, ErrorKind::Attribute, ErrorKind::Fact, ErrorKind::Element] {
                    let count = errors.iter().filter(|e| e.kind == kind).count();
                    if count > 0 {
                        println!("  {} errors: {}", kind, count);
                    }
                }

                for error in &errors {
                    println!("  {} {}", "ERROR:".red(), error);
                }
            }

            if !errors.is_empty() {
                std::process::exit(1);
            }
        }

        Commands::Bench { input, iterations } => {
            let parser = Parser::new();
            let iterations = iterations.max(1);

            // Warmup
            for _ in 0..3 {
                let _ = parser.parse_file(&input)?;
            }

            let mut times = Vec::with_capacity(iterations);
            let mut doc_facts = 0;

            for _ in 0..iterations {
                let start = Instant::now();
                let doc = parser.parse_file(&input)?;
                times.push(start.elapsed());
                doc_facts = doc.fact_count();
            }

            times.sort();
            let min = times[0];
            let max = times[times.len() - 1];
            let median = times[times.len() / 2];
            let mean = times.iter().sum::<std::time::Duration>() / times.len() as u32;

            println!("Benchmark Results for {}", input.display());
            println!("  Iterations: {}", iterations);
            println!("  Facts: {}", doc_facts);
            println!("  Cached schemas: {}", parser.cache().schema_count());
            println!("  Min:    {:.3}ms", min.as_secs_f64() * 1000.0);
            println!("  Median: {:.3}ms", median.as_secs_f64() * 1000.0);
            println!("  Mean:   {:.3}ms", mean.as_secs_f64() * 1000.0);
            println!("  Max:    {:.3}ms", max.as_secs_f64() * 1000.0);
            println!(
                "  Throughput: {:.0} facts/sec",
                doc_facts as f64 / mean.as_secs_f64()
            );
        }
    }

    Ok(())
}
