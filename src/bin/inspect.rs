//! Schema Inspector CLI
//!
//! Loads a directory of schema definition files, compiles each, and reports
//! what the compiled pipelines will do.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use model_schemas::{load_dir, Schema};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-inspect")]
#[command(about = "Inspect compiled record schemas")]
struct Cli {
    /// Directory containing schema definition files
    #[arg(short, long, default_value = "schemas")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every schema with its version and leaf count
    List,

    /// Show one schema's leaf paths, private properties, and indexes
    Show {
        /// Schema name
        name: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let defs = load_dir(&cli.dir)?;

    match cli.command {
        Commands::List => {
            if defs.is_empty() {
                println!("No schema definitions under {:?}", cli.dir);
                return Ok(());
            }
            for (name, def) in &defs {
                let leaves = def.leaves().len();
                let version = def.version.as_deref().unwrap_or("<missing version>");
                let strictness = if def.is_strict() { "strict" } else { "lax" };
                println!("{} v{} ({}, {} leaf properties)", name, version, strictness, leaves);
            }
            Ok(())
        }

        Commands::Show { name } => {
            let def = defs
                .get(&name)
                .cloned()
                .ok_or_else(|| format!("No schema named '{}' under {:?}", name, cli.dir))?;
            let schema = Schema::new(def)?;

            println!("{} v{}", schema.name(), schema.version());
            println!("strict: {}", schema.is_strict());
            println!();

            println!("properties:");
            for (path, leaf) in schema.definition().leaves() {
                print!("  {} ({})", path, leaf.type_name);
                if leaf.is_required() {
                    print!(" required");
                }
                if leaf.is_private() {
                    print!(" private");
                }
                if let Some(default) = &leaf.default {
                    print!(" default={}", default);
                }
                if !leaf.validators.is_empty() {
                    print!(" validators={}", leaf.validators.len());
                }
                println!();
            }

            if !schema.private_properties().is_empty() {
                println!();
                println!("sanitize redacts: {}", schema.private_properties().join(", "));
            }

            if !schema.indexes().is_empty() {
                println!();
                println!("indexes:");
                for (backend, list) in schema.indexes() {
                    for descriptor in list {
                        let options = descriptor
                            .options
                            .as_ref()
                            .map(|o| format!(" {}", serde_json::to_string(o).unwrap_or_default()))
                            .unwrap_or_default();
                        println!("  {}: [{}]{}", backend, descriptor.field_set(), options);
                    }
                }
            }

            Ok(())
        }
    }
}
