mod config;
mod core;
mod error;
mod input;
mod models;
mod output;
mod utils;

use crate::config::{initialize_config_file, load_config, ConfigOverrides};
use crate::core::engine::{DumpEngine, DumpReport};
use crate::error::DumpError;
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scandump")]
#[command(about = "Split vulnerability scan results into per-finding host, port and socket lists")]
#[command(version = core::version())]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default scandump.toml
    Init,
    /// Aggregate scan documents and write the output tree
    Dump {
        #[arg(required = true, value_name = "INPUT")]
        inputs: Vec<PathBuf>,

        #[arg(short, long = "output-directory", value_name = "DIR")]
        output_directory: PathBuf,

        #[arg(short, long, value_name = "PATH_TO_CONFIG")]
        config: Option<PathBuf>,

        /// Skip <protocol>_plugin_outputs.txt evidence files
        #[arg(long)]
        no_plugin_outputs: bool,

        /// overwrite, reject or namespace
        #[arg(long)]
        collision_policy: Option<String>,

        #[arg(short, long)]
        jobs: Option<usize>,

        #[arg(short, long)]
        min_risk: Option<String>,

        #[arg(long, value_delimiter = ',')]
        exclude_plugins: Option<Vec<String>>,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &DumpReport) {
    println!(
        "Processed {} records: {} hosts, {} plugins ({} duplicates skipped, {} filtered)",
        report.records_read,
        report.hosts,
        report.plugins,
        report.duplicates_skipped,
        report.filtered
    );
    let by_risk: Vec<String> = report
        .by_risk
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(risk, count)| format!("{} {}", count, risk))
        .collect();
    if !by_risk.is_empty() {
        println!(
            "Findings: {} ({} exploitable)",
            by_risk.join(", "),
            report.exploitable
        );
    }
    println!("Wrote {} plugin directories", report.emit.emitted);

    if !report.record_errors.is_empty() {
        eprintln!(
            "Warning: {} malformed records skipped:",
            report.record_errors.len()
        );
        for error in report.error_samples() {
            eprintln!("  - {}", error);
        }
    }
    if !report.emit.conflicts.is_empty() {
        eprintln!(
            "Warning: {} output directory conflicts:",
            report.emit.conflicts.len()
        );
        for conflict in &report.emit.conflicts {
            eprintln!("  - {}", conflict);
        }
    }
    if !report.emit.rejected.is_empty() {
        eprintln!(
            "Warning: plugins left out by the reject policy: {}",
            report.emit.rejected.join(", ")
        );
    }
    for (plugin_id, error) in &report.emit.failures {
        eprintln!("Error writing plugin {}: {}", plugin_id, error);
    }
    if !report.is_clean() {
        eprintln!("Dump finished with warnings.");
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init => {
            if let Err(e) = initialize_config_file(None) {
                eprintln!("Error during initialization: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Dump {
            inputs,
            output_directory,
            config,
            no_plugin_outputs,
            collision_policy,
            jobs,
            min_risk,
            exclude_plugins,
        } => {
            let overrides = ConfigOverrides {
                plugin_outputs: no_plugin_outputs.then_some(false),
                collision_policy,
                jobs,
                min_risk,
                exclude_plugins,
            };
            let result = load_config(config, overrides)
                .map_err(DumpError::from)
                .and_then(|config| {
                    fs::create_dir_all(&output_directory)
                        .map_err(|_| DumpError::OutputRoot(output_directory.clone()))?;
                    DumpEngine::new(&config).run(&inputs, &output_directory)
                });

            match result {
                Ok(report) => {
                    print_report(&report);
                    if !report.emit.failures.is_empty() {
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("Error during dump: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
