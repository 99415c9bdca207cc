//! tobeast CLI - lowers a model graph into inference-engine run configurations
//!
//! Usage:
//!   tobeast <file>                      # Write <stem>.json next to the input
//!   tobeast <file> -o out -l 5000000    # Choose output directory and chain length
//!   tobeast <file> -r 3                 # Write <stem>_0.json .. <stem>_2.json

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tobeast_core::{lower_replicates, LoweringOptions};
use tobeast_model::ModelGraph;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tobeast")]
#[command(version)]
#[command(about = "Lower probabilistic model graphs into MCMC run configurations")]
struct Cli {
    /// Model graph in JSON form
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Output directory (defaults to the input file's directory)
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// MCMC chain length; non-positive uses the default
    #[arg(short = 'l', long, default_value_t = 1_000_000, allow_negative_numbers = true)]
    chain_length: i64,

    /// Pre-burn-in samples; negative computes it from the state size
    #[arg(short = 'b', long, default_value_t = -1, allow_negative_numbers = true)]
    pre_burnin: i64,

    /// Number of replicate configurations to write
    #[arg(short, long, default_value_t = 1)]
    replicates: usize,

    /// Output file stem (defaults to the input file stem)
    #[arg(long, value_name = "STEM")]
    stem: Option<String>,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Filter used when `RUST_LOG` is unset.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_graph(path: &Path) -> Result<ModelGraph, String> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;
    serde_json::from_str(&source)
        .map_err(|e| format!("Error parsing model graph '{}': {}", path.display(), e))
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let graph = match read_graph(&cli.file) {
        Ok(g) => g,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let stem = cli.stem.clone().unwrap_or_else(|| {
        cli.file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string())
    });
    let out_dir = cli.out.clone().unwrap_or_else(|| {
        cli.file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let options = LoweringOptions {
        chain_length: cli.chain_length,
        pre_burnin: cli.pre_burnin,
        file_stem: stem,
        replicates: cli.replicates,
    };
    let registry = tobeast_ext::full_registry();

    let configs = match lower_replicates(&graph, &registry, &options) {
        Ok(c) => c,
        Err(e) => {
            error!("Lowering error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        error!("Error creating output directory '{}': {}", out_dir.display(), e);
        process::exit(1);
    }
    for config in &configs {
        let path = out_dir.join(format!("{}.json", config.file_stem));
        let json = match config.to_json() {
            Ok(j) => j,
            Err(e) => {
                error!("Error serializing '{}': {}", config.file_stem, e);
                process::exit(1);
            }
        };
        if let Err(e) = std::fs::write(&path, json) {
            error!("Error writing '{}': {}", path.display(), e);
            process::exit(1);
        }
        info!(
            path = %path.display(),
            state = config.state.len(),
            operators = config.operators.len(),
            "wrote run configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_default_filter() {
        assert_eq!(default_filter(0), "warn");
        assert_eq!(default_filter(1), "info");
        assert_eq!(default_filter(2), "debug");
        assert_eq!(default_filter(7), "debug");
    }

    #[test]
    fn cyclic_graph_files_are_rejected() {
        let dir = std::env::temp_dir().join(format!("tobeast-cli-{}", process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cyclic.json");
        let data = tobeast_model::GraphData {
            generators: vec![tobeast_model::Generator::distribution(tobeast_model::kinds::EXP)
                .with_param("mean", tobeast_model::ValueId(0))],
            values: vec![tobeast_model::Value::constant(tobeast_model::Payload::Real(1.0))
                .named("a")
                .generated_by(tobeast_model::GeneratorId(0), true)],
        };
        std::fs::write(&path, serde_json::to_string(&data).unwrap()).unwrap();
        let err = read_graph(&path).unwrap_err();
        assert!(err.contains("depends on itself"), "{}", err);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
