//! vcal-bench command line.
//!
//! - `generate`: write `.bin`/`.hdf5` (and `.txt`) datasets from a JSON list
//! - `bench`: benchmark the HNSW backend on one dataset file
//! - `sweep`: train size × worker count sweep, optionally saved as JSON

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use vcal_bench::{
    codec, generator, logging, Benchmark, BenchmarkConfig, BenchmarkMatrix, GeneratorConfig, HnswIndexer,
    QueryPolicy, Result, SimdLevel, Space, SweepConfig, DEF_LEVEL_SEED,
};

#[derive(Parser)]
#[command(name = "vcal-bench")]
#[command(version)]
#[command(about = "Synthetic ANN datasets with exact ground truth and HNSW benchmark sweeps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate every dataset listed in a JSON configuration file
    Generate {
        /// JSON array of {name, angular, dim, k, testCount, trainCount, seed}
        #[arg(long)]
        config: PathBuf,
        /// Output directory, created if missing
        #[arg(long, default_value = "data")]
        out: PathBuf,
        /// Also write the `<name>.txt` text dump
        #[arg(long)]
        describe: bool,
    },
    /// Benchmark builds and queries on one dataset file
    Bench {
        /// `.bin`, `.hdf5` or `.safetensors` dataset
        #[arg(long)]
        dataset: PathBuf,
        #[arg(long, default_value_t = 200)]
        ef_construction: usize,
        /// Comma separated efSearch values, swept in this order
        #[arg(long, value_delimiter = ',', default_value = "10,20,40,80,120,200,400,600")]
        ef_search: Vec<usize>,
        #[arg(long, default_value_t = 16)]
        m_max: usize,
        #[arg(long, default_value_t = 2)]
        runs: usize,
        /// Build in parallel with this many workers
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long, default_value_t = SimdLevel::None)]
        simd: SimdLevel,
        #[arg(long, default_value_t = DEF_LEVEL_SEED)]
        level_seed: u64,
        /// Only time builds
        #[arg(long)]
        no_queries: bool,
    },
    /// Run the train size × worker count sweep
    Sweep {
        /// JSON sweep configuration; built-in defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        space: Option<Space>,
        #[arg(long)]
        simd: Option<SimdLevel>,
        #[arg(long)]
        query_policy: Option<QueryPolicy>,
        /// Write the full result as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate { config, out, describe } => {
            let cfg = GeneratorConfig::load(&config)?;
            for path in generator::generate_all(&cfg, &out, describe)? {
                println!("Wrote {}.", path.display());
            }
        }
        Commands::Bench {
            dataset,
            ef_construction,
            ef_search,
            m_max,
            runs,
            workers,
            simd,
            level_seed,
            no_queries,
        } => {
            let dataset = Arc::new(codec::load(&dataset)?);
            let cfg = BenchmarkConfig::new(ef_construction, ef_search, m_max, runs)
                .with_level_seed(level_seed)
                .with_simd(simd);
            let mut bench = Benchmark::new(dataset, cfg, HnswIndexer)?;
            if let Some(w) = workers {
                bench = bench.get_parallel(w)?;
            }
            bench.run(!no_queries)?;
            print!("{}", bench.report()?);
        }
        Commands::Sweep { config, space, simd, query_policy, json } => {
            let mut cfg = match config {
                Some(path) => SweepConfig::load(&path)?,
                None => SweepConfig::default(),
            };
            if let Some(space) = space {
                cfg.space = space;
            }
            if let Some(simd) = simd {
                cfg.simd = simd;
            }
            if let Some(policy) = query_policy {
                cfg.query_policy = policy;
            }

            let mut matrix = BenchmarkMatrix::new(cfg, HnswIndexer)?;
            matrix.run()?;
            let report = matrix.report()?;

            println!("{:<24}{:>12}{:>16}", "Label", "trainCount", "Build avg (s)");
            let all = report.sequential.iter().chain(report.parallel.values().flatten());
            for s in all.clone() {
                let p = s.build_point();
                println!("{:<24}{:>12}{:>16.6}", s.label, p.x, p.y);
            }
            for s in all.filter(|s| s.query.is_some()) {
                println!("\n{} (trainCount = {}): recall / queries per second", s.label, s.train_count);
                for p in s.recall_line() {
                    println!("{:>10.3}{:>16.1}", p.x, p.y);
                }
            }

            if let Some(path) = json {
                let text = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
                fs::write(&path, text)?;
                println!("\nWrote {}.", path.display());
            }
        }
    }
    Ok(())
}
