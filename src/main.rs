//! Krash Miner CLI
//!
//! A command-line tool for krash DAG management, hashing and mining.
//!
//! # Commands
//!
//! - `seedhash` - Print the epoch seed of a block
//! - `makedag` - Generate the DAG for a block's epoch
//! - `hash` - Compute mix digest and result for a header and nonce
//! - `verify` - Check a claimed mix digest and result
//! - `mine` - Search for a nonce meeting a target
//! - `autodag` - Keep the next epoch's DAG pregenerated
//! - `benchmark` - Run performance benchmark

use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use krash::algorithm::{
    io::make_dag, meets_difficulty, quick_check_difficulty, seed_hash, Hasher, Light, Params,
    H256,
};
use krash::autodag::AutoDag;
use krash::config::MinerConfig;
use krash::miner::{mine, MineOptions, Target};

#[derive(Parser)]
#[command(name = "krash")]
#[command(author = "Krypton")]
#[command(version)]
#[command(about = "Krash proof-of-work miner and DAG manager")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// DAG directory (default: ~/.krash)
    #[arg(long, global = true)]
    dag_dir: Option<PathBuf>,

    /// Use the tiny test parameters instead of the configured ones
    #[arg(long, global = true)]
    testing: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the seed hash for a block's epoch
    Seedhash { block: u64 },

    /// Generate the DAG file for a block's epoch
    Makedag { block: u64 },

    /// Compute mix digest and result
    Hash {
        #[arg(long)]
        block: u64,

        /// Header hash, 32 bytes hex
        #[arg(long)]
        header: String,

        #[arg(long)]
        nonce: u64,

        /// Use the full dataset instead of the light cache
        #[arg(long)]
        full: bool,
    },

    /// Verify a claimed mix digest and result with the light cache
    Verify {
        #[arg(long)]
        block: u64,

        #[arg(long)]
        header: String,

        #[arg(long)]
        nonce: u64,

        #[arg(long)]
        mix: String,

        #[arg(long)]
        result: String,

        /// Also check the result against this difficulty
        #[arg(long)]
        difficulty: Option<u64>,
    },

    /// Search for a nonce meeting a target
    Mine {
        #[arg(long)]
        block: u64,

        #[arg(long)]
        header: String,

        /// Number of threads to use (default: config, then number of CPU cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Boundary difficulty (result <= 2^256 / difficulty)
        #[arg(short, long, conflicts_with = "zero_bits")]
        difficulty: Option<u64>,

        /// Target as leading zero bits
        #[arg(long, default_value = "16")]
        zero_bits: u32,

        #[arg(long, default_value = "0")]
        start_nonce: u64,

        /// Give up after this many hashes
        #[arg(long)]
        max_attempts: Option<u64>,

        /// Hash from the light cache only
        #[arg(long)]
        light: bool,
    },

    /// Pregenerate DAGs for a chain head until interrupted
    Autodag {
        /// Current chain head
        #[arg(long)]
        head: u64,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of hashes to compute
        #[arg(short, long, default_value = "100")]
        count: u32,

        #[arg(long)]
        block: Option<u64>,

        #[arg(long)]
        full: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = MinerConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.dag_dir {
        config.dag_dir = dir;
    }
    if cli.testing {
        config.params = Params::testing();
    }

    match cli.command {
        Commands::Seedhash { block } => cmd_seedhash(&config, block),
        Commands::Makedag { block } => cmd_makedag(&config, block),
        Commands::Hash {
            block,
            header,
            nonce,
            full,
        } => cmd_hash(&config, block, &header, nonce, full),
        Commands::Verify {
            block,
            header,
            nonce,
            mix,
            result,
            difficulty,
        } => cmd_verify(&config, block, &header, nonce, &mix, &result, difficulty),
        Commands::Mine {
            block,
            header,
            threads,
            difficulty,
            zero_bits,
            start_nonce,
            max_attempts,
            light,
        } => {
            if let Some(threads) = threads {
                config.threads = threads;
            }
            let target = match difficulty {
                Some(d) => Target::from_difficulty(d),
                None => Target::LeadingZeros(zero_bits),
            };
            let options = MineOptions {
                threads: config.effective_threads(),
                start_nonce,
                max_attempts,
            };
            cmd_mine(&config, block, &header, target, &options, light)
        }
        Commands::Autodag { head } => cmd_autodag(&config, head),
        Commands::Benchmark { count, block, full } => {
            cmd_benchmark(&config, count, block.unwrap_or(0), full)
        }
    }
}

fn parse_h256(what: &str, text: &str) -> anyhow::Result<H256> {
    let bytes = hex::decode(text.trim_start_matches("0x"))
        .with_context(|| format!("{} is not valid hex", what))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("{} must be 32 bytes, got {}", what, b.len()))
}

/// Full handle from the DAG directory, or the light cache when asked or when
/// the dataset does not fit
fn build_hasher(config: &MinerConfig, block: u64, full: bool) -> anyhow::Result<Hasher> {
    let light = Light::with_params(block, config.params)?;
    if !full {
        return Ok(light.into());
    }
    let mut last = 0;
    let hasher = Hasher::prefer_full_in(&config.dag_dir, light, |percent| {
        if percent >= last + 10 {
            info!(percent, "generating dataset");
            last = percent;
        }
        true
    })?;
    Ok(hasher)
}

fn cmd_seedhash(config: &MinerConfig, block: u64) -> anyhow::Result<()> {
    println!("{}", hex::encode(seed_hash(block, &config.params)));
    Ok(())
}

fn cmd_makedag(config: &MinerConfig, block: u64) -> anyhow::Result<()> {
    let start = Instant::now();
    let path = make_dag(block, &config.dag_dir, config.params)?;
    println!("DAG ready: {}", path.display());
    println!("Time elapsed: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn cmd_hash(
    config: &MinerConfig,
    block: u64,
    header: &str,
    nonce: u64,
    full: bool,
) -> anyhow::Result<()> {
    let header = parse_h256("header", header)?;
    let hasher = build_hasher(config, block, full)?;
    let pow = hasher.compute(&header, nonce)?;
    println!("Mix digest: {}", hex::encode(pow.mix_digest));
    println!("Result:     {}", hex::encode(pow.result));
    Ok(())
}

fn cmd_verify(
    config: &MinerConfig,
    block: u64,
    header: &str,
    nonce: u64,
    mix: &str,
    result: &str,
    difficulty: Option<u64>,
) -> anyhow::Result<()> {
    let header = parse_h256("header", header)?;
    let mix = parse_h256("mix digest", mix)?;
    let result = parse_h256("result", result)?;

    if let Some(difficulty) = difficulty {
        let boundary = krash::algorithm::boundary_from_difficulty(difficulty);
        if !quick_check_difficulty(&header, nonce, &mix, &boundary) {
            anyhow::bail!("result does not meet difficulty {}", difficulty);
        }
    }

    let light = Light::with_params(block, config.params)?;
    light
        .check(&header, nonce, &mix, &result)
        .context("proof rejected")?;
    println!("Valid");
    Ok(())
}

fn cmd_mine(
    config: &MinerConfig,
    block: u64,
    header: &str,
    target: Target,
    options: &MineOptions,
    light_only: bool,
) -> anyhow::Result<()> {
    let header = parse_h256("header", header)?;
    let hasher = build_hasher(config, block, !light_only)?;

    println!("Starting mining...");
    println!("Block: {}", block);
    println!("Threads: {}", options.threads);
    println!("Dataset: {}", if hasher.is_full() { "full" } else { "light" });

    let report = mine(&hasher, &header, target, options)?;

    match report.solution {
        Some(solution) => {
            println!("\nFound valid hash!");
            println!("Nonce: {}", solution.nonce);
            println!("Mix digest: {}", hex::encode(solution.mix_digest));
            println!("Result: {}", hex::encode(solution.result));
        }
        None => println!("\nNo solution within the attempt budget"),
    }
    println!("Hashes computed: {}", report.hashes);
    println!("Hashrate: {:.2} H/s", report.hash_rate());
    Ok(())
}

fn cmd_autodag(config: &MinerConfig, head: u64) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let autodag = AutoDag::new(
            config.dag_dir.clone(),
            config.params,
            config.autodag_interval(),
            Arc::new(AtomicU64::new(head)),
        );
        autodag.start();
        println!("Automatic DAG pregeneration running, Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        autodag.stop().await;
        Ok::<_, anyhow::Error>(())
    })
}

fn cmd_benchmark(config: &MinerConfig, count: u32, block: u64, full: bool) -> anyhow::Result<()> {
    let build = Instant::now();
    let hasher = build_hasher(config, block, full)?;
    let build_secs = build.elapsed().as_secs_f64();

    println!(
        "Running benchmark with {} hashes ({} path)...",
        count,
        if hasher.is_full() { "full" } else { "light" }
    );

    let header = [0x42u8; 32];
    let mut best = 0u32;
    let start = Instant::now();
    for nonce in 0..count as u64 {
        let pow = hasher.compute(&header, nonce)?;
        while best < 256 && meets_difficulty(&pow.result, best + 1) {
            best += 1;
        }
    }
    let elapsed = start.elapsed();
    let hashrate = count as f64 / elapsed.as_secs_f64();

    println!("\nResults:");
    println!("  Total hashes: {}", count);
    println!("  Setup time: {:.2}s", build_secs);
    println!("  Time elapsed: {:.2}s", elapsed.as_secs_f64());
    println!("  Hashrate: {:.2} H/s", hashrate);
    println!("  Best leading zero bits: {}", best);

    println!("\nAlgorithm parameters:");
    println!("  Epoch: {}", config.params.epoch(block));
    println!(
        "  Cache size: {} KB",
        config.params.cache_size(block) / 1024
    );
    println!(
        "  Dataset size: {} MB",
        config.params.full_size(block) / (1024 * 1024)
    );
    println!("  Accesses: {}", config.params.accesses);
    Ok(())
}
