//! Balance simulator entry point.
//!
//! Plays a seeded batch of matches between two actor templates and prints the
//! aggregate result as JSON on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use runeclash_core::config::load_json;
use runeclash_core::simulation::{ActorTemplate, SimConfig, Simulation};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Run seeded Runeclash balance simulations")]
struct Cli {
    /// Batch config (JSON). Flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Template for side A (JSON).
    #[arg(long)]
    a: Option<PathBuf>,
    /// Template for side B (JSON).
    #[arg(long)]
    b: Option<PathBuf>,
    /// Number of matches.
    #[arg(long)]
    n: Option<u32>,
    /// Master seed.
    #[arg(long, allow_hyphen_values = true)]
    seed: Option<i32>,
    /// Round limit per match.
    #[arg(long)]
    turn_cap: Option<u32>,
    /// Play matches on the rayon pool.
    #[arg(long)]
    parallel: bool,
    /// Pretty-print the result.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    tracing::info!(
        a = %config.template_a.name,
        b = %config.template_b.name,
        n = config.n,
        seed = config.seed,
        parallel = cli.parallel,
        "starting simulation"
    );

    let sim = Simulation::new(config);
    let result = if cli.parallel { sim.run_parallel() } else { sim.run() };

    let out = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{out}");
    Ok(())
}

fn build_config(cli: &Cli) -> Result<SimConfig> {
    let mut config = match &cli.config {
        Some(path) => load_json::<SimConfig>(path).context("loading batch config")?,
        None => SimConfig::default(),
    };
    if let Some(path) = &cli.a {
        config.template_a = load_template(path)?;
    }
    if let Some(path) = &cli.b {
        config.template_b = load_template(path)?;
    }
    if let Some(n) = cli.n {
        config.n = n;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(turn_cap) = cli.turn_cap {
        config.turn_cap = turn_cap;
    }
    Ok(config)
}

fn load_template(path: &Path) -> Result<ActorTemplate> {
    load_json(path).with_context(|| format!("loading template {}", path.display()))
}
