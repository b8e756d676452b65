mod soak;

use anyhow::Context;
use clap::Parser;
use quartz_config::QuartzConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "quartz-soak",
    about = "Drive a ring buffer with concurrent producers and consumers and check delivery."
)]
struct Args {
    /// TOML configuration file (built-in defaults when omitted)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Overrides `log_level` from the configuration
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => QuartzConfig::load(path.display().to_string())
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => QuartzConfig::default(),
    };

    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    let ring = config.validate().context("invalid configuration")?;
    let report = soak::run(ring, &config.workload);
    report.log();

    if !report.passed() {
        anyhow::bail!("delivery check failed");
    }
    Ok(())
}
