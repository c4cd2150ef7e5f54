//! stakepool-sim: replay a staking pool scenario and print a JSON report.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use stakepool_pool::PoolConfig;
use stakepool_sim::Scenario;
use stakepool_utils::{format_duration, init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "stakepool-sim", about = "Replay a staking pool scenario")]
struct Cli {
    /// Scenario file (TOML).
    #[arg(long, env = "STAKEPOOL_SCENARIO")]
    scenario: PathBuf,

    /// Pool configuration file (TOML). Defaults apply when omitted.
    #[arg(long, env = "STAKEPOOL_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured rewards duration, in seconds.
    #[arg(long, env = "STAKEPOOL_REWARDS_DURATION")]
    rewards_duration: Option<u64>,

    /// Log format: "human" or "json". Overrides the config file.
    #[arg(long, env = "STAKEPOOL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error". Overrides the
    /// config file.
    #[arg(long, env = "STAKEPOOL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write the final pool state (bincode) to this path.
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Pretty-print the report.
    #[arg(long)]
    pretty: bool,

    /// Exit non-zero if any step failed.
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PoolConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PoolConfig::default(),
    };
    if let Some(secs) = cli.rewards_duration {
        config.rewards_duration_secs = secs;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format.to_string();
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    config.validate()?;

    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level)?;
    tracing::info!(
        pool = %config.address,
        owner = %config.owner,
        period = %format_duration(config.rewards_duration_secs),
        "pool configured"
    );

    let scenario = Scenario::from_toml_file(&cli.scenario)
        .with_context(|| format!("loading scenario {}", cli.scenario.display()))?;
    let replay = stakepool_sim::run(&config, &scenario)?;

    if let Some(path) = &cli.snapshot_out {
        let bytes = replay.state.encode()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        tracing::info!(path = %path.display(), "snapshot written");
    }

    let json = if cli.pretty {
        serde_json::to_string_pretty(&replay.report)?
    } else {
        serde_json::to_string(&replay.report)?
    };
    println!("{json}");

    let failures = replay.report.failures();
    if failures > 0 {
        tracing::warn!(failures, "some steps failed");
        if cli.strict {
            anyhow::bail!("{failures} step(s) failed");
        }
    }
    Ok(())
}
