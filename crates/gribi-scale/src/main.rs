//! gribi-scale entry point.
//!
//! Builds a scale profile, programs the selected batches through a recording
//! RIB client and checks every confirmation against the mirrored expectation.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use gribi_scale::{
    EntryCounts, ExpectedResultMirror, IdPool, OpResult, OperationType, ProfileConfig,
    ProfileOrchestrator, ProfileStats, RecordingClient,
};
use itertools::Itertools;
use log::{error, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// gRIBI forwarding-state scale generator
#[derive(Parser, Debug)]
#[command(name = "gribi-scale")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Profile configuration file (yaml, json or toml); defaults if missing
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Override the configured batch count
    #[arg(short = 'b', long)]
    batches: Option<usize>,

    /// Comma separated batch indices to push (default: all)
    #[arg(short = 'p', long)]
    push: Option<String>,

    /// Delete the pushed batches and push them again
    #[arg(long)]
    cycle: bool,

    /// Write a JSON report to this path
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Serialize)]
struct Report {
    generated_at: String,
    batch_count: usize,
    pushed: Vec<usize>,
    used_batches: Vec<usize>,
    segments: BTreeMap<String, EntryCounts>,
    batches: Vec<EntryCounts>,
    total: EntryCounts,
    backup_entries: usize,
    confirmations: usize,
    stats: ProfileStats,
}

fn parse_batch_list(list: &str) -> anyhow::Result<Vec<usize>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .with_context(|| format!("invalid batch index '{}'", s))
        })
        .collect()
}

fn load_config(args: &Args) -> anyhow::Result<ProfileConfig> {
    let mut config = match &args.config {
        Some(path) => ProfileConfig::load_or_default(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ProfileConfig::default(),
    };
    if let Some(batches) = args.batches {
        config.batch_count = batches;
    }
    config.validate().context("invalid profile configuration")?;
    Ok(config)
}

/// Runs one phase and checks the confirmations it produced.
async fn checked_phase(
    profile: &ProfileOrchestrator,
    client: &RecordingClient,
    indices: &[usize],
    operation: OperationType,
) -> anyhow::Result<usize> {
    let start = client.result_count();
    let installs_before = profile.stats().backup_installs;

    let expected = profile.expected_results(indices)?;
    let mut want: Vec<OpResult> = Vec::new();
    match operation {
        OperationType::Add => {
            profile.push_batches(indices).await?;
            if profile.stats().backup_installs > installs_before {
                want.extend(ExpectedResultMirror::results_for(
                    profile.backup_entries(),
                    OperationType::Add,
                ));
            }
            want.extend(expected.adds);
        }
        OperationType::Delete => {
            profile.delete_batches(indices).await?;
            want.extend(expected.deletes);
        }
    }

    let got = client.results_since(start);
    ExpectedResultMirror::verify(&want, &got)
        .with_context(|| format!("{} of batches {:?} returned unexpected results", operation, indices))?;
    info!("{} of batches {:?}: {} confirmations verified", operation, indices, got.len());
    Ok(got.len())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    let batch_count = config.batch_count;
    let pool = Arc::new(IdPool::new(config.id_base));

    let mut profile = ProfileOrchestrator::new(config, pool).context("failed to build profile")?;
    let client = Arc::new(RecordingClient::new());
    profile.set_client(client.clone());

    let indices = match &args.push {
        Some(list) => parse_batch_list(list)?,
        None => (0..batch_count).collect(),
    };
    if indices.is_empty() {
        bail!("no batches selected");
    }

    let mut confirmations = checked_phase(&profile, &client, &indices, OperationType::Add).await?;
    if args.cycle {
        confirmations += checked_phase(&profile, &client, &indices, OperationType::Delete).await?;
        confirmations += checked_phase(&profile, &client, &indices, OperationType::Add).await?;
    }

    let used = profile.used_batches();
    let total = profile.combined_stats().total();
    info!(
        "configured batches [{}]: {} entries in profile, {} confirmations",
        used.iter().join(", "),
        total.total(),
        confirmations
    );

    if let Some(path) = &args.output {
        let report = Report {
            generated_at: Utc::now().to_rfc3339(),
            batch_count,
            pushed: indices,
            used_batches: used.into_iter().collect(),
            segments: profile
                .segments()
                .iter()
                .map(|s| (s.name.clone(), s.counts()))
                .collect(),
            batches: profile.combined_stats().batches.clone(),
            total,
            backup_entries: profile.backup_entries().len(),
            confirmations,
            stats: profile.stats(),
        };
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("Starting gribi-scale");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_batch_list() {
        assert_eq!(parse_batch_list("0, 2,3").unwrap(), vec![0, 2, 3]);
        assert_eq!(parse_batch_list("1,").unwrap(), vec![1]);
        assert!(parse_batch_list("1,x").is_err());
    }

    #[test]
    fn test_batches_override() {
        let args = Args::parse_from(["gribi-scale", "--batches", "2"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.batch_count, 2);

        let args = Args::parse_from(["gribi-scale", "--batches", "0"]);
        assert!(load_config(&args).is_err());
    }
}
