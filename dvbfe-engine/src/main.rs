//! dvbfe: drive simulated DVB front-ends through the tuning engine.
//!
//! Front-ends, links and antenna wiring come from the configuration file;
//! transponders are given as JSON, e.g.
//! `{"type":"satellite","frequency":11836000,"symbol_rate":27500000,"orbital_position":192}`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde_json::json;

use dvbfe_engine::config::{load_config, ConfigFile};
use dvbfe_engine::{FrontendGroup, FrontendId, FrontendRunner, TransponderParameters};

mod logging;

/// dvbfe - transponder tuning engine for DVB front-ends
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory where log files are stored [default: logs]
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Number of days to keep log files [default: 7]
    #[arg(long)]
    log_retention_days: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tune a transponder and print the final status as JSON.{n}
    /// Without --slot the best scoring front-end is used.
    Tune {
        /// Transponder parameters as JSON
        #[arg(short, long)]
        params: String,

        /// Slot number to tune on
        #[arg(short, long)]
        slot: Option<usize>,

        /// Seconds to wait for a settled state
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
    /// Print every slot's score for a transponder.
    Score {
        /// Transponder parameters as JSON
        #[arg(short, long)]
        params: String,
    },
    /// Print slot number and tuner type of every front-end.
    Status,
}

fn parse_params(json: &str) -> Result<TransponderParameters, Box<dyn std::error::Error>> {
    serde_json::from_str(json).map_err(|e| format!("Invalid transponder parameters: {}", e).into())
}

fn slot_of(group: &FrontendGroup, id: FrontendId) -> Option<usize> {
    group.frontend(id).ok().map(|fe| fe.info().slot)
}

async fn run_tune(
    config: &ConfigFile,
    params: TransponderParameters,
    slot: Option<usize>,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let (group, _handles) = config.build_group()?;
    let id = match slot {
        Some(slot) => config
            .frontend_id(slot)
            .ok_or_else(|| format!("Slot {} is not configured", slot))?,
        None => {
            let (id, score) = group
                .best_frontend(&params)
                .ok_or("No front-end can tune this transponder")?;
            info!("{} selected with score {}", id, score);
            id
        }
    };

    let runner = FrontendRunner::start(group);
    runner.acquire(id).await?;
    runner.tune(id, params).await?;
    let outcome = runner.wait_for_settled(id, timeout).await;

    let report = {
        let shared = runner.group();
        let mut group = shared.lock().await;
        let state = group.frontend(id)?.state();
        json!({
            "slot": slot_of(&group, id),
            "state": state.label(),
            "status": group.status(id)?,
            "frontend": group.frontend_data(id)?,
            "transponder": group.transponder_data(id, false)?,
        })
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Err(e) = runner.release(id).await {
        warn!("{}: release failed: {}", id, e);
    }
    runner.shutdown().await;

    match outcome {
        Ok(state) => {
            info!("{} settled in {}", id, state.label());
            Ok(())
        }
        Err(e) => {
            error!("{}: tune failed: {}", id, e);
            Err(e.into())
        }
    }
}

fn run_score(
    config: &ConfigFile,
    params: TransponderParameters,
) -> Result<(), Box<dyn std::error::Error>> {
    let (group, _) = config.build_group()?;
    let scores: Vec<_> = group
        .scores(&params)
        .into_iter()
        .map(|(id, score)| json!({ "slot": slot_of(&group, id), "score": score }))
        .collect();
    let best = group.best_frontend(&params).and_then(|(id, _)| slot_of(&group, id));
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "scores": scores, "best": best }))?
    );
    Ok(())
}

fn run_status(config: &ConfigFile) -> Result<(), Box<dyn std::error::Error>> {
    let (group, _) = config.build_group()?;
    let mut slots = Vec::with_capacity(group.len());
    for id in group.ids() {
        let fe = group.frontend(id)?;
        slots.push(json!({
            "data": group.frontend_data(id)?,
            "description": fe.info().description,
            "enabled": fe.info().enabled,
            "sec_root": slot_of(&group, group.sec_root(id)?),
        }));
    }
    println!("{}", serde_json::to_string_pretty(&slots)?);
    Ok(())
}

/// Log directory and retention; the command line takes precedence over the file.
fn log_settings(args: &Args, file_config: &ConfigFile) -> (PathBuf, u64) {
    let log_dir = args.log_dir.clone().unwrap_or_else(|| {
        PathBuf::from(file_config.logging.log_dir.as_deref().unwrap_or("logs"))
    });
    let retention_days = args
        .log_retention_days
        .or(file_config.logging.retention_days)
        .unwrap_or(7);
    (log_dir, retention_days)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Explicit path > auto-detect > defaults
    let config_path = args.config.clone().or_else(|| {
        let default_path = PathBuf::from("dvbfe.toml");
        if default_path.exists() {
            Some(default_path)
        } else {
            None
        }
    });
    let file_config = if let Some(config_path) = &config_path {
        match load_config(config_path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", config_path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e.into());
            }
        }
    } else {
        ConfigFile::default()
    };

    let (log_dir, log_retention_days) = log_settings(&args, &file_config);
    logging::init_logging(
        &log_dir,
        log_retention_days,
        args.verbose,
        file_config.logging.level.as_deref(),
    )?;

    if file_config.frontend.is_empty() {
        warn!("No front-ends configured");
    }

    match args.command {
        Command::Tune {
            params,
            slot,
            timeout,
        } => {
            run_tune(
                &file_config,
                parse_params(&params)?,
                slot,
                Duration::from_secs(timeout),
            )
            .await
        }
        Command::Score { params } => run_score(&file_config, parse_params(&params)?),
        Command::Status => run_status(&file_config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config() -> ConfigFile {
        toml::from_str(
            r#"
[logging]
log_dir = "/var/log/dvbfe"
retention_days = 30
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_log_settings_from_file() {
        let args = Args::try_parse_from(["dvbfe", "status"]).unwrap();
        assert_eq!(
            log_settings(&args, &file_config()),
            (PathBuf::from("/var/log/dvbfe"), 30)
        );
        assert_eq!(
            log_settings(&args, &ConfigFile::default()),
            (PathBuf::from("logs"), 7)
        );
    }

    #[test]
    fn test_explicit_flags_win_even_with_default_values() {
        let args = Args::try_parse_from([
            "dvbfe",
            "--log-dir",
            "logs",
            "--log-retention-days",
            "7",
            "status",
        ])
        .unwrap();
        assert_eq!(
            log_settings(&args, &file_config()),
            (PathBuf::from("logs"), 7)
        );
    }
}
