use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use serde_json::json;

use collision_risk::evaluation::{compare, prediction_divergence};
use collision_risk::log_parser::{load_collision_log, load_prediction_log, load_warning_log};

#[derive(Parser, Debug)]
#[command(name = "evaluate")]
#[command(about = "Score collision warnings against the simulator's collision log", long_about = None)]
struct Args {
    /// Simulator collision output (XML)
    #[arg(long, default_value = "collision_log.txt")]
    collisions: PathBuf,

    /// Warning log per strategy as NAME=PATH (repeatable)
    #[arg(
        long = "warnings",
        value_name = "NAME=PATH",
        value_parser = parse_named_path,
        default_values = ["kalman=warnings_kalman.log", "constant-velocity=warnings_constant-velocity.log"]
    )]
    warnings: Vec<(String, PathBuf)>,

    /// Prediction trace to summarise (optional)
    #[arg(long)]
    predictions: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn parse_named_path(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{}'", raw)),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let ground_truth = load_collision_log(&args.collisions);
    if !ground_truth.is_available() {
        bail!(
            "no ground truth available from {} ({:?})",
            args.collisions.display(),
            ground_truth.status
        );
    }

    let strategies: Vec<(String, _)> = args
        .warnings
        .iter()
        .map(|(name, path)| (name.clone(), load_warning_log(path)))
        .collect();
    let reports = compare(&ground_truth.collisions, &strategies);

    let divergence = args
        .predictions
        .as_ref()
        .map(|path| prediction_divergence(&load_prediction_log(path)));

    if args.json {
        let output = json!({
            "collisions": args.collisions,
            "total_collisions": ground_truth.len(),
            "reports": reports,
            "prediction_divergence": divergence,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{} Analysis:", report.strategy);
        println!("{}", report);
        println!("Warnings: {}", report.total_warnings);
    }

    if let Some(divergence) = divergence {
        println!("\nPrediction Divergence:");
        println!("{}", divergence);
    }

    Ok(())
}
