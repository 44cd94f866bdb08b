use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;

use collision_risk::config::{DetectorConfig, EstimatorKind, GapModel, KalmanMode};
use collision_risk::event_log::EventLog;
use collision_risk::filters::build_estimator;
use collision_risk::monitor::{PredictionTrace, RiskMonitor, StrategyRun};
use collision_risk::telemetry::RecordedTrace;

#[derive(Parser, Debug)]
#[command(name = "collision_detector")]
#[command(about = "Replay a recorded traffic trace through the collision-risk detector", long_about = None)]
struct Args {
    /// Recorded trace (.json or .json.gz)
    #[arg(long)]
    trace: PathBuf,

    /// Estimator strategy (kalman, constant-velocity, both)
    #[arg(long, default_value = "both")]
    strategy: String,

    /// JSON detector config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prediction horizon in seconds
    #[arg(long)]
    horizon: Option<f64>,

    /// Rear-end warning gap in metres
    #[arg(long)]
    rear_end_gap: Option<f64>,

    /// Side-swipe distance threshold in metres
    #[arg(long)]
    side_swipe_threshold: Option<f64>,

    /// Use the measured leader gap corrected by predicted displacement
    #[arg(long, default_value_t = false)]
    measured_gap: bool,

    /// Skip the Kalman measurement update
    #[arg(long, default_value_t = false)]
    predict_only: bool,

    /// Carry Kalman state across frames instead of re-deriving it per frame
    #[arg(long, default_value_t = false)]
    carry_state: bool,

    /// Also log both estimators' predictions for every vehicle
    #[arg(long, default_value_t = false)]
    prediction_trace: bool,

    /// Output directory for warning logs
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

fn strategies(name: &str) -> Result<Vec<EstimatorKind>> {
    if name.eq_ignore_ascii_case("both") {
        return Ok(vec![EstimatorKind::Kalman, EstimatorKind::ConstantVelocity]);
    }
    match name.parse::<EstimatorKind>() {
        Ok(kind) => Ok(vec![kind]),
        Err(e) => bail!("{} (expected kalman, constant-velocity or both)", e),
    }
}

fn build_config(args: &Args) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::load(path)?,
        None => DetectorConfig::default(),
    };

    if let Some(horizon) = args.horizon {
        config.horizon = horizon;
    }
    if let Some(gap) = args.rear_end_gap {
        config.rear_end_gap = gap;
    }
    if let Some(threshold) = args.side_swipe_threshold {
        config.side_swipe_threshold = threshold;
    }
    if args.measured_gap {
        config.gap_model = GapModel::MeasuredCorrected;
    }
    if args.predict_only {
        config.kalman.mode = KalmanMode::PredictOnly;
    }
    if args.carry_state {
        config.kalman.carry_state = true;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let kinds = strategies(&args.strategy)?;
    let config = build_config(&args)?;

    log::info!("Collision detector starting");
    log::info!("  Trace: {}", args.trace.display());
    log::info!("  Strategies: {:?}", kinds.iter().map(|k| k.name()).collect::<Vec<_>>());
    log::info!(
        "  Horizon: {} s, rear-end gap: {} m, side-swipe threshold: {} m",
        config.horizon,
        config.rear_end_gap,
        config.side_swipe_threshold
    );

    let trace = RecordedTrace::load(&args.trace)?;
    if trace.is_empty() {
        log::warn!("Trace {} has no frames", args.trace.display());
    }

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let mut monitor = RiskMonitor::new(config.clone())?;
    for kind in kinds {
        let path = args.output_dir.join(format!("warnings_{}.log", kind.name()));
        log::info!("  {} warnings -> {}", kind.name(), path.display());
        let log = EventLog::append_to(&path)?;
        monitor = monitor.with_strategy(StrategyRun::new(build_estimator(kind, &config.kalman), log));
    }
    if args.prediction_trace {
        let path = args.output_dir.join("predictions.log");
        log::info!("  prediction trace -> {}", path.display());
        let log = EventLog::append_to(&path)?;
        monitor = monitor.with_prediction_trace(PredictionTrace::new(config.kalman.clone(), log));
    }

    let summary = monitor.replay(&trace, Local::now().naive_local());

    println!("\n=== Replay Summary ===");
    println!("Frames: {}", summary.frames);
    println!("Skipped vehicle samples: {}", summary.skipped_vehicles);
    for strategy in &summary.strategies {
        println!("{} warnings: {}", strategy.strategy, strategy.events);
        if strategy.write_failures > 0 {
            println!("{} failed writes: {}", strategy.strategy, strategy.write_failures);
        }
    }
    if args.prediction_trace {
        println!("Prediction lines: {}", summary.prediction_lines);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selection() {
        assert_eq!(
            strategies("both").unwrap(),
            vec![EstimatorKind::Kalman, EstimatorKind::ConstantVelocity]
        );
        assert_eq!(strategies("cv").unwrap(), vec![EstimatorKind::ConstantVelocity]);
        assert!(strategies("particle").is_err());
    }

    #[test]
    fn test_flag_overrides() {
        let args = Args::parse_from([
            "collision_detector",
            "--trace",
            "trace.json",
            "--rear-end-gap",
            "7.5",
            "--measured-gap",
            "--predict-only",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.rear_end_gap, 7.5);
        assert_eq!(config.gap_model, GapModel::MeasuredCorrected);
        assert_eq!(config.kalman.mode, KalmanMode::PredictOnly);
        assert_eq!(config.side_swipe_threshold, 3.0);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = Args::parse_from(["collision_detector", "--trace", "t.json", "--horizon", "0"]);
        assert!(build_config(&args).is_err());
    }
}
