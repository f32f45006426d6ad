//! SENTRA-OS demo binary
//!
//! Drives the full condition-monitoring pipeline through a scripted
//! scenario: calibrate an asset, monitor healthy operation, inject a fault,
//! reset, and print the resulting assessments, events, and validation
//! metrics.
//!
//! # Usage
//!
//! ```bash
//! # In-memory store, default scenario
//! cargo run --release
//!
//! # Severe jitter fault, sled-backed persistence
//! cargo run --release -- --fault jitter --severity severe --data-dir ./data
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: logging filter (default: info)
//! - `SENTRA_CONFIG`: path to a TOML config file

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use sentra_os::config::EngineConfig;
use sentra_os::events::EventEngine;
use sentra_os::ingest::IngestionFacade;
use sentra_os::lifecycle::LifecycleController;
use sentra_os::storage::{MemoryPointWriter, PointWriter, SledPointWriter, StateStore};
use sentra_os::types::{FaultKind, FaultSeverity, SystemState};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sentra-os")]
#[command(about = "SENTRA-OS Rotating Asset Condition Monitoring Engine")]
#[command(version)]
struct CliArgs {
    /// Asset to monitor
    #[arg(long, default_value = "motor-1")]
    asset: String,

    /// Fault kind to inject: spike, drift, jitter, default
    #[arg(long, default_value = "spike")]
    fault: String,

    /// Fault severity: mild, medium, severe
    #[arg(long, default_value = "medium")]
    severity: String,

    /// Seconds to monitor in each phase
    #[arg(long, default_value = "5")]
    phase_secs: u64,

    /// Random seed for synthetic data and detector training
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Persist points to a sled store at this path instead of memory
    #[arg(long)]
    data_dir: Option<String>,
}

fn parse_fault(s: &str) -> Result<FaultKind> {
    match s.to_ascii_lowercase().as_str() {
        "spike" => Ok(FaultKind::Spike),
        "drift" => Ok(FaultKind::Drift),
        "jitter" => Ok(FaultKind::Jitter),
        "default" => Ok(FaultKind::Default),
        other => anyhow::bail!("unknown fault kind '{}'", other),
    }
}

fn parse_severity(s: &str) -> Result<FaultSeverity> {
    match s.to_ascii_lowercase().as_str() {
        "mild" => Ok(FaultSeverity::Mild),
        "medium" => Ok(FaultSeverity::Medium),
        "severe" => Ok(FaultSeverity::Severe),
        other => anyhow::bail!("unknown severity '{}'", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    let fault = parse_fault(&args.fault)?;
    let severity = parse_severity(&args.severity)?;

    let config = EngineConfig::load();
    let store = Arc::new(StateStore::new(config.history_capacity.max(2000)));
    let events = Arc::new(EventEngine::new(config.debounce_ticks));

    let writer: Arc<dyn PointWriter> = match &args.data_dir {
        Some(dir) => Arc::new(
            SledPointWriter::open(std::path::Path::new(dir))
                .with_context(|| format!("opening point store at {}", dir))?,
        ),
        None => Arc::new(MemoryPointWriter::new()),
    };

    let controller = LifecycleController::new(
        Arc::clone(&store),
        Arc::clone(&writer),
        Arc::clone(&events),
        config.clone(),
        args.seed,
    );
    let facade = IngestionFacade::new(
        Arc::clone(&store),
        Arc::clone(&writer),
        Arc::clone(&events),
        config,
    );

    info!(asset = %args.asset, "=== Phase 1: calibration ===");
    controller.calibrate(&args.asset).await?;

    // Wait for the calibration worker to reach MONITORING_HEALTHY
    let mut waited = 0u64;
    while controller.state().await == SystemState::Calibrating && waited < 60 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        waited += 1;
    }
    anyhow::ensure!(
        controller.state().await == SystemState::MonitoringHealthy,
        "calibration did not reach MONITORING_HEALTHY: {:?}",
        controller.snapshot().await.status
    );

    info!("=== Phase 2: healthy monitoring ===");
    tokio::time::sleep(Duration::from_secs(args.phase_secs)).await;
    print_report(&facade, &args.asset).await;

    info!(fault = %fault, severity = %severity, "=== Phase 3: fault injection ===");
    controller.inject_fault(&args.asset, fault, severity).await?;
    tokio::time::sleep(Duration::from_secs(args.phase_secs)).await;
    print_report(&facade, &args.asset).await;

    info!("=== Phase 4: reset to healthy ===");
    controller.reset(&args.asset).await?;
    tokio::time::sleep(Duration::from_secs(args.phase_secs)).await;
    print_report(&facade, &args.asset).await;

    let snapshot = controller.snapshot().await;
    info!(
        state = %snapshot.state,
        training_samples = snapshot.metrics.training_samples,
        healthy_stability = snapshot.healthy_stability,
        fault_capture_rate = snapshot.fault_capture_rate,
        "=== Validation metrics ==="
    );

    controller.stop().await?;
    Ok(())
}

async fn print_report(facade: &IngestionFacade, asset: &str) {
    match facade.assess_current(asset).await {
        Ok(report) => {
            info!(
                asset = %asset,
                health = report.health_score,
                risk = %report.risk_level,
                rul_days = report.maintenance_window_days,
                "Health report"
            );
            for explanation in &report.explanations {
                info!(reason = %explanation.reason, "  explanation");
            }
        }
        Err(e) => info!(asset = %asset, error = %e, "Assessment unavailable"),
    }
}
