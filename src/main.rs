//! lawn-estimator: headless driver for the capture workflow
//!
//! Resolves an address, measures a property polygon read from GeoJSON,
//! subtracts an optional exclusion, and prints the estimate.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lawn_estimator::config::{self, EstimatorConfig};
use lawn_estimator::domain::parse_polygon;
use lawn_estimator::services::{
    AssistSlot, FootprintEstimator, GeometryEngine, HttpGeocoder, Locator, ProviderChain,
};
use lawn_estimator::workflow::{LocateOutcome, SurveyOutcome, WorkflowSettings};
use lawn_estimator::CaptureWorkflow;

/// Estimate mowable lawn area for a property
#[derive(Debug, Parser)]
#[command(name = "lawn-estimator", version, about)]
struct Cli {
    /// Street address of the property
    #[arg(long)]
    address: String,

    /// GeoJSON file with the property boundary
    #[arg(long)]
    property: PathBuf,

    /// GeoJSON file with a non-mowable area to subtract
    #[arg(long)]
    exclusion: Option<PathBuf>,

    /// Also report the estimate net of building footprints
    #[arg(long)]
    buildings: bool,

    /// Configuration file to use instead of the layered lookup
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Initialize logging with RUST_LOG environment variable support
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_polygon(path: &Path) -> Result<lawn_estimator::domain::Polygon> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_polygon(&text).with_context(|| format!("parsing {}", path.display()))
}

async fn run(cli: Cli, config: EstimatorConfig) -> Result<()> {
    let property = read_polygon(&cli.property)?;
    let exclusion = cli.exclusion.as_deref().map(read_polygon).transpose()?;

    let engine = GeometryEngine::new();
    let mut workflow = CaptureWorkflow::new(engine, WorkflowSettings::from(&config));

    let geocoder = HttpGeocoder::new(config.geocode.clone(), config.http.timeout())?;
    let locator = Locator::new(Arc::new(geocoder), AssistSlot::unavailable());
    match workflow.locate(&locator, &cli.address).await? {
        LocateOutcome::Located(located) => {
            println!("Located: {} at {}", located.address, located.coordinate);
        }
        LocateOutcome::Retry { message } => bail!(message),
        LocateOutcome::Stale => bail!("address lookup was superseded"),
    }

    workflow.set_property(property)?;

    if cli.buildings {
        let chain = ProviderChain::from_config(&config.buildings, config.http.timeout())?;
        let estimator = FootprintEstimator::new(engine, config.estimate.sq_ft_per_minute);
        if let SurveyOutcome::Estimated(estimate) = workflow
            .survey_buildings(&estimator, &chain, exclusion.clone())
            .await?
        {
            println!(
                "Net of {} building(s): {} ({} subtraction(s) skipped)",
                estimate.buildings_considered,
                estimate.result,
                estimate.skipped()
            );
        }
    }

    let property_sq_ft = workflow.advance_to_exclusions()?;
    println!("Property: {} sq ft", property_sq_ft);

    if let Some(exclusion) = exclusion {
        workflow.set_exclusion(exclusion)?;
    }
    let result = workflow.advance_to_result()?;
    println!("Lawn: {}", result);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EstimatorConfig::load_file(path)?,
        None => EstimatorConfig::load(Some(config::project_root().as_path()))?,
    };

    tracing::info!("Starting lawn-estimator for {:?}", cli.address);

    // Run with Ctrl+C signal handling
    tokio::select! {
        res = run(cli, config) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
