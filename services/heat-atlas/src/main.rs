//! Heat atlas command-line service.
//!
//! Builds one heat composite from a granule request and drives the
//! dashboard overlay against a headless map:
//! - Quality filtering, window reads and pixel-stack aggregation
//! - PNG export of the colorized composite
//! - Optional KOSTRA scenario, CatRaRE events and flood-risk layers
//! - JSON run report with statistics and provenance

mod config;
mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use atlas_common::{BoundingBox, GranuleList};
use chrono::Utc;
use clap::Parser;
use compositor::{
    AggregationMethod, CachingSource, CompositeRequest, Compositor, HttpCogSource,
    LocalFileSource, RasterSource,
};
use dashboard::{
    catrare, kostra, Applied, CompositeChannel, DashboardController, FloodScenario,
    KostraScenario, HEAT_LAYER, KOSTRA_LAYER,
};
use overlay::{HeadlessHost, Viewport};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::AtlasConfig;
use report::{LayerReport, RunReport};

#[derive(Parser, Debug)]
#[command(name = "heat-atlas")]
#[command(about = "Build a heat composite and render it with the dashboard layers")]
struct Args {
    /// Composite request JSON (region, granules, optional method)
    request: PathBuf,

    /// Override the request region: "west,south,east,north"
    #[arg(long)]
    region: Option<String>,

    /// Override the aggregation method (max, mean, median, p90, p95)
    #[arg(long)]
    method: Option<String>,

    /// Output PNG for the heat composite
    #[arg(short, long, default_value = "composite.png")]
    out: PathBuf,

    /// Write the run report as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// YAML configuration file (defaults to COMPOSITE_* environment variables)
    #[arg(long, env = "HEAT_ATLAS_CONFIG")]
    config: Option<PathBuf>,

    /// Read granules from this directory instead of over HTTP
    #[arg(long)]
    local_root: Option<PathBuf>,

    /// Proxy URL prefix for remote granules
    #[arg(long, env = "RASTER_PROXY_URL")]
    proxy_url: Option<String>,

    /// KOSTRA scenario to show, e.g. "60min/100a"
    #[arg(long)]
    kostra: Option<String>,

    /// Show CatRaRE events from this GeoJSON file
    #[arg(long)]
    catrare: Option<PathBuf>,

    /// Flood scenario to show (hq10, hq100, hqextrem)
    #[arg(long)]
    flood: Option<String>,

    /// Print Prometheus metrics on exit
    #[arg(long)]
    print_metrics: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Starting heat atlas");

    let mut config = AtlasConfig::load(args.config.as_deref())?;
    if args.proxy_url.is_some() {
        config.compositor.proxy_url = args.proxy_url.clone();
    }
    if let Some(path) = &args.catrare {
        config.catrare_path = Some(path.clone());
    }

    let request = load_request(&args)?;
    info!(
        granules = request.granules.len(),
        region = %request.region.cache_key(),
        "Loaded composite request"
    );

    let mut source: Arc<dyn RasterSource> = match &args.local_root {
        Some(root) => Arc::new(LocalFileSource::with_root(root)),
        None => Arc::new(HttpCogSource::new(config.compositor.proxy_url.clone())?),
    };
    if config.compositor.granule_cache_entries > 0 {
        source = Arc::new(CachingSource::new(
            source,
            config.compositor.granule_cache_entries,
        ));
    }

    let mut heat = Compositor::new(source.clone(), config.compositor.clone())?;
    if let Some(scale) = config.fixed_scale()? {
        heat = heat.with_fixed_scale(scale);
    }
    let heat = Arc::new(heat);
    let mut phases = heat.subscribe();
    tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow();
            info!(phase = phase.as_str(), "Composite phase");
        }
    });

    let mut controller = DashboardController::new(CompositeChannel::new(HEAT_LAYER, heat));
    if config.kostra_base_url.is_some() {
        let kostra_config = kostra::compositor_config(&config.compositor);
        let compositor = Compositor::new(source, kostra_config)?;
        controller = controller
            .with_kostra(CompositeChannel::new(KOSTRA_LAYER, Arc::new(compositor)).with_opacity(0.6));
    }

    let host = HeadlessHost::new(1, Viewport::default());
    controller.attach(&host, false)?;

    let mut report = RunReport::default();

    // Heat composite
    let applied = controller.update_heat(&request).await?;
    let composite = controller.composite(HEAT_LAYER).cloned();
    report
        .layers
        .push(LayerReport::new(HEAT_LAYER, applied, composite.as_deref()));

    match &composite {
        Some(result) => {
            renderer::export::write_png(&result.image, &args.out)
                .with_context(|| format!("Failed to write PNG: {:?}", args.out))?;
            info!(
                path = %args.out.display(),
                width = result.width,
                height = result.height,
                valid = result.stats.valid_pixels,
                confidence = result.provenance.coverage_confidence.as_str(),
                "Wrote composite"
            );
            report.png = Some(args.out.display().to_string());
        }
        None => warn!("No composite produced; PNG not written"),
    }

    // KOSTRA scenario
    if let Some(scenario) = &args.kostra {
        let scenario = KostraScenario::parse(scenario)?;
        match config.kostra_base_url.as_deref() {
            Some(base_url) => {
                let applied = controller
                    .show_kostra(scenario, base_url, request.region)
                    .await?;
                let composite = controller.composite(KOSTRA_LAYER).cloned();
                report
                    .layers
                    .push(LayerReport::new(KOSTRA_LAYER, applied, composite.as_deref()));
            }
            None => warn!(scenario = %scenario, "kostra_base_url not configured; scenario skipped"),
        }
    }

    // CatRaRE events
    if let Some(path) = &config.catrare_path {
        let events = catrare::load_events(path)?;
        let recent = catrare::filter_recent(events, config.catrare_years, Utc::now().date_naive());
        let in_region: Vec<_> = recent
            .into_iter()
            .filter(|e| request.region.contains_point(e.lon, e.lat))
            .collect();
        info!(events = in_region.len(), years = config.catrare_years, "Showing CatRaRE events");
        controller.show_events(&in_region);
        report.events_shown = Some(in_region.len());
    }

    // Flood-risk tiles
    if let Some(scenario) = &args.flood {
        match config.flood_archive_url.as_deref() {
            Some(url) => controller.show_flood(url, FloodScenario::from_str(scenario)),
            None => warn!("flood_archive_url not configured; flood layer skipped"),
        }
    }

    report.rendered = host.log().last_layer_ids();

    if let Some(path) = &args.stats {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write stats: {:?}", path))?;
        info!(path = %path.display(), "Wrote run report");
    }

    controller.detach();

    if args.print_metrics {
        println!("{}", prometheus.render());
    }

    info!(
        layers = report.rendered.len(),
        heat = applied.as_str(),
        "Heat atlas run complete"
    );

    if applied != Applied::Shown {
        anyhow::bail!("heat composite not available: {}", applied);
    }
    Ok(())
}

fn load_request(args: &Args) -> Result<CompositeRequest> {
    let json = std::fs::read_to_string(&args.request)
        .with_context(|| format!("Failed to read request: {:?}", args.request))?;
    let mut request: CompositeRequest = serde_json::from_str(&json)
        .with_context(|| format!("Invalid request JSON: {:?}", args.request))?;

    if let Some(region) = &args.region {
        request.region = BoundingBox::from_region_string(region)
            .with_context(|| format!("Invalid region: {}", region))?;
    }
    if let Some(method) = &args.method {
        request.method = Some(AggregationMethod::from_str(method));
    }

    let granules = GranuleList {
        granules: request.granules,
    };
    granules.validate().context("Invalid granule list")?;
    request.granules = granules.granules;
    Ok(request)
}
