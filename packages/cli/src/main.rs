#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for flood map selections and zone monitoring.
//!
//! ```text
//! flood_map select --north 26.185 --south 26.175 --east 91.76 --west 91.73 [--prime]
//! flood_map monitor [--cycles 3] [--interval-secs 10]
//! ```
//!
//! Both commands read from the embedded demo dataset by default. Pass
//! `--source overpass` to use the live Overpass and flood status services
//! configured through `FLOOD_MAP_*` environment variables.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use flood_map_analytics::summarize_zones;
use flood_map_monitor::{MonitorConfig, PollingReconciler};
use flood_map_region::RegionGateway;
use flood_map_region::config::GatewayConfig;
use flood_map_region::memory::InMemoryGateway;
use flood_map_region::overpass::OverpassGateway;
use flood_map_region_models::{SelectionBounds, ZoneRecord};
use flood_map_selection::{RequestCoordinator, SelectionConfig, SelectionState};

#[derive(Parser)]
#[command(
    name = "flood_map",
    about = "Flood impact selections and live zone monitoring"
)]
struct Cli {
    /// Where region data comes from
    #[arg(long, value_enum, default_value_t = Source::Demo, global = true)]
    source: Source,

    /// Maximum concurrent region detail requests
    #[arg(long, default_value_t = 8, global = true)]
    concurrency: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    /// Embedded demo regions
    Demo,
    /// Overpass API and the configured flood status feed
    Overpass,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate every region intersecting a rectangle
    Select {
        #[arg(long, allow_hyphen_values = true)]
        north: f64,
        #[arg(long, allow_hyphen_values = true)]
        south: f64,
        #[arg(long, allow_hyphen_values = true)]
        east: f64,
        #[arg(long, allow_hyphen_values = true)]
        west: f64,
        /// Run one poll cycle first so cached depths and populations fill gaps
        #[arg(long)]
        prime: bool,
    },
    /// Poll the flood status feed and print the live zone list
    Monitor {
        /// Stop after this many cycles instead of running until Ctrl-C
        #[arg(long)]
        cycles: Option<u32>,
        /// Seconds between poll cycles
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: u64,
    },
}

fn build_gateway(source: Source) -> Result<Arc<dyn RegionGateway>, Box<dyn std::error::Error>> {
    Ok(match source {
        Source::Demo => Arc::new(InMemoryGateway::demo()?),
        Source::Overpass => {
            let config = GatewayConfig::load()?;
            log::info!(
                "Using Overpass at {} and flood status at {}",
                config.overpass_url,
                config.status_url
            );
            Arc::new(OverpassGateway::new(config)?)
        }
    })
}

async fn select(
    gateway: Arc<dyn RegionGateway>,
    config: SelectionConfig,
    bounds: SelectionBounds,
    prime: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut coordinator = RequestCoordinator::new(Arc::clone(&gateway), config);

    if prime {
        let monitor = PollingReconciler::new(
            gateway,
            MonitorConfig {
                detail_concurrency: config.detail_concurrency,
                ..MonitorConfig::default()
            },
        );
        let report = monitor.poll_once().await;
        log::info!("Primed region cache: {report:?}");
        coordinator = coordinator.with_cache(monitor.cache_reader());
    }

    coordinator.select_region(bounds).await;

    match coordinator.current() {
        SelectionState::Ready(selection) => {
            let output = serde_json::json!({
                "selection": &*selection,
                "outline": selection.outline_geojson(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        SelectionState::Failed { message, .. } => Err(message.into()),
        SelectionState::Idle | SelectionState::Loading { .. } => {
            Err("selection did not complete".into())
        }
    }
}

async fn monitor(
    gateway: Arc<dyn RegionGateway>,
    config: MonitorConfig,
    cycles: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = Arc::new(PollingReconciler::new(gateway, config));

    if let Some(cycles) = cycles {
        let mut ticker = tokio::time::interval(config.interval);
        for cycle in 1..=cycles {
            ticker.tick().await;
            let report = monitor.poll_once().await;
            println!("cycle {cycle}: {}", serde_json::to_string(&report)?);
        }
    } else {
        let handle = Arc::clone(&monitor).spawn(config.interval);
        tokio::signal::ctrl_c().await?;
        handle.abort();
    }

    let zones = monitor.zones();
    print_zones(&zones);

    let summary = serde_json::json!({
        "zones": summarize_zones(&zones),
        "aggregate": monitor.global_aggregate(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn print_zones(zones: &[ZoneRecord]) {
    if zones.is_empty() {
        println!("No flood zones tracked.");
        return;
    }

    println!(
        "{:<10} {:<24} {:>7} {:<9} {:<8}",
        "ID", "LOCATION", "LEVEL", "SEVERITY", "STATUS"
    );
    println!("{}", "-".repeat(62));

    for zone in zones {
        let location = if zone.location.chars().count() > 24 {
            format!("{}...", zone.location.chars().take(21).collect::<String>())
        } else {
            zone.location.clone()
        };
        println!(
            "{:<10} {:<24} {:>6}m {:<9} {:<8}",
            zone.id.as_str(),
            location,
            zone.level_meters,
            zone.severity.as_ref(),
            zone.status.as_ref(),
        );
    }

    println!("\n{} zone(s)", zones.len());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let gateway = build_gateway(cli.source)?;

    match cli.command {
        Commands::Select {
            north,
            south,
            east,
            west,
            prime,
        } => {
            let bounds = SelectionBounds::new(north, south, east, west)?;
            let config = SelectionConfig {
                detail_concurrency: cli.concurrency,
            };
            select(gateway, config, bounds, prime).await
        }
        Commands::Monitor {
            cycles,
            interval_secs,
        } => {
            let config = MonitorConfig {
                interval: Duration::from_secs(interval_secs),
                detail_concurrency: cli.concurrency,
            };
            monitor(gateway, config, cycles).await
        }
    }
}
