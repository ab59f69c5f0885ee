#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Population, flood depth, and relief estimate aggregation.
//!
//! Pure functions over region snapshots. Two calibrations exist for the
//! relief worker estimate: rectangle selections count one worker per 500
//! residents, while the global aggregate built from polled data counts
//! one per 1,000. Both add a fixed base crew of 20.

use flood_map_region_models::{Aggregate, Region, Severity, ZoneRecord, ZoneStatus};
use serde::{Deserialize, Serialize};

/// Fixed crew added to every worker estimate.
const BASE_WORKER_COUNT: u64 = 20;

/// Daily food requirement per resident, in kilograms.
const FOOD_KG_PER_PERSON: f64 = 0.05;

/// Which data source an aggregate is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calibration {
    /// A user-drawn rectangle selection.
    Selection,
    /// Every region known to the polling monitor.
    Global,
}

impl Calibration {
    /// Residents served by one relief worker.
    #[must_use]
    pub const fn residents_per_worker(self) -> u64 {
        match self {
            Self::Selection => 500,
            Self::Global => 1000,
        }
    }
}

/// Aggregates a rectangle selection.
#[must_use]
pub fn aggregate(regions: &[Region]) -> Aggregate {
    aggregate_with(regions, Calibration::Selection)
}

/// Aggregates the polling monitor's global region snapshot.
#[must_use]
pub fn aggregate_global(regions: &[Region]) -> Aggregate {
    aggregate_with(regions, Calibration::Global)
}

/// Aggregates regions with an explicit worker calibration.
///
/// The average depth only counts regions with positive depth; dry regions
/// would otherwise dilute the figure. When no region is flooded the
/// average is 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_with(regions: &[Region], calibration: Calibration) -> Aggregate {
    let total_population = regions
        .iter()
        .map(|r| r.population)
        .fold(0u64, u64::saturating_add);

    let positive: Vec<u32> = regions
        .iter()
        .map(|r| r.flood_depth_mm)
        .filter(|d| *d > 0)
        .collect();
    let sample: Vec<u32> = if positive.is_empty() {
        regions.iter().map(|r| r.flood_depth_mm).collect()
    } else {
        positive
    };
    let depth_sum: u64 = sample.iter().copied().map(u64::from).sum();
    let average_mm = depth_sum as f64 / sample.len().max(1) as f64;

    Aggregate {
        region_count: regions.len(),
        total_population,
        average_flood_depth_meters: average_mm / 1000.0,
        estimated_food_tons: round_to_tenth(total_population as f64 * FOOD_KG_PER_PERSON / 1000.0),
        estimated_worker_count: total_population / calibration.residents_per_worker()
            + BASE_WORKER_COUNT,
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Zone counts for the dashboard charts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSummary {
    pub total: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
    /// Zones whose level went up in the last observed change.
    pub rising: usize,
    /// Most severe classification present, if any zone is tracked.
    pub highest: Option<Severity>,
}

impl ZoneSummary {
    #[must_use]
    pub const fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

/// Counts zones per severity and direction.
#[must_use]
pub fn summarize_zones(zones: &[ZoneRecord]) -> ZoneSummary {
    zones.iter().fold(ZoneSummary::default(), |mut summary, zone| {
        summary.total += 1;
        match zone.severity {
            Severity::Low => summary.low += 1,
            Severity::Medium => summary.medium += 1,
            Severity::High => summary.high += 1,
            Severity::Critical => summary.critical += 1,
        }
        if zone.status == ZoneStatus::Rising {
            summary.rising += 1;
        }
        summary.highest = summary.highest.max(Some(zone.severity));
        summary
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: &str, population: u64, depth_mm: u32) -> Region {
        Region {
            population,
            flood_depth_mm: depth_mm,
            ..Region::empty(id.into())
        }
    }

    fn zone(id: &str, severity: Severity, status: ZoneStatus) -> ZoneRecord {
        ZoneRecord {
            id: id.into(),
            location: id.to_string(),
            level_meters: "0.0".to_string(),
            severity,
            status,
            timestamp_millis: 0,
            boundary_geometry: None,
        }
    }

    #[test]
    fn empty_set_yields_zeroes() {
        let agg = aggregate(&[]);
        assert_eq!(agg.region_count, 0);
        assert_eq!(agg.total_population, 0);
        assert!(agg.average_flood_depth_meters.abs() < f64::EPSILON);
        assert!(agg.estimated_food_tons.abs() < f64::EPSILON);
        assert_eq!(agg.estimated_worker_count, 20);
    }

    #[test]
    fn average_ignores_dry_regions() {
        let agg = aggregate(&[region("a", 1000, 0), region("b", 2000, 500)]);
        assert_eq!(agg.total_population, 3000);
        assert!((agg.average_flood_depth_meters - 0.5).abs() < 1e-9);
    }

    #[test]
    fn all_dry_regions_average_zero() {
        let agg = aggregate(&[region("a", 10, 0), region("b", 20, 0)]);
        assert!(agg.average_flood_depth_meters.abs() < f64::EPSILON);
    }

    #[test]
    fn selection_estimates() {
        let agg = aggregate(&[region("a", 1000, 300), region("b", 2000, 700)]);
        assert_eq!(agg.total_population, 3000);
        assert!((agg.average_flood_depth_meters - 0.5).abs() < 1e-9);
        assert!((agg.estimated_food_tons - 0.2).abs() < 1e-9);
        assert_eq!(agg.estimated_worker_count, 26);
    }

    #[test]
    fn global_calibration_uses_coarser_worker_ratio() {
        let regions = [region("a", 1000, 300), region("b", 2000, 700)];
        assert_eq!(aggregate_global(&regions).estimated_worker_count, 23);
        assert_eq!(aggregate(&regions).estimated_worker_count, 26);
    }

    #[test]
    fn worker_count_floors() {
        assert_eq!(aggregate(&[region("a", 999, 0)]).estimated_worker_count, 21);
        assert_eq!(aggregate_global(&[region("a", 999, 0)]).estimated_worker_count, 20);
    }

    #[test]
    fn food_rounds_to_one_decimal() {
        let agg = aggregate(&[region("a", 123_456, 0)]);
        // 123456 * 0.05 / 1000 = 6.1728
        assert!((agg.estimated_food_tons - 6.2).abs() < 1e-9);
    }

    #[test]
    fn aggregate_serializes_camel_case() {
        let json = serde_json::to_value(aggregate(&[region("a", 500, 250)])).unwrap();
        assert_eq!(json["totalPopulation"], 500);
        assert_eq!(json["estimatedWorkerCount"], 21);
    }

    #[test]
    fn zone_summary_counts() {
        let zones = [
            zone("a", Severity::High, ZoneStatus::Rising),
            zone("b", Severity::Medium, ZoneStatus::Stable),
            zone("c", Severity::High, ZoneStatus::Falling),
            zone("d", Severity::Critical, ZoneStatus::Rising),
        ];
        let summary = summarize_zones(&zones);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.count(Severity::High), 2);
        assert_eq!(summary.count(Severity::Low), 0);
        assert_eq!(summary.rising, 2);
        assert_eq!(summary.highest, Some(Severity::Critical));
        assert_eq!(summarize_zones(&[]).highest, None);
    }
}
