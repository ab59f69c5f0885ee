#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood status polling and zone reconciliation.
//!
//! [`PollingReconciler`] periodically reads the flood depth feed, compares
//! each reading with the last one it saw, and keeps the live zone list in
//! step: tracked zones are updated when their level, trend, or severity
//! changes, and untracked regions that reach medium severity or above are
//! looked up and added. It owns the [`RegionCache`] of last-seen depths
//! and populations; other components read it through a [`CacheReader`].

pub mod clock;
pub mod registry;

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use flood_map_analytics::aggregate_global;
use flood_map_region::RegionGateway;
use flood_map_region_models::{
    Aggregate, CacheReader, FloodDepthReading, Region, RegionCache, RegionId, Severity,
    ZoneRecord, ZoneStatus, format_level_meters,
};
use futures::{StreamExt as _, stream};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, SystemClock};
use crate::registry::ZoneRegistry;

/// Default time between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default number of region detail requests in flight per cycle.
pub const DEFAULT_DETAIL_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// Maximum concurrent region detail requests.
    pub detail_concurrency: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
        }
    }
}

/// Outcome of a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum CycleReport {
    Completed {
        /// Readings returned by the status feed.
        readings: usize,
        /// Tracked zones whose record changed.
        updated: usize,
        /// Regions newly added to the zone list.
        inserted: usize,
        /// Candidate regions whose detail could not be fetched.
        failed_details: usize,
    },
    /// The previous cycle was still running.
    Skipped,
    /// The status feed could not be read.
    StatusUnavailable,
}

/// A region detail resolved for an insertion candidate.
struct Resolved {
    region: Region,
    /// Whether the detail was fetched during this cycle.
    fresh: bool,
}

/// Keeps the zone list and region cache in step with the flood status feed.
pub struct PollingReconciler {
    gateway: Arc<dyn RegionGateway>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    cache: Arc<RwLock<RegionCache>>,
    registry: RwLock<ZoneRegistry>,
    /// Successfully fetched details, reused for the rest of the session.
    details: RwLock<BTreeMap<RegionId, Region>>,
    /// Held for the duration of a cycle.
    cycle: tokio::sync::Mutex<()>,
}

impl PollingReconciler {
    #[must_use]
    pub fn new(gateway: Arc<dyn RegionGateway>, config: MonitorConfig) -> Self {
        Self::with_clock(gateway, config, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(
        gateway: Arc<dyn RegionGateway>,
        config: MonitorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            clock,
            config,
            cache: Arc::new(RwLock::new(RegionCache::default())),
            registry: RwLock::new(ZoneRegistry::default()),
            details: RwLock::new(BTreeMap::new()),
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Read-only handle to the region cache.
    #[must_use]
    pub fn cache_reader(&self) -> CacheReader {
        CacheReader::new(Arc::clone(&self.cache))
    }

    /// Snapshot of the zone list in display order.
    #[must_use]
    pub fn zones(&self) -> Vec<ZoneRecord> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .zones()
            .to_vec()
    }

    /// Aggregates every region in the cache with the global calibration.
    #[must_use]
    pub fn global_aggregate(&self) -> Aggregate {
        let regions = self.cache_reader().read(RegionCache::regions);
        aggregate_global(&regions)
    }

    /// Starts polling every `period` on a background task.
    ///
    /// Each tick runs its cycle on its own task, so a slow cycle never
    /// delays the timer; a tick that lands while a cycle is still running
    /// is skipped by [`Self::poll_once`].
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            log::info!("Polling flood status every {period:?}");
            loop {
                ticker.tick().await;
                let monitor = Arc::clone(&self);
                tokio::spawn(async move {
                    monitor.poll_once().await;
                });
            }
        })
    }

    /// Runs one poll cycle.
    pub async fn poll_once(&self) -> CycleReport {
        let Ok(_cycle) = self.cycle.try_lock() else {
            log::warn!("Previous poll cycle still running; skipping");
            return CycleReport::Skipped;
        };

        let readings = match self.gateway.get_flood_depth_status().await {
            Ok(readings) => readings,
            Err(e) => {
                log::warn!("Flood status unavailable: {e}");
                return CycleReport::StatusUnavailable;
            }
        };

        let now = self.clock.now_millis();
        let (mut updates, candidates) = self.reconcile_tracked(&readings, now);
        let updated = updates.len();

        let width = self.config.detail_concurrency.max(1);
        let resolved: Vec<(FloodDepthReading, Option<Resolved>)> = stream::iter(candidates)
            .map(|reading| async move {
                let resolved = self.resolve_detail(&reading.id).await;
                (reading, resolved)
            })
            .buffered(width)
            .collect()
            .await;

        let mut failed_details = 0;
        let mut inserted = 0;
        for (reading, resolved) in resolved {
            let Some(Resolved { region, fresh }) = resolved else {
                failed_details += 1;
                continue;
            };
            if let Some(record) = new_zone(&region, fresh, reading.depth, now) {
                updates.push(record);
                inserted += 1;
            }
        }

        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(updates);

        log::info!(
            "Poll cycle: {} readings, {updated} updated, {inserted} inserted, {failed_details} detail failures",
            readings.len()
        );
        CycleReport::Completed {
            readings: readings.len(),
            updated,
            inserted,
            failed_details,
        }
    }

    /// Records every reading in the cache and diffs tracked zones.
    ///
    /// Returns updated records for tracked zones and the readings for
    /// untracked regions above low severity.
    fn reconcile_tracked(
        &self,
        readings: &[FloodDepthReading],
        now: i64,
    ) -> (Vec<ZoneRecord>, Vec<FloodDepthReading>) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);

        let mut updates = Vec::new();
        let mut candidates = Vec::new();
        for reading in readings {
            let previous = cache
                .record_depth(reading.id.clone(), reading.depth)
                .unwrap_or(reading.depth);
            let severity = Severity::from_depth_mm(reading.depth);

            if let Some(existing) = registry.get(&reading.id) {
                let level_meters = format_level_meters(reading.depth);
                let status = ZoneStatus::from_depths(previous, reading.depth);
                if existing.level_meters != level_meters
                    || existing.status != status
                    || existing.severity != severity
                {
                    log::debug!(
                        "Zone {} now {severity} ({status}, {level_meters} m)",
                        reading.id
                    );
                    updates.push(ZoneRecord {
                        level_meters,
                        severity,
                        status,
                        timestamp_millis: now,
                        ..existing.clone()
                    });
                }
            } else if severity != Severity::Low {
                candidates.push(reading.clone());
            }
        }

        (updates, candidates)
    }

    /// Returns the region detail for `id`, fetching it if it is not cached.
    async fn resolve_detail(&self, id: &RegionId) -> Option<Resolved> {
        let cached = self
            .details
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();
        if let Some(region) = cached {
            return Some(Resolved {
                region,
                fresh: false,
            });
        }

        match self.gateway.get_region_detail(id).await {
            Ok(detail) => {
                let region = detail.into_region();
                if region.population > 0 {
                    self.cache
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .record_population(id.clone(), region.population);
                }
                self.details
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id.clone(), region.clone());
                Some(Resolved {
                    region,
                    fresh: true,
                })
            }
            Err(e) => {
                log::warn!("Detail for region {id} failed: {e}");
                None
            }
        }
    }
}

/// Builds the record for a newly tracked zone, if it is still above low
/// severity once the detail is known.
///
/// A freshly fetched detail's own positive depth takes precedence over the
/// polled one. A cached detail's depth may be stale, so the polled depth is
/// used instead.
fn new_zone(region: &Region, fresh: bool, polled_mm: u32, now: i64) -> Option<ZoneRecord> {
    let depth_mm = if fresh && region.flood_depth_mm > 0 {
        region.flood_depth_mm
    } else {
        polled_mm
    };
    let severity = Severity::from_depth_mm(depth_mm);
    if severity == Severity::Low {
        log::debug!("Region {} reclassified as low; not tracking", region.id);
        return None;
    }

    Some(ZoneRecord {
        id: region.id.clone(),
        location: region
            .name
            .clone()
            .unwrap_or_else(|| region.id.to_string()),
        level_meters: format_level_meters(depth_mm),
        severity,
        status: ZoneStatus::Rising,
        timestamp_millis: now,
        boundary_geometry: (!region.boundary_geometry.is_empty())
            .then(|| region.boundary_geometry.clone()),
    })
}
