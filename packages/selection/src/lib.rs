#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rectangle selection coordinator.
//!
//! Each call to [`RequestCoordinator::select_region`] supersedes the one
//! before it. The region lookup and the detail fan-out run in a spawned
//! task; starting a new selection aborts the previous task and bumps a
//! generation counter. A result is committed to the observable
//! [`SelectionState`] only if its generation is still current when it
//! finishes, so observers never see a stale selection overwrite a newer
//! one.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flood_map_analytics::aggregate;
use flood_map_geometry::{outline_to_geojson, region_outline};
use flood_map_region::{GatewayError, RegionGateway};
use flood_map_region_models::{
    Aggregate, CacheReader, GeoPoint, Region, RegionCache, RegionId, SelectionBounds,
};
use futures::{StreamExt as _, stream};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

/// Default number of region detail requests in flight per selection.
pub const DEFAULT_DETAIL_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionConfig {
    /// Maximum concurrent region detail requests.
    pub detail_concurrency: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
        }
    }
}

/// A committed selection result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub bounds: SelectionBounds,
    /// Regions in lookup order. Failed detail fetches appear as empty
    /// regions.
    pub regions: Vec<Region>,
    pub aggregate: Aggregate,
    /// Convex hull of every boundary point, counter-clockwise.
    pub outline: Vec<GeoPoint>,
}

impl Selection {
    /// The outline as a `GeoJSON` geometry, if there is one.
    #[must_use]
    pub fn outline_geojson(&self) -> Option<flood_map_geometry::geojson::Geometry> {
        outline_to_geojson(&self.outline)
    }
}

/// What the dashboard should currently show for the selection panel.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionState {
    /// No selection has been made, or it was cancelled.
    Idle,
    /// A selection for `bounds` is being fetched.
    Loading { bounds: SelectionBounds },
    /// The most recent selection finished.
    Ready(Arc<Selection>),
    /// The region lookup for the most recent selection failed.
    Failed {
        bounds: SelectionBounds,
        message: String,
    },
}

struct Generation {
    /// Ticket of the most recently started selection.
    current: u64,
    in_flight: Option<AbortHandle>,
}

/// Coordinates rectangle selections against a [`RegionGateway`].
pub struct RequestCoordinator {
    gateway: Arc<dyn RegionGateway>,
    cache: Option<CacheReader>,
    config: SelectionConfig,
    generation: Mutex<Generation>,
    state: watch::Sender<SelectionState>,
}

impl RequestCoordinator {
    #[must_use]
    pub fn new(gateway: Arc<dyn RegionGateway>, config: SelectionConfig) -> Self {
        let (state, _) = watch::channel(SelectionState::Idle);
        Self {
            gateway,
            cache: None,
            config,
            generation: Mutex::new(Generation {
                current: 0,
                in_flight: None,
            }),
            state,
        }
    }

    /// Fills missing depth and population from the polling monitor's cache.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheReader) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Subscribes to selection state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SelectionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> SelectionState {
        self.state.borrow().clone()
    }

    /// Selects every region intersecting `bounds` and aggregates them.
    ///
    /// Any selection still in flight is aborted before this one's requests
    /// are issued. Returns `None` if this selection is itself superseded
    /// before it finishes, or if the region lookup fails. Individual detail
    /// failures only zero out the affected region.
    ///
    /// Dropping the returned future abandons the selection: its fetch is
    /// aborted and the state returns to [`SelectionState::Idle`].
    pub async fn select_region(&self, bounds: SelectionBounds) -> Option<Aggregate> {
        let gateway = Arc::clone(&self.gateway);
        let width = self.config.detail_concurrency.max(1);
        let (ticket, task) = self.begin(bounds, async move {
            fetch_regions(gateway.as_ref(), &bounds, width).await
        });

        let mut abandon = AbandonOnDrop {
            coordinator: self,
            ticket,
            armed: true,
        };
        let outcome = task.await;
        abandon.armed = false;

        let fetched = match outcome {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => {
                let message = e.to_string();
                if self.commit(ticket, SelectionState::Failed { bounds, message }) {
                    log::error!("Region lookup for selection {ticket} failed: {e}");
                } else {
                    log::debug!("Selection {ticket} failed after being superseded: {e}");
                }
                return None;
            }
            Err(e) if e.is_cancelled() => {
                log::debug!("Selection {ticket} superseded");
                return None;
            }
            Err(e) => {
                let message = format!("selection task failed: {e}");
                if self.commit(ticket, SelectionState::Failed { bounds, message }) {
                    log::error!("Selection {ticket} task failed: {e}");
                }
                return None;
            }
        };

        let regions = match &self.cache {
            Some(cache) => cache.read(|c| fill_from_cache(fetched, c)),
            None => fetched.into_iter().map(|f| f.region).collect(),
        };
        let selection = build_selection(bounds, regions);
        let result = selection.aggregate;
        let region_count = selection.regions.len();

        if self.commit(ticket, SelectionState::Ready(Arc::new(selection))) {
            log::info!(
                "Selection {ticket}: {region_count} regions, population {}",
                result.total_population
            );
            Some(result)
        } else {
            log::debug!("Selection {ticket} finished after being superseded; discarding");
            None
        }
    }

    /// Abandons any in-flight selection and returns to [`SelectionState::Idle`].
    pub fn cancel(&self) {
        let mut generation = self.lock();
        Self::reset(&mut generation);
        self.state.send_replace(SelectionState::Idle);
    }

    fn lock(&self) -> MutexGuard<'_, Generation> {
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Invalidates the current ticket and aborts its fetch.
    fn reset(generation: &mut Generation) {
        generation.current += 1;
        if let Some(handle) = generation.in_flight.take() {
            handle.abort();
        }
    }

    /// Starts a new generation running `fetch`.
    ///
    /// The previous fetch is aborted before `fetch` is spawned, and both
    /// happen under the lock, so concurrent callers are ordered by ticket.
    fn begin<F>(&self, bounds: SelectionBounds, fetch: F) -> (u64, JoinHandle<F::Output>)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let mut generation = self.lock();
        Self::reset(&mut generation);
        let task = tokio::spawn(fetch);
        generation.in_flight = Some(task.abort_handle());
        self.state.send_replace(SelectionState::Loading { bounds });
        (generation.current, task)
    }

    /// Publishes `state` if `ticket` is still current.
    fn commit(&self, ticket: u64, state: SelectionState) -> bool {
        let mut generation = self.lock();
        if generation.current != ticket {
            return false;
        }
        generation.in_flight = None;
        self.state.send_replace(state);
        true
    }

    /// Cancels `ticket` if it is still current.
    fn abandon(&self, ticket: u64) {
        let mut generation = self.lock();
        if generation.current != ticket {
            return;
        }
        Self::reset(&mut generation);
        self.state.send_replace(SelectionState::Idle);
        log::debug!("Selection {ticket} abandoned by its caller");
    }
}

impl Drop for RequestCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.lock().in_flight.take() {
            handle.abort();
        }
    }
}

/// Abandons a selection whose caller stopped waiting for it.
struct AbandonOnDrop<'a> {
    coordinator: &'a RequestCoordinator,
    ticket: u64,
    armed: bool,
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.abandon(self.ticket);
        }
    }
}

/// A region from the detail fan-out.
struct Fetched {
    region: Region,
    /// False when the detail fetch failed and `region` is a stand-in.
    ok: bool,
}

/// Looks up the regions in `bounds` and fetches their details.
async fn fetch_regions(
    gateway: &dyn RegionGateway,
    bounds: &SelectionBounds,
    width: usize,
) -> Result<Vec<Fetched>, GatewayError> {
    let refs = gateway.find_regions_in_bounds(bounds).await?;

    let mut seen = BTreeSet::new();
    let ids: Vec<RegionId> = refs
        .into_iter()
        .map(|r| r.id)
        .filter(|id| seen.insert(id.clone()))
        .collect();
    log::debug!("Fetching {} region details (concurrency={width})", ids.len());

    let fetched = stream::iter(ids)
        .map(|id| async move {
            match gateway.get_region_detail(&id).await {
                Ok(detail) => Fetched {
                    region: detail.into_region(),
                    ok: true,
                },
                Err(e) => {
                    log::warn!("Detail for region {id} failed: {e}");
                    Fetched {
                        region: Region::empty(id),
                        ok: false,
                    }
                }
            }
        })
        .buffered(width)
        .collect()
        .await;

    Ok(fetched)
}

/// Replaces zero depth and population of fetched regions with the last
/// polled values. Stand-ins for failed fetches stay empty.
fn fill_from_cache(fetched: Vec<Fetched>, cache: &RegionCache) -> Vec<Region> {
    fetched
        .into_iter()
        .map(|Fetched { mut region, ok }| {
            if !ok {
                return region;
            }
            if region.flood_depth_mm == 0
                && let Some(depth) = cache.depth_mm(&region.id)
            {
                region.flood_depth_mm = depth;
            }
            if region.population == 0
                && let Some(population) = cache.population_of(&region.id)
            {
                region.population = population;
            }
            region
        })
        .collect()
}

fn build_selection(bounds: SelectionBounds, regions: Vec<Region>) -> Selection {
    Selection {
        bounds,
        aggregate: aggregate(&regions),
        outline: region_outline(&regions),
        regions,
    }
}
