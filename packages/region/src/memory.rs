//! In-memory region gateway.
//!
//! Serves a fixed set of region details, indexed by envelope in an R-tree
//! for bounds lookups. Depth readings start from each region's
//! `flood_depth` tag and can be changed between polls. Latency and
//! per-call failures can be injected, which is how the CLI demo and the
//! coordinator/monitor tests exercise slow and flaky services.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use flood_map_region_models::{
    FloodDepthReading, RegionDetail, RegionId, RegionRef, SelectionBounds, parse_depth_mm,
};
use rstar::{AABB, RTree, RTreeObject};

use crate::{GatewayError, RegionGateway};

const DEMO_REGIONS_JSON: &str = include_str!("../data/demo_regions.json");

/// A region envelope stored in the R-tree.
struct RegionEnvelope {
    id: RegionId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Gateway over a fixed, in-process region set.
pub struct InMemoryGateway {
    index: RTree<RegionEnvelope>,
    details: BTreeMap<RegionId, RegionDetail>,
    /// region id -> depth served by the status feed
    readings: RwLock<BTreeMap<RegionId, u32>>,
    failing_details: RwLock<BTreeSet<RegionId>>,
    lookup_available: AtomicBool,
    status_available: AtomicBool,
    latency: Duration,
    detail_calls: AtomicUsize,
}

impl InMemoryGateway {
    /// Builds a gateway serving `details`.
    ///
    /// Regions without any geometry or declared bounds are still served by
    /// id and by the status feed, but never match a bounds lookup.
    #[must_use]
    pub fn new(details: Vec<RegionDetail>) -> Self {
        let mut entries = Vec::with_capacity(details.len());
        let mut readings = BTreeMap::new();
        let mut by_id = BTreeMap::new();

        for detail in details {
            match detail.envelope() {
                Some(b) => entries.push(RegionEnvelope {
                    id: detail.id.clone(),
                    envelope: AABB::from_corners([b.west(), b.south()], [b.east(), b.north()]),
                }),
                None => log::warn!("Region {} has no geometry; bounds lookups will skip it", detail.id),
            }
            readings.insert(
                detail.id.clone(),
                parse_depth_mm(detail.tags.flood_depth.as_deref()),
            );
            by_id.insert(detail.id.clone(), detail);
        }

        Self {
            index: RTree::bulk_load(entries),
            details: by_id,
            readings: RwLock::new(readings),
            failing_details: RwLock::new(BTreeSet::new()),
            lookup_available: AtomicBool::new(true),
            status_available: AtomicBool::new(true),
            latency: Duration::ZERO,
            detail_calls: AtomicUsize::new(0),
        }
    }

    /// Builds a gateway over the embedded demo dataset.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Json`] if the embedded dataset is malformed.
    pub fn demo() -> Result<Self, GatewayError> {
        let details: Vec<RegionDetail> = serde_json::from_str(DEMO_REGIONS_JSON)?;
        Ok(Self::new(details))
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Changes the depth the status feed reports for `id`.
    pub fn set_depth(&self, id: &RegionId, depth_mm: u32) {
        self.readings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), depth_mm);
    }

    /// Makes detail requests for `id` fail until [`Self::restore_detail`].
    pub fn fail_detail(&self, id: &RegionId) {
        self.failing_details
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());
    }

    pub fn restore_detail(&self, id: &RegionId) {
        self.failing_details
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Toggles whether bounds lookups succeed.
    pub fn set_lookup_available(&self, available: bool) {
        self.lookup_available.store(available, Ordering::SeqCst);
    }

    /// Toggles whether the status feed succeeds.
    pub fn set_status_available(&self, available: bool) {
        self.status_available.store(available, Ordering::SeqCst);
    }

    /// Number of detail requests served so far, failures included.
    #[must_use]
    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait::async_trait]
impl RegionGateway for InMemoryGateway {
    async fn find_regions_in_bounds(
        &self,
        bounds: &SelectionBounds,
    ) -> Result<Vec<RegionRef>, GatewayError> {
        self.simulate_latency().await;

        if !self.lookup_available.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable {
                message: "bounds lookup disabled".to_string(),
            });
        }

        let query = AABB::from_corners(
            [bounds.west(), bounds.south()],
            [bounds.east(), bounds.north()],
        );
        let mut ids: Vec<RegionId> = self
            .index
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.id.clone())
            .collect();
        ids.sort();

        Ok(ids.into_iter().map(|id| RegionRef { id }).collect())
    }

    async fn get_region_detail(&self, id: &RegionId) -> Result<RegionDetail, GatewayError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let failing = self
            .failing_details
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id);
        if failing {
            return Err(GatewayError::Unavailable {
                message: format!("detail for region {id} disabled"),
            });
        }

        let mut detail = self
            .details
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound { id: id.clone() })?;

        // Keep the detail's depth tag in step with the status feed.
        if let Some(depth) = self
            .readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            detail.tags.flood_depth = Some(depth.to_string());
        }

        Ok(detail)
    }

    async fn get_flood_depth_status(&self) -> Result<Vec<FloodDepthReading>, GatewayError> {
        self.simulate_latency().await;

        if !self.status_available.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable {
                message: "status feed disabled".to_string(),
            });
        }

        Ok(self
            .readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, depth)| FloodDepthReading {
                id: id.clone(),
                depth: *depth,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(refs: &[RegionRef]) -> Vec<&str> {
        refs.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn demo_dataset_parses() {
        let details: Vec<RegionDetail> = serde_json::from_str(DEMO_REGIONS_JSON).unwrap();
        assert_eq!(details.len(), 6);
        let unique: BTreeSet<_> = details.iter().map(|d| &d.id).collect();
        assert_eq!(unique.len(), details.len(), "demo region ids must be unique");
        assert!(details.iter().all(|d| d.envelope().is_some()));
    }

    #[tokio::test]
    async fn bounds_lookup_uses_envelopes() {
        let gateway = InMemoryGateway::demo().unwrap();
        let bounds = SelectionBounds::new(26.185, 26.175, 91.76, 91.73).unwrap();
        let refs = gateway.find_regions_in_bounds(&bounds).await.unwrap();
        assert_eq!(ids(&refs), ["9002", "9003"]);
    }

    #[tokio::test]
    async fn bounds_lookup_outside_dataset_is_empty() {
        let gateway = InMemoryGateway::demo().unwrap();
        let bounds = SelectionBounds::new(10.0, 9.0, 10.0, 9.0).unwrap();
        assert!(gateway.find_regions_in_bounds(&bounds).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_can_be_disabled() {
        let gateway = InMemoryGateway::demo().unwrap();
        gateway.set_lookup_available(false);
        let bounds = SelectionBounds::new(27.0, 26.0, 92.0, 91.0).unwrap();
        assert!(matches!(
            gateway.find_regions_in_bounds(&bounds).await,
            Err(GatewayError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_detail_is_not_found() {
        let gateway = InMemoryGateway::demo().unwrap();
        let result = gateway.get_region_detail(&RegionId::from("nope")).await;
        assert!(matches!(result, Err(GatewayError::NotFound { .. })));
        assert_eq!(gateway.detail_calls(), 1);
    }

    #[tokio::test]
    async fn failing_detail_can_be_restored() {
        let gateway = InMemoryGateway::demo().unwrap();
        let id = RegionId::from("9003");
        gateway.fail_detail(&id);
        assert!(gateway.get_region_detail(&id).await.is_err());
        gateway.restore_detail(&id);
        let region = gateway.get_region_detail(&id).await.unwrap().into_region();
        assert_eq!(region.population, 23_900);
        assert_eq!(region.flood_depth_mm, 780);
    }

    #[tokio::test]
    async fn status_feed_tracks_depth_changes() {
        let gateway = InMemoryGateway::demo().unwrap();
        let id = RegionId::from("9001");
        gateway.set_depth(&id, 615);

        let readings = gateway.get_flood_depth_status().await.unwrap();
        assert_eq!(readings.len(), 6);
        let reading = readings.iter().find(|r| r.id == id).unwrap();
        assert_eq!(reading.depth, 615);

        let detail = gateway.get_region_detail(&id).await.unwrap();
        assert_eq!(detail.tags.flood_depth.as_deref(), Some("615"));

        gateway.set_status_available(false);
        assert!(gateway.get_flood_depth_status().await.is_err());
    }
}
