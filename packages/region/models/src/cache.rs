//! Per-region flood status and population cache.
//!
//! Written only by the polling monitor; everything else reads clones or
//! point lookups.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::{Region, RegionId};

/// Last observed flood depth and known population per region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionCache {
    /// region id -> last polled depth in millimetres
    pub flood_status: BTreeMap<RegionId, u32>,
    /// region id -> population from the region detail
    pub population: BTreeMap<RegionId, u64>,
}

impl RegionCache {
    #[must_use]
    pub fn depth_mm(&self, id: &RegionId) -> Option<u32> {
        self.flood_status.get(id).copied()
    }

    #[must_use]
    pub fn population_of(&self, id: &RegionId) -> Option<u64> {
        self.population.get(id).copied()
    }

    /// Records a new depth, returning the previous one.
    pub fn record_depth(&mut self, id: RegionId, depth_mm: u32) -> Option<u32> {
        self.flood_status.insert(id, depth_mm)
    }

    pub fn record_population(&mut self, id: RegionId, population: u64) {
        self.population.insert(id, population);
    }

    /// Every region known to the cache, without geometry.
    ///
    /// Regions with a population but no depth reading (or the reverse)
    /// get 0 for the missing field.
    #[must_use]
    pub fn regions(&self) -> Vec<Region> {
        let mut ids: Vec<&RegionId> = self.flood_status.keys().collect();
        ids.extend(
            self.population
                .keys()
                .filter(|id| !self.flood_status.contains_key(*id)),
        );
        ids.sort();

        ids.into_iter()
            .map(|id| Region {
                population: self.population_of(id).unwrap_or(0),
                flood_depth_mm: self.depth_mm(id).unwrap_or(0),
                ..Region::empty(id.clone())
            })
            .collect()
    }
}

/// Read-only handle to a cache owned by someone else.
#[derive(Debug, Clone)]
pub struct CacheReader(Arc<RwLock<RegionCache>>);

impl CacheReader {
    #[must_use]
    pub const fn new(cache: Arc<RwLock<RegionCache>>) -> Self {
        Self(cache)
    }

    /// Runs `f` against the current cache contents.
    ///
    /// The lock is held only for the duration of `f`.
    pub fn read<R>(&self, f: impl FnOnce(&RegionCache) -> R) -> R {
        f(&self.0.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// A point-in-time copy of the cache.
    #[must_use]
    pub fn snapshot(&self) -> RegionCache {
        self.read(Clone::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_owner_writes() {
        let shared = Arc::new(RwLock::new(RegionCache::default()));
        let reader = CacheReader::new(Arc::clone(&shared));
        assert!(reader.snapshot().flood_status.is_empty());

        shared.write().unwrap().record_depth("a".into(), 720);
        assert_eq!(reader.read(|c| c.depth_mm(&"a".into())), Some(720));
    }

    #[test]
    fn record_depth_returns_previous_value() {
        let mut cache = RegionCache::default();
        let id = RegionId::from("a");
        assert_eq!(cache.record_depth(id.clone(), 300), None);
        assert_eq!(cache.record_depth(id.clone(), 600), Some(300));
        assert_eq!(cache.depth_mm(&id), Some(600));
    }

    #[test]
    fn regions_merge_both_maps() {
        let mut cache = RegionCache::default();
        cache.record_depth("a".into(), 400);
        cache.record_population("a".into(), 1_000);
        cache.record_population("b".into(), 2_500);
        cache.record_depth("c".into(), 50);

        let regions = cache.regions();
        let ids: Vec<&str> = regions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(regions[0].population, 1_000);
        assert_eq!(regions[0].flood_depth_mm, 400);
        assert_eq!(regions[1].flood_depth_mm, 0);
        assert_eq!(regions[2].population, 0);
    }
}
