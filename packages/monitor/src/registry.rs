//! The live flood zone list.

use std::cmp::Reverse;

use flood_map_region_models::{RegionId, ZoneRecord};

/// Merges `updates` into `zones` and restores display order.
///
/// An update replaces the record with the same id; records for new ids are
/// appended. The result is sorted newest first, with ties broken by
/// severity (most severe first). The sort is stable, so records that tie
/// on both keep their merge order.
#[must_use]
pub fn merge_zones(mut zones: Vec<ZoneRecord>, updates: Vec<ZoneRecord>) -> Vec<ZoneRecord> {
    for update in updates {
        match zones.iter_mut().find(|z| z.id == update.id) {
            Some(existing) => *existing = update,
            None => zones.push(update),
        }
    }
    zones.sort_by_key(|z| (Reverse(z.timestamp_millis), Reverse(z.severity.rank())));
    zones
}

/// Zones currently shown in the live list, in display order.
#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: Vec<ZoneRecord>,
}

impl ZoneRegistry {
    #[must_use]
    pub fn zones(&self) -> &[ZoneRecord] {
        &self.zones
    }

    #[must_use]
    pub fn get(&self, id: &RegionId) -> Option<&ZoneRecord> {
        self.zones.iter().find(|z| &z.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn merge(&mut self, updates: Vec<ZoneRecord>) {
        if updates.is_empty() {
            return;
        }
        self.zones = merge_zones(std::mem::take(&mut self.zones), updates);
    }
}
