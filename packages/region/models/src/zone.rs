//! Tracked flood zones and their classification.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{GeoPoint, RegionId};

/// Ordinal flood severity derived from water depth.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Up to 200 mm.
    Low = 0,
    /// Over 200 mm.
    Medium = 1,
    /// Over 500 mm.
    High = 2,
    /// Over 1000 mm.
    Critical = 3,
}

impl Severity {
    /// Classifies a flood depth in millimetres.
    #[must_use]
    pub const fn from_depth_mm(depth_mm: u32) -> Self {
        if depth_mm > 1000 {
            Self::Critical
        } else if depth_mm > 500 {
            Self::High
        } else if depth_mm > 200 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Sort rank, higher is more severe.
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Marker and badge colour for the map layer.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Low => "#22c55e",
            Self::Medium => "#eab308",
            Self::High => "#f97316",
            Self::Critical => "#dc2626",
        }
    }

    /// Marker icon name for the map layer.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Low => "droplet",
            Self::Medium => "waves",
            Self::High => "alert-triangle",
            Self::Critical => "siren",
        }
    }

    /// Returns all variants, least severe first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Medium, Self::High, Self::Critical]
    }
}

/// Direction of the water level since the previous observation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ZoneStatus {
    Rising,
    Falling,
    Stable,
}

impl ZoneStatus {
    /// Compares a previous depth with a new one.
    #[must_use]
    pub const fn from_depths(previous_mm: u32, current_mm: u32) -> Self {
        if current_mm > previous_mm {
            Self::Rising
        } else if current_mm < previous_mm {
            Self::Falling
        } else {
            Self::Stable
        }
    }
}

/// A flood-affected area surfaced in the live zone list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRecord {
    /// Region the zone tracks.
    pub id: RegionId,
    /// Display name.
    pub location: String,
    /// Water level in metres with one decimal (e.g. `"0.6"`).
    pub level_meters: String,
    pub severity: Severity,
    pub status: ZoneStatus,
    /// Unix milliseconds of the last change.
    pub timestamp_millis: i64,
    /// Region boundary, when it was fetched.
    pub boundary_geometry: Option<Vec<Vec<GeoPoint>>>,
}

/// Formats a depth in millimetres as metres with one decimal.
#[must_use]
pub fn format_level_meters(depth_mm: u32) -> String {
    format!("{:.1}", f64::from(depth_mm) / 1000.0)
}
