#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region, selection, aggregate, and flood zone types.
//!
//! These types are shared by the gateway, the geometry helpers, the
//! selection coordinator, and the polling monitor. They carry no I/O of
//! their own; the only logic here is validation of selection bounds and
//! lenient parsing of the string tags returned by region data services.

pub mod cache;
pub mod detail;
pub mod zone;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::{CacheReader, RegionCache};
pub use detail::{
    DetailBounds, FloodDepthReading, RegionDetail, RegionMember, RegionRef, RegionTags,
};
pub use zone::{Severity, ZoneRecord, ZoneStatus, format_level_meters};

/// Opaque region identifier, stable across polls within a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub String);

impl RegionId {
    /// Wraps anything string-like as a region id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for RegionId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// A WGS84 coordinate as returned by region data services.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// An administrative unit with its flood attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// Region identifier.
    pub id: RegionId,
    /// Display name, when the data service provides one.
    pub name: Option<String>,
    /// Boundary as an ordered list of line segments.
    pub boundary_geometry: Vec<Vec<GeoPoint>>,
    /// Resident count, 0 when unknown.
    pub population: u64,
    /// Current flood depth in millimetres.
    pub flood_depth_mm: u32,
}

impl Region {
    /// A region that contributes nothing to an aggregate.
    ///
    /// Used in place of regions whose detail fetch failed.
    #[must_use]
    pub const fn empty(id: RegionId) -> Self {
        Self {
            id,
            name: None,
            boundary_geometry: Vec::new(),
            population: 0,
            flood_depth_mm: 0,
        }
    }

    /// Iterates every boundary point across all segments.
    pub fn boundary_points(&self) -> impl Iterator<Item = &GeoPoint> {
        self.boundary_geometry.iter().flatten()
    }
}

/// Error returned when selection bounds violate their invariants.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid selection bounds (n={north}, s={south}, e={east}, w={west})")]
pub struct InvalidBoundsError {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// A user-drawn rectangle scoping a region query.
///
/// Always satisfies `north >= south` and `east >= west`; a degenerate
/// rectangle collapses to a line or a single point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectionBounds {
    north: f64,
    south: f64,
    east: f64,
    west: f64,
}

impl SelectionBounds {
    /// Creates bounds from explicit edges.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoundsError`] if any edge is not finite, if
    /// `north < south`, or if `east < west`.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, InvalidBoundsError> {
        let finite = [north, south, east, west].iter().all(|v| v.is_finite());
        if !finite || north < south || east < west {
            return Err(InvalidBoundsError {
                north,
                south,
                east,
                west,
            });
        }
        Ok(Self {
            north,
            south,
            east,
            west,
        })
    }

    /// Creates bounds from the two corners of a drag gesture, in either
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoundsError`] if any coordinate is not finite.
    pub fn from_corners(a: GeoPoint, b: GeoPoint) -> Result<Self, InvalidBoundsError> {
        Self::new(
            a.lat.max(b.lat),
            a.lat.min(b.lat),
            a.lon.max(b.lon),
            a.lon.min(b.lon),
        )
    }

    #[must_use]
    pub const fn north(&self) -> f64 {
        self.north
    }

    #[must_use]
    pub const fn south(&self) -> f64 {
        self.south
    }

    #[must_use]
    pub const fn east(&self) -> f64 {
        self.east
    }

    #[must_use]
    pub const fn west(&self) -> f64 {
        self.west
    }

    /// Whether the point lies inside or on the edge of the rectangle.
    #[must_use]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lon >= self.west
            && point.lon <= self.east
    }

    /// Whether two rectangles overlap, touching edges included.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }
}

/// Summary statistics derived from a set of regions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    /// Number of regions the statistics were computed from.
    pub region_count: usize,
    /// Sum of region populations.
    pub total_population: u64,
    /// Mean flood depth over regions with positive depth, in metres.
    pub average_flood_depth_meters: f64,
    /// Estimated daily food requirement in tons, one decimal.
    pub estimated_food_tons: f64,
    /// Estimated relief worker headcount.
    pub estimated_worker_count: u64,
}

/// Parses a population tag, stripping thousands separators.
///
/// Returns 0 for missing or unparseable values.
#[must_use]
pub fn parse_population(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return 0;
    };
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | '\'') && !c.is_whitespace())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Parses a flood depth tag in millimetres.
///
/// Fractional values are rounded; negative, non-finite, missing, or
/// unparseable values yield 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_depth_mm(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .map_or(0, |v| v.round().min(f64::from(u32::MAX)) as u32)
}
