//! Wire types returned by region data services.
//!
//! The shapes follow the Overpass API `out geom` element format: numeric
//! ids, free-form string `tags`, and relation `members` carrying their own
//! point geometry. Deserialization is lenient so a sloppy tag never
//! rejects a whole record.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{GeoPoint, Region, RegionId, SelectionBounds, parse_depth_mm, parse_population};

/// Reference to a region returned by a bounds query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRef {
    #[serde(deserialize_with = "region_id")]
    pub id: RegionId,
}

/// Free-form region tags. Only the keys the dashboard needs are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTags {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Population, possibly with thousands separators.
    #[serde(default, deserialize_with = "lenient_string")]
    pub population: Option<String>,
    /// Flood depth in millimetres as a numeric string.
    #[serde(default, deserialize_with = "lenient_string")]
    pub flood_depth: Option<String>,
}

/// One member of a region relation, typically an outer boundary way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionMember {
    #[serde(default)]
    pub geometry: Vec<GeoPoint>,
}

/// Bounding box attached to a detail response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetailBounds {
    pub minlat: f64,
    pub minlon: f64,
    pub maxlat: f64,
    pub maxlon: f64,
}

/// Full detail of a single region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDetail {
    #[serde(deserialize_with = "region_id")]
    pub id: RegionId,
    #[serde(default)]
    pub tags: RegionTags,
    #[serde(default)]
    pub members: Vec<RegionMember>,
    #[serde(default)]
    pub bounds: Option<DetailBounds>,
}

impl RegionDetail {
    /// Converts the wire record into a [`Region`], parsing its tags.
    #[must_use]
    pub fn into_region(self) -> Region {
        Region {
            population: parse_population(self.tags.population.as_deref()),
            flood_depth_mm: parse_depth_mm(self.tags.flood_depth.as_deref()),
            name: self.tags.name,
            boundary_geometry: self
                .members
                .into_iter()
                .map(|m| m.geometry)
                .filter(|segment| !segment.is_empty())
                .collect(),
            id: self.id,
        }
    }

    /// The region's envelope: the declared bounds when present, otherwise
    /// the extent of its member geometry.
    #[must_use]
    pub fn envelope(&self) -> Option<SelectionBounds> {
        if let Some(b) = self.bounds {
            return SelectionBounds::new(b.maxlat, b.minlat, b.maxlon, b.minlon).ok();
        }

        let mut points = self.members.iter().flat_map(|m| m.geometry.iter());
        let first = points.next()?;
        let (mut north, mut south, mut east, mut west) = (first.lat, first.lat, first.lon, first.lon);
        for p in points {
            north = north.max(p.lat);
            south = south.min(p.lat);
            east = east.max(p.lon);
            west = west.min(p.lon);
        }
        SelectionBounds::new(north, south, east, west).ok()
    }
}

/// Current flood depth for one region, as reported by the status feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloodDepthReading {
    #[serde(deserialize_with = "region_id")]
    pub id: RegionId,
    /// Depth in millimetres.
    #[serde(default, deserialize_with = "depth_mm")]
    pub depth: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Unsigned(u64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::String(s) => s,
            Self::Unsigned(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }
}

fn region_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RegionId, D::Error> {
    StringOrNumber::deserialize(deserializer).map(|v| RegionId(v.into_string()))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(StringOrNumber::into_string))
}

fn depth_mm<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = Option::<StringOrNumber>::deserialize(deserializer)?.map(StringOrNumber::into_string);
    Ok(parse_depth_mm(raw.as_deref()))
}
