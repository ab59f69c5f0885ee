#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry helpers for region selections.
//!
//! Computes the outline (convex hull) drawn around a selection's regions,
//! envelopes of point sets, and the `GeoJSON` form of outlines handed to
//! the map layer. Coordinates use `x = longitude`, `y = latitude`.

use flood_map_region_models::{GeoPoint, Region, SelectionBounds};
use geo::{Coord, LineString, Polygon, Rect};

pub use geojson;

/// Computes the convex hull of a point set with Andrew's monotone chain.
///
/// Inputs with fewer than three points are returned unchanged. Otherwise
/// the hull is returned counter-clockwise starting from the lowest-x
/// (then lowest-y) point, without a closing duplicate. Collinear points
/// on the hull boundary are dropped.
#[must_use]
pub fn convex_hull(points: &[Coord<f64>]) -> Vec<Coord<f64>> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y)));

    let mut lower: Vec<Coord<f64>> = Vec::with_capacity(sorted.len());
    for &p in &sorted {
        push_hull_point(&mut lower, p);
    }

    let mut upper: Vec<Coord<f64>> = Vec::with_capacity(sorted.len());
    for &p in sorted.iter().rev() {
        push_hull_point(&mut upper, p);
    }

    // Each chain ends where the other begins.
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn push_hull_point(chain: &mut Vec<Coord<f64>>, p: Coord<f64>) {
    while chain.len() >= 2 && cross(chain[chain.len() - 2], chain[chain.len() - 1], p) <= 0.0 {
        chain.pop();
    }
    chain.push(p);
}

/// Z component of `(a - o) x (b - o)`; positive for a counter-clockwise turn.
fn cross(o: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - o.x).mul_add(b.y - o.y, -((a.y - o.y) * (b.x - o.x)))
}

#[must_use]
pub const fn to_coord(point: &GeoPoint) -> Coord<f64> {
    Coord {
        x: point.lon,
        y: point.lat,
    }
}

#[must_use]
pub const fn to_geo_point(coord: Coord<f64>) -> GeoPoint {
    GeoPoint::new(coord.y, coord.x)
}

/// Converts selection bounds to a [`Rect`].
#[must_use]
pub fn to_rect(bounds: &SelectionBounds) -> Rect<f64> {
    Rect::new(
        Coord {
            x: bounds.west(),
            y: bounds.south(),
        },
        Coord {
            x: bounds.east(),
            y: bounds.north(),
        },
    )
}

/// Envelope of a point set, or `None` when it is empty.
#[must_use]
pub fn bounds_of(points: &[GeoPoint]) -> Option<SelectionBounds> {
    let (first, rest) = points.split_first()?;
    let init = (first.lat, first.lat, first.lon, first.lon);
    let (north, south, east, west) = rest.iter().fold(init, |(n, s, e, w), p| {
        (n.max(p.lat), s.min(p.lat), e.max(p.lon), w.min(p.lon))
    });
    SelectionBounds::new(north, south, east, west).ok()
}

/// Outline around every boundary point of the given regions.
#[must_use]
pub fn region_outline(regions: &[Region]) -> Vec<GeoPoint> {
    let coords: Vec<Coord<f64>> = regions
        .iter()
        .flat_map(Region::boundary_points)
        .map(to_coord)
        .collect();

    convex_hull(&coords).into_iter().map(to_geo_point).collect()
}

/// Converts an outline to `GeoJSON` for the map layer.
///
/// Three or more points become a closed `Polygon`, two a `LineString`,
/// one a `Point`. Returns `None` for an empty outline.
#[must_use]
pub fn outline_to_geojson(outline: &[GeoPoint]) -> Option<geojson::Geometry> {
    let coords: Vec<Coord<f64>> = outline.iter().map(to_coord).collect();

    let value = match coords.len() {
        0 => return None,
        1 => geojson::Value::from(&geo::Point::from(coords[0])),
        2 => geojson::Value::from(&LineString::from(coords)),
        _ => geojson::Value::from(&Polygon::new(LineString::from(coords), vec![])),
    };

    Some(geojson::Geometry::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area as _, Intersects as _};

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn small_inputs_are_returned_unchanged() {
        assert!(convex_hull(&[]).is_empty());
        assert_eq!(convex_hull(&[c(3.0, 1.0)]), vec![c(3.0, 1.0)]);
        assert_eq!(
            convex_hull(&[c(3.0, 1.0), c(-2.0, 4.0)]),
            vec![c(3.0, 1.0), c(-2.0, 4.0)]
        );
    }

    #[test]
    fn square_hull_drops_interior_point() {
        let points = [
            c(1.0, 1.0),
            c(0.5, 0.5),
            c(0.0, 0.0),
            c(0.0, 1.0),
            c(1.0, 0.0),
        ];
        let hull = convex_hull(&points);
        assert_eq!(
            hull,
            vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0), c(0.0, 1.0)]
        );

        let polygon = Polygon::new(LineString::from(hull), vec![]);
        assert!(polygon.signed_area() > 0.0, "hull must be counter-clockwise");
    }

    #[test]
    fn collinear_edge_points_are_dropped() {
        let points = [
            c(0.0, 0.0),
            c(1.0, 0.0),
            c(2.0, 0.0),
            c(2.0, 2.0),
            c(0.0, 2.0),
        ];
        let hull = convex_hull(&points);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&c(1.0, 0.0)));
    }

    #[test]
    fn duplicates_do_not_change_the_hull() {
        let points = [
            c(0.0, 0.0),
            c(0.0, 0.0),
            c(4.0, 0.0),
            c(4.0, 0.0),
            c(2.0, 3.0),
            c(2.0, 3.0),
        ];
        assert_eq!(
            convex_hull(&points),
            vec![c(0.0, 0.0), c(4.0, 0.0), c(2.0, 3.0)]
        );
    }

    #[test]
    fn hull_is_independent_of_input_order() {
        let a = [c(0.0, 0.0), c(3.0, 1.0), c(1.0, 4.0), c(-1.0, 2.0), c(1.0, 1.0)];
        let mut b = a;
        b.reverse();
        assert_eq!(convex_hull(&a), convex_hull(&b));
    }

    #[test]
    fn every_input_point_lies_within_hull() {
        // xorshift keeps the cloud deterministic; integer coordinates keep
        // the turn tests exact
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            #[allow(clippy::cast_precision_loss)]
            let v = (state % 2001) as f64;
            v - 1000.0
        };

        for _ in 0..20 {
            let points: Vec<Coord<f64>> = (0..40).map(|_| c(next(), next())).collect();
            let hull = convex_hull(&points);
            assert!(hull.len() >= 3);

            let polygon = Polygon::new(LineString::from(hull), vec![]);
            assert!(polygon.signed_area() > 0.0);
            for p in &points {
                assert!(
                    polygon.intersects(&geo::Point::from(*p)),
                    "{p:?} outside hull"
                );
            }
        }
    }

    #[test]
    fn bounds_of_point_set() {
        let points = [
            GeoPoint::new(1.0, 10.0),
            GeoPoint::new(-2.0, 12.0),
            GeoPoint::new(0.5, 9.0),
        ];
        let b = bounds_of(&points).unwrap();
        assert!((b.north() - 1.0).abs() < f64::EPSILON);
        assert!((b.south() - -2.0).abs() < f64::EPSILON);
        assert!((b.east() - 12.0).abs() < f64::EPSILON);
        assert!((b.west() - 9.0).abs() < f64::EPSILON);
        assert!(bounds_of(&[]).is_none());
    }

    #[test]
    fn rect_matches_bounds() {
        let b = SelectionBounds::new(5.0, 1.0, 8.0, 2.0).unwrap();
        let rect = to_rect(&b);
        assert_eq!(rect.min(), c(2.0, 1.0));
        assert_eq!(rect.max(), c(8.0, 5.0));
    }

    #[test]
    fn region_outline_spans_all_segments() {
        let square = |lat: f64, lon: f64| {
            vec![
                GeoPoint::new(lat, lon),
                GeoPoint::new(lat, lon + 1.0),
                GeoPoint::new(lat + 1.0, lon + 1.0),
                GeoPoint::new(lat + 1.0, lon),
            ]
        };
        let regions = [
            Region {
                boundary_geometry: vec![square(0.0, 0.0)],
                ..Region::empty("a".into())
            },
            Region {
                boundary_geometry: vec![square(0.0, 2.0)],
                ..Region::empty("b".into())
            },
            Region::empty("c".into()),
        ];

        let outline = region_outline(&regions);
        assert_eq!(
            outline,
            vec![
                GeoPoint::new(0.0, 0.0),
                GeoPoint::new(0.0, 3.0),
                GeoPoint::new(1.0, 3.0),
                GeoPoint::new(1.0, 0.0),
            ]
        );
    }

    #[test]
    fn outline_geojson_shapes() {
        assert!(outline_to_geojson(&[]).is_none());

        let point = outline_to_geojson(&[GeoPoint::new(1.0, 2.0)]).unwrap();
        assert!(matches!(point.value, geojson::Value::Point(_)));

        let line =
            outline_to_geojson(&[GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)]).unwrap();
        assert!(matches!(line.value, geojson::Value::LineString(ref l) if l.len() == 2));

        let polygon = outline_to_geojson(&[
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(1.0, 1.0),
        ])
        .unwrap();
        match polygon.value {
            geojson::Value::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                // closed ring
                assert_eq!(rings[0].len(), 4);
                assert_eq!(rings[0].first(), rings[0].last());
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }
}
