//! Route definition for the simulated vehicle.
//!
//! A [`Route`] is a fixed, ordered sequence of [`Waypoint`]s. It is built once
//! from configuration and shared read-only between the publisher (which walks
//! it) and the rendering layer (which draws it and frames the camera on it).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A geographic point in decimal degrees.
///
/// Serializes as `{ "lat": .., "lng": .. }`, the shape used both by the
/// position document and by route configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Latitude in degrees.
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Longitude in degrees.
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl Waypoint {
    /// Create a waypoint from latitude and longitude.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both coordinates are finite and inside the valid degree ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Waypoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

impl From<(f64, f64)> for Waypoint {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

/// Axis-aligned box enclosing every waypoint of a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteBounds {
    /// Minimum latitude and longitude.
    pub south_west: Waypoint,
    /// Maximum latitude and longitude.
    pub north_east: Waypoint,
}

impl RouteBounds {
    /// The midpoint of the box.
    #[must_use]
    pub fn center(&self) -> Waypoint {
        Waypoint::new(
            (self.south_west.latitude + self.north_east.latitude) / 2.0,
            (self.south_west.longitude + self.north_east.longitude) / 2.0,
        )
    }

    /// Whether the point lies inside the box (edges inclusive).
    #[must_use]
    pub fn contains(&self, point: Waypoint) -> bool {
        (self.south_west.latitude..=self.north_east.latitude).contains(&point.latitude)
            && (self.south_west.longitude..=self.north_east.longitude).contains(&point.longitude)
    }
}

/// An immutable, ordered sequence of waypoints.
///
/// Cloning is cheap; the waypoints are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    waypoints: Arc<[Waypoint]>,
}

impl Route {
    /// Build a route from waypoints in travel order.
    #[must_use]
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self {
            waypoints: waypoints.into(),
        }
    }

    /// Number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Whether the route has no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Waypoint at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Waypoint> {
        self.waypoints.get(index).copied()
    }

    /// Starting waypoint.
    #[must_use]
    pub fn first(&self) -> Option<Waypoint> {
        self.waypoints.first().copied()
    }

    /// Final waypoint.
    #[must_use]
    pub fn last(&self) -> Option<Waypoint> {
        self.waypoints.last().copied()
    }

    /// All waypoints in order.
    #[must_use]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Bounding box of the route, or `None` for an empty route.
    #[must_use]
    pub fn bounds(&self) -> Option<RouteBounds> {
        let first = self.first()?;
        let init = RouteBounds {
            south_west: first,
            north_east: first,
        };
        Some(self.waypoints.iter().fold(init, |b, w| RouteBounds {
            south_west: Waypoint::new(
                b.south_west.latitude.min(w.latitude),
                b.south_west.longitude.min(w.longitude),
            ),
            north_east: Waypoint::new(
                b.north_east.latitude.max(w.latitude),
                b.north_east.longitude.max(w.longitude),
            ),
        }))
    }
}

impl FromIterator<Waypoint> for Route {
    fn from_iter<I: IntoIterator<Item = Waypoint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal() -> Route {
        Route::new(vec![
            Waypoint::new(0.0, 0.0),
            Waypoint::new(1.0, 1.0),
            Waypoint::new(2.0, 2.0),
        ])
    }

    #[test]
    fn test_route_accessors() {
        let route = diagonal();
        assert_eq!(route.len(), 3);
        assert!(!route.is_empty());
        assert_eq!(route.first(), Some(Waypoint::new(0.0, 0.0)));
        assert_eq!(route.last(), Some(Waypoint::new(2.0, 2.0)));
        assert_eq!(route.get(1), Some(Waypoint::new(1.0, 1.0)));
        assert_eq!(route.get(3), None);
    }

    #[test]
    fn test_empty_route() {
        let route = Route::new(Vec::new());
        assert!(route.is_empty());
        assert!(route.first().is_none());
        assert!(route.last().is_none());
        assert!(route.bounds().is_none());
    }

    #[test]
    fn test_route_bounds() {
        let route = Route::new(vec![
            Waypoint::new(10.0, -5.0),
            Waypoint::new(12.0, -7.0),
            Waypoint::new(11.0, -3.0),
        ]);
        let bounds = route.bounds().unwrap();
        assert_eq!(bounds.south_west, Waypoint::new(10.0, -7.0));
        assert_eq!(bounds.north_east, Waypoint::new(12.0, -3.0));
        assert_eq!(bounds.center(), Waypoint::new(11.0, -5.0));
        assert!(route.waypoints().iter().all(|w| bounds.contains(*w)));
        assert!(!bounds.contains(Waypoint::new(13.0, -5.0)));
    }

    #[test]
    fn test_waypoint_validity() {
        assert!(Waypoint::new(45.0, 120.0).is_valid());
        assert!(!Waypoint::new(91.0, 0.0).is_valid());
        assert!(!Waypoint::new(0.0, -180.5).is_valid());
        assert!(!Waypoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_waypoint_wire_shape() {
        let json = serde_json::to_string(&Waypoint::new(1.5, 2.5)).unwrap();
        assert_eq!(json, r#"{"lat":1.5,"lng":2.5}"#);
    }

    #[test]
    fn test_route_clone_shares_waypoints() {
        let route = diagonal();
        let cloned = route.clone();
        assert_eq!(route, cloned);
        assert!(std::ptr::eq(route.waypoints(), cloned.waypoints()));
    }
}
