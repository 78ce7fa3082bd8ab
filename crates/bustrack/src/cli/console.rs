//! Terminal sinks for the tracker.
//!
//! [`ConsoleStatus`] prints status changes and errors. [`ConsoleMap`] stands in
//! for a map widget: it logs marker activity and counts animation frames.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, trace};

use crate::animation::{MapSurface, MarkerPose};
use crate::route::Route;
use crate::tracker::{ClientState, StatusView};

/// Prints status lines to stdout and errors to stderr.
#[derive(Debug, Default)]
pub struct ConsoleStatus;

impl StatusView for ConsoleStatus {
    fn show_status(&self, state: ClientState) {
        println!("[{state}] {}", state.description());
    }

    fn show_error(&self, message: &str) {
        eprintln!("[error] {message}");
    }
}

/// Logs marker activity in place of a rendered map.
#[derive(Debug, Default)]
pub struct ConsoleMap {
    frames: AtomicU64,
}

impl ConsoleMap {
    /// Create a map with no frames drawn.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of animation frames received.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl MapSurface for ConsoleMap {
    fn draw_route(&self, route: &Route) {
        match route.bounds() {
            Some(bounds) => info!(
                waypoints = route.len(),
                south_west = %bounds.south_west,
                north_east = %bounds.north_east,
                center = %bounds.center(),
                "Drawing route"
            ),
            None => info!("Drawing empty route"),
        }
    }

    fn show_marker(&self, pose: MarkerPose) {
        info!(position = %pose.position, heading = pose.heading, "Marker shown");
    }

    fn move_marker(&self, pose: MarkerPose) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        trace!(position = %pose.position, heading = pose.heading, "Marker moved");
    }

    fn hide_marker(&self) {
        info!("Marker hidden");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Waypoint;

    #[test]
    fn test_console_map_counts_frames() {
        let map = ConsoleMap::new();
        let pose = MarkerPose::new(Waypoint::new(1.0, 2.0), 45.0);

        map.show_marker(pose);
        map.move_marker(pose);
        map.move_marker(pose);
        map.hide_marker();

        assert_eq!(map.frames(), 2);
    }

    #[test]
    fn test_console_map_draws_empty_route() {
        let map = ConsoleMap::new();
        map.draw_route(&Route::new(Vec::new()));
        assert_eq!(map.frames(), 0);
    }
}
