//! Client-side marker animation.
//!
//! Position updates arrive every few seconds; the marker should glide between
//! them. [`Animator`] interpolates linearly from wherever the marker is drawn
//! to the new target over a fixed duration, emitting one frame per
//! `frame_interval` on a local clock. It never touches the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{trace, warn};

use crate::route::{Route, Waypoint};

/// Default length of one marker animation.
pub const DEFAULT_ANIMATION_DURATION: Duration = Duration::from_secs(3);

/// Default time between animation frames (about 60 Hz).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Shortest frame interval an animator will run with.
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

/// Returned by [`bearing`] when the direction cannot be classified.
pub const NO_BEARING: f64 = -1.0;

/// Heading in degrees from `from` towards `to`.
///
/// This is a planar, quadrant-based approximation rather than a great-circle
/// bearing: the angle comes from `atan(|dlng| / |dlat|)` and is shifted into
/// the quadrant the displacement falls in. Due north yields 360, due east 90,
/// due south 180 and due west 270. Identical points yield [`NO_BEARING`].
#[must_use]
pub fn bearing(from: Waypoint, to: Waypoint) -> f64 {
    let dlat = (from.latitude - to.latitude).abs();
    let dlng = (from.longitude - to.longitude).abs();
    let angle = (dlng / dlat).atan().to_degrees();

    let northward = from.latitude < to.latitude;
    let eastward = from.longitude < to.longitude;

    let heading = if northward && eastward {
        angle
    } else if !northward && eastward {
        (90.0 - angle) + 90.0
    } else if !northward && !eastward {
        angle + 180.0
    } else if northward && !eastward {
        (90.0 - angle) + 270.0
    } else {
        NO_BEARING
    };

    if heading.is_nan() {
        NO_BEARING
    } else {
        heading
    }
}

/// Where the marker is drawn and which way it points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPose {
    /// Drawn position.
    pub position: Waypoint,
    /// Rotation in degrees, as produced by [`bearing`].
    pub heading: f64,
}

impl MarkerPose {
    /// A pose at `position` with the given heading.
    #[must_use]
    pub const fn new(position: Waypoint, heading: f64) -> Self {
        Self { position, heading }
    }
}

/// The rendering surface the vehicle marker lives on.
///
/// Implementations are called from tokio tasks and must not call back into
/// the [`Animator`] driving them.
pub trait MapSurface: Send + Sync {
    /// Draw the route polyline and fit the camera to it.
    fn draw_route(&self, route: &Route);

    /// Create the marker, or make a hidden one visible, at `pose`.
    fn show_marker(&self, pose: MarkerPose);

    /// Move the visible marker to `pose`.
    fn move_marker(&self, pose: MarkerPose);

    /// Hide the marker.
    fn hide_marker(&self);
}

/// Animation timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationConfig {
    /// Time taken to travel from start to target.
    pub duration: Duration,
    /// Time between frames.
    pub frame_interval: Duration,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_ANIMATION_DURATION,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

/// A straight-line, fixed-duration path between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolation {
    /// Where the path begins.
    pub start: Waypoint,
    /// Where the path ends.
    pub end: Waypoint,
    /// Time taken to reach `end`.
    pub duration: Duration,
}

impl Interpolation {
    /// Create a path from `start` to `end`.
    #[must_use]
    pub const fn new(start: Waypoint, end: Waypoint, duration: Duration) -> Self {
        Self {
            start,
            end,
            duration,
        }
    }

    /// Progress in `[0, 1]` after `elapsed`.
    #[must_use]
    pub fn fraction(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    /// Heading of the whole path.
    #[must_use]
    pub fn heading(&self) -> f64 {
        bearing(self.start, self.end)
    }

    /// Pose after `elapsed`.
    #[must_use]
    pub fn pose_at(&self, elapsed: Duration) -> MarkerPose {
        let t = self.fraction(elapsed);
        let position = Waypoint::new(
            t * self.end.latitude + (1.0 - t) * self.start.latitude,
            t * self.end.longitude + (1.0 - t) * self.start.longitude,
        );
        MarkerPose::new(position, self.heading())
    }

    /// Whether `elapsed` reaches the end of the path.
    #[must_use]
    pub fn is_complete(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }
}

/// Drawn marker state shared with the frame task.
///
/// `generation` increases whenever the running animation is superseded; a
/// frame task only writes while its generation is current.
#[derive(Debug, Default)]
struct MarkerTrack {
    generation: u64,
    pose: Option<MarkerPose>,
}

fn lock(track: &Mutex<MarkerTrack>) -> MutexGuard<'_, MarkerTrack> {
    track.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives the vehicle marker on a [`MapSurface`].
///
/// At most one animation runs at a time; starting another cancels the first
/// and begins from wherever the marker was at that instant.
pub struct Animator {
    surface: Arc<dyn MapSurface>,
    config: AnimationConfig,
    track: Arc<Mutex<MarkerTrack>>,
    task: Option<JoinHandle<()>>,
    path: Option<Interpolation>,
    started: u64,
}

impl std::fmt::Debug for Animator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Animator")
            .field("config", &self.config)
            .field("pose", &self.pose())
            .field("path", &self.path)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl Animator {
    /// Create an animator drawing on `surface`.
    ///
    /// A frame interval shorter than [`MIN_FRAME_INTERVAL`] is raised to it.
    #[must_use]
    pub fn new(surface: Arc<dyn MapSurface>, mut config: AnimationConfig) -> Self {
        if config.frame_interval < MIN_FRAME_INTERVAL {
            warn!(
                requested_ms = config.frame_interval.as_millis(),
                "Frame interval too short, using the minimum"
            );
            config.frame_interval = MIN_FRAME_INTERVAL;
        }
        Self {
            surface,
            config,
            track: Arc::new(Mutex::new(MarkerTrack::default())),
            task: None,
            path: None,
            started: 0,
        }
    }

    /// Animation timing in use.
    #[must_use]
    pub fn config(&self) -> AnimationConfig {
        self.config
    }

    /// The marker's current pose, if it has been drawn.
    #[must_use]
    pub fn pose(&self) -> Option<MarkerPose> {
        lock(&self.track).pose
    }

    /// The marker's current position, if it has been drawn.
    #[must_use]
    pub fn position(&self) -> Option<Waypoint> {
        self.pose().map(|p| p.position)
    }

    /// Path of the most recently started animation, while it runs.
    #[must_use]
    pub fn current_path(&self) -> Option<Interpolation> {
        if self.is_animating() {
            self.path
        } else {
            None
        }
    }

    /// Whether an animation is in flight.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Number of animations started so far.
    #[must_use]
    pub fn animations_started(&self) -> u64 {
        self.started
    }

    /// Stop any running animation, leaving the marker where it is.
    pub fn cancel(&mut self) {
        lock(&self.track).generation += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.path = None;
    }

    /// Cancel any animation and make the marker visible at `position`.
    pub fn show_at(&mut self, position: Waypoint) {
        self.cancel();
        let pose = self.set_pose(position);
        self.surface.show_marker(pose);
    }

    /// Cancel any animation and move the visible marker to `position`.
    pub fn snap_to(&mut self, position: Waypoint) {
        self.cancel();
        let pose = self.set_pose(position);
        self.surface.move_marker(pose);
    }

    /// Cancel any animation and hide the marker.
    pub fn hide(&mut self) {
        self.cancel();
        self.surface.hide_marker();
    }

    fn set_pose(&self, position: Waypoint) -> MarkerPose {
        let mut track = lock(&self.track);
        let heading = track.pose.map_or(0.0, |p| p.heading);
        let pose = MarkerPose::new(position, heading);
        track.pose = Some(pose);
        pose
    }

    /// Glide the marker to `target`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn animate_to(&mut self, target: Waypoint) {
        let (generation, start) = {
            let mut track = lock(&self.track);
            track.generation += 1;
            (track.generation, track.pose.map_or(target, |p| p.position))
        };
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let path = Interpolation::new(start, target, self.config.duration);
        trace!(%start, %target, "Starting marker animation");
        self.path = Some(path);
        self.started += 1;
        self.task = Some(tokio::spawn(run_frames(
            path,
            self.config.frame_interval,
            Arc::clone(&self.track),
            Arc::clone(&self.surface),
            generation,
        )));
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_frames(
    path: Interpolation,
    frame_interval: Duration,
    track: Arc<Mutex<MarkerTrack>>,
    surface: Arc<dyn MapSurface>,
    generation: u64,
) {
    let started = Instant::now();
    let mut frames = interval(frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        frames.tick().await;
        let elapsed = started.elapsed();
        let pose = path.pose_at(elapsed);
        {
            let mut track = lock(&track);
            if track.generation != generation {
                return;
            }
            track.pose = Some(pose);
            surface.move_marker(pose);
        }
        if path.is_complete(elapsed) {
            trace!(position = %pose.position, "Marker animation complete");
            return;
        }
    }
}
