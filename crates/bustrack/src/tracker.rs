//! Client-side tracking state machine.
//!
//! [`TrackStateMachine`] folds incoming position records into a
//! [`ClientTrackState`] and reports what changed. [`Tracker`] turns those
//! reactions into status and map actions. The map is attached lazily: any map
//! action needed before it is ready is remembered and replayed once, against
//! the state current at attach time.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::animation::{AnimationConfig, Animator, MapSurface};
use crate::error::Error;
use crate::record::{PositionRecord, TrackStatus};
use crate::route::{Route, Waypoint};

/// Text shown while the live feed is failing.
pub const RETRY_LATER_MESSAGE: &str = "Unable to reach live tracking. Please try again later.";

/// Tracking state as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClientState {
    /// No record has been seen yet.
    #[default]
    Unknown,
    /// The vehicle is not running.
    Stopped,
    /// The vehicle is on its way.
    Active,
    /// The vehicle has arrived.
    Finished,
}

impl ClientState {
    /// State for a snapshot of the store. `None` means the record has never
    /// been written.
    #[must_use]
    pub fn from_record(record: Option<&PositionRecord>) -> Self {
        record.map_or(Self::Unknown, |r| r.status.into())
    }

    /// Status line shown to the user.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Unknown => "Waiting for bus status",
            Self::Stopped => "Bus is not running",
            Self::Active => "Bus is on the way",
            Self::Finished => "Bus has reached its destination",
        }
    }
}

impl From<TrackStatus> for ClientState {
    fn from(status: TrackStatus) -> Self {
        match status {
            TrackStatus::Stopped => Self::Stopped,
            TrackStatus::Active => Self::Active,
            TrackStatus::Finished => Self::Finished,
        }
    }
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Stopped => write!(f, "stopped"),
            Self::Active => write!(f, "active"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Derived client state. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClientTrackState {
    /// Current state.
    pub state: ClientState,
    /// Most recent location seen in any record.
    pub last_known_position: Option<Waypoint>,
}

/// What a single record changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reaction {
    /// Nothing to do.
    None,
    /// Still active and a new location arrived.
    Follow(Waypoint),
    /// The state changed.
    Transition {
        /// State before the record.
        from: ClientState,
        /// State after the record.
        to: ClientState,
    },
}

/// Pure state machine over position records.
#[derive(Debug, Clone, Default)]
pub struct TrackStateMachine {
    current: ClientTrackState,
}

impl TrackStateMachine {
    /// Start in [`ClientState::Unknown`] with no known position.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current derived state.
    #[must_use]
    pub fn current(&self) -> &ClientTrackState {
        &self.current
    }

    /// Fold in one snapshot of the store.
    ///
    /// Any location present is remembered regardless of state. A transition is
    /// reported only when the state differs from the current one.
    pub fn apply(&mut self, record: Option<&PositionRecord>) -> Reaction {
        let next = ClientState::from_record(record);
        let location = record.and_then(|r| r.location);
        let moved = location.filter(|loc| self.current.last_known_position != Some(*loc));

        if location.is_some() {
            self.current.last_known_position = location;
        }

        if next == self.current.state {
            return match (next, moved) {
                (ClientState::Active, Some(target)) => Reaction::Follow(target),
                _ => Reaction::None,
            };
        }

        let from = std::mem::replace(&mut self.current.state, next);
        Reaction::Transition { from, to: next }
    }
}

/// Where status text and the error indicator are shown.
pub trait StatusView: Send + Sync {
    /// Show the status for `state`.
    fn show_status(&self, state: ClientState);

    /// Show a transient error indicator.
    fn show_error(&self, message: &str);
}

#[derive(Debug)]
struct MapBinding {
    animator: Animator,
    marker_visible: bool,
}

/// Drives the status view and map from position records.
pub struct Tracker {
    route: Route,
    machine: TrackStateMachine,
    status: Arc<dyn StatusView>,
    animation: AnimationConfig,
    map: Option<MapBinding>,
    deferred: bool,
    error_shown: bool,
    transitions: u64,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("route_len", &self.route.len())
            .field("state", self.machine.current())
            .field("map", &self.map)
            .field("deferred", &self.deferred)
            .field("error_shown", &self.error_shown)
            .field("transitions", &self.transitions)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Create a tracker for `route` with no map attached.
    #[must_use]
    pub fn new(route: Route, status: Arc<dyn StatusView>, animation: AnimationConfig) -> Self {
        Self {
            route,
            machine: TrackStateMachine::new(),
            status,
            animation,
            map: None,
            deferred: false,
            error_shown: false,
            transitions: 0,
        }
    }

    /// Current derived state.
    #[must_use]
    pub fn track_state(&self) -> ClientTrackState {
        *self.machine.current()
    }

    /// Current client state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        self.machine.current().state
    }

    /// Number of state transitions handled.
    #[must_use]
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Whether a map surface is attached.
    #[must_use]
    pub fn has_map(&self) -> bool {
        self.map.is_some()
    }

    /// Whether a map action is waiting for a surface.
    #[must_use]
    pub fn has_deferred_action(&self) -> bool {
        self.deferred
    }

    /// The marker animator, when a map is attached.
    #[must_use]
    pub fn animator(&self) -> Option<&Animator> {
        self.map.as_ref().map(|m| &m.animator)
    }

    /// Whether the error indicator is showing.
    #[must_use]
    pub fn is_showing_error(&self) -> bool {
        self.error_shown
    }

    /// Handle one snapshot of the store.
    ///
    /// The first record after a feed error replaces the error indicator with
    /// the current status.
    pub fn handle_record(&mut self, record: Option<&PositionRecord>) {
        let recovered = record.is_some() && std::mem::take(&mut self.error_shown);
        match self.machine.apply(record) {
            Reaction::None => trace!("Position record changes nothing"),
            Reaction::Follow(target) => self.follow(target),
            Reaction::Transition { from, to } => {
                info!(%from, %to, "Tracking state changed");
                self.transitions += 1;
                self.status.show_status(to);
                self.run_map_action();
                return;
            }
        }
        if recovered {
            info!(state = %self.state(), "Live position feed recovered");
            self.status.show_status(self.state());
        }
    }

    /// Handle a failure of the live feed. The tracked state is kept as is.
    pub fn handle_error(&mut self, error: &Error) {
        warn!(error = %error, state = %self.state(), "Live position feed error");
        self.status.show_error(RETRY_LATER_MESSAGE);
        self.error_shown = true;
    }

    /// Attach a rendering surface, replaying any deferred map action.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach_map(&mut self, surface: Arc<dyn MapSurface>) {
        surface.draw_route(&self.route);
        self.map = Some(MapBinding {
            animator: Animator::new(surface, self.animation),
            marker_visible: false,
        });
        debug!(deferred = self.deferred, "Map attached");

        if std::mem::take(&mut self.deferred) {
            self.apply_state_to_map();
        }
    }

    /// Detach the rendering surface, cancelling any animation on it.
    pub fn detach_map(&mut self) {
        if let Some(mut binding) = self.map.take() {
            binding.animator.cancel();
            debug!("Map detached");
        }
    }

    /// Cancel in-flight animation. The map stays attached.
    pub fn shutdown(&mut self) {
        if let Some(binding) = self.map.as_mut() {
            binding.animator.cancel();
        }
    }

    fn follow(&mut self, target: Waypoint) {
        match self.map.as_mut() {
            Some(binding) if binding.marker_visible => {
                binding.animator.animate_to(target);
                return;
            }
            _ => {}
        }
        self.run_map_action();
    }

    fn run_map_action(&mut self) {
        if self.map.is_none() {
            debug!(state = %self.state(), "Map not ready, deferring map action");
            self.deferred = true;
            return;
        }
        self.apply_state_to_map();
    }

    fn apply_state_to_map(&mut self) {
        let current = *self.machine.current();
        let Some(binding) = self.map.as_mut() else {
            return;
        };

        match current.state {
            ClientState::Active => {
                let Some(target) = current.last_known_position.or_else(|| self.route.first())
                else {
                    warn!("Active with no location and an empty route, no marker to show");
                    return;
                };
                if !binding.marker_visible {
                    binding.animator.show_at(target);
                    binding.marker_visible = true;
                }
                binding.animator.animate_to(target);
            }
            ClientState::Finished => {
                let Some(destination) = self.route.last().or(current.last_known_position) else {
                    return;
                };
                if binding.marker_visible {
                    binding.animator.snap_to(destination);
                } else {
                    binding.animator.show_at(destination);
                    binding.marker_visible = true;
                }
            }
            ClientState::Stopped | ClientState::Unknown => {
                if binding.marker_visible {
                    binding.animator.hide();
                    binding.marker_visible = false;
                }
            }
        }
    }
}
