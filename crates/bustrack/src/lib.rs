//! `bustrack` - Live vehicle position tracking
//!
//! This library simulates a vehicle driving a fixed route and publishes its
//! position to a single shared record. Subscribers follow that record through a
//! client state machine and animate a map marker between sparse updates.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod animation;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod publisher;
pub mod record;
pub mod route;
pub mod session;
pub mod store;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use animation::{bearing, AnimationConfig, Animator, Interpolation, MapSurface, MarkerPose};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use publisher::{Publisher, PublisherConfig, PublisherState};
pub use record::{PositionDocument, PositionRecord, PositionUpdate, TrackStatus};
pub use route::{Route, RouteBounds, Waypoint};
pub use session::TrackingSession;
pub use store::{MemoryStore, PositionStore, StoreStats, Subscription};
pub use tracker::{ClientState, ClientTrackState, StatusView, TrackStateMachine, Tracker};
