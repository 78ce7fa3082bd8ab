//! Simulated vehicle that walks a route and publishes its position.
//!
//! The [`Publisher`] runs a tick loop on the tokio runtime. Each tick writes
//! the next waypoint as an `ACTIVE` update; once the route is exhausted one
//! final `FINISHED` write is made and the loop ends. Writes are queued to a
//! single writer task so a slow or failing store never delays the next tick,
//! and writes still land in tick order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::record::PositionUpdate;
use crate::route::Route;
use crate::store::PositionStore;

/// Default time between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest tick interval a publisher will run with.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for a [`Publisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Time between consecutive ticks.
    pub tick_interval: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Lifecycle of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublisherState {
    /// Not started, stopped, or given an empty route.
    Idle,
    /// Ticking through the route.
    Active,
    /// Reached the end of the route and stopped scheduling ticks.
    Finished,
}

impl std::fmt::Display for PublisherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

#[derive(Debug, Default)]
struct Slots {
    run: Option<JoinHandle<()>>,
    writes: Option<mpsc::UnboundedSender<PositionUpdate>>,
}

/// Periodic position publisher.
///
/// At most one tick is pending at any time: [`start`](Self::start) cancels any
/// previous run before scheduling the first tick of a new one.
pub struct Publisher {
    store: Arc<dyn PositionStore>,
    route: Route,
    config: PublisherConfig,
    slots: Mutex<Slots>,
    state: Arc<watch::Sender<PublisherState>>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("route_len", &self.route.len())
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Publisher {
    /// Create a publisher with the default tick interval.
    #[must_use]
    pub fn new(store: Arc<dyn PositionStore>, route: Route) -> Self {
        Self::with_config(store, route, PublisherConfig::default())
    }

    /// Create a publisher with custom configuration.
    ///
    /// A tick interval shorter than [`MIN_TICK_INTERVAL`] is raised to it.
    #[must_use]
    pub fn with_config(
        store: Arc<dyn PositionStore>,
        route: Route,
        mut config: PublisherConfig,
    ) -> Self {
        if config.tick_interval < MIN_TICK_INTERVAL {
            warn!(
                requested_ms = config.tick_interval.as_millis(),
                "Tick interval too short, using the minimum"
            );
            config.tick_interval = MIN_TICK_INTERVAL;
        }
        let (state, _) = watch::channel(PublisherState::Idle);
        Self {
            store,
            route,
            config,
            slots: Mutex::new(Slots::default()),
            state: Arc::new(state),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The route being simulated.
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PublisherState {
        *self.state.borrow()
    }

    /// Watch lifecycle changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<PublisherState> {
        self.state.subscribe()
    }

    /// Whether a tick loop is currently scheduled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.slots().run.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start (or restart) the simulation from the first waypoint.
    ///
    /// Must be called from within a tokio runtime. An empty route is a no-op.
    pub fn start(&self) {
        let mut slots = self.slots();

        if let Some(previous) = slots.run.take() {
            debug!("Cancelling previous publisher run");
            previous.abort();
        }

        if self.route.is_empty() {
            info!("Route is empty, nothing to publish");
            self.state.send_replace(PublisherState::Idle);
            return;
        }

        let writes = match &slots.writes {
            Some(tx) if !tx.is_closed() => tx.clone(),
            _ => {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(write_loop(Arc::clone(&self.store), rx));
                slots.writes = Some(tx.clone());
                tx
            }
        };

        info!(
            waypoints = self.route.len(),
            interval_ms = self.config.tick_interval.as_millis(),
            "Starting position publisher"
        );
        self.state.send_replace(PublisherState::Active);
        slots.run = Some(tokio::spawn(tick_loop(
            self.route.clone(),
            self.config.tick_interval,
            writes,
            Arc::clone(&self.state),
        )));
    }

    /// Cancel the pending tick.
    ///
    /// Writes already queued still reach the store; no further tick runs.
    pub fn stop(&self) {
        if let Some(run) = self.slots().run.take() {
            run.abort();
            info!("Position publisher stopped");
        }
        self.state.send_if_modified(|state| {
            if *state == PublisherState::Active {
                *state = PublisherState::Idle;
                true
            } else {
                false
            }
        });
    }

    /// Wait until the current run has written `FINISHED` and it has been
    /// queued for the store.
    ///
    /// Returns immediately if the publisher is already finished; returns
    /// `false` if the publisher is dropped first.
    pub async fn finished(&self) -> bool {
        let mut rx = self.state.subscribe();
        let reached = rx.wait_for(|s| *s == PublisherState::Finished).await.is_ok();
        reached
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        if let Some(run) = self.slots().run.take() {
            run.abort();
        }
    }
}

async fn tick_loop(
    route: Route,
    tick_interval: Duration,
    writes: mpsc::UnboundedSender<PositionUpdate>,
    state: Arc<watch::Sender<PublisherState>>,
) {
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cursor = 0;

    loop {
        ticker.tick().await;

        let Some(waypoint) = route.get(cursor) else {
            if writes.send(PositionUpdate::finished()).is_err() {
                warn!("Position writer is gone, run not finished");
                state.send_replace(PublisherState::Idle);
                break;
            }
            info!(ticks = cursor, "Route complete");
            state.send_replace(PublisherState::Finished);
            break;
        };

        let mut update = PositionUpdate::active(waypoint);
        if cursor == 0 {
            update = update.with_start_time(Utc::now());
        }
        debug!(tick = cursor, %waypoint, "Publishing position");

        if writes.send(update).is_err() {
            warn!("Position writer is gone, ending run");
            break;
        }
        cursor += 1;
    }
}

async fn write_loop(
    store: Arc<dyn PositionStore>,
    mut rx: mpsc::UnboundedReceiver<PositionUpdate>,
) {
    while let Some(update) = rx.recv().await {
        if let Err(e) = store.write(update).await {
            warn!(error = %e, "Failed to publish position");
        }
    }
    debug!("Position writer stopped");
}
