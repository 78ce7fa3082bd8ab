//! Live tracking session.
//!
//! A [`TrackingSession`] owns a store subscription and a [`Tracker`] inside a
//! single task. Every record, error and map attachment is handled by that task
//! in order, so the tracker is never touched concurrently. Opening subscribes;
//! [`TrackingSession::close`] unsubscribes and cancels any animation.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::animation::MapSurface;
use crate::error::{Error, Result};
use crate::store::{PositionStore, Subscription};
use crate::tracker::{ClientTrackState, Tracker};

enum Command {
    AttachMap(Arc<dyn MapSurface>),
    DetachMap,
    Close,
}

/// Handle to a running tracking session.
#[derive(Debug)]
pub struct TrackingSession {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ClientTrackState>,
    task: JoinHandle<Tracker>,
}

impl TrackingSession {
    /// Subscribe to `store` and start feeding `tracker`.
    ///
    /// The record current at subscribe time is handled first. Must be called
    /// from within a tokio runtime.
    #[must_use]
    pub fn open(store: &dyn PositionStore, tracker: Tracker) -> Self {
        let subscription = store.subscribe();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(tracker.track_state());

        info!("Opening live tracking session");
        let task = tokio::spawn(run(subscription, tracker, command_rx, state_tx));
        Self {
            commands,
            state,
            task,
        }
    }

    /// Latest derived state.
    #[must_use]
    pub fn state(&self) -> ClientTrackState {
        *self.state.borrow()
    }

    /// Watch derived state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ClientTrackState> {
        self.state.clone()
    }

    /// Attach a rendering surface. Deferred map actions replay on it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session has shut down.
    pub fn attach_map(&self, surface: Arc<dyn MapSurface>) -> Result<()> {
        self.send(Command::AttachMap(surface))
    }

    /// Detach the rendering surface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session has shut down.
    pub fn detach_map(&self) -> Result<()> {
        self.send(Command::DetachMap)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::SessionClosed)
    }

    /// Unsubscribe, cancel any animation, and hand back the tracker.
    ///
    /// # Errors
    ///
    /// Returns an error if the session task panicked.
    pub async fn close(self) -> Result<Tracker> {
        // The task may already be winding down; it still returns the tracker.
        let _ = self.commands.send(Command::Close);
        self.task
            .await
            .map_err(|e| Error::internal(format!("tracking session task failed: {e}")))
    }
}

async fn run(
    mut subscription: Subscription,
    mut tracker: Tracker,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ClientTrackState>,
) -> Tracker {
    tracker.handle_record(subscription.current());
    state.send_replace(tracker.track_state());

    let mut subscribed = true;
    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::AttachMap(surface)) => tracker.attach_map(surface),
                Some(Command::DetachMap) => tracker.detach_map(),
                Some(Command::Close) | None => break,
            },

            received = subscription.recv(), if subscribed => match received {
                Ok(record) => tracker.handle_record(Some(&record)),
                Err(e) => {
                    tracker.handle_error(&e);
                    if !e.is_recoverable() {
                        debug!("Subscription ended, waiting for close");
                        subscribed = false;
                    }
                }
            },
        }
        state.send_replace(tracker.track_state());
    }

    tracker.shutdown();
    subscription.unsubscribe();
    info!("Live tracking session closed");
    tracker
}
