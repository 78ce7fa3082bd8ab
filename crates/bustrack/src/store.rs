//! The position store: one shared record with push notification.
//!
//! The store holds exactly one [`PositionDocument`], overwritten in place.
//! Every write is merged into it and the resulting full record is broadcast to
//! all live [`Subscription`]s. A subscription starts with the record current at
//! the moment it was taken, so late subscribers are never blind to existing
//! state.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::{PositionDocument, PositionRecord, PositionUpdate, TrackStatus};

/// Default number of writes buffered per subscriber before it lags.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Holder of the single shared position record.
///
/// Implementations must be safe for concurrent writers and apply writes in a
/// single order that all subscribers observe.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Merge `update` into the record, creating it if absent, and notify
    /// subscribers with the resulting record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write could not be applied.
    async fn write(&self, update: PositionUpdate) -> Result<PositionRecord>;

    /// Subscribe to the record.
    ///
    /// The subscription carries the current record (if one exists) and then
    /// yields every later write until it is dropped or unsubscribed.
    fn subscribe(&self) -> Subscription;

    /// Read the current record without subscribing.
    ///
    /// Yields [`PositionRecord::default`] if nothing has been written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn read_once(&self) -> Result<PositionRecord>;
}

/// A live feed of position records.
#[derive(Debug)]
pub struct Subscription {
    current: Option<PositionRecord>,
    rx: broadcast::Receiver<PositionRecord>,
}

impl Subscription {
    /// Create a subscription from the record current at subscribe time and a
    /// receiver for later writes.
    #[must_use]
    pub fn new(current: Option<PositionRecord>, rx: broadcast::Receiver<PositionRecord>) -> Self {
        Self { current, rx }
    }

    /// The record as it stood when the subscription was taken, or `None` if
    /// the record had never been written.
    #[must_use]
    pub fn current(&self) -> Option<&PositionRecord> {
        self.current.as_ref()
    }

    /// Wait for the next write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubscriptionLagged`] if writes were dropped for this
    /// subscriber (later writes still arrive), or [`Error::SubscriptionClosed`]
    /// if the store is gone.
    pub async fn recv(&mut self) -> Result<PositionRecord> {
        match self.rx.recv().await {
            Ok(record) => {
                self.current = Some(record.clone());
                Ok(record)
            }
            Err(RecvError::Lagged(skipped)) => Err(Error::SubscriptionLagged { skipped }),
            Err(RecvError::Closed) => Err(Error::SubscriptionClosed),
        }
    }

    /// Stop receiving writes.
    pub fn unsubscribe(self) {
        debug!("Position subscription closed");
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of writes applied since the store was created.
    pub writes: u64,
    /// Number of live subscriptions.
    pub subscribers: usize,
    /// Whether a record exists.
    pub has_record: bool,
}

#[derive(Debug, Default)]
struct StoreInner {
    document: Option<PositionDocument>,
    writes: u64,
}

/// In-process [`PositionStore`].
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    tx: broadcast::Sender<PositionRecord>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create an empty store buffering up to `capacity` writes per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Mutex::new(StoreInner::default()),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole record with a raw wire document.
    ///
    /// This is the path used by external writers; the status text is not
    /// checked here and is decoded like any other write.
    pub fn put_document(&self, mut document: PositionDocument) -> PositionRecord {
        document.last_update_time = Some(Utc::now());
        let mut inner = self.lock();
        self.commit(&mut inner, document)
    }

    /// Overwrite the record with a stopped, location-less state.
    ///
    /// This is the only way back to `STOPPED` once a run has finished.
    pub fn reset(&self) -> PositionRecord {
        info!("Resetting position record");
        self.put_document(PositionDocument {
            status: Some(TrackStatus::Stopped.as_str().to_string()),
            ..PositionDocument::default()
        })
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let inner = self.lock();
        StoreStats {
            writes: inner.writes,
            subscribers: self.tx.receiver_count(),
            has_record: inner.document.is_some(),
        }
    }

    fn commit(&self, inner: &mut StoreInner, document: PositionDocument) -> PositionRecord {
        let record = PositionRecord::decode(&document);
        inner.document = Some(document);
        inner.writes += 1;

        // No receivers is not an error; the record is still stored.
        let _ = self.tx.send(record.clone());
        record
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn write(&self, update: PositionUpdate) -> Result<PositionRecord> {
        let mut inner = self.lock();
        let mut document = inner.document.clone().unwrap_or_default();

        if let (Some(next), Some(current)) = (
            update.status,
            document.status.as_deref().and_then(TrackStatus::parse),
        ) {
            if !current.can_transition_to(next) {
                return Err(Error::InvalidTransition {
                    from: current,
                    to: next,
                });
            }
        }

        update.apply_to(&mut document, Utc::now());
        let record = self.commit(&mut inner, document);
        debug!(
            status = %record.status,
            location = ?record.location,
            "Position record written"
        );
        Ok(record)
    }

    fn subscribe(&self) -> Subscription {
        // Taking the receiver under the lock means no write can slip between
        // the snapshot and the first delivered update.
        let inner = self.lock();
        let rx = self.tx.subscribe();
        let current = inner.document.as_ref().map(PositionRecord::decode);
        debug!(has_record = current.is_some(), "New position subscription");
        Subscription::new(current, rx)
    }

    async fn read_once(&self) -> Result<PositionRecord> {
        let inner = self.lock();
        Ok(inner
            .document
            .as_ref()
            .map(PositionRecord::decode)
            .unwrap_or_default())
    }
}
