//! The shared position record and its wire representation.
//!
//! The store keeps a single [`PositionDocument`] whose `status` field is free
//! text for compatibility with external writers. Everything past the store
//! boundary sees the typed [`PositionRecord`] instead; [`PositionRecord::decode`]
//! is the only place raw status text is interpreted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::route::Waypoint;

/// Lifecycle status of a tracked run.
///
/// A single run moves `Stopped -> Active -> Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackStatus {
    /// The vehicle is not running.
    Stopped,
    /// The vehicle is moving along the route.
    Active,
    /// The vehicle reached the end of the route.
    Finished,
}

impl TrackStatus {
    /// The text stored in the document's `status` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Active => "ACTIVE",
            Self::Finished => "FINISHED",
        }
    }

    /// Parse wire text, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        [Self::Stopped, Self::Active, Self::Finished]
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(text))
    }

    /// Whether a write may move the record from `self` to `next`.
    ///
    /// Only a reset can take a finished run back to stopped.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        !(self == Self::Finished && next == Self::Stopped)
    }
}

impl std::fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stored document, exactly as it appears on the wire.
///
/// ```json
/// { "status": "ACTIVE", "location": { "lat": 1.0, "lng": 2.0 },
///   "lastUpdateTime": "...", "startTime": "..." }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDocument {
    /// Status text. Expected to be one of `STOPPED`, `ACTIVE`, `FINISHED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Latest reported position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Waypoint>,

    /// Time of the most recent write, set by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,

    /// Time the current run became active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

/// A decoded, point-in-time snapshot of the shared record.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    /// Current run status.
    pub status: TrackStatus,
    /// Latest reported position, if any.
    pub location: Option<Waypoint>,
    /// Time of the most recent write.
    pub last_update_time: Option<DateTime<Utc>>,
    /// Time the current run became active.
    pub start_time: Option<DateTime<Utc>>,
}

impl Default for PositionRecord {
    /// The record observed before anything has been written.
    fn default() -> Self {
        Self {
            status: TrackStatus::Stopped,
            location: None,
            last_update_time: None,
            start_time: None,
        }
    }
}

impl PositionRecord {
    /// Decode a wire document.
    ///
    /// Missing or unrecognised status text decodes as [`TrackStatus::Stopped`];
    /// an out-of-range location is dropped. Both cases are logged.
    #[must_use]
    pub fn decode(doc: &PositionDocument) -> Self {
        let status = match doc.status.as_deref() {
            Some(text) => TrackStatus::parse(text).unwrap_or_else(|| {
                warn!(status = text, "Unrecognised status text, treating as STOPPED");
                TrackStatus::Stopped
            }),
            None => {
                warn!("Position record has no status, treating as STOPPED");
                TrackStatus::Stopped
            }
        };

        let location = doc.location.filter(|loc| {
            let valid = loc.is_valid();
            if !valid {
                warn!(
                    latitude = loc.latitude,
                    longitude = loc.longitude,
                    "Discarding out-of-range location"
                );
            }
            valid
        });

        Self {
            status,
            location,
            last_update_time: doc.last_update_time,
            start_time: doc.start_time,
        }
    }

    /// Encode back into the wire shape.
    #[must_use]
    pub fn to_document(&self) -> PositionDocument {
        PositionDocument {
            status: Some(self.status.as_str().to_string()),
            location: self.location,
            last_update_time: self.last_update_time,
            start_time: self.start_time,
        }
    }
}

/// A partial write: only the fields that are `Some` are merged.
///
/// `lastUpdateTime` is not part of the update; the store stamps it on every
/// write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionUpdate {
    /// New status, if changing.
    pub status: Option<TrackStatus>,
    /// New location, if reporting one.
    pub location: Option<Waypoint>,
    /// Start of the run, set only when the run begins.
    pub start_time: Option<DateTime<Utc>>,
}

impl PositionUpdate {
    /// An `ACTIVE` write at `location`.
    #[must_use]
    pub fn active(location: Waypoint) -> Self {
        Self {
            status: Some(TrackStatus::Active),
            location: Some(location),
            start_time: None,
        }
    }

    /// A `FINISHED` write. The last location is kept.
    #[must_use]
    pub fn finished() -> Self {
        Self {
            status: Some(TrackStatus::Finished),
            ..Self::default()
        }
    }

    /// Also set the run's start time.
    #[must_use]
    pub fn with_start_time(mut self, at: DateTime<Utc>) -> Self {
        self.start_time = Some(at);
        self
    }

    /// Merge into `doc`, stamping `lastUpdateTime` with `now`.
    pub fn apply_to(&self, doc: &mut PositionDocument, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            doc.status = Some(status.as_str().to_string());
        }
        if let Some(location) = self.location {
            doc.location = Some(location);
        }
        if let Some(start_time) = self.start_time {
            doc.start_time = Some(start_time);
        }
        doc.last_update_time = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_status(status: Option<&str>) -> PositionDocument {
        PositionDocument {
            status: status.map(str::to_string),
            location: Some(Waypoint::new(1.0, 2.0)),
            ..PositionDocument::default()
        }
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TrackStatus::Stopped.to_string(), "STOPPED");
        assert_eq!(TrackStatus::Active.to_string(), "ACTIVE");
        assert_eq!(TrackStatus::Finished.to_string(), "FINISHED");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(TrackStatus::parse("ACTIVE"), Some(TrackStatus::Active));
        assert_eq!(TrackStatus::parse(" finished "), Some(TrackStatus::Finished));
        assert_eq!(TrackStatus::parse("Stopped"), Some(TrackStatus::Stopped));
        assert_eq!(TrackStatus::parse("PAUSED"), None);
        assert_eq!(TrackStatus::parse(""), None);
    }

    #[test]
    fn test_status_transitions() {
        assert!(TrackStatus::Stopped.can_transition_to(TrackStatus::Active));
        assert!(TrackStatus::Active.can_transition_to(TrackStatus::Finished));
        assert!(TrackStatus::Finished.can_transition_to(TrackStatus::Active));
        assert!(!TrackStatus::Finished.can_transition_to(TrackStatus::Stopped));
    }

    #[test]
    fn test_default_record() {
        let record = PositionRecord::default();
        assert_eq!(record.status, TrackStatus::Stopped);
        assert!(record.location.is_none());
        assert!(record.start_time.is_none());
    }

    #[test]
    fn test_decode_valid_status() {
        let record = PositionRecord::decode(&doc_with_status(Some("ACTIVE")));
        assert_eq!(record.status, TrackStatus::Active);
        assert_eq!(record.location, Some(Waypoint::new(1.0, 2.0)));
    }

    #[test]
    fn test_decode_malformed_status_falls_back_to_stopped() {
        let record = PositionRecord::decode(&doc_with_status(Some("ON_ITS_WAY")));
        assert_eq!(record.status, TrackStatus::Stopped);
        assert_eq!(record.location, Some(Waypoint::new(1.0, 2.0)));
    }

    #[test]
    fn test_decode_missing_status_falls_back_to_stopped() {
        let record = PositionRecord::decode(&doc_with_status(None));
        assert_eq!(record.status, TrackStatus::Stopped);
    }

    #[test]
    fn test_decode_drops_out_of_range_location() {
        let doc = PositionDocument {
            status: Some("ACTIVE".to_string()),
            location: Some(Waypoint::new(123.0, 0.0)),
            ..PositionDocument::default()
        };
        let record = PositionRecord::decode(&doc);
        assert_eq!(record.status, TrackStatus::Active);
        assert!(record.location.is_none());
    }

    #[test]
    fn test_update_merges_only_set_fields() {
        let now = Utc::now();
        let started = now - chrono::Duration::seconds(30);
        let mut doc = PositionDocument::default();

        PositionUpdate::active(Waypoint::new(1.0, 1.0))
            .with_start_time(started)
            .apply_to(&mut doc, started);
        PositionUpdate::finished().apply_to(&mut doc, now);

        assert_eq!(doc.status.as_deref(), Some("FINISHED"));
        assert_eq!(doc.location, Some(Waypoint::new(1.0, 1.0)));
        assert_eq!(doc.start_time, Some(started));
        assert_eq!(doc.last_update_time, Some(now));
    }

    #[test]
    fn test_document_wire_shape() {
        let doc = PositionDocument {
            status: Some("ACTIVE".to_string()),
            location: Some(Waypoint::new(1.0, 2.0)),
            ..PositionDocument::default()
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["location"]["lat"], 1.0);
        assert_eq!(json["location"]["lng"], 2.0);
        assert!(json.get("startTime").is_none());

        let parsed: PositionDocument = serde_json::from_str(
            r#"{"status":"FINISHED","lastUpdateTime":"2024-05-01T08:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(parsed.status.as_deref(), Some("FINISHED"));
        assert!(parsed.location.is_none());
        assert!(parsed.last_update_time.is_some());
    }

    #[test]
    fn test_record_to_document() {
        let record = PositionRecord {
            status: TrackStatus::Active,
            location: Some(Waypoint::new(3.0, 4.0)),
            last_update_time: None,
            start_time: None,
        };
        let doc = record.to_document();
        assert_eq!(PositionRecord::decode(&doc), record);
    }
}
