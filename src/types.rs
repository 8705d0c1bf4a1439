//! Core types for the relay.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a worker that offers are delivered to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub u64);

impl fmt::Debug for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecipientId({})", self.0)
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecipientId {
    fn from(id: u64) -> Self {
        RecipientId(id)
    }
}

/// Identifies one connection attempt. Never reused within a process.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

// --- Offers ---

/// Kind of event pushed to a recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    #[default]
    ShiftOffer,
}

/// When the offered shift happens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

/// Human-readable description of the offered shift.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OfferDetails {
    pub location_name: String,
    pub client_name: String,
    pub service_type: String,
    pub description: String,
}

/// An immutable shift offer. Identity is `shift_id`; the relay does not
/// deduplicate, so submitting the same offer twice queues it twice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEvent {
    #[serde(rename = "type", default)]
    pub kind: OfferKind,
    pub shift_id: u64,
    #[serde(flatten)]
    pub schedule: Schedule,
    #[serde(flatten)]
    pub details: OfferDetails,
}

impl OfferEvent {
    pub fn new(shift_id: u64, schedule: Schedule, details: OfferDetails) -> Self {
        Self {
            kind: OfferKind::ShiftOffer,
            shift_id,
            schedule,
            details,
        }
    }

    /// The canned offer used to exercise a relay end to end.
    pub fn sample(shift_id: u64) -> Self {
        Self::new(
            shift_id,
            Schedule {
                date: "2026-01-20".to_string(),
                start_time: "09:00".to_string(),
                end_time: "17:00".to_string(),
            },
            OfferDetails {
                location_name: "Outreach Center".to_string(),
                client_name: "Test Client".to_string(),
                service_type: "Home Care".to_string(),
                description: "Test shift offer from backend".to_string(),
            },
        )
    }

    /// Encode as the JSON frame a transport writes to the wire.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON frame.
    pub fn from_frame(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| RelayError::Deserialization(e.to_string()))
    }
}

// --- Responses ---

/// A recipient's decision about an offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Accepted => write!(f, "accepted"),
            Decision::Rejected => write!(f, "rejected"),
        }
    }
}

/// A recipient's response to a previously offered shift.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub emp_id: RecipientId,
    pub shift_id: u64,
    pub response: Decision,
    /// Client-supplied time of the decision, passed through as sent
    /// (usually ISO-8601).
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ResponseRecord {
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| RelayError::Deserialization(e.to_string()))
    }
}

/// Acknowledgement returned for a recorded response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseAck {
    pub success: bool,
    /// Whether the decision counts as an assignment.
    pub assigned: bool,
    pub message: String,
    pub timestamp: Timestamp,
}

// --- Delivery ---

/// Outcome of submitting an offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Pushed over the recipient's live channel.
    Sent,
    /// Queued until the recipient connects.
    Pending,
    /// The push failed.
    Error,
}

/// What a producer gets back from `submit_offer`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub status: DeliveryStatus,
    pub emp_id: RecipientId,
    pub shift_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why a live channel was closed by the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// A newer connection for the same recipient took over.
    Superseded,
    /// The relay removed the channel after a failed push.
    Evicted,
    /// Closed on request.
    Shutdown,
}

/// Items a transport task reads off a live channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Offer(OfferEvent),
    /// Keep-alive probe; the recipient answers with `{"type": "pong"}`.
    Ping,
    Closed(CloseReason),
}

/// Classified inbound message from a connected recipient.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    Pong,
    Application(serde_json::Value),
    Malformed(String),
}

// --- Diagnostics ---

/// Snapshot of live connections and queue depths.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionsReport {
    pub active_connections: Vec<RecipientId>,
    pub total: usize,
    pub pending_offers: BTreeMap<RecipientId, usize>,
}

/// Relay counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    pub active_connections: usize,
    pub pending_recipients: usize,
    pub pending_offers: usize,
    pub offers_sent: u64,
    pub offers_queued: u64,
    pub offers_failed: u64,
    pub offers_evicted: u64,
}

/// Short service status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySummary {
    pub service: String,
    pub status: String,
    pub active_connections: usize,
}

/// Result of draining a recipient's queue over a fresh channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Offers pushed successfully.
    pub delivered: usize,
    /// Offers put back in the queue after a failed push.
    pub requeued: usize,
    /// Offers lost after a failed push.
    pub dropped: usize,
}
