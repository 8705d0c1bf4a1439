//! Main Relay struct tying all components together.

use crate::dispatch::{Dispatcher, DrainPolicy, PushFailurePolicy};
use crate::queue::PendingQueueStore;
use crate::registry::{ChannelInfo, LiveChannel, RecipientRegistry};
use crate::session::Session;
use crate::types::{
    CloseReason, ConnectionsReport, Decision, DeliveryStatus, DrainReport, OfferEvent, RecipientId,
    RelayStats, RelaySummary, ResponseAck, ResponseRecord, SessionId, SubmitReceipt, Timestamp,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Name reported by `Relay::summary`. This is the relay core, not a test
/// server, so it does not reuse the test harness name.
const SERVICE_NAME: &str = "Shift Offer Relay";

/// Relay configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Events buffered per live channel before pushes start failing.
    pub channel_capacity: usize,

    /// How long a push may wait on a full channel (None = fail immediately).
    pub push_timeout: Option<Duration>,

    /// Max queued offers per recipient; the oldest is dropped beyond it.
    /// None = unbounded.
    pub max_pending_per_recipient: Option<usize>,

    /// What to do with an offer whose push failed.
    pub push_failure: PushFailurePolicy,

    /// How the queue is cleared when draining on connect.
    pub drain_policy: DrainPolicy,

    /// Redeliver offers a session never read when it disconnects.
    pub redeliver_unread: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            push_timeout: None,
            max_pending_per_recipient: None,
            push_failure: PushFailurePolicy::Drop,
            drain_policy: DrainPolicy::Confirmed,
            redeliver_unread: true,
        }
    }
}

/// The shift offer relay.
///
/// Provides a unified interface for:
/// - Opening recipient sessions (register + drain)
/// - Submitting offers (push now or queue)
/// - Recording recipient responses
/// - Diagnostics over live connections and queue depths
///
/// `Relay` is `Send + Sync`; share it behind an `Arc` between transport tasks.
pub struct Relay {
    config: RelayConfig,
    registry: Arc<RecipientRegistry>,
    queue: Arc<PendingQueueStore>,
    dispatcher: Arc<Dispatcher>,
    next_session: AtomicU64,
}

impl Relay {
    /// Create an empty relay.
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(RecipientRegistry::new());
        let queue = Arc::new(PendingQueueStore::with_max_depth(
            config.max_pending_per_recipient,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&queue),
            config.push_failure,
            config.drain_policy,
        ));

        Self {
            config,
            registry,
            queue,
            dispatcher,
            next_session: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    // --- Connection Lifecycle ---

    /// Open a session for `recipient`.
    ///
    /// Supersedes any existing session for the same recipient, then pushes
    /// every queued offer over the new channel in FIFO order before returning.
    pub fn connect(&self, recipient: RecipientId) -> Session {
        let session = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        let (channel, receiver) = LiveChannel::pair(
            recipient,
            session,
            self.config.channel_capacity,
            self.config.push_timeout,
        );

        let drained = self.dispatcher.attach(channel);
        info!(
            %recipient,
            session = session.0,
            drained = drained.delivered,
            total_connections = self.registry.len(),
            "recipient connected"
        );

        Session::new(
            session,
            recipient,
            receiver,
            Arc::clone(&self.dispatcher),
            self.config.redeliver_unread,
            drained,
        )
    }

    /// Push the recipient's queued offers over its live channel.
    ///
    /// Connect already does this; call it again after a partial drain once
    /// the transport has caught up.
    pub fn drain_pending(&self, recipient: RecipientId) -> DrainReport {
        self.dispatcher.drain_pending(recipient)
    }

    /// Force-close the recipient's live channel. Idempotent.
    ///
    /// The session itself stays open until its transport task drops it; it
    /// reads `SessionEvent::Closed(CloseReason::Shutdown)` last.
    pub fn disconnect(&self, recipient: RecipientId) -> bool {
        self.dispatcher.close(recipient, CloseReason::Shutdown)
    }

    /// Ping every live channel. Returns how many accepted the ping.
    pub fn send_keepalive(&self) -> usize {
        self.registry.ping_all()
    }

    // --- Event Submission ---

    /// Submit an offer for `recipient`: pushed if live, queued otherwise.
    pub fn submit_offer(&self, recipient: RecipientId, offer: OfferEvent) -> SubmitReceipt {
        let shift_id = offer.shift_id;
        match self.dispatcher.submit(recipient, offer) {
            Ok(status) => SubmitReceipt {
                status,
                emp_id: recipient,
                shift_id,
                message: None,
            },
            Err(e) => SubmitReceipt {
                status: DeliveryStatus::Error,
                emp_id: recipient,
                shift_id,
                message: Some(e.to_string()),
            },
        }
    }

    /// Record a recipient's decision about an offer.
    ///
    /// Pass-through: neither the registry nor the queue is consulted.
    pub fn record_response(&self, response: &ResponseRecord) -> ResponseAck {
        info!(
            emp_id = %response.emp_id,
            shift_id = response.shift_id,
            decision = %response.response,
            "shift response"
        );

        ResponseAck {
            success: true,
            assigned: response.response == Decision::Accepted,
            message: format!(
                "Shift {} {} by employee {}",
                response.shift_id, response.response, response.emp_id
            ),
            timestamp: Timestamp::now(),
        }
    }

    // --- Pending Offers ---

    /// Queued offers for `recipient`, oldest first. Does not clear them.
    pub fn fetch_pending(&self, recipient: RecipientId) -> Vec<OfferEvent> {
        self.queue.peek_all(recipient)
    }

    /// Remove and return queued offers for `recipient`, oldest first.
    pub fn take_pending(&self, recipient: RecipientId) -> Vec<OfferEvent> {
        self.queue.drain_all(recipient)
    }

    /// Number of offers queued for `recipient`.
    pub fn pending_count(&self, recipient: RecipientId) -> usize {
        self.queue.peek_count(recipient)
    }

    // --- Diagnostics ---

    pub fn is_live(&self, recipient: RecipientId) -> bool {
        self.registry.is_live(recipient)
    }

    /// The recipient's live channel, if any.
    pub fn channel(&self, recipient: RecipientId) -> Option<ChannelInfo> {
        self.registry.get(recipient)
    }

    pub fn live_recipients(&self) -> Vec<RecipientId> {
        self.registry.live_recipients()
    }

    /// Live recipients and per-recipient queue depth.
    pub fn connections(&self) -> ConnectionsReport {
        let active_connections = self.registry.live_recipients();
        ConnectionsReport {
            total: active_connections.len(),
            active_connections,
            pending_offers: self.queue.depths(),
        }
    }

    pub fn stats(&self) -> RelayStats {
        let counters = &self.dispatcher.counters;
        RelayStats {
            active_connections: self.registry.len(),
            pending_recipients: self.queue.depths().len(),
            pending_offers: self.queue.total(),
            offers_sent: counters.sent.load(Ordering::Relaxed),
            offers_queued: counters.queued.load(Ordering::Relaxed),
            offers_failed: counters.failed.load(Ordering::Relaxed),
            offers_evicted: counters.evicted.load(Ordering::Relaxed),
        }
    }

    pub fn summary(&self) -> RelaySummary {
        RelaySummary {
            service: SERVICE_NAME.to_string(),
            status: "running".to_string(),
            active_connections: self.registry.len(),
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionEvent;

    #[test]
    fn test_submit_receipts() {
        let relay = Relay::default();

        let receipt = relay.submit_offer(RecipientId(42), OfferEvent::sample(7));
        assert_eq!(receipt.status, DeliveryStatus::Pending);
        assert_eq!(receipt.emp_id, RecipientId(42));
        assert_eq!(receipt.shift_id, 7);
        assert!(receipt.message.is_none());

        let _session = relay.connect(RecipientId(43));
        let receipt = relay.submit_offer(RecipientId(43), OfferEvent::sample(8));
        assert_eq!(receipt.status, DeliveryStatus::Sent);
    }

    #[test]
    fn test_error_receipt_carries_message() {
        let relay = Relay::new(RelayConfig {
            channel_capacity: 1,
            ..Default::default()
        });
        let _session = relay.connect(RecipientId(1));

        relay.submit_offer(RecipientId(1), OfferEvent::sample(1));
        let receipt = relay.submit_offer(RecipientId(1), OfferEvent::sample(2));

        assert_eq!(receipt.status, DeliveryStatus::Error);
        assert!(receipt.message.unwrap().contains("full"));
    }

    #[test]
    fn test_record_response() {
        let relay = Relay::default();
        let ack = relay.record_response(&ResponseRecord {
            emp_id: RecipientId(123),
            shift_id: 456,
            response: Decision::Accepted,
            timestamp: None,
        });
        assert!(ack.success);
        assert!(ack.assigned);
        assert_eq!(ack.message, "Shift 456 accepted by employee 123");

        let ack = relay.record_response(&ResponseRecord {
            emp_id: RecipientId(123),
            shift_id: 456,
            response: Decision::Rejected,
            timestamp: Some("2026-01-20T09:00:00".to_string()),
        });
        assert!(!ack.assigned);
        // Responses do not touch relay state
        assert_eq!(relay.stats(), RelayStats::default());
    }

    #[test]
    fn test_disconnect_closes_channel() {
        let relay = Relay::default();
        let session = relay.connect(RecipientId(3));

        assert!(relay.disconnect(RecipientId(3)));
        assert!(!relay.disconnect(RecipientId(3)));
        assert!(!relay.is_live(RecipientId(3)));
        assert_eq!(
            session.recv().unwrap(),
            SessionEvent::Closed(CloseReason::Shutdown)
        );
    }

    #[test]
    fn test_keepalive_and_summary() {
        let relay = Relay::default();
        let a = relay.connect(RecipientId(1));
        let _b = relay.connect(RecipientId(2));

        assert_eq!(relay.send_keepalive(), 2);
        assert_eq!(a.try_recv().unwrap(), SessionEvent::Ping);

        let summary = relay.summary();
        assert_eq!(summary.status, "running");
        assert_eq!(summary.active_connections, 2);
    }

    #[test]
    fn test_stats_track_delivery() {
        let relay = Relay::default();
        relay.submit_offer(RecipientId(1), OfferEvent::sample(1));
        relay.submit_offer(RecipientId(1), OfferEvent::sample(2));
        let _session = relay.connect(RecipientId(1));
        relay.submit_offer(RecipientId(1), OfferEvent::sample(3));

        let stats = relay.stats();
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.offers_queued, 2);
        assert_eq!(stats.offers_sent, 3);
        assert_eq!(stats.pending_offers, 0);
        assert_eq!(stats.offers_failed, 0);
    }
}
