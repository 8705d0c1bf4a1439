//! Connection lifecycle: one `Session` per open recipient connection.
//!
//! A session is created by `Relay::connect`, which registers its channel and
//! drains the recipient's queue over it before returning. The transport task
//! that owns the connection reads `SessionEvent`s from the session and feeds
//! inbound frames to `handle_inbound`. Dropping the session is the disconnect:
//! it unregisters the session's own channel on every exit path, and offers
//! still buffered in the channel are redelivered.

use crate::dispatch::Dispatcher;
use crate::types::{DrainReport, InboundMessage, RecipientId, SessionEvent, SessionId, Timestamp};
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// An open delivery session for one recipient.
pub struct Session {
    id: SessionId,
    recipient: RecipientId,
    receiver: Receiver<SessionEvent>,
    dispatcher: Arc<Dispatcher>,
    redeliver_unread: bool,
    drained: DrainReport,
    /// Microseconds of the last pong, 0 if none yet.
    last_pong: AtomicI64,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        recipient: RecipientId,
        receiver: Receiver<SessionEvent>,
        dispatcher: Arc<Dispatcher>,
        redeliver_unread: bool,
        drained: DrainReport,
    ) -> Self {
        Self {
            id,
            recipient,
            receiver,
            dispatcher,
            redeliver_unread,
            drained,
            last_pong: AtomicI64::new(0),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn recipient(&self) -> RecipientId {
        self.recipient
    }

    /// What the connect-time drain pushed into this session.
    pub fn drained(&self) -> &DrainReport {
        &self.drained
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SessionEvent, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SessionEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Classify an inbound frame from the recipient.
    ///
    /// Never fails and never touches the registry or the queue: pongs only
    /// refresh `last_pong`, anything else is handed back for the caller to
    /// route, malformed frames are logged.
    pub fn handle_inbound(&self, frame: &str) -> InboundMessage {
        let value: serde_json::Value = match serde_json::from_str(frame) {
            Ok(value) => value,
            Err(e) => {
                warn!(recipient = %self.recipient, error = %e, "malformed inbound frame");
                return InboundMessage::Malformed(e.to_string());
            }
        };

        if value.get("type").and_then(|t| t.as_str()) == Some("pong") {
            self.last_pong.store(Timestamp::now().0, Ordering::Relaxed);
            trace!(recipient = %self.recipient, "pong");
            return InboundMessage::Pong;
        }

        debug!(recipient = %self.recipient, message = %value, "inbound message");
        InboundMessage::Application(value)
    }

    /// When the recipient last answered a keep-alive.
    pub fn last_pong(&self) -> Option<Timestamp> {
        match self.last_pong.load(Ordering::Relaxed) {
            0 => None,
            micros => Some(Timestamp(micros)),
        }
    }

    /// Disconnect. Same as dropping the session.
    pub fn close(self) {}
}

impl Drop for Session {
    fn drop(&mut self) {
        let unread = self.redeliver_unread.then_some(&self.receiver);
        self.dispatcher.detach(self.recipient, self.id, unread);
        debug!(recipient = %self.recipient, session = self.id.0, "disconnected");
    }
}
