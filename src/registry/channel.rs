//! Live channel handle.

use crate::error::{RelayError, Result};
use crate::types::{CloseReason, RecipientId, SessionEvent, SessionId, Timestamp};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::time::Duration;

/// The sending half of one open delivery session.
///
/// Owned by the registry while the session is live. Dropping it disconnects
/// the receiver once the buffered events have been read.
#[derive(Clone)]
pub struct LiveChannel {
    recipient: RecipientId,
    session: SessionId,
    sender: Sender<SessionEvent>,
    /// None = never block on a full buffer.
    push_timeout: Option<Duration>,
    connected_at: Timestamp,
}

/// Read-only view of a registered channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub recipient: RecipientId,
    pub session: SessionId,
    pub connected_at: Timestamp,
    /// Events pushed but not yet read by the transport.
    pub buffered: usize,
}

impl LiveChannel {
    /// Create a bounded channel and return both halves.
    pub fn pair(
        recipient: RecipientId,
        session: SessionId,
        capacity: usize,
        push_timeout: Option<Duration>,
    ) -> (Self, Receiver<SessionEvent>) {
        let (sender, receiver) = bounded(capacity.max(1));
        let channel = Self {
            recipient,
            session,
            sender,
            push_timeout,
            connected_at: Timestamp::now(),
        };
        (channel, receiver)
    }

    pub fn recipient(&self) -> RecipientId {
        self.recipient
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            recipient: self.recipient,
            session: self.session,
            connected_at: self.connected_at,
            buffered: self.sender.len(),
        }
    }

    /// Push an event to the recipient.
    pub fn push(&self, event: SessionEvent) -> Result<()> {
        match self.push_timeout {
            None => self.try_push(event),
            Some(timeout) => self.sender.send_timeout(event, timeout).map_err(|e| match e {
                SendTimeoutError::Timeout(_) => RelayError::PushTimeout(self.recipient),
                SendTimeoutError::Disconnected(_) => RelayError::ChannelClosed(self.recipient),
            }),
        }
    }

    /// Push without ever waiting, whatever the configured timeout.
    pub fn try_push(&self, event: SessionEvent) -> Result<()> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => RelayError::ChannelFull(self.recipient),
            TrySendError::Disconnected(_) => RelayError::ChannelClosed(self.recipient),
        })
    }

    /// Tell the recipient why the channel is going away, then release it.
    pub fn close(self, reason: CloseReason) {
        // Best effort: a full or dead buffer just loses the notice.
        let _ = self.sender.try_send(SessionEvent::Closed(reason));
    }
}
