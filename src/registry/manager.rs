//! Recipient registry: one live channel per recipient.

use crate::error::Result;
use crate::types::{CloseReason, RecipientId, SessionEvent, SessionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use super::channel::{ChannelInfo, LiveChannel};

/// Maps recipients to their single live channel.
pub struct RecipientRegistry {
    channels: RwLock<HashMap<RecipientId, LiveChannel>>,
}

impl RecipientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Install `channel` as the live channel for its recipient.
    ///
    /// Any previous channel is closed with `CloseReason::Superseded`.
    /// Returns true if a previous channel was replaced.
    pub fn register(&self, channel: LiveChannel) -> bool {
        let recipient = channel.recipient();
        let session = channel.session();
        let previous = self.channels.write().insert(recipient, channel);

        match previous {
            Some(old) => {
                debug!(
                    %recipient,
                    old_session = old.session().0,
                    new_session = session.0,
                    "superseded live channel"
                );
                old.close(CloseReason::Superseded);
                true
            }
            None => {
                debug!(%recipient, session = session.0, "registered live channel");
                false
            }
        }
    }

    /// Remove the live channel for `recipient`, whichever session owns it.
    /// No-op if absent.
    pub fn unregister(&self, recipient: RecipientId) -> bool {
        self.channels.write().remove(&recipient).is_some()
    }

    /// Remove the live channel for `recipient` only if `session` still owns it.
    pub fn unregister_session(&self, recipient: RecipientId, session: SessionId) -> bool {
        let mut channels = self.channels.write();
        match channels.get(&recipient) {
            Some(channel) if channel.session() == session => {
                channels.remove(&recipient);
                debug!(%recipient, session = session.0, "unregistered live channel");
                true
            }
            _ => false,
        }
    }

    /// Remove the live channel for `recipient` and tell it why.
    pub fn close(&self, recipient: RecipientId, reason: CloseReason) -> bool {
        let removed = self.channels.write().remove(&recipient);
        match removed {
            Some(channel) => {
                debug!(%recipient, session = channel.session().0, ?reason, "closed live channel");
                channel.close(reason);
                true
            }
            None => false,
        }
    }

    /// Whether `recipient` has a live channel.
    pub fn is_live(&self, recipient: RecipientId) -> bool {
        self.channels.read().contains_key(&recipient)
    }

    /// Describe the live channel for `recipient`, if any.
    pub fn get(&self, recipient: RecipientId) -> Option<ChannelInfo> {
        self.channels.read().get(&recipient).map(LiveChannel::info)
    }

    /// Push an event over the recipient's live channel.
    ///
    /// Returns None if the recipient has no live channel. A push that waits
    /// on a full buffer does not hold the registry lock.
    pub fn push(&self, recipient: RecipientId, event: SessionEvent) -> Option<Result<()>> {
        let channel = self.channels.read().get(&recipient).cloned()?;
        Some(channel.push(event))
    }

    /// Push a keep-alive ping to every live channel without blocking.
    /// Returns how many channels accepted it.
    pub fn ping_all(&self) -> usize {
        let channels = self.channels.read();
        let mut delivered = 0;
        for (recipient, channel) in channels.iter() {
            match channel.try_push(SessionEvent::Ping) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(%recipient, error = %e, "keep-alive ping not delivered"),
            }
        }
        delivered
    }

    /// All recipients with a live channel, in ascending order.
    pub fn live_recipients(&self) -> Vec<RecipientId> {
        let mut ids: Vec<_> = self.channels.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live channels.
    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}

impl Default for RecipientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
