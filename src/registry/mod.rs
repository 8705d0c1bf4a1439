//! Registry of live delivery channels.
//!
//! Each recipient has at most one live channel. Registering a new channel for
//! a recipient supersedes the previous one: the old channel is sent
//! `SessionEvent::Closed(CloseReason::Superseded)` (best effort) and its
//! sender is dropped, so the transport task reading it sees disconnection.
//!
//! Removal is always idempotent. Removal by session only touches the entry if
//! it still belongs to that session, which keeps a late disconnect from an
//! old connection from evicting its successor.
//!
//! # Example
//!
//! ```ignore
//! let registry = RecipientRegistry::new();
//!
//! let (channel, receiver) = LiveChannel::pair(RecipientId(42), SessionId(1), 16, None);
//! registry.register(channel);
//! assert!(registry.is_live(RecipientId(42)));
//!
//! registry.unregister_session(RecipientId(42), SessionId(1));
//! registry.unregister_session(RecipientId(42), SessionId(1)); // no-op
//! ```

mod channel;
mod manager;

pub use channel::{ChannelInfo, LiveChannel};
pub use manager::RecipientRegistry;
