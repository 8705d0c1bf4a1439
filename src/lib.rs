//! # Shift Relay
//!
//! An in-process relay that pushes shift offers to connected workers and
//! queues them for workers who are offline.
//!
//! ## Core Concepts
//!
//! - **Registry**: At most one live channel per recipient; reconnects supersede
//! - **Pending queue**: Per-recipient FIFO of undelivered offers
//! - **Dispatcher**: Push now if live, queue otherwise, drain on connect
//! - **Session**: RAII handle for one connection; dropping it disconnects
//!
//! The transport (WebSocket/HTTP) is left to the caller: a connection task
//! calls `Relay::connect`, forwards `SessionEvent`s to the socket, and feeds
//! inbound frames to `Session::handle_inbound`.
//!
//! ## Example
//!
//! ```ignore
//! use shift_relay::{DeliveryStatus, OfferEvent, RecipientId, Relay, RelayConfig};
//!
//! let relay = Relay::new(RelayConfig::default());
//!
//! // Worker 42 is offline: the offer is queued
//! let receipt = relay.submit_offer(RecipientId(42), OfferEvent::sample(7));
//! assert_eq!(receipt.status, DeliveryStatus::Pending);
//!
//! // On connect the queue is drained over the new session
//! let session = relay.connect(RecipientId(42));
//! let event = session.recv()?;
//! ```

pub mod dispatch;
pub mod error;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod session;
pub mod types;

// Re-exports
pub use dispatch::{Dispatcher, DrainPolicy, PushFailurePolicy};
pub use error::{RelayError, Result};
pub use queue::PendingQueueStore;
pub use registry::{ChannelInfo, LiveChannel, RecipientRegistry};
pub use relay::{Relay, RelayConfig};
pub use session::Session;
pub use types::*;
