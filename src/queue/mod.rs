//! Per-recipient FIFO of offers waiting for the recipient to connect.

mod store;

pub use store::PendingQueueStore;
