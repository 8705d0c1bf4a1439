//! Pending queue store.

use crate::types::{OfferEvent, RecipientId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::warn;

/// Holds undelivered offers per recipient, oldest first.
///
/// Queues are unbounded unless `max_depth` is set, in which case the oldest
/// offer is evicted to make room. A drained recipient has no entry at all.
pub struct PendingQueueStore {
    queues: Mutex<HashMap<RecipientId, VecDeque<OfferEvent>>>,
    max_depth: Option<usize>,
}

impl PendingQueueStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::with_max_depth(None)
    }

    /// Create a store that keeps at most `max_depth` offers per recipient.
    pub fn with_max_depth(max_depth: Option<usize>) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            max_depth,
        }
    }

    /// Append an offer to the recipient's queue.
    ///
    /// Returns the offers evicted to respect the depth cap (oldest first).
    pub fn enqueue(&self, recipient: RecipientId, offer: OfferEvent) -> Vec<OfferEvent> {
        let mut queues = self.queues.lock();
        let queue = queues.entry(recipient).or_default();
        queue.push_back(offer);
        self.trim(recipient, queue)
    }

    /// Put offers back at the front of the queue, keeping their order.
    ///
    /// Used for offers that are older than anything already queued.
    pub fn requeue_front(&self, recipient: RecipientId, offers: Vec<OfferEvent>) -> Vec<OfferEvent> {
        if offers.is_empty() {
            return Vec::new();
        }
        let mut queues = self.queues.lock();
        let queue = queues.entry(recipient).or_default();
        for offer in offers.into_iter().rev() {
            queue.push_front(offer);
        }
        self.trim(recipient, queue)
    }

    /// Remove and return every queued offer for the recipient in FIFO order.
    ///
    /// Read-once: concurrent drains never see the same offer.
    pub fn drain_all(&self, recipient: RecipientId) -> Vec<OfferEvent> {
        self.queues
            .lock()
            .remove(&recipient)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Copy of the queued offers without removing them.
    pub fn peek_all(&self, recipient: RecipientId) -> Vec<OfferEvent> {
        self.queues
            .lock()
            .get(&recipient)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of offers queued for the recipient.
    pub fn peek_count(&self, recipient: RecipientId) -> usize {
        self.queues.lock().get(&recipient).map_or(0, VecDeque::len)
    }

    /// Queue depth per recipient with anything queued.
    ///
    /// Drained recipients are left out rather than reported with a depth of 0.
    pub fn depths(&self) -> BTreeMap<RecipientId, usize> {
        self.queues
            .lock()
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(id, queue)| (*id, queue.len()))
            .collect()
    }

    /// Total number of queued offers across recipients.
    pub fn total(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }

    fn trim(&self, recipient: RecipientId, queue: &mut VecDeque<OfferEvent>) -> Vec<OfferEvent> {
        let Some(max) = self.max_depth else {
            return Vec::new();
        };
        let excess = queue.len().saturating_sub(max);
        if excess > 0 {
            warn!(%recipient, evicted = excess, max_depth = max, "pending queue full, dropping oldest");
        }
        queue.drain(..excess).collect()
    }
}

impl Default for PendingQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_drain_fifo() {
        let store = PendingQueueStore::new();
        for shift in 1..=3 {
            store.enqueue(RecipientId(42), OfferEvent::sample(shift));
        }
        assert_eq!(store.peek_count(RecipientId(42)), 3);

        let drained: Vec<u64> = store
            .drain_all(RecipientId(42))
            .iter()
            .map(|o| o.shift_id)
            .collect();
        assert_eq!(drained, vec![1, 2, 3]);
    }

    #[test]
    fn test_second_drain_is_empty() {
        let store = PendingQueueStore::new();
        store.enqueue(RecipientId(42), OfferEvent::sample(7));

        assert_eq!(store.drain_all(RecipientId(42)).len(), 1);
        assert!(store.drain_all(RecipientId(42)).is_empty());
        assert_eq!(store.peek_count(RecipientId(42)), 0);
    }

    #[test]
    fn test_unknown_recipient_is_empty() {
        let store = PendingQueueStore::new();
        assert!(store.drain_all(RecipientId(1)).is_empty());
        assert!(store.peek_all(RecipientId(1)).is_empty());
        assert_eq!(store.peek_count(RecipientId(1)), 0);
    }

    #[test]
    fn test_peek_does_not_clear() {
        let store = PendingQueueStore::new();
        store.enqueue(RecipientId(42), OfferEvent::sample(7));

        assert_eq!(store.peek_all(RecipientId(42)).len(), 1);
        assert_eq!(store.peek_all(RecipientId(42)).len(), 1);
        assert_eq!(store.total(), 1);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let store = PendingQueueStore::new();
        store.enqueue(RecipientId(42), OfferEvent::sample(7));
        store.enqueue(RecipientId(42), OfferEvent::sample(7));
        assert_eq!(store.peek_count(RecipientId(42)), 2);
    }

    #[test]
    fn test_requeue_front_preserves_order() {
        let store = PendingQueueStore::new();
        store.enqueue(RecipientId(1), OfferEvent::sample(3));
        store.requeue_front(
            RecipientId(1),
            vec![OfferEvent::sample(1), OfferEvent::sample(2)],
        );

        let ids: Vec<u64> = store
            .peek_all(RecipientId(1))
            .iter()
            .map(|o| o.shift_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_depth_cap_drops_oldest() {
        let store = PendingQueueStore::with_max_depth(Some(2));
        assert!(store.enqueue(RecipientId(1), OfferEvent::sample(1)).is_empty());
        assert!(store.enqueue(RecipientId(1), OfferEvent::sample(2)).is_empty());

        let evicted = store.enqueue(RecipientId(1), OfferEvent::sample(3));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].shift_id, 1);

        let ids: Vec<u64> = store
            .drain_all(RecipientId(1))
            .iter()
            .map(|o| o.shift_id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_depths_and_isolation() {
        let store = PendingQueueStore::new();
        store.enqueue(RecipientId(1), OfferEvent::sample(1));
        store.enqueue(RecipientId(2), OfferEvent::sample(2));
        store.enqueue(RecipientId(2), OfferEvent::sample(3));

        store.drain_all(RecipientId(1));

        let depths = store.depths();
        assert_eq!(depths.get(&RecipientId(1)), None);
        assert_eq!(depths.get(&RecipientId(2)), Some(&2));
    }
}
