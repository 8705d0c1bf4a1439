//! Delivery dispatcher: push now or queue for later.

use crate::error::{RelayError, Result};
use crate::queue::PendingQueueStore;
use crate::registry::{LiveChannel, RecipientRegistry};
use crate::types::{
    CloseReason, DeliveryStatus, DrainReport, OfferEvent, RecipientId, SessionEvent, SessionId,
};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happens to an offer whose push to a live channel fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PushFailurePolicy {
    /// Report the failure and drop the offer.
    #[default]
    Drop,
    /// Report the offer as pending and queue it.
    Requeue,
}

/// How the queue is cleared while draining over a new channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrainPolicy {
    /// Each offer leaves the queue only once its push succeeded. Offers after
    /// a failed push go back to the front of the queue.
    #[default]
    Confirmed,
    /// The queue is cleared before pushing. Offers after a failed push are lost.
    Atomic,
}

/// Delivery counters.
#[derive(Debug, Default)]
pub(crate) struct DeliveryCounters {
    pub sent: AtomicU64,
    pub queued: AtomicU64,
    pub failed: AtomicU64,
    pub evicted: AtomicU64,
}

/// Decides between pushing and queueing, and drains queues on connect.
///
/// Every path that reads the registry and then writes either the registry or
/// the queue runs under the recipient's lock, so a connect racing a submit for
/// the same recipient takes exactly one delivery path. Different recipients
/// never wait on each other, even while a push blocks on a full channel.
pub struct Dispatcher {
    registry: Arc<RecipientRegistry>,
    queue: Arc<PendingQueueStore>,
    push_failure: PushFailurePolicy,
    drain_policy: DrainPolicy,
    pub(crate) counters: DeliveryCounters,
    /// Per-recipient locks for check-then-act sequences across registry and queue.
    recipient_locks: Mutex<HashMap<RecipientId, Arc<Mutex<()>>>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<RecipientRegistry>,
        queue: Arc<PendingQueueStore>,
        push_failure: PushFailurePolicy,
        drain_policy: DrainPolicy,
    ) -> Self {
        Self {
            registry,
            queue,
            push_failure,
            drain_policy,
            counters: DeliveryCounters::default(),
            recipient_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Deliver `offer` to `recipient`, or queue it if the recipient is offline.
    ///
    /// Returns `Sent` or `Pending`. A failed push returns the push error under
    /// `PushFailurePolicy::Drop` and `Pending` under `PushFailurePolicy::Requeue`.
    pub fn submit(&self, recipient: RecipientId, offer: OfferEvent) -> Result<DeliveryStatus> {
        let lock = self.recipient_lock(recipient);
        let _guard = lock.lock();
        self.submit_locked(recipient, offer)
    }

    /// Register `channel` and flush its recipient's queue over it.
    pub fn attach(&self, channel: LiveChannel) -> DrainReport {
        let recipient = channel.recipient();
        let lock = self.recipient_lock(recipient);
        let _guard = lock.lock();
        self.registry.register(channel);
        self.drain_locked(recipient)
    }

    /// Flush the recipient's queue over its live channel.
    ///
    /// An offline recipient keeps its queue and gets an empty report.
    pub fn drain_pending(&self, recipient: RecipientId) -> DrainReport {
        let lock = self.recipient_lock(recipient);
        let _guard = lock.lock();
        self.drain_locked(recipient)
    }

    /// Unregister `session` and hand back offers it never read.
    ///
    /// Unread offers are pushed to a successor channel if one is live. Any
    /// that cannot be pushed, and all of them when no successor exists, go
    /// back to the front of the queue. Idempotent.
    pub fn detach(
        &self,
        recipient: RecipientId,
        session: SessionId,
        unread: Option<&Receiver<SessionEvent>>,
    ) {
        let lock = self.recipient_lock(recipient);
        let _guard = lock.lock();
        self.registry.unregister_session(recipient, session);

        // Nothing can reach this receiver once unregistered under the lock.
        let leftovers: Vec<OfferEvent> = unread
            .map(|rx| {
                rx.try_iter()
                    .filter_map(|event| match event {
                        SessionEvent::Offer(offer) => Some(offer),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if leftovers.is_empty() {
            return;
        }

        debug!(%recipient, count = leftovers.len(), "redelivering unread offers");
        if self.registry.is_live(recipient) {
            self.redeliver_locked(recipient, leftovers);
        } else {
            self.requeue(recipient, leftovers);
        }
    }

    /// Close the recipient's live channel. Idempotent.
    pub fn close(&self, recipient: RecipientId, reason: CloseReason) -> bool {
        let lock = self.recipient_lock(recipient);
        let _guard = lock.lock();
        self.registry.close(recipient, reason)
    }

    fn recipient_lock(&self, recipient: RecipientId) -> Arc<Mutex<()>> {
        Arc::clone(self.recipient_locks.lock().entry(recipient).or_default())
    }

    fn submit_locked(&self, recipient: RecipientId, offer: OfferEvent) -> Result<DeliveryStatus> {
        let shift_id = offer.shift_id;

        let pushed = match self.registry.push(recipient, SessionEvent::Offer(offer.clone())) {
            None => {
                self.enqueue(recipient, offer);
                debug!(%recipient, shift_id, "stored pending offer");
                return Ok(DeliveryStatus::Pending);
            }
            Some(result) => result,
        };

        match pushed {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                debug!(%recipient, shift_id, "sent offer");
                Ok(DeliveryStatus::Sent)
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(%recipient, shift_id, error = %e, "push failed");
                self.evict_if_dead(recipient, &e);
                match self.push_failure {
                    PushFailurePolicy::Drop => Err(e),
                    PushFailurePolicy::Requeue => {
                        self.enqueue(recipient, offer);
                        Ok(DeliveryStatus::Pending)
                    }
                }
            }
        }
    }

    fn drain_locked(&self, recipient: RecipientId) -> DrainReport {
        let mut report = DrainReport::default();
        if !self.registry.is_live(recipient) {
            return report;
        }

        let offers = self.queue.drain_all(recipient);
        if offers.is_empty() {
            return report;
        }

        let mut remaining = offers.into_iter();
        while let Some(offer) = remaining.next() {
            let result = self
                .registry
                .push(recipient, SessionEvent::Offer(offer.clone()))
                .unwrap_or_else(|| Err(RelayError::ChannelClosed(recipient)));

            match result {
                Ok(()) => {
                    report.delivered += 1;
                    self.counters.sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(%recipient, shift_id = offer.shift_id, error = %e, "push failed mid-drain");
                    self.evict_if_dead(recipient, &e);

                    let rest: Vec<OfferEvent> = std::iter::once(offer).chain(remaining).collect();
                    match self.drain_policy {
                        DrainPolicy::Confirmed => {
                            report.requeued = rest.len();
                            let evicted = self.queue.requeue_front(recipient, rest);
                            self.count_evicted(evicted.len());
                        }
                        DrainPolicy::Atomic => {
                            report.dropped = rest.len();
                        }
                    }
                    break;
                }
            }
        }

        debug!(
            %recipient,
            delivered = report.delivered,
            requeued = report.requeued,
            dropped = report.dropped,
            "drained pending offers"
        );
        report
    }

    /// Push a closed session's unread offers to the live successor.
    ///
    /// They were counted as sent once already. The first failed push sends
    /// that offer and everything after it back to the queue front.
    fn redeliver_locked(&self, recipient: RecipientId, offers: Vec<OfferEvent>) {
        let mut remaining = offers.into_iter();
        while let Some(offer) = remaining.next() {
            let result = self
                .registry
                .push(recipient, SessionEvent::Offer(offer.clone()))
                .unwrap_or_else(|| Err(RelayError::ChannelClosed(recipient)));

            if let Err(e) = result {
                warn!(%recipient, shift_id = offer.shift_id, error = %e, "redelivery failed, requeueing");
                self.evict_if_dead(recipient, &e);
                let rest: Vec<OfferEvent> = std::iter::once(offer).chain(remaining).collect();
                self.requeue(recipient, rest);
                return;
            }
        }
    }

    fn requeue(&self, recipient: RecipientId, offers: Vec<OfferEvent>) {
        self.counters
            .queued
            .fetch_add(offers.len() as u64, Ordering::Relaxed);
        let evicted = self.queue.requeue_front(recipient, offers);
        self.count_evicted(evicted.len());
    }

    fn enqueue(&self, recipient: RecipientId, offer: OfferEvent) {
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        let evicted = self.queue.enqueue(recipient, offer);
        self.count_evicted(evicted.len());
    }

    fn count_evicted(&self, count: usize) {
        if count > 0 {
            self.counters
                .evicted
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// A closed receiver never recovers, so stop treating the recipient as live.
    fn evict_if_dead(&self, recipient: RecipientId, error: &RelayError) {
        if error.is_dead_channel() {
            self.registry.close(recipient, CloseReason::Evicted);
        }
    }
}
