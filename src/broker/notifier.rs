//! Streaming notifier
//!
//! Bridges the pull-only delivery queue to a push channel. A subscription
//! owns a bounded channel and a poll task; the task wakes on a fixed
//! interval, and when the queue is non-empty it moves exactly one message
//! into the channel. A backlog therefore drains at one message per interval,
//! which is the intended rate limit.
//!
//! Only one subscription may be active at a time: a second concurrent
//! `subscribe` is rejected rather than letting two consumers race over the
//! same queue. Delivery is at-most-once. A message that was handed to a
//! subscriber which then went away is logged and dropped, never re-enqueued.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::Utc;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::message::Message;
use crate::broker::queue::DeliveryQueue;
use crate::utils::error::NotifierError;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct ActiveSubscription {
    id: Uuid,
    cancel: CancellationToken,
}

type ActiveSlot = Arc<Mutex<Option<ActiveSubscription>>>;

fn lock_slot(slot: &ActiveSlot) -> MutexGuard<'_, Option<ActiveSubscription>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drains a [`DeliveryQueue`] into at most one subscriber.
#[derive(Debug, Clone)]
pub struct Notifier {
    queue: DeliveryQueue,
    poll_interval: Duration,
    active: ActiveSlot,
}

impl Notifier {
    pub fn new(queue: DeliveryQueue, poll_interval: Duration) -> Self {
        Self {
            queue,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Opens the subscriber channel and starts the poll task.
    ///
    /// The first poll happens immediately so a backlog present at connect
    /// time is not held back for a full interval. Must be called from within
    /// a tokio runtime.
    pub fn subscribe(&self) -> Result<Subscription, NotifierError> {
        let mut active = lock_slot(&self.active);
        if active.is_some() {
            warn!("Rejected subscription: a subscriber is already connected");
            return Err(NotifierError::AlreadySubscribed);
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (sender, receiver) = mpsc::channel(1);
        *active = Some(ActiveSubscription {
            id,
            cancel: cancel.clone(),
        });
        drop(active);

        tokio::spawn(poll_loop(
            self.queue.clone(),
            sender,
            cancel.clone(),
            self.poll_interval,
            id,
        ));
        info!("Subscriber {id} connected");

        Ok(Subscription {
            id,
            receiver,
            cancel,
            active: self.active.clone(),
        })
    }

    /// Tears down the active subscription from the server side.
    ///
    /// Returns `false` when nobody was connected.
    pub fn disconnect(&self) -> bool {
        match lock_slot(&self.active).take() {
            Some(active) => {
                active.cancel.cancel();
                info!("Subscriber {} disconnected by server", active.id);
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        lock_slot(&self.active).is_some()
    }
}

/// One connected subscriber.
///
/// Yields delivered messages in FIFO order, one per poll interval at most.
/// The stream ends when the server tears the subscription down. Dropping it
/// stops the poll task; a message still buffered at that point is lost.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<Message>,
    cancel: CancellationToken,
    active: ActiveSlot,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next delivered message.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.receiver.close();
        while let Ok(message) = self.receiver.try_recv() {
            warn!(
                subscriber = %self.id,
                text = message.text(),
                "Delivery lost: subscriber gone before the message was written"
            );
        }

        let mut active = lock_slot(&self.active);
        if active.as_ref().is_some_and(|a| a.id == self.id) {
            *active = None;
            info!("Subscriber {} disconnected", self.id);
        }
    }
}

async fn poll_loop(
    queue: DeliveryQueue,
    sender: mpsc::Sender<Message>,
    cancel: CancellationToken,
    period: Duration,
    id: Uuid,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sender.closed() => break,
            _ = ticker.tick() => {}
        }

        if queue.is_empty() {
            continue;
        }

        // Reserve before dequeuing so a message only leaves the queue when
        // there is room to hand it over.
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = sender.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        // The subscriber may have gone while we waited for capacity.
        if sender.is_closed() {
            break;
        }

        let Some(message) = queue.dequeue_one() else {
            continue;
        };
        let waited = Utc::now() - message.queued_at();
        debug!(
            subscriber = %id,
            queued_ms = waited.num_milliseconds(),
            remaining = queue.len(),
            "Delivering message"
        );
        if !deliver(&sender, permit, message, id) {
            break;
        }
    }

    debug!("Poll loop for subscriber {id} stopped");
}

/// Hands a dequeued message to the reserved slot.
///
/// Returns `false`, logging the message as lost, when the receiving side has
/// closed in the meantime: a send into a closed channel would drop it
/// silently.
pub(crate) fn deliver(
    sender: &mpsc::Sender<Message>,
    permit: mpsc::Permit<'_, Message>,
    message: Message,
    id: Uuid,
) -> bool {
    if sender.is_closed() {
        warn!(
            subscriber = %id,
            text = message.text(),
            "Delivery lost: subscriber gone before the message was written"
        );
        return false;
    }
    permit.send(message);
    true
}
