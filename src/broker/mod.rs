//! The `broker` module moves messages from the ingestion endpoint to the one
//! connected subscriber.
//!
//! - `message`: the immutable [`Message`] unit and its event framing.
//! - `queue`: the FIFO [`DeliveryQueue`] shared by producers and the notifier.
//! - `notifier`: the [`Notifier`] that drains the queue on a fixed cadence.

pub mod message;
pub mod notifier;
pub mod queue;

pub use message::{Message, MessagePayload};
pub use notifier::{Notifier, Subscription};
pub use queue::DeliveryQueue;
