//! # Message Queues
//!
//! Ordered, allocation-free handoff of work between threads.

mod circular;
mod message;
mod message_queue;

pub use circular::CircularQueue;
pub use message::{Message, MessageBuffer};
pub use message_queue::{
    message_queue, DrainStats, MessageConsumer, MessageProducer, QueueConfig,
};
