//! AMQP broker topology, publisher and consumer (§4.2).
//!
//! A single direct exchange carries all traffic; the queue layout and
//! dead-letter wiring live in [`topology`].

pub mod consumer;
pub mod error;
pub mod publisher;
pub mod topology;

pub use consumer::{AmqpConsumer, Delivery, QueueConsumer};
pub use error::BrokerError;
pub use publisher::Publisher;
pub use topology::Topology;

pub type Result<T> = std::result::Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_exposes_all_five_queues() {
        let topology = Topology {
            exchange: "notify.direct".to_string(),
            email_queue: "email.queue".to_string(),
            email_priority_queue: "email.priority.queue".to_string(),
            push_queue: "push.queue".to_string(),
            push_priority_queue: "push.priority.queue".to_string(),
            failed_queue: "failed.queue".to_string(),
        };
        assert_eq!(topology.exchange, "notify.direct");
        assert_eq!(topology.failed_queue, "failed.queue");
    }
}
