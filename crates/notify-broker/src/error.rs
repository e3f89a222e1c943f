use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("AMQP connection error: {0}")]
    Connection(String),

    #[error("failed to declare topology: {0}")]
    Topology(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("consume failed: {0}")]
    Consume(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown delivery tag for receipt handle: {0}")]
    NotFound(String),

    #[error("consumer stopped")]
    Stopped,
}
