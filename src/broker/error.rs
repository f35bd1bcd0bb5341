//! Error types for the Broker Bridge (§4.4, §7).

use thiserror::Error;

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    Connection(String),

    #[error("broker publish error: {0}")]
    Publish(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A consumer's handler returned an error; the message is left unacked
    /// for redelivery rather than treated as a broker fault.
    #[error("message handler error: {0}")]
    Handler(String),
}

impl BrokerError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BrokerError::Serialization(_))
    }
}

impl From<BrokerError> for crate::domain::PipelineError {
    fn from(e: BrokerError) -> Self {
        crate::domain::PipelineError::Broker(e.to_string())
    }
}
