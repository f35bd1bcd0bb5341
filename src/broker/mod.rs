//! Broker Bridge: the AMQP notification channel between Intake and the
//! Ingest Engine's worker pool (§4.4, §5).

mod bridge;
mod error;

pub use bridge::{BrokerBridge, IngestNotification};
pub use error::{BrokerError, BrokerResult};
