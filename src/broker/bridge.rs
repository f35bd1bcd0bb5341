//! AMQP connection to the `zoomhook` queue: Intake publishes one
//! notification per created Ingest, and the Ingest Engine's worker pool
//! consumes them, acking only after a delivery is fully processed
//! (at-least-once, §4.4, §5).

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::error::{BrokerError, BrokerResult};
use crate::config::RabbitConfig;

/// The message shape published to and consumed from the queue: an opaque
/// Source uuid plus the Ingest row id it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestNotification {
    pub uuid: String,
    pub ingest_id: i64,
}

pub struct BrokerBridge {
    channel: Channel,
    queue: String,
}

impl BrokerBridge {
    #[instrument(skip(config), fields(host = %config.host))]
    pub async fn connect(config: &RabbitConfig) -> BrokerResult<Self> {
        let uri = format!("amqp://{}:{}@{}/%2f", config.user, config.password, config.host);
        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        let channel = connection.create_channel().await.map_err(|e| BrokerError::Connection(e.to_string()))?;

        channel
            .queue_declare(&config.queue, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        channel.basic_qos(1, BasicQosOptions::default()).await.map_err(|e| BrokerError::Connection(e.to_string()))?;

        info!(queue = %config.queue, "broker bridge connected");
        Ok(Self { channel, queue: config.queue.clone() })
    }

    /// Publishes a notification for an Ingest the caller just created; a
    /// worker in the pool consumes it to start processing.
    #[instrument(skip(self))]
    pub async fn publish(&self, notification: &IngestNotification) -> BrokerResult<()> {
        let payload = serde_json::to_vec(notification).map_err(|e| BrokerError::Serialization(e.to_string()))?;
        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        Ok(())
    }

    /// Runs until the consumer stream ends, invoking `handler` for each
    /// delivery and acking only after it returns `Ok`; a handler error
    /// leaves the message unacked so it is redelivered.
    pub async fn consume<F, Fut>(&self, consumer_tag: &str, handler: F) -> BrokerResult<()>
    where
        F: Fn(IngestNotification) -> Fut,
        Fut: std::future::Future<Output = BrokerResult<()>>,
    {
        let mut consumer = self
            .channel
            .basic_consume(&self.queue, consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    warn!(error = %e, "broker delivery error");
                    continue;
                }
            };

            let notification: IngestNotification = match serde_json::from_slice(&delivery.data) {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "dropping malformed broker message");
                    let _ = delivery.ack(BasicAckOptions::default()).await;
                    continue;
                }
            };

            match handler(notification).await {
                Ok(()) => {
                    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                        warn!(error = %e, "failed to ack broker message");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "ingest handler failed, leaving message unacked for redelivery");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_round_trips_through_json() {
        let notification = IngestNotification { uuid: "abc==".into(), ingest_id: 7 };
        let json = serde_json::to_string(&notification).unwrap();
        let decoded: IngestNotification = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.uuid, "abc==");
        assert_eq!(decoded.ingest_id, 7);
    }
}
