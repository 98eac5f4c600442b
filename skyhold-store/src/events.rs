use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde_json::{json, Value};
use skyhold_core::events::EventPublisher;
use skyhold_core::notification::{NotificationSender, ReservationNotice};
use skyhold_core::{CoreError, CoreResult};
use skyhold_shared::models::events::{ReservationNoticeEvent, TOPIC_NOTIFICATIONS};
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish(&self, topic: &str, key: &str, payload: &Value) -> CoreResult<()> {
        self.send(topic, key, &payload.to_string())
            .await
            .map_err(|e| CoreError::InternalError(format!("kafka: {}", e)))
    }
}

/// Hands notices to the mailer through the notifications topic.
#[derive(Clone)]
pub struct KafkaNotificationSender {
    producer: EventProducer,
}

impl KafkaNotificationSender {
    pub fn new(producer: EventProducer) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl NotificationSender for KafkaNotificationSender {
    async fn send(&self, notice: &ReservationNotice) -> CoreResult<()> {
        let event = ReservationNoticeEvent {
            reservation_id: notice.reservation_id,
            code: notice.code.clone(),
            kind: notice.kind.as_str().to_string(),
            recipient: notice.passenger_email.expose().clone(),
            payload: json!({
                "passenger_name": notice.passenger_name,
                "flight_code": notice.flight_code,
                "departure_at": notice.departure_at,
                "payment_deadline": notice.payment_deadline,
                "total_cents": notice.total_cents,
            }),
            timestamp: chrono::Utc::now().timestamp(),
        };
        let payload = serde_json::to_string(&event).map_err(|e| CoreError::InternalError(e.to_string()))?;
        self.producer
            .send(TOPIC_NOTIFICATIONS, &notice.code, &payload)
            .await
            .map_err(|e| CoreError::InternalError(format!("kafka: {}", e)))
    }
}
