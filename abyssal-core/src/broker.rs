//! Broker transport (§4.5, §6.1): thin wrappers over `lapin`, the AMQP
//! 0.9.1 client the services use to talk to RabbitMQ.
//!
//! Every exchange declared here is a durable topic exchange; every publish
//! is persistent-delivery-mode; every consumer queue is durable with
//! manual acknowledgement, matching §6.1 exactly. Propagation follows §7:
//! a message handler that returns `Ok(())` is acked, one that returns
//! `Err` is nacked with `requeue: true`.

use futures_util::stream::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

/// `delivery_mode = 2`: the broker persists the message to disk (§6.1).
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Open a connection and a single channel against `amqp_uri`.
pub async fn connect(amqp_uri: &str) -> Result<Channel, lapin::Error> {
    let connection = Connection::connect(amqp_uri, ConnectionProperties::default()).await?;
    connection.create_channel().await
}

/// One named, durable topic exchange + routing key (§6.1's three exchange
/// declarations: `orderbook`/`orderbook.updates`, `oms`/`oms.action`,
/// `execution-exchange`/`execution.update`).
#[derive(Debug, Clone, Copy)]
pub struct Topic {
    pub exchange: &'static str,
    pub routing_key: &'static str,
}

impl Topic {
    pub const ORDERBOOK: Topic = Topic {
        exchange: "orderbook",
        routing_key: "orderbook.updates",
    };
    pub const OMS_ACTION: Topic = Topic {
        exchange: "oms",
        routing_key: "oms.action",
    };
    pub const EXECUTION_UPDATE: Topic = Topic {
        exchange: "execution-exchange",
        routing_key: "execution.update",
    };
}

/// Publishes persistent messages to one durable topic exchange (§6.1).
pub struct Publisher {
    channel: Channel,
    topic: Topic,
    content_type: &'static str,
}

impl Publisher {
    pub async fn declare(channel: Channel, topic: Topic, content_type: &'static str) -> Result<Self, lapin::Error> {
        channel
            .exchange_declare(
                topic.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(Self {
            channel,
            topic,
            content_type,
        })
    }

    /// Publish one persistent message. Failures are logged by the caller
    /// and do not roll back any engine state — the system is
    /// at-least-once (§7 "Broker publish failures are logged but do not
    /// roll back state").
    pub async fn publish(&self, payload: &[u8]) -> Result<(), lapin::Error> {
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_content_type(self.content_type.into());
        self.channel
            .basic_publish(
                self.topic.exchange,
                self.topic.routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?
            .await?;
        Ok(())
    }
}

/// A durable, manually-acknowledged consumer queue bound to one topic
/// (§6.1: `ppo_queue`, `ppo_execution_queue`, `oms_action_queue`).
pub struct Consumer {
    channel: Channel,
    inner: lapin::Consumer,
}

impl Consumer {
    pub async fn bind(channel: Channel, queue_name: &str, topic: Topic, consumer_tag: &str) -> Result<Self, lapin::Error> {
        channel
            .exchange_declare(
                topic.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                queue_name,
                topic.exchange,
                topic.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        let inner = channel
            .basic_consume(
                queue_name,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(Self { channel, inner })
    }

    /// Pull the next delivery's payload. The caller is responsible for
    /// calling [`ack`](Self::ack) or [`nack`](Self::nack) on the returned
    /// delivery tag once the message has been processed (§7).
    pub async fn next(&mut self) -> Option<Result<(u64, Vec<u8>), lapin::Error>> {
        let delivery = self.inner.next().await?;
        match delivery {
            Ok(delivery) => {
                let tag = delivery.delivery_tag;
                let payload = delivery.data.clone();
                Some(Ok((tag, payload)))
            }
            Err(err) => Some(Err(err)),
        }
    }

    pub async fn ack(&self, delivery_tag: u64) -> Result<(), lapin::Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
    }

    /// Negative-acknowledge with requeue on processing exception (§7).
    pub async fn nack(&self, delivery_tag: u64) -> Result<(), lapin::Error> {
        self.channel
            .basic_nack(delivery_tag, BasicNackOptions { requeue: true, multiple: false })
            .await
    }
}
