use anyhow::{bail, Context, Result};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bridge::Bridge;
use crate::config::Config;

/// Topic pattern covering every local device status JSON message.
pub const DEVICE_STATUS_TOPIC: &str = "status/local/json/device/#";

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Holds the broker connection and feeds every matching message to the
/// bridge.
pub struct Listener {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl Listener {
    /// Connects to the broker and subscribes to the device status stream.
    /// A rejected or failed handshake is fatal; the bridge must not run
    /// without its subscription.
    pub async fn connect(cfg: &Config) -> Result<Self> {
        let client_id = format!("emon-bridge-{}", Uuid::new_v4().simple());
        let options = MqttOptions::new(client_id, &cfg.mqtt_host, cfg.mqtt_port);
        let (client, mut eventloop) = AsyncClient::new(options, 10);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        bail!("Broker rejected connection: {:?}", ack.code);
                    }
                    break;
                }
                Ok(_) => {}
                Err(e) => return Err(e).context("MQTT connection handshake failed"),
            }
        }

        client
            .subscribe(DEVICE_STATUS_TOPIC, QoS::AtMostOnce)
            .await
            .context("Failed to subscribe to device status stream")?;
        info!(
            host = %cfg.mqtt_host,
            topic = DEVICE_STATUS_TOPIC,
            "Subscribed to device status stream"
        );

        Ok(Self { client, eventloop })
    }

    /// Polls the broker forever, handing every publish to the bridge.
    /// Handling is sequential: the next event is not polled until the
    /// bridge is done with the current message.
    pub async fn run(&mut self, bridge: &Bridge) -> Result<()> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    bridge.handle(&publish.topic, &publish.payload).await;
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // Subscriptions do not survive a reconnect.
                    self.client
                        .subscribe(DEVICE_STATUS_TOPIC, QoS::AtMostOnce)
                        .await
                        .context("Failed to re-subscribe after reconnect")?;
                    info!(topic = DEVICE_STATUS_TOPIC, "Re-subscribed after reconnect");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "MQTT connection error, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
}
