use crate::bus::PubSubClient;
use crate::errors::{Error, Result};
use crate::store::TelemetryStore;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{error, info, warn};

const REQUEST_CAPACITY: usize = 10000;

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// rumqttc client used only to manage subscriptions; messages arrive
/// through the matching [`EventLoop`].
#[derive(Clone)]
pub struct MqttSubscriber {
    client: AsyncClient,
}

#[async_trait]
impl PubSubClient for MqttSubscriber {
    async fn subscribe(&self, filter: &str) -> Result<()> {
        self.client
            .subscribe(filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| Error::Subscribe {
                filter: filter.to_string(),
                reason: e.to_string(),
            })
    }
}

pub fn connect(settings: &BrokerSettings) -> (MqttSubscriber, EventLoop) {
    info!("Connecting to MQTT broker at {}:{}", settings.host, settings.port);

    let mut mqtt_options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);
    if let Some(username) = &settings.username {
        mqtt_options.set_credentials(username, settings.password.clone().unwrap_or_default());
    }

    let (client, eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
    (MqttSubscriber { client }, eventloop)
}

/// Drives the event loop forever: subscribes on every connection
/// acknowledgement and hands each publish to the store. A failed message is
/// logged and skipped.
pub async fn run_ingest<C: PubSubClient>(store: &TelemetryStore<C>, mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT connected");
                if let Err(e) = store.on_connect().await {
                    error!("Subscribe failed: {}", e);
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if let Err(e) = store.on_message(&publish.topic, &publish.payload).await {
                    warn!(topic = %publish.topic, "Message not stored: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT error: {}", e);
                // rumqttc reconnects on the next poll
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
