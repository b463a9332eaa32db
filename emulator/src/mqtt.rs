use crate::bus::PubSubClient;
use crate::errors::{ConfigError, ConnectionError, PublishError};
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const REQUEST_CAPACITY: usize = 100;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Where and as whom a session connects.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// Must be unique among concurrently connected sessions.
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
}

impl BrokerConfig {
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(30),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Empty("broker host"));
        }
        if self.port == 0 {
            return Err(ConfigError::Zero("broker port"));
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::Empty("client id"));
        }
        match (&self.username, &self.password) {
            (None, Some(_)) => Err(ConfigError::PasswordWithoutUsername),
            (Some(user), _) if user.is_empty() => Err(ConfigError::Empty("username")),
            _ => Ok(()),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// rumqttc-backed bus connection.
///
/// After the handshake the event loop is driven by a background task until
/// the client disconnects.
pub struct MqttBus {
    options: MqttOptions,
    client: Option<AsyncClient>,
    driver: Option<JoinHandle<()>>,
}

impl MqttBus {
    /// `last_will_topic` receives `false` from the broker if the connection
    /// drops without an orderly disconnect.
    pub fn new(config: &BrokerConfig, last_will_topic: Option<&str>) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }
        if let Some(topic) = last_will_topic {
            options.set_last_will(LastWill::new(
                topic,
                b"false".to_vec(),
                QoS::AtLeastOnce,
                false,
            ));
        }

        Self {
            options,
            client: None,
            driver: None,
        }
    }
}

#[async_trait]
impl PubSubClient for MqttBus {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(ConnectionError::Refused(format!("{:?}", ack.code)));
                    }
                    break;
                }
                Ok(_) => {}
                Err(rumqttc::ConnectionError::ConnectionRefused(code)) => {
                    return Err(ConnectionError::Refused(format!("{:?}", code)));
                }
                Err(e) => return Err(ConnectionError::Transport(e.to_string())),
            }
        }

        let client_id = self.options.client_id();
        info!(client_id = %client_id, "Connected to MQTT broker");
        self.driver = Some(tokio::spawn(drive(eventloop, client_id)));
        self.client = Some(client);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PublishError::new(topic, "not connected"))?;

        client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| PublishError::new(topic, e))
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        if let Some(client) = self.client.take() {
            client
                .disconnect()
                .await
                .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        }

        if let Some(mut driver) = self.driver.take() {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut driver).await.is_err() {
                warn!("MQTT event loop did not drain within {:?}, aborting", DRAIN_TIMEOUT);
                driver.abort();
            }
        }
        Ok(())
    }
}

async fn drive(mut eventloop: EventLoop, client_id: String) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!(client_id = %client_id, "Disconnect sent, stopping event loop");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!(client_id = %client_id, "MQTT eventloop error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;

    #[test]
    fn test_valid_broker_config() {
        let mut config = BrokerConfig::new("dev.rightech.io", 1883, "emulator_dev-1");
        config.username = Some("livingroom".to_string());
        config.password = Some("secret".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.addr(), "dev.rightech.io:1883");
    }

    #[test]
    fn test_password_requires_username() {
        let mut config = BrokerConfig::new("localhost", 1883, "emulator_dev-1");
        config.password = Some("secret".to_string());
        assert_eq!(config.validate(), Err(ConfigError::PasswordWithoutUsername));
    }

    #[test]
    fn test_empty_client_id_rejected() {
        let config = BrokerConfig::new("localhost", 1883, "");
        assert_eq!(config.validate(), Err(ConfigError::Empty("client id")));
    }

    #[test]
    fn test_last_will_announces_offline() {
        let config = SessionConfig::new("base/state", Duration::from_secs(30));
        let bus = MqttBus::new(
            &BrokerConfig::new("localhost", 1883, "emulator_test"),
            Some(&config.online_topic()),
        );
        let will = bus.options.last_will().unwrap();
        assert_eq!(will.topic, "base/state/online");
        assert_eq!(&will.message[..], b"false");
        assert_eq!(will.qos, QoS::AtLeastOnce);
        assert!(!will.retain);

        let bus = MqttBus::new(&BrokerConfig::new("localhost", 1883, "emulator_test"), None);
        assert!(bus.options.last_will().is_none());
    }

    #[test]
    fn test_publish_before_connect_fails() {
        tokio_test::block_on(async {
            let bus = MqttBus::new(&BrokerConfig::new("localhost", 1883, "emulator_test"), None);
            let err = bus.publish("base/state/pm25", "12.0".to_string()).await.unwrap_err();
            assert_eq!(err.topic, "base/state/pm25");
        });
    }

    #[test]
    fn test_disconnect_without_connect_is_noop() {
        tokio_test::block_on(async {
            let mut bus = MqttBus::new(&BrokerConfig::new("localhost", 1883, "emulator_test"), None);
            assert!(bus.disconnect().await.is_ok());
        });
    }
}
