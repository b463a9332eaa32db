use crate::errors::ConfigError;
use crate::mqtt::BrokerConfig;
use crate::session::{expand_topic, SessionConfig, DEVICE_ID_PLACEHOLDER};
use clap::Parser;
use std::time::Duration;

/// Emulates air-quality monitors publishing per-metric telemetry over MQTT.
#[derive(Debug, Clone, Parser)]
#[command(name = "airq-emulator", version)]
pub struct Cli {
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    pub broker: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub port: u16,

    #[arg(long, env = "MQTT_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Client ids are `{prefix}-{uuid}`.
    #[arg(long, env = "CLIENT_ID_PREFIX", default_value = "emulator")]
    pub client_id_prefix: String,

    /// Device ids are `{prefix}_{n:03}`.
    #[arg(long, env = "DEVICE_PREFIX", default_value = "air_monitor")]
    pub device_prefix: String,

    #[arg(long, env = "DEVICES", default_value_t = 1)]
    pub devices: usize,

    #[arg(long, env = "INTERVAL_SECS", default_value_t = 30)]
    pub interval_secs: u64,

    /// Cycles per device; 0 runs until interrupted.
    #[arg(long, env = "CYCLES", default_value_t = 3)]
    pub cycles: u64,

    /// May contain `{device_id}`.
    #[arg(long, env = "TOPIC_BASE", default_value = "v1/devices/me/telemetry")]
    pub topic_base: String,

    #[arg(long, env = "ATTRIBUTES_TOPIC")]
    pub attributes_topic: Option<String>,

    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Fixed seed for reproducible series; device n uses `seed + n`.
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,
}

/// Everything needed to run one emulated device.
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    pub device_id: String,
    pub broker: BrokerConfig,
    pub session: SessionConfig,
    pub seed: Option<u64>,
}

impl Cli {
    /// Whether concurrent devices would share presence topics.
    pub fn shares_topics(&self) -> bool {
        self.devices > 1 && !self.topic_base.contains(DEVICE_ID_PLACEHOLDER)
    }

    pub fn device_specs(&self) -> Result<Vec<DeviceSpec>, ConfigError> {
        if self.devices == 0 {
            return Err(ConfigError::Zero("devices"));
        }
        if self.device_prefix.is_empty() {
            return Err(ConfigError::Empty("device prefix"));
        }

        (0..self.devices)
            .map(|i| -> Result<DeviceSpec, ConfigError> {
                let device_id = format!("{}_{:03}", self.device_prefix, i + 1);

                let mut broker = BrokerConfig::new(
                    &self.broker,
                    self.port,
                    format!("{}-{}", self.client_id_prefix, uuid::Uuid::new_v4()),
                );
                broker.username = self.username.clone();
                broker.password = self.password.clone();
                broker.validate()?;

                let mut session = SessionConfig::new(
                    expand_topic(&self.topic_base, &device_id),
                    Duration::from_secs(self.interval_secs),
                );
                session.attributes_topic = self
                    .attributes_topic
                    .as_deref()
                    .map(|t| expand_topic(t, &device_id));
                session.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
                session.validate()?;

                Ok(DeviceSpec {
                    device_id,
                    broker,
                    session,
                    seed: self.seed.map(|s| s.wrapping_add(i as u64)),
                })
            })
            .collect()
    }
}
