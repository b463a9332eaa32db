use crate::errors::{Error, Result};
use crate::mqtt::BrokerSettings;
use crate::validate::validate_filter;
use clap::Parser;

/// Subscribes to air-quality telemetry and appends every message to SQLite.
#[derive(Debug, Clone, Parser)]
#[command(name = "airq-ingestor", version)]
pub struct Cli {
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    pub broker: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub port: u16,

    #[arg(long, env = "MQTT_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Defaults to `ingestor-{uuid}`.
    #[arg(long, env = "MQTT_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(
        long = "topic",
        env = "TOPICS",
        value_delimiter = ',',
        default_values_t = [
            "v1/devices/me/telemetry/#".to_string(),
            "v1/devices/me/attributes".to_string(),
        ]
    )]
    pub topics: Vec<String>,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:air_quality.db")]
    pub database_url: String,

    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: String,
}

impl Cli {
    pub fn broker_settings(&self) -> Result<BrokerSettings> {
        if self.broker.is_empty() {
            return Err(Error::Config("Broker host cannot be empty".to_string()));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(Error::Config("Password given without a username".to_string()));
        }
        let client_id = match &self.client_id {
            Some(id) if id.is_empty() => {
                return Err(Error::Config("Client id cannot be empty".to_string()))
            }
            Some(id) => id.clone(),
            None => format!("ingestor-{}", uuid::Uuid::new_v4()),
        };

        Ok(BrokerSettings {
            host: self.broker.clone(),
            port: self.port,
            client_id,
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.broker_settings()?;
        for topic in &self.topics {
            validate_filter(topic)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("airq-ingestor").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(
            cli.topics,
            vec!["v1/devices/me/telemetry/#", "v1/devices/me/attributes"]
        );
        assert!(cli.validate().is_ok());
        assert!(cli.broker_settings().unwrap().client_id.starts_with("ingestor-"));
    }

    #[test]
    fn test_topic_list() {
        let cli = parse(&["--topic", "base/state/#,devices/+/online"]);
        assert_eq!(cli.topics, vec!["base/state/#", "devices/+/online"]);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(parse(&["--password", "x"]).validate().is_err());
        assert!(parse(&["--topic", "a/#/b"]).validate().is_err());
        assert!(parse(&["--client-id", ""]).validate().is_err());
    }
}
