use crate::bus::PubSubClient;
use crate::db;
use crate::errors::{Error, Result};
use crate::metrics::{
    APPEND_LATENCY_SECONDS, INVALID_MESSAGES_TOTAL, MESSAGES_TOTAL, STORAGE_FAILURES_TOTAL,
    STORED_TOTAL,
};
use crate::model::TelemetryRecord;
use crate::validate::{validate_filter, validate_message};
use sqlx::SqlitePool;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Write path from the bus into the `telemetry` table.
///
/// Every received message becomes one row; nothing is deduplicated, so a
/// redelivered message is stored again.
pub struct TelemetryStore<C: PubSubClient> {
    client: C,
    pool: SqlitePool,
    filters: Vec<String>,
}

impl<C: PubSubClient> TelemetryStore<C> {
    pub fn new(client: C, pool: SqlitePool, filters: Vec<String>) -> Result<Self> {
        if filters.is_empty() {
            return Err(Error::Config("At least one topic filter is required".to_string()));
        }
        let mut unique: Vec<String> = Vec::with_capacity(filters.len());
        for filter in filters {
            validate_filter(&filter)?;
            if !unique.contains(&filter) {
                unique.push(filter);
            }
        }

        Ok(Self {
            client,
            pool,
            filters: unique,
        })
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// (Re)subscribes to every filter. Called after each successful
    /// handshake, since a clean session drops earlier subscriptions.
    pub async fn on_connect(&self) -> Result<()> {
        for filter in &self.filters {
            self.client.subscribe(filter).await?;
            info!("Subscribed to {} with QoS 1", filter);
        }
        Ok(())
    }

    /// Stamps the message with the local receive time and appends it.
    pub async fn on_message(&self, topic: &str, payload: &[u8]) -> Result<TelemetryRecord> {
        MESSAGES_TOTAL.inc();

        let value = match validate_message(topic, payload) {
            Ok(value) => value,
            Err(e) => {
                INVALID_MESSAGES_TOTAL.inc();
                warn!(topic = %topic, "Rejected message: {}", e);
                return Err(e);
            }
        };

        let record = TelemetryRecord::received_now(topic, value);
        let start = Instant::now();
        match db::append(&self.pool, &record).await {
            Ok(()) => {
                APPEND_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
                STORED_TOTAL.inc();
                debug!(topic = %record.topic, value = %record.value, "Stored record");
                Ok(record)
            }
            Err(e) => {
                STORAGE_FAILURES_TOTAL.inc();
                error!(topic = %topic, "Failed to append record: {}", e);
                Err(e.into())
            }
        }
    }

    /// Stored rows in append order.
    pub async fn records(&self) -> Result<Vec<TelemetryRecord>> {
        Ok(db::fetch_all(&self.pool).await?)
    }
}
