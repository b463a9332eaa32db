use chrono::{DateTime, SecondsFormat, Utc};

/// One received bus message, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub topic: String,
    /// Raw payload text; never interpreted.
    pub value: String,
    /// Ingestor clock at receipt, whole milliseconds.
    pub received_at: DateTime<Utc>,
}

impl TelemetryRecord {
    pub fn received_now(topic: impl Into<String>, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            topic: topic.into(),
            value: value.into(),
            received_at: DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now),
        }
    }

    /// RFC 3339 with millisecond precision, as stored in `received_at`.
    pub fn received_at_text(&self) -> String {
        self.received_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
