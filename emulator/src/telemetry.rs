use crate::errors::Result;
use crate::policy::RelayPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

/// Qualitative air-quality label attached to every reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Good,
    /// Reported by older firmware; the relay policy never assigns it.
    Ok,
    Warning,
    Danger,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Good => "GOOD",
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Danger => "DANGER",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every independently published value of a reading, in publish order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Pm25,
    Pm10,
    Co2,
    Temperature,
    Humidity,
    RelayState,
    Status,
    Online,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Pm25,
        Metric::Pm10,
        Metric::Co2,
        Metric::Temperature,
        Metric::Humidity,
        Metric::RelayState,
        Metric::Status,
        Metric::Online,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Pm25 => "pm25",
            Metric::Pm10 => "pm10",
            Metric::Co2 => "co2",
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::RelayState => "relay_state",
            Metric::Status => "status",
            Metric::Online => "online",
        }
    }

    /// `{base}/{metric}`
    pub fn topic(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.as_str())
    }
}

/// One immutable sensor snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device_id: String,
    /// Whole milliseconds; see [`now_millis`].
    pub captured_at: DateTime<Utc>,
    pub pm25: f64,
    pub pm10: f64,
    pub co2: u32,
    pub temperature: f64,
    pub humidity: f64,
    pub relay_state: bool,
    pub status: Status,
    pub online: bool,
}

impl Reading {
    /// Text payload for one metric.
    pub fn payload(&self, metric: Metric) -> String {
        match metric {
            Metric::Pm25 => format!("{:.1}", self.pm25),
            Metric::Pm10 => format!("{:.1}", self.pm10),
            Metric::Co2 => self.co2.to_string(),
            Metric::Temperature => format!("{:.1}", self.temperature),
            Metric::Humidity => format!("{:.1}", self.humidity),
            Metric::RelayState => self.relay_state.to_string(),
            Metric::Status => self.status.to_string(),
            Metric::Online => self.online.to_string(),
        }
    }

    /// Topic/payload pairs for every metric under `base`.
    pub fn publications(&self, base: &str) -> Vec<(String, String)> {
        Metric::ALL
            .iter()
            .map(|m| (m.topic(base), self.payload(*m)))
            .collect()
    }

    /// Combined attributes message: `{"timestamp": <ms>, "status": ...}`.
    pub fn attributes_json(&self) -> Result<String> {
        let attributes = Attributes {
            timestamp: self.captured_at,
            status: self.status,
        };
        Ok(serde_json::to_string(&attributes)?)
    }
}

/// Current time truncated to whole milliseconds, the unit used on the wire.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[derive(Debug, Serialize)]
struct Attributes {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
    status: Status,
}

/// Flat file-interchange shape of a reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingDocument {
    pub device_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub pm25: f64,
    pub pm10: f64,
    pub co2: u32,
    pub temperature: f64,
    pub humidity: f64,
    pub relay_state: bool,
}

impl From<&Reading> for ReadingDocument {
    fn from(r: &Reading) -> Self {
        Self {
            device_id: r.device_id.clone(),
            timestamp: r.captured_at,
            pm25: r.pm25,
            pm10: r.pm10,
            co2: r.co2,
            temperature: r.temperature,
            humidity: r.humidity,
            relay_state: r.relay_state,
        }
    }
}

impl ReadingDocument {
    /// The document has no status or presence keys: status is re-derived from
    /// the metrics and the reading is taken as online.
    pub fn into_reading(self, policy: &RelayPolicy) -> Reading {
        let mut reading = Reading {
            device_id: self.device_id,
            captured_at: self.timestamp,
            pm25: self.pm25,
            pm10: self.pm10,
            co2: self.co2,
            temperature: self.temperature,
            humidity: self.humidity,
            relay_state: self.relay_state,
            status: Status::Good,
            online: true,
        };
        reading.status = policy.evaluate(&reading).1;
        reading
    }
}

pub fn write_json<W: Write>(reading: &Reading, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &ReadingDocument::from(reading))?;
    Ok(())
}

pub fn read_json<R: Read>(reader: R) -> Result<Reading> {
    let doc: ReadingDocument = serde_json::from_reader(reader)?;
    Ok(doc.into_reading(&RelayPolicy::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Reading {
        Reading {
            device_id: "air_monitor_001".to_string(),
            captured_at: DateTime::from_timestamp_millis(1_730_000_000_123).unwrap(),
            pm25: 41.3,
            pm10: 58.0,
            co2: 812,
            temperature: 23.4,
            humidity: 47.9,
            relay_state: true,
            status: Status::Danger,
            online: true,
        }
    }

    #[test]
    fn test_topics_follow_base() {
        assert_eq!(Metric::Pm25.topic("base/state"), "base/state/pm25");
        assert_eq!(Metric::Online.topic("base/state/"), "base/state/online");
    }

    #[test]
    fn test_publications_cover_every_metric() {
        let pubs = sample().publications("v1/devices/me/telemetry");
        assert_eq!(pubs.len(), 8);
        assert_eq!(pubs[0], ("v1/devices/me/telemetry/pm25".to_string(), "41.3".to_string()));
        assert_eq!(pubs[1].1, "58.0");
        assert_eq!(pubs[2].1, "812");
        assert_eq!(pubs[5].1, "true");
        assert_eq!(pubs[6].1, "DANGER");
        assert_eq!(pubs[7], ("v1/devices/me/telemetry/online".to_string(), "true".to_string()));
    }

    #[test]
    fn test_json_round_trip() {
        let reading = sample();
        let mut buf = Vec::new();
        write_json(&reading, &mut buf).unwrap();
        let parsed = read_json(buf.as_slice()).unwrap();
        assert_eq!(parsed, reading);
    }

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(ReadingDocument::from(&sample())).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            [
                "co2",
                "device_id",
                "humidity",
                "pm10",
                "pm25",
                "relay_state",
                "temperature",
                "timestamp"
            ]
        );
        assert_eq!(obj["timestamp"], 1_730_000_000_123_i64);
    }

    #[test]
    fn test_attributes_message() {
        let json = sample().attributes_json().unwrap();
        assert_eq!(json, r#"{"timestamp":1730000000123,"status":"DANGER"}"#);
    }

    #[test]
    fn test_now_millis_has_no_sub_millisecond_part() {
        assert_eq!(now_millis().timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
