//! Subscriber side of the air-quality telemetry pipeline: receives bus
//! messages and appends them to a durable log table.

pub mod bus;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod mqtt;
pub mod rest;
pub mod store;
pub mod validate;

pub use bus::PubSubClient;
pub use errors::{Error, Result, StorageError};
pub use model::TelemetryRecord;
pub use store::TelemetryStore;
