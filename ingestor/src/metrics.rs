use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::Once;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_messages_total",
        "Total messages received from MQTT"
    ))
    .unwrap();
    pub static ref STORED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_stored_total",
        "Total telemetry records appended"
    ))
    .unwrap();
    pub static ref INVALID_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_invalid_messages_total",
        "Total messages rejected before storage"
    ))
    .unwrap();
    pub static ref STORAGE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_storage_failures_total",
        "Total failed appends"
    ))
    .unwrap();
    pub static ref APPEND_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ingestor_append_latency_seconds",
            "Time taken to append one record"
        )
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0])
    )
    .unwrap();
}

static INIT: Once = Once::new();

/// Registers every metric with [`REGISTRY`]; later calls do nothing.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY.register(Box::new(MESSAGES_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(STORED_TOTAL.clone())).unwrap();
        REGISTRY
            .register(Box::new(INVALID_MESSAGES_TOTAL.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(STORAGE_FAILURES_TOTAL.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(APPEND_LATENCY_SECONDS.clone()))
            .unwrap();
    });
}

pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_after_init() {
        init_metrics();
        init_metrics();
        let text = gather_metrics().unwrap();
        assert!(text.contains("ingestor_messages_total"));
        assert!(text.contains("ingestor_storage_failures_total"));
    }
}
