use crate::bus::PubSubClient;
use crate::errors::{ConfigError, ConnectionError, PublishError, Result, SessionError};
use crate::synth::ReadingSynthesizer;
use crate::telemetry::{Metric, Reading};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Placeholder in a topic base template replaced by the device id.
pub const DEVICE_ID_PLACEHOLDER: &str = "{device_id}";

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Connected, presence announced as online.
    Online,
    /// Connected, offline announced; about to close.
    Offline,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Topic prefix; every metric goes to `{topic_base}/{metric}`.
    pub topic_base: String,
    /// Optional topic for the combined `{timestamp, status}` message.
    pub attributes_topic: Option<String>,
    pub interval: Duration,
    pub connect_timeout: Duration,
}

impl SessionConfig {
    pub fn new(topic_base: impl Into<String>, interval: Duration) -> Self {
        Self {
            topic_base: topic_base.into(),
            attributes_topic: None,
            interval,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.topic_base.trim_matches('/').is_empty() {
            return Err(ConfigError::Empty("topic base"));
        }
        if self.attributes_topic.as_deref() == Some("") {
            return Err(ConfigError::Empty("attributes topic"));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::Zero("interval"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Zero("connect timeout"));
        }
        Ok(())
    }

    pub fn online_topic(&self) -> String {
        Metric::Online.topic(&self.topic_base)
    }
}

/// Substitutes [`DEVICE_ID_PLACEHOLDER`] in a topic template.
pub fn expand_topic(template: &str, device_id: &str) -> String {
    template.replace(DEVICE_ID_PLACEHOLDER, device_id)
}

/// Interrupts running sessions, e.g. from a Ctrl-C handler.
///
/// Triggering only wakes the publish loop; the owner still calls
/// [`DeviceSession::stop`] to announce offline and close.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Sleeps for `duration` unless triggered first. Returns `true` when
    /// interrupted.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        if *rx.borrow_and_update() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = rx.wait_for(|stopped| *stopped) => true,
        }
    }
}

/// Publish failures of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleFailure {
    pub cycle: u64,
    pub errors: Vec<PublishError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub cycles_completed: u64,
    pub messages_published: u64,
    /// One entry per cycle that had at least one failed publish.
    pub failures: Vec<CycleFailure>,
    pub interrupted: bool,
}

impl RunReport {
    pub fn failed_publishes(&self) -> usize {
        self.failures.iter().map(|f| f.errors.len()).sum()
    }
}

/// One emulated device: a dedicated bus connection plus its reading series.
pub struct DeviceSession<C: PubSubClient, R: Rng = StdRng> {
    config: SessionConfig,
    synth: ReadingSynthesizer<R>,
    client: C,
    state: SessionState,
    previous: Option<Reading>,
    stop_signal: StopSignal,
    cycles: u64,
}

impl<C: PubSubClient, R: Rng + Send> DeviceSession<C, R> {
    pub fn new(
        config: SessionConfig,
        synth: ReadingSynthesizer<R>,
        client: C,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            synth,
            client,
            state: SessionState::Disconnected,
            previous: None,
            stop_signal: StopSignal::new(),
            cycles: 0,
        })
    }

    /// Shares `signal` with other sessions so one trigger interrupts them all.
    pub fn with_stop_signal(mut self, signal: StopSignal) -> Self {
        self.stop_signal = signal;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device_id(&self) -> &str {
        self.synth.device_id()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Connects within the configured timeout and announces `online=true`.
    pub async fn start(&mut self) -> Result<()> {
        self.expect_state(SessionState::Disconnected, "start")?;

        let timeout = self.config.connect_timeout;
        match tokio::time::timeout(timeout, self.client.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(device_id = %self.device_id(), "Connection failed: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                error!(device_id = %self.device_id(), "Connection timed out after {:?}", timeout);
                return Err(ConnectionError::Timeout(timeout).into());
            }
        }

        self.state = SessionState::Online;
        info!(device_id = %self.device_id(), topic_base = %self.config.topic_base, "Session online");

        if let Err(e) = self.client.publish(&self.config.online_topic(), "true".to_string()).await {
            warn!(device_id = %self.device_id(), "Failed to announce online: {}", e);
        }
        Ok(())
    }

    /// Runs `n` publish cycles, sleeping `interval` between them (not after
    /// the last). Returns early if the stop signal fires.
    pub async fn run_cycles(&mut self, n: u64) -> Result<RunReport> {
        self.run(Some(n)).await
    }

    /// Publishes until the stop signal fires.
    pub async fn run_until_stopped(&mut self) -> Result<RunReport> {
        self.run(None).await
    }

    async fn run(&mut self, limit: Option<u64>) -> Result<RunReport> {
        self.expect_state(SessionState::Online, "run")?;

        let mut report = RunReport::default();
        loop {
            if limit.is_some_and(|n| report.cycles_completed >= n) {
                break;
            }
            if self.stop_signal.is_triggered() {
                report.interrupted = true;
                break;
            }

            self.cycles += 1;
            let cycle = self.cycles;
            let reading = self.synth.next(self.previous.as_ref());
            info!(
                device_id = %reading.device_id,
                cycle,
                pm25 = reading.pm25,
                pm10 = reading.pm10,
                co2 = reading.co2,
                temperature = reading.temperature,
                humidity = reading.humidity,
                relay = reading.relay_state,
                status = %reading.status,
                "Reading"
            );

            let (published, errors) = self.publish_reading(&reading).await;
            report.messages_published += published;
            if !errors.is_empty() {
                warn!(
                    device_id = %reading.device_id,
                    cycle,
                    failed = errors.len(),
                    "Cycle completed with publish failures"
                );
                report.failures.push(CycleFailure { cycle, errors });
            }
            report.cycles_completed += 1;
            self.previous = Some(reading);

            if limit.is_some_and(|n| report.cycles_completed >= n) {
                break;
            }
            if self.stop_signal.sleep(self.config.interval).await {
                report.interrupted = true;
                break;
            }
        }

        if report.interrupted {
            info!(device_id = %self.device_id(), cycles = report.cycles_completed, "Publish loop interrupted");
        }
        Ok(report)
    }

    /// Publishes every metric independently; one failure never skips the rest.
    async fn publish_reading(&self, reading: &Reading) -> (u64, Vec<PublishError>) {
        let mut errors = Vec::new();
        let mut publications = reading.publications(&self.config.topic_base);

        if let Some(topic) = &self.config.attributes_topic {
            match reading.attributes_json() {
                Ok(payload) => publications.push((topic.clone(), payload)),
                Err(e) => errors.push(PublishError::new(topic.as_str(), e)),
            }
        }

        let mut published = 0;
        for (topic, payload) in publications {
            match self.client.publish(&topic, payload).await {
                Ok(()) => published += 1,
                Err(e) => {
                    warn!(device_id = %reading.device_id, topic = %topic, "Failed to publish: {}", e.reason);
                    errors.push(e);
                }
            }
        }
        (published, errors)
    }

    /// Announces `online=false` (best effort) and closes the connection.
    /// Idempotent; always ends in [`SessionState::Closed`].
    pub async fn stop(&mut self) {
        match self.state {
            SessionState::Closed => return,
            SessionState::Disconnected => {
                self.state = SessionState::Closed;
                return;
            }
            SessionState::Online => {
                match self.client.publish(&self.config.online_topic(), "false".to_string()).await {
                    Ok(()) => info!(device_id = %self.device_id(), "Announced offline"),
                    Err(e) => warn!(device_id = %self.device_id(), "Failed to announce offline: {}", e),
                }
                self.state = SessionState::Offline;
            }
            SessionState::Offline => {}
        }

        if let Err(e) = self.client.disconnect().await {
            warn!(device_id = %self.device_id(), "Disconnect failed: {}", e);
        }
        self.state = SessionState::Closed;
        info!(device_id = %self.device_id(), "Session closed");
    }

    fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(SessionError::InvalidTransition {
                action,
                state: self.state,
            });
        }
        Ok(())
    }
}
