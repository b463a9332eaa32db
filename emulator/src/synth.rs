//! Reading synthesis.
//!
//! Values follow a mean-reverting random walk: the first reading is drawn
//! around each metric's mean, every later one moves from the previous reading
//! by a step of at most `max_step`. Results are clamped to the metric range
//! and rounded to the precision the sensors report (0.1 for particulates,
//! temperature and humidity, whole ppm for co2).

use crate::errors::ConfigError;
use crate::policy::RelayPolicy;
use crate::telemetry::{now_millis, Reading, Status};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fraction of the distance to the target mean recovered per tick.
const REVERSION: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Half-width of the uniform noise added each tick.
    pub jitter: f64,
    /// Largest change between consecutive readings.
    pub max_step: f64,
}

impl MetricRange {
    pub const fn new(min: f64, max: f64, mean: f64, jitter: f64, max_step: f64) -> Self {
        Self {
            min,
            max,
            mean,
            jitter,
            max_step,
        }
    }

    fn validate(&self, metric: &'static str) -> Result<(), ConfigError> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(ConfigError::InvertedRange {
                metric,
                min: self.min,
                max: self.max,
            });
        }
        self.check_mean(metric, self.mean)?;
        for spread in [self.jitter, self.max_step] {
            if !spread.is_finite() || spread < 0.0 {
                return Err(ConfigError::NegativeSpread(metric));
            }
        }
        // the noise range spans 2 * jitter
        if !(2.0 * self.jitter).is_finite() {
            return Err(ConfigError::SpreadTooWide {
                metric,
                spread: self.jitter,
            });
        }
        Ok(())
    }

    fn check_mean(&self, metric: &'static str, mean: f64) -> Result<(), ConfigError> {
        if !mean.is_finite() || mean < self.min || mean > self.max {
            return Err(ConfigError::MeanOutOfRange {
                metric,
                mean,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Rounds to 0.1 without leaving the range, so bounds that are not
    /// multiples of 0.1 still hold.
    fn round_within(&self, value: f64) -> f64 {
        round1(value).clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizerConfig {
    pub pm25: MetricRange,
    /// pm10 = pm25 + uniform(`pm10_offset.0`, `pm10_offset.1`)
    pub pm10_offset: (f64, f64),
    /// `co2.mean` is the vacant-room level.
    pub co2: MetricRange,
    pub co2_occupied_mean: f64,
    pub occupancy_probability: f64,
    pub temperature: MetricRange,
    pub humidity: MetricRange,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            pm25: MetricRange::new(5.0, 100.0, 25.0, 5.0, 4.0),
            pm10_offset: (10.0, 20.0),
            co2: MetricRange::new(400.0, 2000.0, 450.0, 75.0, 60.0),
            co2_occupied_mean: 800.0,
            occupancy_probability: 0.7,
            temperature: MetricRange::new(18.0, 32.0, 24.0, 1.0, 0.5),
            humidity: MetricRange::new(30.0, 80.0, 50.0, 5.0, 2.0),
        }
    }
}

impl SynthesizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pm25.validate("pm25")?;
        self.co2.validate("co2")?;
        self.co2.check_mean("co2_occupied_mean", self.co2_occupied_mean)?;
        // co2 is reported in whole ppm
        if self.co2.min < 0.0 || self.co2.min.ceil() > self.co2.max.floor() {
            return Err(ConfigError::InvertedRange {
                metric: "co2",
                min: self.co2.min,
                max: self.co2.max,
            });
        }
        self.temperature.validate("temperature")?;
        self.humidity.validate("humidity")?;

        let (lo, hi) = self.pm10_offset;
        if !lo.is_finite() || lo < 0.0 {
            return Err(ConfigError::NegativeSpread("pm10_offset"));
        }
        if !hi.is_finite() || lo > hi {
            return Err(ConfigError::InvertedRange {
                metric: "pm10_offset",
                min: lo,
                max: hi,
            });
        }
        if !(0.0..=1.0).contains(&self.occupancy_probability) {
            return Err(ConfigError::Probability(self.occupancy_probability));
        }
        Ok(())
    }
}

/// Produces successive readings for one device.
pub struct ReadingSynthesizer<R: Rng = StdRng> {
    device_id: String,
    config: SynthesizerConfig,
    policy: RelayPolicy,
    rng: R,
}

impl ReadingSynthesizer<StdRng> {
    pub fn from_entropy(
        device_id: impl Into<String>,
        config: SynthesizerConfig,
    ) -> Result<Self, ConfigError> {
        Self::new(device_id, config, StdRng::from_entropy())
    }

    pub fn seeded(
        device_id: impl Into<String>,
        config: SynthesizerConfig,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        Self::new(device_id, config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ReadingSynthesizer<R> {
    pub fn new(
        device_id: impl Into<String>,
        config: SynthesizerConfig,
        rng: R,
    ) -> Result<Self, ConfigError> {
        let device_id = device_id.into();
        if device_id.is_empty() {
            return Err(ConfigError::Empty("device_id"));
        }
        config.validate()?;
        Ok(Self {
            device_id,
            config,
            policy: RelayPolicy::default(),
            rng,
        })
    }

    pub fn with_policy(mut self, policy: RelayPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    pub fn next(&mut self, previous: Option<&Reading>) -> Reading {
        let cfg = self.config.clone();

        let pm25 = cfg
            .pm25
            .round_within(self.sample(cfg.pm25, cfg.pm25.mean, previous.map(|p| p.pm25)));
        let (lo, hi) = cfg.pm10_offset;
        let pm10 = round1(pm25 + self.rng.gen_range(lo..=hi)).max(pm25);

        let occupied = self.rng.gen_bool(cfg.occupancy_probability);
        let co2_target = if occupied {
            cfg.co2_occupied_mean
        } else {
            cfg.co2.mean
        };
        let co2 = self
            .sample(cfg.co2, co2_target, previous.map(|p| f64::from(p.co2)))
            .round()
            .clamp(cfg.co2.min.ceil(), cfg.co2.max.floor()) as u32;

        let temperature = cfg.temperature.round_within(self.sample(
            cfg.temperature,
            cfg.temperature.mean,
            previous.map(|p| p.temperature),
        ));
        let humidity = cfg.humidity.round_within(self.sample(
            cfg.humidity,
            cfg.humidity.mean,
            previous.map(|p| p.humidity),
        ));

        self.policy.apply(Reading {
            device_id: self.device_id.clone(),
            captured_at: now_millis(),
            pm25,
            pm10,
            co2,
            temperature,
            humidity,
            relay_state: false,
            status: Status::Good,
            online: true,
        })
    }

    fn sample(&mut self, range: MetricRange, target: f64, previous: Option<f64>) -> f64 {
        let noise = self.rng.gen_range(-range.jitter..=range.jitter);
        let value = match previous {
            Some(prev) => {
                let step = ((target - prev) * REVERSION + noise).clamp(-range.max_step, range.max_step);
                prev + step
            }
            None => target + noise,
        };
        value.clamp(range.min, range.max)
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
