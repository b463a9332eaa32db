use crate::telemetry::{Reading, Status};

pub const PM25_DANGER: f64 = 35.0;
pub const PM10_DANGER: f64 = 50.0;
pub const CO2_DANGER: u32 = 1000;

pub const PM25_WARNING: f64 = 25.0;
pub const PM10_WARNING: f64 = 35.0;
pub const CO2_WARNING: u32 = 800;

/// Upper limits of one severity tier. A reading exceeds the tier when any
/// metric is strictly above its limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub pm25: f64,
    pub pm10: f64,
    pub co2: u32,
}

impl Thresholds {
    pub fn exceeded_by(&self, r: &Reading) -> bool {
        r.pm25 > self.pm25 || r.pm10 > self.pm10 || r.co2 > self.co2
    }
}

/// Decides the purifier relay and the status label of a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayPolicy {
    pub danger: Thresholds,
    pub warning: Thresholds,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            danger: Thresholds {
                pm25: PM25_DANGER,
                pm10: PM10_DANGER,
                co2: CO2_DANGER,
            },
            warning: Thresholds {
                pm25: PM25_WARNING,
                pm10: PM10_WARNING,
                co2: CO2_WARNING,
            },
        }
    }
}

impl RelayPolicy {
    /// The relay switches on exactly when the danger tier is exceeded.
    pub fn evaluate(&self, r: &Reading) -> (bool, Status) {
        let relay_state = self.danger.exceeded_by(r);
        let status = if relay_state {
            Status::Danger
        } else if self.warning.exceeded_by(r) {
            Status::Warning
        } else {
            Status::Good
        };
        (relay_state, status)
    }

    /// Returns a copy of `r` with relay and status set by this policy.
    pub fn apply(&self, mut r: Reading) -> Reading {
        let (relay_state, status) = self.evaluate(&r);
        r.relay_state = relay_state;
        r.status = status;
        r
    }
}
