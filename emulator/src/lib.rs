//! Air-quality monitor emulation: synthesizes sensor readings and publishes
//! them metric by metric over a publish/subscribe bus.

pub mod bus;
pub mod config;
pub mod errors;
pub mod mqtt;
pub mod policy;
pub mod session;
pub mod synth;
pub mod telemetry;

pub use bus::PubSubClient;
pub use errors::{ConfigError, ConnectionError, PublishError, SessionError};
pub use policy::RelayPolicy;
pub use session::{DeviceSession, RunReport, SessionConfig, SessionState, StopSignal};
pub use synth::{ReadingSynthesizer, SynthesizerConfig};
pub use telemetry::{Metric, Reading, Status};
