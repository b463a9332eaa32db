use thiserror::Error;

/// Invalid configuration, detected before anything is synthesized or sent.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{metric}: minimum {min} exceeds maximum {max}")]
    InvertedRange { metric: &'static str, min: f64, max: f64 },

    #[error("{metric}: mean {mean} outside [{min}, {max}]")]
    MeanOutOfRange {
        metric: &'static str,
        mean: f64,
        min: f64,
        max: f64,
    },

    #[error("{0}: value must be finite and non-negative")]
    NegativeSpread(&'static str),

    #[error("{metric}: spread {spread} is too wide to sample")]
    SpreadTooWide { metric: &'static str, spread: f64 },

    #[error("occupancy probability {0} outside [0, 1]")]
    Probability(f64),

    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("password given without a username")]
    PasswordWithoutUsername,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// The bus could not be reached or refused the handshake.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("handshake did not complete within {0:?}")]
    Timeout(std::time::Duration),

    #[error("broker refused connection: {0}")]
    Refused(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// A single message could not be handed to the transport.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("publish to {topic} failed: {reason}")]
pub struct PublishError {
    pub topic: String,
    pub reason: String,
}

impl PublishError {
    pub fn new(topic: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("cannot {action} a session in state {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: crate::session::SessionState,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
