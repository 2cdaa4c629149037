use std::{error::Error, fmt, io};

use comms::msg::RefusalKind;

use crate::initialization::InitErr;

/// The coordinator module's result type.
pub type Result<T> = std::result::Result<T, CoordinatorErr>;

/// A submission the coordinator refused to evaluate.
///
/// None of these touch the global state nor the aggregation window, and none of
/// them is a staleness rejection, which is a regular `SubmitOutcome`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The submitted vector's shape disagrees with the global parameters.
    ShapeMismatch { expected: usize, got: usize },
    /// The sample count wasn't positive, or too big to fit in the window's total weight.
    InvalidWeight { got: i64 },
    /// The participant claims to have trained against a round that doesn't exist yet.
    ProtocolViolation { trained_against: i64, current: u64 },
}

impl SubmitError {
    /// The wire level name of this error.
    pub fn refusal_kind(&self) -> RefusalKind {
        match self {
            Self::ShapeMismatch { .. } => RefusalKind::ShapeMismatch,
            Self::InvalidWeight { .. } => RefusalKind::InvalidWeight,
            Self::ProtocolViolation { .. } => RefusalKind::ProtocolViolation,
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: got {got} parameters, expected {expected}")
            }
            Self::InvalidWeight { got } if *got > 0 => {
                write!(f, "invalid weight: sample count {got} overflows the window's total weight")
            }
            Self::InvalidWeight { got } => {
                write!(f, "invalid weight: sample count must be positive, got {got}")
            }
            Self::ProtocolViolation {
                trained_against,
                current,
            } => write!(
                f,
                "protocol violation: trained against round {trained_against} but the current round is {current}"
            ),
        }
    }
}

impl Error for SubmitError {}

/// Failures of the coordinator outside of a single submission.
#[derive(Debug)]
pub enum CoordinatorErr {
    /// The configuration can't build a working coordinator.
    InvalidConfig(String),
    /// The initial parameters couldn't be generated.
    Init(InitErr),
    /// A window timeout was configured outside of a tokio runtime.
    NoRuntime,
    /// A checkpoint doesn't match the configured shape.
    Checkpoint { expected: usize, got: usize },
    /// The coordinator was shut down while waiting on it.
    ShutDown,
    Serde(serde_json::Error),
    Io(io::Error),
}

impl fmt::Display for CoordinatorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Init(e) => write!(f, "failed to generate the initial parameters: {e}"),
            Self::NoRuntime => f.write_str("a window timeout requires a running tokio runtime"),
            Self::Checkpoint { expected, got } => write!(
                f,
                "checkpoint holds {got} parameters, the coordinator expects {expected}"
            ),
            Self::ShutDown => f.write_str("the coordinator was shut down"),
            Self::Serde(e) => write!(f, "serde error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for CoordinatorErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Init(e) => Some(e),
            Self::Serde(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CoordinatorErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CoordinatorErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

impl From<InitErr> for CoordinatorErr {
    fn from(value: InitErr) -> Self {
        Self::Init(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<CoordinatorErr> for io::Error {
    fn from(value: CoordinatorErr) -> Self {
        match value {
            CoordinatorErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
