use std::{error::Error, fmt, io};

use comms::msg::RefusalKind;

/// The participant module's result type.
pub type Result<T> = std::result::Result<T, ParticipantErr>;

/// What a `Trainer` may fail with.
pub type TrainErr = Box<dyn Error + Send + Sync>;

/// Participant runtime failures.
#[derive(Debug)]
pub enum ParticipantErr {
    Io(io::Error),
    /// The coordinator refused to evaluate a submission at all.
    Refused { kind: RefusalKind, detail: String },
    UnexpectedMessage { round: u64, got: &'static str },
    ShapeMismatch { got: usize, expected: usize },
    Train(TrainErr),
    InvalidConfig(String),
    /// The coordinator ended the session.
    Disconnected,
}

impl fmt::Display for ParticipantErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Refused { kind, detail } => write!(f, "submission refused ({kind:?}): {detail}"),
            Self::UnexpectedMessage { round, got } => {
                write!(f, "unexpected message at round {round}: got {got}")
            }
            Self::ShapeMismatch { got, expected } => write!(
                f,
                "trainer returned {got} parameters, expected {expected}"
            ),
            Self::Train(e) => write!(f, "training failed: {e}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Disconnected => f.write_str("the coordinator disconnected"),
        }
    }
}

impl Error for ParticipantErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Train(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for ParticipantErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<ParticipantErr> for io::Error {
    fn from(value: ParticipantErr) -> Self {
        match value {
            ParticipantErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
