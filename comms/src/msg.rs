use std::{borrow::Cow, io};

use crate::{Deserialize, Serialize};

type Header = u64;
const HEADER_SIZE: usize = size_of::<Header>();
const WORD_SIZE: usize = size_of::<i64>();

const ERR: Header = 0;
const CONTROL: Header = 1;
const SNAPSHOT: Header = 2;
const UPDATE: Header = 3;
const RESYNC: Header = 4;

/// Why the coordinator refused to look at a submission at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalKind {
    ShapeMismatch,
    InvalidWeight,
    ProtocolViolation,
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Asks for the current global round and parameters.
    Fetch { participant_id: u64 },
    /// The submission was merged into the current window.
    Accepted { current_round: i64 },
    /// The submission was malformed and left no trace on the coordinator.
    Refused { kind: RefusalKind, detail: String },
    Disconnect,
}

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug, PartialEq)]
pub enum Payload<'a> {
    /// A consistent `(round, parameters)` pair, the reply to a fetch.
    Snapshot { round: i64, params: &'a [f64] },
    /// A participant's post-training parameters.
    Update {
        participant_id: u64,
        trained_against_round: i64,
        sample_count: i64,
        params: &'a [f64],
    },
    /// A staleness rejection carrying the parameters to resynchronize with.
    Resync { current_round: i64, params: &'a [f64] },
}

/// The application layer message for the entire system.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// A short, static name of this message's kind for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::Fetch { .. }) => "control/fetch",
            Msg::Control(Command::Accepted { .. }) => "control/accepted",
            Msg::Control(Command::Refused { .. }) => "control/refused",
            Msg::Control(Command::Disconnect) => "control/disconnect",
            Msg::Data(Payload::Snapshot { .. }) => "data/snapshot",
            Msg::Data(Payload::Update { .. }) => "data/update",
            Msg::Data(Payload::Resync { .. }) => "data/resync",
            Msg::Err(_) => "err",
        }
    }

    fn invalid_data<T>(detail: String) -> io::Result<T> {
        Err(io::Error::new(io::ErrorKind::InvalidData, detail))
    }

    /// Splits `N` big endian metadata words off the front of `buf`.
    fn read_words<const N: usize>(buf: &[u8]) -> io::Result<([i64; N], &[u8])> {
        let needed = N * WORD_SIZE;

        if buf.len() < needed {
            return Self::invalid_data(format!(
                "data frame too short: got {} bytes, need at least {needed}",
                buf.len()
            ));
        }

        let (head, rest) = buf.split_at(needed);
        let mut words = [0; N];

        for (word, chunk) in words.iter_mut().zip(head.chunks_exact(WORD_SIZE)) {
            let bytes = chunk
                .try_into()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            *word = i64::from_be_bytes(bytes);
        }

        Ok((words, rest))
    }

    fn read_params(buf: &[u8]) -> io::Result<&[f64]> {
        bytemuck::try_cast_slice(buf).or_else(|e| {
            Self::invalid_data(format!(
                "parameter block of {} bytes is not a valid f64 slice: {e:?}",
                buf.len()
            ))
        })
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR.to_be_bytes());
                Some(e.as_bytes())
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL.to_be_bytes());

                // SAFETY: Serialize impl for `Command` is derived and not implemented
                //         by hand. Nor has a non string-key map inside.
                serde_json::to_writer(buf, cmd).unwrap();
                None
            }
            Msg::Data(payload) => {
                let (kind, words, nwords, params) = match payload {
                    Payload::Snapshot { round, params } => (SNAPSHOT, [*round, 0, 0], 1, *params),
                    Payload::Update {
                        participant_id,
                        trained_against_round,
                        sample_count,
                        params,
                    } => (
                        UPDATE,
                        [
                            *participant_id as i64,
                            *trained_against_round,
                            *sample_count,
                        ],
                        3,
                        *params,
                    ),
                    Payload::Resync {
                        current_round,
                        params,
                    } => (RESYNC, [*current_round, 0, 0], 1, *params),
                };

                buf.extend_from_slice(&kind.to_be_bytes());
                words[..nwords]
                    .iter()
                    .for_each(|word| buf.extend_from_slice(&word.to_be_bytes()));

                Some(bytemuck::cast_slice(params))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::invalid_data(format!(
                "The given buffer is too small {}, must at least be {HEADER_SIZE} bytes",
                buf.len()
            ));
        }

        let (kind_buf, rest) = buf.split_at(HEADER_SIZE);
        let ([kind], _) = Self::read_words::<1>(kind_buf)?;

        match kind as Header {
            ERR => {
                let detail = std::str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(detail)))
            }
            CONTROL => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            SNAPSHOT => {
                let ([round], rest) = Self::read_words::<1>(rest)?;
                let params = Self::read_params(rest)?;
                Ok(Self::Data(Payload::Snapshot { round, params }))
            }
            UPDATE => {
                let ([participant_id, trained_against_round, sample_count], rest) =
                    Self::read_words::<3>(rest)?;

                let participant_id = u64::try_from(participant_id).or_else(|_| {
                    Self::invalid_data(format!("negative participant id {participant_id}"))
                })?;

                let params = Self::read_params(rest)?;
                Ok(Self::Data(Payload::Update {
                    participant_id,
                    trained_against_round,
                    sample_count,
                    params,
                }))
            }
            RESYNC => {
                let ([current_round], rest) = Self::read_words::<1>(rest)?;
                let params = Self::read_params(rest)?;
                Ok(Self::Data(Payload::Resync {
                    current_round,
                    params,
                }))
            }
            other => Self::invalid_data(format!("Received an invalid kind header {other}")),
        }
    }
}
