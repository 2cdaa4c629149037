use std::{io, sync::Arc};

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use coordinator::{GlobalModelState, UpdateSubmission};
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{CoordinatorClient, SubmitReply};
use crate::error::{ParticipantErr, Result};

/// Talks to a coordinator over a `comms` channel.
///
/// Contract:
/// - `Command::Fetch` is answered with `Payload::Snapshot`
/// - `Payload::Update` is answered with `Command::Accepted`, `Payload::Resync`
///   or `Command::Refused`
pub struct RemoteClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
    round: u64,
}

impl<R, W> RemoteClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(rx: OnoReceiver<R>, tx: OnoSender<W>) -> Self {
        Self { rx, tx, round: 0 }
    }

    /// Converts a round received from the coordinator, which is never negative.
    fn round(round: i64) -> io::Result<u64> {
        u64::try_from(round).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("coordinator sent a negative round {round}"),
            )
        })
    }

    /// Rebuilds a global state from the wire's signed round and borrowed parameters.
    fn state(round: i64, params: &[f64]) -> Result<Arc<GlobalModelState>> {
        Ok(Arc::new(GlobalModelState {
            round: Self::round(round)?,
            parameters: params.into(),
        }))
    }

    fn unexpected<T>(round: u64, msg: Msg) -> Result<T> {
        match msg {
            Msg::Control(Command::Disconnect) => Err(ParticipantErr::Disconnected),
            Msg::Err(detail) => Err(io::Error::other(format!("coordinator reported: {detail}")).into()),
            msg => Err(ParticipantErr::UnexpectedMessage {
                round,
                got: msg.kind(),
            }),
        }
    }
}

impl<R, W> CoordinatorClient for RemoteClient<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn fetch(&mut self, participant_id: u64) -> Result<Arc<GlobalModelState>> {
        let msg = Msg::Control(Command::Fetch { participant_id });
        self.tx.send(&msg).await?;

        let msg: Msg = self.rx.recv().await?;
        let Msg::Data(Payload::Snapshot { round, params }) = msg else {
            return Self::unexpected(self.round, msg);
        };

        let state = Self::state(round, params)?;
        self.round = state.round;
        Ok(state)
    }

    async fn submit(&mut self, update: UpdateSubmission) -> Result<SubmitReply> {
        let msg = Msg::Data(Payload::Update {
            participant_id: update.participant_id,
            trained_against_round: update.trained_against_round as i64,
            sample_count: update.sample_count as i64,
            params: update.parameters.as_slice(),
        });
        self.tx.send(&msg).await?;

        let msg: Msg = self.rx.recv().await?;
        match msg {
            Msg::Control(Command::Accepted { current_round }) => {
                self.round = Self::round(current_round)?;
                Ok(SubmitReply::Accepted {
                    current_round: self.round,
                })
            }
            Msg::Data(Payload::Resync {
                current_round,
                params,
            }) => {
                let current = Self::state(current_round, params)?;
                self.round = current.round;
                Ok(SubmitReply::Rejected { current })
            }
            Msg::Control(Command::Refused { kind, detail }) => {
                Err(ParticipantErr::Refused { kind, detail })
            }
            msg => Self::unexpected(self.round, msg),
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.tx.send(&Msg::Control(Command::Disconnect)).await?;

        let res: io::Result<Msg> = self.rx.recv().await;
        match res {
            Ok(Msg::Control(Command::Disconnect)) => {}
            Ok(msg) => debug!("expected a disconnect echo, got {}", msg.kind()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
            Err(e) => return Err(e.into()),
        }

        self.tx.shutdown().await?;
        Ok(())
    }
}
