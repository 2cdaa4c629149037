use std::io;

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinSet,
};

use crate::{
    coordinator::{SubmitOutcome, UpdateSubmission},
    error::SubmitError,
    handle::CoordinatorHandle,
};

/// Serves the coordinator's operations to participants over `comms` channels.
///
/// Every connection gets its own task, they all share the same `Coordinator`.
pub struct CoordinatorServer {
    tasks: JoinSet<io::Result<()>>,
    handle: CoordinatorHandle,
}

impl CoordinatorServer {
    /// Creates a new `CoordinatorServer`.
    ///
    /// # Arguments
    /// * `handle` - The coordinator to serve.
    pub fn new(handle: CoordinatorHandle) -> Self {
        Self {
            tasks: JoinSet::new(),
            handle,
        }
    }

    pub fn handle(&self) -> &CoordinatorHandle {
        &self.handle
    }

    /// The amount of connections still being served.
    pub fn connections(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every connection to finish.
    ///
    /// A failed connection is logged and doesn't stop the others.
    ///
    /// # Returns
    /// An error only if a connection task panicked.
    pub async fn run(&mut self) -> io::Result<()> {
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res? {
                warn!("connection closed with an error: {e}");
            }
        }

        Ok(())
    }

    /// Binds a new participant connection to this server and spawns its serving task.
    ///
    /// # Arguments
    /// * `rx` - The receiving end of the communication.
    /// * `tx` - The sending end of the communication.
    pub fn spawn<R, W>(&mut self, rx: OnoReceiver<R>, tx: OnoSender<W>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let handle = self.handle.clone();
        self.tasks.spawn(serve(handle, rx, tx));
    }
}

/// Answers a single participant's requests until it disconnects or the coordinator shuts down.
async fn serve<R, W>(
    handle: CoordinatorHandle,
    mut rx: OnoReceiver<R>,
    mut tx: OnoSender<W>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    loop {
        let msg: Msg = tokio::select! {
            res = rx.recv() => match res {
                Ok(msg) => msg,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("participant hung up");
                    return Ok(());
                }
                Err(e) => return Err(e),
            },
            _ = handle.cancelled() => {
                info!("coordinator shut down, disconnecting participant");
                tx.send(&Msg::Control(Command::Disconnect)).await?;
                return tx.shutdown().await;
            }
        };

        match msg {
            Msg::Control(Command::Fetch { participant_id }) => {
                let snapshot = handle.fetch(participant_id).await;

                let msg = Msg::Data(Payload::Snapshot {
                    round: snapshot.round as i64,
                    params: snapshot.parameters.as_slice(),
                });

                tx.send(&msg).await?;
            }
            Msg::Data(Payload::Update {
                participant_id,
                trained_against_round,
                sample_count,
                params,
            }) => {
                let res = match decode(&handle, participant_id, trained_against_round, sample_count, params) {
                    Ok(update) => handle.submit(update).await,
                    Err(e) => Err(e),
                };

                match res {
                    Ok(SubmitOutcome::Accepted { current_round, .. }) => {
                        let msg = Msg::Control(Command::Accepted {
                            current_round: current_round as i64,
                        });

                        tx.send(&msg).await?;
                    }
                    Ok(SubmitOutcome::Rejected { current, .. }) => {
                        let msg = Msg::Data(Payload::Resync {
                            current_round: current.round as i64,
                            params: current.parameters.as_slice(),
                        });

                        tx.send(&msg).await?;
                    }
                    Err(e) => {
                        let msg = Msg::Control(Command::Refused {
                            kind: e.refusal_kind(),
                            detail: e.to_string(),
                        });

                        tx.send(&msg).await?;
                    }
                }
            }
            Msg::Control(Command::Disconnect) => {
                tx.send(&Msg::Control(Command::Disconnect)).await?;
                return Ok(());
            }
            Msg::Err(detail) => {
                return Err(io::Error::other(format!("participant reported: {detail}")));
            }
            msg => {
                let kind = msg.kind();
                tx.send(&Msg::Err(format!("unexpected message kind {kind}").into())).await?;

                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("received an unexpected message kind, got: {kind}"),
                ));
            }
        }
    }
}

/// Turns the wire's signed fields into an `UpdateSubmission`.
///
/// # Returns
/// The same `SubmitError` the coordinator would give if the fields are out of range.
fn decode(
    handle: &CoordinatorHandle,
    participant_id: u64,
    trained_against_round: i64,
    sample_count: i64,
    params: &[f64],
) -> Result<UpdateSubmission, SubmitError> {
    let err = if sample_count <= 0 {
        SubmitError::InvalidWeight { got: sample_count }
    } else if trained_against_round < 0 {
        SubmitError::ProtocolViolation {
            trained_against: trained_against_round,
            current: handle.round(),
        }
    } else {
        return Ok(UpdateSubmission {
            participant_id,
            trained_against_round: trained_against_round as u64,
            parameters: params.into(),
            sample_count: sample_count as u64,
        });
    };

    error!(participant_id = participant_id; "refused submission: {err}");
    Err(err)
}
