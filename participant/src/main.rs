use std::{env, fs, io};

use log::info;
use participant::{Participant, ParticipantConfig, RemoteClient, SyntheticTrainer};
use tokio::{net::TcpStream, signal};
use tokio_util::sync::CancellationToken;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8765";

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> io::Result<T> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid {key}: {raw}"))
        }),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let mut config = match env::var("CONFIG") {
        Ok(path) => serde_json::from_slice(&fs::read(path)?)?,
        Err(_) => ParticipantConfig::default(),
    };
    config.id = var_or("PARTICIPANT_ID", config.id)?;

    let params = var_or("PARAMS", 1usize)?;
    let trainer = SyntheticTrainer::new(params, 1., config.seed.unwrap_or(config.id))
        .map_err(io::Error::other)?;

    let addr = format!(
        "{}:{}",
        env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string()),
    );

    let stream = TcpStream::connect(&addr).await?;
    let (rx, tx) = comms::tcp(stream);
    info!(participant_id = config.id; "connected to coordinator at {addr}");

    let participant = Participant::new(&config, RemoteClient::new(rx, tx), trainer)?;
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("received SIGTERM");
            on_signal.cancel();
        }
    });

    let metrics = if config.offline {
        participant.run_offline(cancel).await?
    } else {
        participant.run(config.rounds, cancel).await?
    };

    info!(
        participant_id = config.id,
        accepted = metrics.accepted,
        rejected = metrics.rejected,
        acceptance_rate = metrics.acceptance_rate();
        "wrapping up"
    );

    Ok(())
}
