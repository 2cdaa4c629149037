use std::{env, io};

use coordinator::{Coordinator, CoordinatorConfig, CoordinatorHandle, CoordinatorServer};
use log::{info, warn};
use tokio::{net::TcpListener, signal};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8765";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config = match env::var("CONFIG") {
        Ok(path) => CoordinatorConfig::from_file(path)?,
        Err(_) => CoordinatorConfig::default(),
    };

    let addr = format!(
        "{}:{}",
        env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string()),
    );

    let coordinator = Coordinator::from_config(&config)?;
    let mut server = CoordinatorServer::new(CoordinatorHandle::new(coordinator.clone()));

    let list = TcpListener::bind(&addr).await?;
    info!(round = coordinator.round(); "coordinator listening at {addr}");

    let finished = async {
        match config.total_rounds {
            Some(total) => coordinator.wait_for_round(total).await.map(|_| ()),
            None => std::future::pending().await,
        }
    };
    tokio::pin!(finished);

    loop {
        tokio::select! {
            res = list.accept() => {
                let (stream, peer) = res?;
                info!("participant connected from {peer}");

                let (rx, tx) = comms::tcp(stream);
                server.spawn(rx, tx);
            }
            res = &mut finished => {
                if res.is_ok() {
                    info!(round = coordinator.round(); "reached the last round");
                }
                break;
            }
            _ = signal::ctrl_c() => {
                info!("received SIGTERM");
                break;
            }
        }
    }

    coordinator.shutdown();
    server.run().await?;

    let stats = coordinator.stats();
    info!(
        accepted = stats.accepted,
        rejected = stats.rejected,
        merges = stats.merges,
        timeouts = stats.timeouts;
        "run finished"
    );

    if let Some(path) = &config.checkpoint {
        match coordinator.snapshot().save(path) {
            Ok(()) => info!("checkpoint written to {}", path.display()),
            Err(e) => warn!("failed to write the checkpoint: {e}"),
        }
    }

    Ok(())
}
