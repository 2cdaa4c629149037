use std::env;

use anyhow::Result;
use log::info;
use node::SimulationConfig;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match env::var("CONFIG") {
        Ok(path) => SimulationConfig::from_file(path)?,
        Err(_) => SimulationConfig::default(),
    };

    let stop = CancellationToken::new();
    node::stop_on_signal(stop.clone());

    let report = node::run(config, stop).await?;

    for summary in &report.history {
        info!(
            round = summary.round,
            aggregated_from = summary.aggregated_from,
            total_weight = summary.total_weight,
            avg_staleness = summary.avg_staleness;
            "merge ({:?})", summary.trigger
        );
    }

    for (id, metrics) in &report.participants {
        info!(
            participant_id = *id,
            rounds = metrics.rounds,
            accepted = metrics.accepted,
            rejected = metrics.rejected,
            delayed_ms = metrics.delayed.as_millis() as u64;
            "participant summary"
        );
    }

    info!(
        round = report.final_state.round,
        accepted = report.stats.accepted,
        rejected = report.stats.rejected,
        timeouts = report.stats.timeouts;
        "simulation finished, weighted quality metric {:.6}",
        report.weighted_metric().unwrap_or(f64::NAN)
    );

    Ok(())
}
