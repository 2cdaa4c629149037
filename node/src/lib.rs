pub mod config;
pub mod simulation;

pub use config::{SimulationConfig, TrainerSpec, Transport};
pub use simulation::{SimulationReport, run, stop_on_signal};
