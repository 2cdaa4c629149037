mod vector;
mod window;

pub use vector::ParameterVector;
pub use window::{AggregationWindow, ClosedWindow};
