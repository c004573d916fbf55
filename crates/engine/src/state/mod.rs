mod history;
mod predicted;

pub use history::{SamplePoint, StateHistory};
pub use predicted::{BodyState, PredictedState, StateVector};
