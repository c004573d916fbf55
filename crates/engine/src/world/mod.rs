mod predictable;
mod registry;

pub use predictable::{Predictable, StepError};
pub use registry::{EntityId, PredictionWorld, ReconcileAction};
