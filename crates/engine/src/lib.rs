pub mod interpolate;
pub mod net;
pub mod reconcile;
pub mod state;
pub mod world;

pub use interpolate::{ObserverConfig, ObserverInterpolator};
pub use net::{
    AuthoritativeState, ObserverSnapshot, SendDecision, SendThrottle, StateFlags, StateSender,
    SyncMessage, WireError, DEFAULT_TICK_RATE,
};
pub use reconcile::{
    AuthoritativeUpdate, CorrectionPlan, IgnoreReason, PredictionConfig, Reconciliation,
    ReconciliationEngine, ReplayOutcome, ReplayScheduler,
};
pub use state::{BodyState, PredictedState, SamplePoint, StateHistory, StateVector};
pub use world::{EntityId, Predictable, PredictionWorld, ReconcileAction, StepError};
