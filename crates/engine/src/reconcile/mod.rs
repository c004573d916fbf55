mod config;
mod engine;
mod replay;

pub use config::PredictionConfig;
pub use engine::{
    AuthoritativeUpdate, CorrectionPlan, IgnoreReason, Reconciliation, ReconciliationEngine,
};
pub use replay::{ReplayOutcome, ReplayScheduler};
