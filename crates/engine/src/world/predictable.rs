use crate::state::StateVector;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("entity cannot advance at tick {tick}")]
    Halted { tick: u64 },
    #[error("simulation dependency unavailable: {0}")]
    Unavailable(&'static str),
}

/// Capability the host simulation implements once per predicted entity
/// archetype. The engine is generic over this and never inspects concrete
/// entity types.
pub trait Predictable {
    type State: StateVector;

    fn current_state(&self) -> Self::State;

    fn snap_to(&mut self, state: &Self::State);

    /// Deterministically advance one fixed tick. An error abandons the
    /// surrounding replay; it never aborts processing of other entities.
    fn step_tick(&mut self, tick: u64) -> Result<Self::State, StepError>;

    fn on_replay_start(&mut self) {}
    fn on_replay_end(&mut self) {}

    /// Called on *other* predicted entities around a neighbor's replay.
    /// Implementations suspend physical interaction and must restore the
    /// saved kinematic/collision configuration exactly on resume.
    fn begin_replay_suspension(&mut self) {}
    fn end_replay_suspension(&mut self) {}
}
