use crate::state::{PredictedState, StateHistory};
use crate::world::Predictable;

use super::engine::CorrectionPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Replayed { ticks: u64 },
    Snapped,
}

/// Re-simulates a corrected entity from its anchor forward to the tick local
/// prediction had reached, re-recording each intermediate state. Anything
/// that prevents a clean replay (window too short, span past the cap, a step
/// failure) falls back to snapping the anchor; a replay is never left
/// partially applied.
pub struct ReplayScheduler {
    max_ticks: u64,
}

impl ReplayScheduler {
    pub fn new(max_ticks: u64) -> Self {
        Self { max_ticks }
    }

    pub fn run<P: Predictable>(
        &self,
        entity: &mut P,
        history: &mut StateHistory<P::State>,
        plan: &CorrectionPlan<P::State>,
    ) -> ReplayOutcome {
        let span = plan.target_tick.saturating_sub(plan.anchor.tick);
        if span <= 1 {
            return self.snap(entity, history, plan);
        }
        if span > self.max_ticks {
            log::warn!(
                "replay span {} past hard cap {}, snapping instead",
                span,
                self.max_ticks
            );
            return self.snap(entity, history, plan);
        }

        entity.on_replay_start();
        entity.snap_to(&plan.anchor.state);

        for tick in plan.anchor.tick + 1..=plan.target_tick {
            match entity.step_tick(tick) {
                Ok(state) => {
                    history.record(PredictedState::new(tick, state));
                }
                Err(err) => {
                    log::warn!("replay abandoned at tick {}: {}", tick, err);
                    entity.on_replay_end();
                    return self.snap(entity, history, plan);
                }
            }
        }

        entity.on_replay_end();
        ReplayOutcome::Replayed { ticks: span }
    }

    fn snap<P: Predictable>(
        &self,
        entity: &mut P,
        history: &mut StateHistory<P::State>,
        plan: &CorrectionPlan<P::State>,
    ) -> ReplayOutcome {
        entity.snap_to(&plan.anchor.state);
        history.clear_and_seed(plan.anchor.clone());
        ReplayOutcome::Snapped
    }
}
