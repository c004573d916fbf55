use std::collections::HashMap;

use crate::reconcile::{
    AuthoritativeUpdate, IgnoreReason, PredictionConfig, Reconciliation, ReconciliationEngine,
    ReplayOutcome, ReplayScheduler,
};
use crate::state::{PredictedState, StateHistory};

use super::predictable::Predictable;

pub type EntityId = u32;

/// What an authoritative update ended up doing, for stats and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    UnknownEntity,
    Ignored(IgnoreReason),
    Snapped,
    Replayed { ticks: u64 },
}

struct Tracked<P: Predictable> {
    entity: P,
    history: StateHistory<P::State>,
    engine: ReconciliationEngine,
    last_record_tick: Option<u64>,
}

/// Registry of all locally predicted entities. Owns each entity's history
/// exclusively and issues the suspend/resume broadcast around replays.
/// Single-threaded and tick-driven; every operation completes synchronously
/// within the calling tick.
pub struct PredictionWorld<P: Predictable> {
    config: PredictionConfig,
    scheduler: ReplayScheduler,
    entities: HashMap<EntityId, Tracked<P>>,
}

impl<P: Predictable> PredictionWorld<P> {
    pub fn new(config: PredictionConfig) -> Self {
        let scheduler = ReplayScheduler::new(config.max_replay_ticks);
        Self {
            config,
            scheduler,
            entities: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    pub fn register(&mut self, id: EntityId, entity: P) {
        let tracked = Tracked {
            entity,
            history: StateHistory::new(self.config.state_history_limit),
            engine: ReconciliationEngine::new(self.config.clone()),
            last_record_tick: None,
        };
        if self.entities.insert(id, tracked).is_some() {
            log::warn!("entity {} registered twice, previous state dropped", id);
        }
    }

    pub fn unregister(&mut self, id: EntityId) -> Option<P> {
        self.entities.remove(&id).map(|t| t.entity)
    }

    pub fn entity(&self, id: EntityId) -> Option<&P> {
        self.entities.get(&id).map(|t| &t.entity)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut P> {
        self.entities.get_mut(&id).map(|t| &mut t.entity)
    }

    pub fn history(&self, id: EntityId) -> Option<&StateHistory<P::State>> {
        self.entities.get(&id).map(|t| &t.history)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Records the entity's live state after the host stepped it for `tick`,
    /// subject to the minimum recording interval.
    pub fn record_predicted(&mut self, id: EntityId, tick: u64) -> bool {
        let Some(tracked) = self.entities.get_mut(&id) else {
            return false;
        };

        if tracked
            .last_record_tick
            .is_some_and(|last| tick < last + self.config.record_interval_ticks)
        {
            return false;
        }

        let state = tracked.entity.current_state();
        if tracked.history.record(PredictedState::new(tick, state)) {
            tracked.last_record_tick = Some(tick);
            true
        } else {
            false
        }
    }

    /// Sole client-side entry point for authoritative server state. Decides
    /// and applies the correction for one entity; errors never escape to the
    /// caller or affect other entities.
    pub fn apply_authoritative(
        &mut self,
        id: EntityId,
        update: AuthoritativeUpdate<P::State>,
    ) -> ReconcileAction {
        let Some(mut tracked) = self.entities.remove(&id) else {
            log::debug!("authoritative update for unknown entity {}", id);
            return ReconcileAction::UnknownEntity;
        };

        let live = tracked.entity.current_state();
        let action = match tracked.engine.reconcile(&mut tracked.history, &live, update) {
            Reconciliation::Ignored(reason) => ReconcileAction::Ignored(reason),
            Reconciliation::Snap(anchor) => {
                let anchor_tick = anchor.tick;
                tracked.entity.snap_to(&anchor.state);
                tracked.history.clear_and_seed(anchor);
                tracked.last_record_tick = Some(anchor_tick);
                ReconcileAction::Snapped
            }
            Reconciliation::Replay(plan) => {
                // Neighbors must not see the entity teleport mid-replay; the
                // resume broadcast pairs with the suspend one exactly, even
                // when the replay degrades to a snap.
                for other in self.entities.values_mut() {
                    other.entity.begin_replay_suspension();
                }
                let outcome =
                    self.scheduler
                        .run(&mut tracked.entity, &mut tracked.history, &plan);
                for other in self.entities.values_mut() {
                    other.entity.end_replay_suspension();
                }

                match outcome {
                    ReplayOutcome::Replayed { ticks } => {
                        tracked.last_record_tick = Some(plan.target_tick);
                        ReconcileAction::Replayed { ticks }
                    }
                    ReplayOutcome::Snapped => {
                        tracked.last_record_tick = Some(plan.anchor.tick);
                        ReconcileAction::Snapped
                    }
                }
            }
        };

        self.entities.insert(id, tracked);
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BodyState;
    use crate::world::StepError;
    use glam::Vec3;

    struct Mover {
        state: BodyState,
        suspend_count: u32,
        suspended: bool,
    }

    impl Mover {
        fn at(z: f32) -> Self {
            Self {
                state: BodyState::new(Vec3::new(0.0, 0.0, z), Vec3::new(0.0, 0.0, 60.0)),
                suspend_count: 0,
                suspended: false,
            }
        }
    }

    impl Predictable for Mover {
        type State = BodyState;

        fn current_state(&self) -> BodyState {
            self.state
        }

        fn snap_to(&mut self, state: &BodyState) {
            self.state = *state;
        }

        fn step_tick(&mut self, _tick: u64) -> Result<BodyState, StepError> {
            self.state.position.z += 1.0;
            Ok(self.state)
        }

        fn begin_replay_suspension(&mut self) {
            self.suspend_count += 1;
            self.suspended = true;
        }

        fn end_replay_suspension(&mut self) {
            assert!(self.suspended, "resume without matching suspend");
            self.suspended = false;
        }
    }

    fn world() -> PredictionWorld<Mover> {
        let config = PredictionConfig {
            record_interval_ticks: 1,
            ..Default::default()
        };
        PredictionWorld::new(config)
    }

    fn predict_range(world: &mut PredictionWorld<Mover>, id: EntityId, ticks: std::ops::RangeInclusive<u64>) {
        for tick in ticks {
            if let Some(entity) = world.entity_mut(id) {
                let _ = entity.step_tick(tick);
            }
            world.record_predicted(id, tick);
        }
    }

    #[test]
    fn record_interval_throttles() {
        let config = PredictionConfig {
            record_interval_ticks: 3,
            ..Default::default()
        };
        let mut world = PredictionWorld::new(config);
        world.register(1, Mover::at(0.0));

        assert!(world.record_predicted(1, 10));
        assert!(!world.record_predicted(1, 11));
        assert!(!world.record_predicted(1, 12));
        assert!(world.record_predicted(1, 13));
        assert_eq!(world.history(1).unwrap().len(), 2);
    }

    #[test]
    fn unknown_entity_is_reported() {
        let mut world = world();
        let update = AuthoritativeUpdate::new(5, BodyState::at_rest(Vec3::ZERO));
        assert_eq!(
            world.apply_authoritative(99, update),
            ReconcileAction::UnknownEntity
        );
    }

    #[test]
    fn matching_update_leaves_history_untouched() {
        let mut world = world();
        world.register(1, Mover::at(0.0));
        predict_range(&mut world, 1, 1..=6);

        let live = world.entity(1).unwrap().state;
        let update = AuthoritativeUpdate::new(4, live);
        assert_eq!(
            world.apply_authoritative(1, update),
            ReconcileAction::Ignored(IgnoreReason::WithinTolerance)
        );
        assert_eq!(world.history(1).unwrap().len(), 6);
    }

    #[test]
    fn divergent_update_replays_and_suspends_others() {
        let mut world = world();
        world.register(1, Mover::at(0.0));
        world.register(2, Mover::at(50.0));
        predict_range(&mut world, 1, 1..=8);

        // Server disagrees at tick 4 by half a unit.
        let server = BodyState::new(Vec3::new(0.0, 0.0, 3.5), Vec3::new(0.0, 0.0, 60.0));
        let action = world.apply_authoritative(1, AuthoritativeUpdate::new(4, server));
        assert_eq!(action, ReconcileAction::Replayed { ticks: 4 });

        let corrected = world.entity(1).unwrap().state;
        assert!((corrected.position.z - 7.5).abs() < 0.001);

        let neighbor = world.entity(2).unwrap();
        assert_eq!(neighbor.suspend_count, 1);
        assert!(!neighbor.suspended);
    }

    #[test]
    fn snap_reseeds_history() {
        let mut world = world();
        world.register(1, Mover::at(0.0));
        predict_range(&mut world, 1, 1..=6);

        // Tick far beyond the recorded window forces a hard snap.
        let server = BodyState::new(Vec3::new(0.0, 0.0, 40.0), Vec3::new(0.0, 0.0, 60.0));
        let action = world.apply_authoritative(1, AuthoritativeUpdate::new(40, server));
        assert_eq!(action, ReconcileAction::Snapped);

        let history = world.history(1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.oldest_tick(), Some(40));
        assert!((world.entity(1).unwrap().state.position.z - 40.0).abs() < 0.001);
    }
}
