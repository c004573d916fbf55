use crate::state::{PredictedState, StateHistory, StateVector};

use super::config::PredictionConfig;

/// One authoritative report from the server about an entity this client
/// predicts. `force_replay` marks teleports, knockbacks and explicit desync
/// corrections that must be applied regardless of divergence.
#[derive(Debug, Clone)]
pub struct AuthoritativeUpdate<S> {
    pub tick: u64,
    pub state: S,
    pub force_replay: bool,
}

impl<S> AuthoritativeUpdate<S> {
    pub fn new(tick: u64, state: S) -> Self {
        Self {
            tick,
            state,
            force_replay: false,
        }
    }

    pub fn forced(tick: u64, state: S) -> Self {
        Self {
            tick,
            state,
            force_replay: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Out-of-order or duplicate delivery; already processed a newer tick.
    Stale,
    /// Fewer than 3 recorded entries; the entity is still initializing.
    WarmingUp,
    /// Divergence is inside the correction thresholds.
    WithinTolerance,
}

/// What a correction pass decided. `Snap` states are applied directly and
/// the history reseeded; `Replay` plans have already truncated the history
/// and inserted the anchor, and are handed to the `ReplayScheduler`.
#[derive(Debug)]
pub enum Reconciliation<S> {
    Ignored(IgnoreReason),
    Snap(PredictedState<S>),
    Replay(CorrectionPlan<S>),
}

/// Anchor plus the tick local prediction had reached before the history was
/// truncated. The scheduler re-simulates `anchor.tick + 1 ..= target_tick`.
#[derive(Debug, Clone)]
pub struct CorrectionPlan<S> {
    pub anchor: PredictedState<S>,
    pub target_tick: u64,
}

/// Per-entity decision maker: given one authoritative update and the local
/// history, produces ignore / hard snap / replay correction. Never retains
/// the history borrow and never lets an internal failure escape; everything
/// unexpected degrades to a snap.
pub struct ReconciliationEngine {
    config: PredictionConfig,
    last_server_tick: Option<u64>,
}

impl ReconciliationEngine {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            config,
            last_server_tick: None,
        }
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    pub fn last_server_tick(&self) -> Option<u64> {
        self.last_server_tick
    }

    pub fn reconcile<S: StateVector>(
        &mut self,
        history: &mut StateHistory<S>,
        live: &S,
        update: AuthoritativeUpdate<S>,
    ) -> Reconciliation<S> {
        if self
            .last_server_tick
            .is_some_and(|last| update.tick <= last)
        {
            log::trace!("dropping stale authoritative update for tick {}", update.tick);
            return Reconciliation::Ignored(IgnoreReason::Stale);
        }
        self.last_server_tick = Some(update.tick);

        let force_replay = update.force_replay;
        let anchor = PredictedState::new(update.tick, update.state);

        if history.len() <= 2 {
            if force_replay {
                return Reconciliation::Snap(anchor);
            }
            return Reconciliation::Ignored(IgnoreReason::WarmingUp);
        }

        if !force_replay && self.within_tolerance(&anchor.state, live) {
            return Reconciliation::Ignored(IgnoreReason::WithinTolerance);
        }

        let (Some(oldest), Some(newest)) = (history.oldest_tick(), history.newest_tick()) else {
            return Reconciliation::Snap(anchor);
        };

        if update.tick < oldest || update.tick > newest {
            if history.is_full() {
                log::warn!(
                    "authoritative tick {} outside recorded window {}..={} with a full buffer",
                    update.tick,
                    oldest,
                    newest
                );
            }
            return Reconciliation::Snap(anchor);
        }

        let (after_index, sampled) = match history.sample(update.tick) {
            Some(point) => {
                let sampled = if point.exact {
                    point.before.state.clone()
                } else if let Some(after) = history.get(point.after_index) {
                    let span = (after.tick - point.before.tick) as f32;
                    let t = (update.tick - point.before.tick) as f32 / span;
                    point.before.state.interpolate(&after.state, t)
                } else {
                    point.before.state.clone()
                };
                (point.after_index, sampled)
            }
            None => {
                log::error!(
                    "sampling tick {} failed inside recorded window {}..={}",
                    update.tick,
                    oldest,
                    newest
                );
                return Reconciliation::Snap(anchor);
            }
        };

        if !force_replay && self.within_tolerance(&anchor.state, &sampled) {
            return Reconciliation::Ignored(IgnoreReason::WithinTolerance);
        }

        let snap_speed = self.config.velocity_snap_threshold;
        if anchor.velocity().length_squared() < snap_speed * snap_speed {
            return Reconciliation::Snap(anchor);
        }

        let target_tick = newest;
        history.truncate_from(after_index);
        if !history.record(anchor.clone()) {
            log::error!("failed to re-anchor history at tick {}", anchor.tick);
            return Reconciliation::Snap(anchor);
        }

        Reconciliation::Replay(CorrectionPlan {
            anchor,
            target_tick,
        })
    }

    fn within_tolerance<S: StateVector>(&self, server: &S, client: &S) -> bool {
        let pos_threshold = self.config.position_correction_threshold;
        let vel_threshold = self.config.velocity_correction_threshold;

        let pos_error = server.position().distance_squared(client.position());
        let vel_error = server.velocity().distance_squared(client.velocity());

        pos_error < pos_threshold * pos_threshold && vel_error < vel_threshold * vel_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BodyState;
    use glam::Vec3;

    const TICK_SPEED: f32 = 60.0;

    fn moving_state(tick: u64) -> PredictedState<BodyState> {
        PredictedState::new(
            tick,
            BodyState::new(
                Vec3::new(0.0, 0.0, tick as f32),
                Vec3::new(0.0, 0.0, TICK_SPEED),
            ),
        )
    }

    fn filled_history(ticks: &[u64]) -> StateHistory<BodyState> {
        let mut history = StateHistory::new(32);
        for &tick in ticks {
            history.record(moving_state(tick));
        }
        history
    }

    fn engine() -> ReconciliationEngine {
        ReconciliationEngine::new(PredictionConfig::default())
    }

    #[test]
    fn stale_updates_dropped() {
        let mut engine = engine();
        let mut history = filled_history(&[10, 11, 12, 13]);
        let live = moving_state(13).state;

        let update = AuthoritativeUpdate::new(12, moving_state(12).state);
        assert!(matches!(
            engine.reconcile(&mut history, &live, update),
            Reconciliation::Ignored(_)
        ));

        let update = AuthoritativeUpdate::new(11, moving_state(11).state);
        assert!(matches!(
            engine.reconcile(&mut history, &live, update),
            Reconciliation::Ignored(IgnoreReason::Stale)
        ));
    }

    #[test]
    fn warm_up_discards_unless_forced() {
        let mut engine = engine();
        let mut history = filled_history(&[10, 11]);
        let live = moving_state(11).state;

        let server = BodyState::new(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO);
        let update = AuthoritativeUpdate::new(10, server);
        assert!(matches!(
            engine.reconcile(&mut history, &live, update),
            Reconciliation::Ignored(IgnoreReason::WarmingUp)
        ));

        let update = AuthoritativeUpdate::forced(11, server);
        assert!(matches!(
            engine.reconcile(&mut history, &live, update),
            Reconciliation::Snap(_)
        ));
    }

    #[test]
    fn matching_live_state_short_circuits() {
        let mut engine = engine();
        let mut history = filled_history(&[10, 11, 12, 13]);
        let live = moving_state(13).state;
        let before = history.len();

        let update = AuthoritativeUpdate::new(12, live);
        assert!(matches!(
            engine.reconcile(&mut history, &live, update),
            Reconciliation::Ignored(IgnoreReason::WithinTolerance)
        ));
        assert_eq!(history.len(), before);
    }

    #[test]
    fn out_of_window_snaps() {
        let mut engine = engine();
        let mut history = filled_history(&[10, 11, 12, 13]);
        let live = BodyState::at_rest(Vec3::ONE);

        let update = AuthoritativeUpdate::new(5, BodyState::at_rest(Vec3::ZERO));
        assert!(matches!(
            engine.reconcile(&mut history, &live, update),
            Reconciliation::Snap(_)
        ));

        let update = AuthoritativeUpdate::new(20, BodyState::at_rest(Vec3::ZERO));
        assert!(matches!(
            engine.reconcile(&mut history, &live, update),
            Reconciliation::Snap(_)
        ));
    }

    #[test]
    fn divergence_below_threshold_is_ignored() {
        let mut engine = engine();
        let mut history = filled_history(&[10, 11, 12, 13]);
        let live = BodyState::at_rest(Vec3::splat(100.0));

        let mut server = moving_state(12).state;
        server.position.z += 0.09;
        let update = AuthoritativeUpdate::new(12, server);
        assert!(matches!(
            engine.reconcile(&mut history, &live, update),
            Reconciliation::Ignored(IgnoreReason::WithinTolerance)
        ));
    }

    #[test]
    fn divergence_above_threshold_corrects() {
        let mut engine = engine();
        let mut history = filled_history(&[10, 11, 12, 13]);
        let live = BodyState::at_rest(Vec3::splat(100.0));

        let mut server = moving_state(12).state;
        server.position.z += 0.11;
        let update = AuthoritativeUpdate::new(12, server);

        match engine.reconcile(&mut history, &live, update) {
            Reconciliation::Replay(plan) => {
                assert_eq!(plan.anchor.tick, 12);
                assert_eq!(plan.target_tick, 13);
            }
            other => panic!("expected replay, got {:?}", other),
        }

        let ticks: Vec<u64> = history.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![10, 11, 12]);
        assert!((history.last_recorded().unwrap().position().z - 12.11).abs() < 0.001);
    }

    #[test]
    fn correction_truncates_at_bracketing_index() {
        let mut engine = engine();
        let mut history = filled_history(&[5, 10, 15, 20]);
        let live = BodyState::at_rest(Vec3::splat(100.0));

        let server = BodyState::new(Vec3::new(0.0, 0.0, 11.0), Vec3::new(0.0, 0.0, TICK_SPEED));
        let update = AuthoritativeUpdate::new(12, server);

        match engine.reconcile(&mut history, &live, update) {
            Reconciliation::Replay(plan) => assert_eq!(plan.target_tick, 20),
            other => panic!("expected replay, got {:?}", other),
        }

        let ticks: Vec<u64> = history.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![5, 10, 12]);
    }

    #[test]
    fn slow_server_state_snaps_instead_of_replaying() {
        let mut engine = engine();
        let mut history = filled_history(&[10, 11, 12, 13]);
        let live = BodyState::at_rest(Vec3::splat(100.0));

        // Well past the position threshold, but nearly at rest.
        let server = BodyState::new(Vec3::new(0.0, 0.0, 50.0), Vec3::new(0.0, 0.0, 0.5));
        let update = AuthoritativeUpdate::new(12, server);

        assert!(matches!(
            engine.reconcile(&mut history, &live, update),
            Reconciliation::Snap(_)
        ));
    }

    #[test]
    fn forced_update_bypasses_tolerance() {
        let mut engine = engine();
        let mut history = filled_history(&[10, 11, 12, 13]);
        // Live and server agree exactly; a plain update would be ignored.
        let live = moving_state(12).state;

        let update = AuthoritativeUpdate::forced(12, live);
        assert!(matches!(
            engine.reconcile(&mut history, &live, update),
            Reconciliation::Replay(_)
        ));
    }
}
