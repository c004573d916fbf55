use glam::Vec3;

use crate::reconcile::PredictionConfig;
use crate::state::BodyState;

use super::protocol::{AuthoritativeState, ObserverSnapshot, StateFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDecision {
    Skip,
    Send,
    Keepalive,
}

/// Bandwidth-adaptive send gate: every tick while the entity is moving,
/// once per idle interval otherwise.
#[derive(Debug)]
pub struct SendThrottle {
    idle_interval_ticks: u64,
    idle_speed_threshold: f32,
    last_sent_tick: Option<u64>,
}

impl SendThrottle {
    pub fn new(idle_interval_ticks: u64, idle_speed_threshold: f32) -> Self {
        Self {
            idle_interval_ticks,
            idle_speed_threshold,
            last_sent_tick: None,
        }
    }

    pub fn decide(&mut self, tick: u64, velocity: Vec3) -> SendDecision {
        let threshold = self.idle_speed_threshold;
        let moving = velocity.length_squared() >= threshold * threshold;

        if moving {
            self.last_sent_tick = Some(tick);
            return SendDecision::Send;
        }

        let due = self
            .last_sent_tick
            .is_none_or(|last| tick >= last + self.idle_interval_ticks);
        if due {
            self.last_sent_tick = Some(tick);
            SendDecision::Keepalive
        } else {
            SendDecision::Skip
        }
    }

    pub fn mark_sent(&mut self, tick: u64) {
        self.last_sent_tick = Some(tick);
    }
}

/// Server-side per-entity sender. Owns one throttle for the owning client's
/// authoritative stream and one for the coarser observer stream; a pending
/// force-replay latch overrides throttling on the next poll.
pub struct StateSender {
    owner: SendThrottle,
    observer: SendThrottle,
    force_replay_pending: bool,
}

impl StateSender {
    pub fn new(config: &PredictionConfig) -> Self {
        Self {
            owner: SendThrottle::new(config.idle_send_interval_ticks, config.idle_speed_threshold),
            observer: SendThrottle::new(
                config.idle_send_interval_ticks,
                config.idle_speed_threshold,
            ),
            force_replay_pending: false,
        }
    }

    /// Raised by game logic on teleports, knockbacks and explicit desync
    /// corrections. Guarantees the next authoritative poll sends.
    pub fn request_force_replay(&mut self) {
        self.force_replay_pending = true;
    }

    pub fn poll_authoritative(&mut self, tick: u64, body: &BodyState) -> Option<AuthoritativeState> {
        if self.force_replay_pending {
            self.force_replay_pending = false;
            self.owner.mark_sent(tick);
            return Some(AuthoritativeState::from_body(
                tick,
                body,
                StateFlags::FORCE_REPLAY,
            ));
        }

        match self.owner.decide(tick, body.velocity) {
            SendDecision::Skip => None,
            SendDecision::Send => Some(AuthoritativeState::from_body(
                tick,
                body,
                StateFlags::empty(),
            )),
            SendDecision::Keepalive => Some(AuthoritativeState::from_body(
                tick,
                body,
                StateFlags::KEEPALIVE,
            )),
        }
    }

    pub fn poll_observer(&mut self, tick: u64, body: &BodyState) -> Option<ObserverSnapshot> {
        match self.observer.decide(tick, body.velocity) {
            SendDecision::Skip => None,
            SendDecision::Send | SendDecision::Keepalive => {
                Some(ObserverSnapshot::from_body(tick, body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving() -> BodyState {
        BodyState::new(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0))
    }

    fn idle() -> BodyState {
        BodyState::at_rest(Vec3::ZERO)
    }

    #[test]
    fn moving_entity_sends_every_tick() {
        let mut sender = StateSender::new(&PredictionConfig::default());

        for tick in 0..5 {
            let state = sender.poll_authoritative(tick, &moving());
            assert!(state.is_some());
            assert!(!state.unwrap().flags().contains(StateFlags::KEEPALIVE));
        }
    }

    #[test]
    fn idle_entity_throttles_to_interval() {
        let config = PredictionConfig {
            idle_send_interval_ticks: 10,
            ..Default::default()
        };
        let mut sender = StateSender::new(&config);

        let first = sender.poll_authoritative(0, &idle()).unwrap();
        assert!(first.flags().contains(StateFlags::KEEPALIVE));

        for tick in 1..10 {
            assert!(sender.poll_authoritative(tick, &idle()).is_none());
        }
        assert!(sender.poll_authoritative(10, &idle()).is_some());
    }

    #[test]
    fn idle_to_moving_resumes_immediately() {
        let config = PredictionConfig {
            idle_send_interval_ticks: 10,
            ..Default::default()
        };
        let mut sender = StateSender::new(&config);

        assert!(sender.poll_authoritative(0, &idle()).is_some());
        assert!(sender.poll_authoritative(1, &idle()).is_none());
        assert!(sender.poll_authoritative(2, &moving()).is_some());
    }

    #[test]
    fn force_replay_latch_overrides_throttle() {
        let config = PredictionConfig {
            idle_send_interval_ticks: 10,
            ..Default::default()
        };
        let mut sender = StateSender::new(&config);

        assert!(sender.poll_authoritative(0, &idle()).is_some());
        sender.request_force_replay();

        let state = sender.poll_authoritative(1, &idle()).unwrap();
        assert!(state.flags().contains(StateFlags::FORCE_REPLAY));

        // Latch is one-shot.
        assert!(sender.poll_authoritative(2, &idle()).is_none());
    }

    #[test]
    fn observer_stream_throttles_independently() {
        let config = PredictionConfig {
            idle_send_interval_ticks: 10,
            ..Default::default()
        };
        let mut sender = StateSender::new(&config);

        assert!(sender.poll_observer(0, &idle()).is_some());
        assert!(sender.poll_observer(1, &idle()).is_none());

        // Owner stream unaffected by observer sends.
        assert!(sender.poll_authoritative(1, &idle()).is_some());
    }
}
