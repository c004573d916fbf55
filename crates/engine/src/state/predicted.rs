use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Contract the prediction engine needs from a state payload. Concrete
/// entity kinds may carry more fields (orientation, movement flags); the
/// engine only ever reads position/velocity and blends whole payloads.
pub trait StateVector: Clone {
    fn position(&self) -> Vec3;
    fn velocity(&self) -> Vec3;

    /// Linear blend toward `other`. `t` past 1.0 extrapolates.
    fn interpolate(&self, other: &Self, t: f32) -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyState {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl BodyState {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self { position, velocity }
    }

    pub fn at_rest(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
        }
    }
}

impl StateVector for BodyState {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn interpolate(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            velocity: self.velocity.lerp(other.velocity, t),
        }
    }
}

/// One recorded point of an entity's own prediction. Ticks are discrete
/// simulation step indices; equality and ordering are exact integer
/// comparisons, never float-epsilon.
#[derive(Debug, Clone)]
pub struct PredictedState<S> {
    pub tick: u64,
    pub state: S,
}

impl<S: StateVector> PredictedState<S> {
    pub fn new(tick: u64, state: S) -> Self {
        Self { tick, state }
    }

    pub fn position(&self) -> Vec3 {
        self.state.position()
    }

    pub fn velocity(&self) -> Vec3 {
        self.state.velocity()
    }
}
