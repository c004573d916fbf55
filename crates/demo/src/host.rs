use glam::Vec3;
use rapier3d::dynamics::{RigidBodyHandle, RigidBodyType};

use rewind::{BodyState, Predictable, StepError};

use crate::physics::PhysicsWorld;

/// Deterministic movement plan keyed by tick, shared by the server and the
/// predicting client so a replayed tick reproduces the original movement.
#[derive(Debug, Clone)]
pub struct MovementScript {
    pub speed: f32,
    pub idle_from: u64,
    pub idle_until: u64,
}

impl MovementScript {
    pub fn velocity_at(&self, tick: u64) -> Vec3 {
        if tick >= self.idle_from && tick < self.idle_until {
            Vec3::ZERO
        } else {
            Vec3::new(self.speed, 0.0, self.speed * 0.5)
        }
    }
}

/// Kinematic mover backed by its own small physics world. The client's copy
/// carries a constant velocity bias so local prediction drifts away from the
/// server and has to be reconciled.
pub struct HostBody {
    physics: PhysicsWorld,
    handle: RigidBodyHandle,
    script: MovementScript,
    bias: Vec3,
    velocity: Vec3,
    dt: f32,
    suspended: Option<(RigidBodyType, Vec3)>,
}

impl HostBody {
    pub fn new(spawn: Vec3, script: MovementScript, bias: Vec3, tick_rate: u32) -> Self {
        let dt = 1.0 / tick_rate as f32;
        let mut physics = PhysicsWorld::new(dt);
        physics.add_ground(-1.0, 200.0);
        let handle = physics.add_kinematic_sphere(spawn, 0.5);

        Self {
            physics,
            handle,
            script,
            bias,
            velocity: Vec3::ZERO,
            dt,
            suspended: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.physics.body_position(self.handle).unwrap_or(Vec3::ZERO)
    }

    pub fn teleport(&mut self, position: Vec3) {
        self.physics.set_body_position(self.handle, position);
    }
}

impl Predictable for HostBody {
    type State = BodyState;

    fn current_state(&self) -> BodyState {
        BodyState::new(self.position(), self.velocity)
    }

    fn snap_to(&mut self, state: &BodyState) {
        self.physics.set_body_position(self.handle, state.position);
        self.physics.set_body_velocity(self.handle, state.velocity);
        self.velocity = state.velocity;
    }

    fn step_tick(&mut self, tick: u64) -> Result<BodyState, StepError> {
        let position = self
            .physics
            .body_position(self.handle)
            .ok_or(StepError::Unavailable("rigid body missing"))?;

        let velocity = self.script.velocity_at(tick) + self.bias;
        self.physics
            .set_next_kinematic_position(self.handle, position + velocity * self.dt);
        self.physics.step();
        self.velocity = velocity;

        Ok(self.current_state())
    }

    fn begin_replay_suspension(&mut self) {
        let Some(body) = self.physics.body_mut(self.handle) else {
            return;
        };
        self.suspended = Some((body.body_type(), self.velocity));
        body.set_body_type(RigidBodyType::Fixed, true);
        self.velocity = Vec3::ZERO;
    }

    fn end_replay_suspension(&mut self) {
        let Some((body_type, velocity)) = self.suspended.take() else {
            return;
        };
        if let Some(body) = self.physics.body_mut(self.handle) {
            body.set_body_type(body_type, true);
        }
        self.velocity = velocity;
        self.physics.set_body_velocity(self.handle, velocity);
    }
}
