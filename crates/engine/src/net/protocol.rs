use bitflags::bitflags;
use glam::Vec3;
use rkyv::{rancor, Archive, Deserialize, Serialize};

use crate::reconcile::AuthoritativeUpdate;
use crate::state::BodyState;

pub const DEFAULT_TICK_RATE: u32 = 60;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StateFlags: u8 {
        /// Teleport, knockback or explicit desync correction; the receiver
        /// must apply it regardless of divergence.
        const FORCE_REPLAY = 1 << 0;
        /// Idle-throttle beat rather than a movement update.
        const KEEPALIVE = 1 << 1;
    }
}

fn encode_velocity(vel: Vec3) -> [i16; 3] {
    const MAX: f32 = 327.67;
    [
        (vel.x.clamp(-MAX, MAX) * 100.0) as i16,
        (vel.y.clamp(-MAX, MAX) * 100.0) as i16,
        (vel.z.clamp(-MAX, MAX) * 100.0) as i16,
    ]
}

fn decode_velocity(vel: [i16; 3]) -> Vec3 {
    Vec3::new(
        vel[0] as f32 / 100.0,
        vel[1] as f32 / 100.0,
        vel[2] as f32 / 100.0,
    )
}

/// Server → owning client. Positions travel at full precision, velocity
/// quantized at 1/100 m/s.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct AuthoritativeState {
    pub tick: u64,
    pub position: [f32; 3],
    pub velocity: [i16; 3],
    pub flags: u8,
}

impl AuthoritativeState {
    pub fn from_body(tick: u64, body: &BodyState, flags: StateFlags) -> Self {
        Self {
            tick,
            position: body.position.into(),
            velocity: encode_velocity(body.velocity),
            flags: flags.bits(),
        }
    }

    pub fn body(&self) -> BodyState {
        BodyState::new(Vec3::from(self.position), decode_velocity(self.velocity))
    }

    pub fn flags(&self) -> StateFlags {
        StateFlags::from_bits_truncate(self.flags)
    }

    pub fn to_update(&self) -> AuthoritativeUpdate<BodyState> {
        AuthoritativeUpdate {
            tick: self.tick,
            state: self.body(),
            force_replay: self.flags().contains(StateFlags::FORCE_REPLAY),
        }
    }
}

/// Server → non-owning observers; consumed only by the observer
/// interpolation path, never by reconciliation.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ObserverSnapshot {
    pub tick: u64,
    pub position: [f32; 3],
    pub velocity: [i16; 3],
}

impl ObserverSnapshot {
    pub fn from_body(tick: u64, body: &BodyState) -> Self {
        Self {
            tick,
            position: body.position.into(),
            velocity: encode_velocity(body.velocity),
        }
    }

    pub fn body(&self) -> BodyState {
        BodyState::new(Vec3::from(self.position), decode_velocity(self.velocity))
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum SyncMessage {
    Authoritative {
        entity_id: u32,
        state: AuthoritativeState,
    },
    Observer {
        entity_id: u32,
        snapshot: ObserverSnapshot,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl SyncMessage {
    pub fn serialize(&self) -> Result<Vec<u8>, WireError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(WireError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, WireError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(WireError::Deserialize)
    }
}
