mod protocol;
mod sender;

pub use protocol::{
    AuthoritativeState, ObserverSnapshot, StateFlags, SyncMessage, WireError, DEFAULT_TICK_RATE,
};
pub use sender::{SendDecision, SendThrottle, StateSender};
