use crate::net::ObserverSnapshot;
use crate::state::{BodyState, StateVector};

#[derive(Debug, Clone)]
pub struct ObserverConfig {
    pub seconds_per_tick: f32,
    /// Maximum interpolation factor; past 1.0 the visible state extrapolates
    /// linearly until the cap, then holds.
    pub extrapolation_cap: f32,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            seconds_per_tick: 1.0 / 60.0,
            extrapolation_cap: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Keyed {
    tick: u64,
    body: BodyState,
}

/// Smoothing for entities this client does not own. No prediction, no
/// reconciliation: the visible state blends between the last two received
/// snapshots, extrapolating briefly when the next one is late.
#[derive(Debug)]
pub struct ObserverInterpolator {
    config: ObserverConfig,
    prev: Option<Keyed>,
    next: Option<Keyed>,
    elapsed: f32,
}

impl ObserverInterpolator {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            config,
            prev: None,
            next: None,
            elapsed: 0.0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ObserverConfig::default())
    }

    pub fn push_snapshot(&mut self, snapshot: ObserverSnapshot) {
        if self
            .next
            .as_ref()
            .is_some_and(|next| snapshot.tick <= next.tick)
        {
            log::trace!("dropping stale observer snapshot for tick {}", snapshot.tick);
            return;
        }

        self.prev = self.next.take();
        self.next = Some(Keyed {
            tick: snapshot.tick,
            body: snapshot.body(),
        });
        self.elapsed = 0.0;
    }

    pub fn advance(&mut self, dt: f32) {
        if self.next.is_some() {
            self.elapsed += dt;
        }
    }

    /// Current visible state, or `None` before the first snapshot.
    pub fn sample(&self) -> Option<BodyState> {
        let next = self.next.as_ref()?;
        let Some(prev) = self.prev.as_ref() else {
            return Some(next.body);
        };

        let span_ticks = next.tick.saturating_sub(prev.tick).max(1);
        let span_secs = span_ticks as f32 * self.config.seconds_per_tick;
        let t = (self.elapsed / span_secs).clamp(0.0, self.config.extrapolation_cap);

        Some(prev.body.interpolate(&next.body, t))
    }

    pub fn is_ready(&self) -> bool {
        self.next.is_some()
    }

    pub fn latest_tick(&self) -> Option<u64> {
        self.next.as_ref().map(|k| k.tick)
    }

    pub fn reset(&mut self) {
        self.prev = None;
        self.next = None;
        self.elapsed = 0.0;
    }
}
