#[derive(Debug, Clone)]
pub struct PredictionConfig {
    pub state_history_limit: usize,

    /// Position divergence (m) below which an update needs no correction.
    /// Prediction drifts by small float amounts continuously; only
    /// materially wrong predictions should produce a visible correction.
    pub position_correction_threshold: f32,

    pub velocity_correction_threshold: f32,

    /// Server-reported speed (m/s) below which a warranted correction is
    /// applied as a hard snap instead of a replay, killing jitter at rest.
    pub velocity_snap_threshold: f32,

    /// Minimum tick spacing between regular predicted-state recordings.
    pub record_interval_ticks: u64,

    /// Send interval while an entity is idle (server-side throttle).
    pub idle_send_interval_ticks: u64,

    pub idle_speed_threshold: f32,

    /// Hard cap on ticks a single replay may re-simulate.
    pub max_replay_ticks: u64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            state_history_limit: 32,
            position_correction_threshold: 0.10,
            velocity_correction_threshold: 0.5,
            velocity_snap_threshold: 2.0,
            record_interval_ticks: 3,
            idle_send_interval_ticks: 60,
            idle_speed_threshold: 0.05,
            max_replay_ticks: 128,
        }
    }
}
