use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub loss_percent: f32,
    pub min_latency_ticks: u64,
    pub max_latency_ticks: u64,
    pub seed: u64,
}

#[derive(Debug)]
struct QueuedMessage {
    deliver_at: u64,
    sequence: u64,
    bytes: Vec<u8>,
}

impl PartialEq for QueuedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.deliver_at == other.deliver_at && self.sequence == other.sequence
    }
}

impl Eq for QueuedMessage {}

impl PartialOrd for QueuedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        (other.deliver_at, other.sequence).cmp(&(self.deliver_at, self.sequence))
    }
}

/// In-process one-way link dropping and delaying serialized messages by a
/// seeded hash, so a run is reproducible.
pub struct LossyLink {
    config: LinkConfig,
    queue: BinaryHeap<QueuedMessage>,
    sequence: u64,
    pub sent: u64,
    pub dropped: u64,
}

impl LossyLink {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            queue: BinaryHeap::new(),
            sequence: 0,
            sent: 0,
            dropped: 0,
        }
    }

    fn rand_percent(&mut self) -> f32 {
        let mut hasher = DefaultHasher::new();
        self.config.seed.hash(&mut hasher);
        self.sequence.hash(&mut hasher);
        self.sequence = self.sequence.wrapping_add(1);
        (hasher.finish() % 10_000) as f32 / 100.0
    }

    pub fn send(&mut self, now_tick: u64, bytes: Vec<u8>) {
        self.sent += 1;

        if self.rand_percent() < self.config.loss_percent {
            self.dropped += 1;
            return;
        }

        let span = self
            .config
            .max_latency_ticks
            .saturating_sub(self.config.min_latency_ticks);
        let jitter = if span > 0 {
            (self.rand_percent() / 100.0 * span as f32) as u64
        } else {
            0
        };
        let delay = self.config.min_latency_ticks + jitter;

        self.queue.push(QueuedMessage {
            deliver_at: now_tick + delay,
            sequence: self.sequence,
            bytes,
        });
    }

    pub fn take_due(&mut self, now_tick: u64) -> Vec<Vec<u8>> {
        let mut due = Vec::new();
        while let Some(message) = self.queue.peek() {
            if message.deliver_at <= now_tick {
                if let Some(message) = self.queue.pop() {
                    due.push(message.bytes);
                }
            } else {
                break;
            }
        }
        due
    }
}
