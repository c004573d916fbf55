use std::collections::VecDeque;

use super::predicted::PredictedState;

/// Result of locating a tick inside the recorded window.
///
/// `before` is the entry at or immediately preceding the tick; `after_index`
/// is the index of the first entry at or after it. On an exact match both
/// refer to the same entry.
#[derive(Debug)]
pub struct SamplePoint<'a, S> {
    pub before: &'a PredictedState<S>,
    pub after_index: usize,
    pub exact: bool,
}

/// Bounded, tick-ordered record of one entity's own predicted states.
/// Oldest entries are evicted first once the limit is reached.
#[derive(Debug)]
pub struct StateHistory<S> {
    entries: VecDeque<PredictedState<S>>,
    limit: usize,
}

impl<S> StateHistory<S> {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Appends a state keyed by its tick. Ticks must be strictly increasing;
    /// anything else indicates a double-record bug upstream and is dropped.
    pub fn record(&mut self, state: PredictedState<S>) -> bool {
        if let Some(newest) = self.entries.back() {
            if state.tick <= newest.tick {
                log::warn!(
                    "discarding record for tick {} (newest recorded is {})",
                    state.tick,
                    newest.tick
                );
                return false;
            }
        }

        if self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(state);
        true
    }

    /// Locates the entries bracketing `tick`.
    ///
    /// Fails with fewer than 3 entries (no interval to bound) and for ticks
    /// older than the oldest entry. A tick beyond the newest entry yields the
    /// last interval, signalling that the sender has run ahead of the
    /// recorded window.
    pub fn sample(&self, tick: u64) -> Option<SamplePoint<'_, S>> {
        if self.entries.len() <= 2 {
            return None;
        }

        let oldest = self.entries.front()?.tick;
        if tick < oldest {
            return None;
        }

        let last = self.entries.len() - 1;
        if tick > self.entries[last].tick {
            return Some(SamplePoint {
                before: &self.entries[last - 1],
                after_index: last,
                exact: false,
            });
        }

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.tick == tick {
                return Some(SamplePoint {
                    before: entry,
                    after_index: i,
                    exact: true,
                });
            }
            if entry.tick > tick {
                return Some(SamplePoint {
                    before: &self.entries[i - 1],
                    after_index: i,
                    exact: false,
                });
            }
        }

        None
    }

    /// Replaces all contents with a single entry. Used after a hard snap so
    /// the next correction has an accurate anchor.
    pub fn clear_and_seed(&mut self, state: PredictedState<S>) {
        self.entries.clear();
        self.entries.push_back(state);
    }

    /// Drops all entries at or after `index`, making room for a corrected
    /// state and the replayed tail.
    pub fn truncate_from(&mut self, index: usize) {
        self.entries.truncate(index);
    }

    pub fn last_recorded(&self) -> Option<&PredictedState<S>> {
        self.entries.back()
    }

    pub fn newest_tick(&self) -> Option<u64> {
        self.entries.back().map(|e| e.tick)
    }

    pub fn oldest_tick(&self) -> Option<u64> {
        self.entries.front().map(|e| e.tick)
    }

    pub fn get(&self, index: usize) -> Option<&PredictedState<S>> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredictedState<S>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.limit
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
