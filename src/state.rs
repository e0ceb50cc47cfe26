use std::collections::{BTreeSet, HashMap};

/// Terminal outcome of one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
    Unavailable,
}

/// Per-pass tally of track outcomes
///
/// After a pass completes, `total == success + error + unavailable`.
/// `not_song` is tracked apart from `total` and reported with the warnings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub unavailable: usize,
    pub not_song: usize,
}

impl Counter {
    /// Count a track as entered. Every entered track ends in exactly one `record`.
    pub fn enter(&mut self) {
        self.total += 1;
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::Error => self.error += 1,
            Outcome::Unavailable => self.unavailable += 1,
        }
    }

    /// Enter and finish a track in one step
    pub fn tally(&mut self, outcome: Outcome) {
        self.enter();
        self.record(outcome);
    }

    pub fn record_not_song(&mut self) {
        self.not_song += 1;
    }

    /// Unavailable plus not-song items
    pub fn warnings(&self) -> usize {
        self.unavailable + self.not_song
    }

    pub fn is_balanced(&self) -> bool {
        self.total == self.success + self.error + self.unavailable
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Collection ordinals already confirmed successful during this process
#[derive(Debug, Clone, Default)]
pub struct SkipMemo {
    done: HashMap<String, BTreeSet<usize>>,
}

impl SkipMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a confirmed success. Entries are never removed.
    pub fn remember(&mut self, collection_id: &str, ordinal: usize) {
        self.done
            .entry(collection_id.to_string())
            .or_default()
            .insert(ordinal);
    }

    pub fn contains(&self, collection_id: &str, ordinal: usize) -> bool {
        self.done
            .get(collection_id)
            .is_some_and(|ordinals| ordinals.contains(&ordinal))
    }

    pub fn len(&self) -> usize {
        self.done.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutable bookkeeping of a batch run, owned by the batch driver
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub counter: Counter,
    pub memo: SkipMemo,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_keeps_counter_balanced() {
        let mut counter = Counter::default();
        counter.tally(Outcome::Success);
        counter.tally(Outcome::Error);
        counter.tally(Outcome::Unavailable);
        counter.tally(Outcome::Success);

        assert_eq!(counter.total, 4);
        assert_eq!(counter.success, 2);
        assert!(counter.is_balanced());
    }

    #[test]
    fn not_song_is_a_warning_outside_total() {
        let mut counter = Counter::default();
        counter.tally(Outcome::Unavailable);
        counter.record_not_song();

        assert_eq!(counter.total, 1);
        assert_eq!(counter.warnings(), 2);
        assert!(counter.is_balanced());
    }

    #[test]
    fn entered_track_is_unbalanced_until_recorded() {
        let mut counter = Counter::default();
        counter.enter();
        assert!(!counter.is_balanced());

        counter.record(Outcome::Error);
        assert!(counter.is_balanced());
    }

    #[test]
    fn reset_clears_counts() {
        let mut counter = Counter::default();
        counter.tally(Outcome::Error);
        counter.record_not_song();
        counter.reset();

        assert_eq!(counter, Counter::default());
    }

    #[test]
    fn memo_is_scoped_per_collection() {
        let mut memo = SkipMemo::new();
        memo.remember("album-1", 3);
        memo.remember("album-1", 3);
        memo.remember("playlist-9", 1);

        assert!(memo.contains("album-1", 3));
        assert!(!memo.contains("album-1", 1));
        assert!(!memo.contains("playlist-9", 3));
        assert_eq!(memo.len(), 2);
    }
}
