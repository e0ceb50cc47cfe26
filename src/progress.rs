use std::sync::Arc;

use crate::link::LinkKind;
use crate::state::{Counter, Outcome};

/// Why a track finished without any fetch work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The output file is already on disk
    AlreadyPresent,
    /// An earlier pass of this run already completed it
    Remembered,
    /// Music videos need a media-user-token plus mp4decrypt and MP4Box
    MvUnsupported,
}

/// Events emitted during a batch run for console reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A queue entry is about to be processed
    QueueItem {
        /// 1-based position in the queue
        position: usize,
        total: usize,
        url: String,
        kind: LinkKind,
    },

    /// The entry could not be classified and is skipped
    InvalidLink { url: String },

    /// A collection has been resolved against the catalog
    CollectionResolved {
        name: String,
        artist: String,
        track_count: usize,
    },

    /// A track is entering the pipeline
    TrackStarted {
        ordinal: usize,
        total: usize,
        name: String,
    },

    /// A track was short-circuited as success
    TrackSkipped {
        ordinal: usize,
        total: usize,
        name: String,
        reason: SkipReason,
    },

    /// A track reached its terminal state
    TrackFinished {
        ordinal: usize,
        total: usize,
        name: String,
        outcome: Outcome,
        /// Failure or unavailability reason
        detail: Option<String>,
    },

    /// Available formats of one track (debug mode)
    QualitySummary { name: String, summary: String },

    /// A pass over the whole queue finished
    PassCompleted { pass: usize, counter: Counter },

    /// The queue will be processed again
    RetryScheduled { pass: usize },

    /// Free-form operator notice
    Notice { message: String },
}

/// Trait for reporting progress events during a batch run.
///
/// Implementations can use this to print console lines, drive progress bars,
/// or collect events in tests.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
