//! Internal playback events (not exposed via SSE)
//!
//! Output backend → engine → controller notifications. These are converted
//! to `ChapterEvent`s only after the controller has verified they belong to
//! the current job.

use crate::audio::SourceId;

/// Internal playback events for backend → controller communication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A source reached its natural end
    ///
    /// Never emitted for a source that was stopped manually. The controller
    /// claims it through `PlaybackEngine::claim_completion` before acting.
    TrackComplete { source_id: SourceId },
}
