//! Event types for the chaptercast event system
//!
//! Provides shared event definitions and the EventBus used by the player
//! and its HTTP/SSE surface.

mod playback_types;

pub use playback_types::{EnrichmentStage, PlayerState};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Chaptercast event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Only code paths that passed their current-job check emit events, so a
/// subscriber never sees effects of superseded work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChapterEvent {
    /// Player state changed
    ///
    /// Triggers:
    /// - SSE: Update transport controls and loading indicators
    PlayerStateChanged {
        /// State before change
        old_state: PlayerState,
        /// State after change
        new_state: PlayerState,
        /// Current track index (None before the first switch)
        index: Option<usize>,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new track became current (explicit navigation or auto-advance)
    TrackChanged {
        /// Track index in the playlist
        index: usize,
        /// Chapter title
        title: String,
        /// When the switch was requested
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A pipeline stage finished for the current track
    ///
    /// Triggers:
    /// - SSE: Reveal script text / cover image as soon as they exist
    TrackEnriched {
        /// Track index in the playlist
        index: usize,
        /// Stage that completed
        stage: EnrichmentStage,
        /// When the stage completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Current track reached its natural end
    TrackCompleted {
        /// Track index in the playlist
        index: usize,
        /// When playback finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Background prefetch wrote a cache entry
    PrefetchFinished {
        /// Track index in the playlist
        index: usize,
        /// Whether the entry is fully enriched (speech included)
        complete: bool,
        /// When the prefetch finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Player closed and output sink torn down
    PlayerClosed {
        /// When the player closed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ChapterEvent {
    /// Event type name (matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            ChapterEvent::PlayerStateChanged { .. } => "PlayerStateChanged",
            ChapterEvent::TrackChanged { .. } => "TrackChanged",
            ChapterEvent::TrackEnriched { .. } => "TrackEnriched",
            ChapterEvent::TrackCompleted { .. } => "TrackCompleted",
            ChapterEvent::PrefetchFinished { .. } => "PrefetchFinished",
            ChapterEvent::PlayerClosed { .. } => "PlayerClosed",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChapterEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ChapterEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    pub fn emit(
        &self,
        event: ChapterEvent,
    ) -> Result<usize, broadcast::error::SendError<ChapterEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: ChapterEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of currently active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
