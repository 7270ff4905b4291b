//! Shared observation state
//!
//! Read-only view of the player for the HTTP/SSE surface: the last published
//! [`PlayerStatus`] and the event broadcaster. Only the job controller
//! publishes, and it does so while holding its own lock, so readers always
//! see statuses in the order they were produced.
//!
//! Locks here are std locks: they are never held across an await.

use crate::playlist::TrackSnapshot;
use chaptercast_common::events::{ChapterEvent, EventBus, PlayerState};
use serde::Serialize;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

/// Event channel capacity
const EVENT_CAPACITY: usize = 100;

/// Player status snapshot
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PlayerStatus {
    /// Current track index (None before the first switch)
    pub index: Option<usize>,
    pub state: PlayerState,
    /// Render view of the current track
    pub track: Option<TrackSnapshot>,
}

/// Shared state accessible by all components
pub struct SharedState {
    status: RwLock<PlayerStatus>,
    events: EventBus,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        Self {
            status: RwLock::new(PlayerStatus::default()),
            events: EventBus::new(EVENT_CAPACITY),
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: ChapterEvent) {
        // No receivers is OK
        self.events.emit_lossy(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<ChapterEvent> {
        self.events.subscribe()
    }

    /// Last published status
    pub fn status(&self) -> PlayerStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn player_state(&self) -> PlayerState {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Replace the published status
    pub(crate) fn publish(&self, status: PlayerStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
