//! Background prefetcher
//!
//! Warms the cache for the track after the one that just started playing.
//! Best effort: failures are logged and swallowed, and nothing here touches
//! the player state, the current snapshot or the active source.
//!
//! Suppression rules, in order:
//! - index outside the playlist
//! - cache already has an entry (presence alone, even a partial one)
//! - a prefetch for the same index is already running

use crate::error::Error;
use crate::playback::cache::TrackCache;
use crate::playback::enrichment::EnrichmentPipeline;
use crate::playback::job::JobToken;
use crate::playlist::Playlist;
use crate::state::SharedState;
use chaptercast_common::ChapterEvent;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct Prefetcher {
    playlist: Arc<Playlist>,
    cache: Arc<TrackCache>,
    pipeline: Arc<EnrichmentPipeline>,
    state: Arc<SharedState>,
    in_flight: Arc<Mutex<HashSet<usize>>>,
}

/// Clears the in-flight mark when the run ends, however it ends
struct InFlightGuard {
    set: Arc<Mutex<HashSet<usize>>>,
    index: usize,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.index);
    }
}

impl Prefetcher {
    pub fn new(
        playlist: Arc<Playlist>,
        cache: Arc<TrackCache>,
        pipeline: Arc<EnrichmentPipeline>,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            playlist,
            cache,
            pipeline,
            state,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn claim(&self, index: usize) -> Option<InFlightGuard> {
        if index >= self.playlist.len() || self.cache.contains(index) {
            return None;
        }
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(index) {
            return None;
        }
        Some(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            index,
        })
    }

    /// Run the full pipeline for `index` unless suppressed
    ///
    /// Writes a partial entry only when speech came back without audio. Any
    /// other failure writes nothing, so the index can be prefetched again.
    pub async fn prefetch(&self, index: usize) {
        let Some(guard) = self.claim(index) else {
            debug!(index, "Prefetch suppressed");
            return;
        };
        self.run(guard).await;
    }

    /// Fire-and-forget variant; returns None when suppressed
    pub fn spawn(self: &Arc<Self>, index: usize) -> Option<JoinHandle<()>> {
        let guard = self.claim(index)?;
        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.run(guard).await }))
    }

    async fn run(&self, guard: InFlightGuard) {
        let index = guard.index;
        let Some(stub) = self.playlist.track(index) else {
            return;
        };
        let mut track = stub.clone();
        let token = JobToken::detached();

        debug!(index, "Prefetch started");

        if let Err(e) = self.pipeline.run_content_stage(&mut track, &token).await {
            warn!(index, "Prefetch content stage failed: {}", e);
            return;
        }

        let complete = match self.pipeline.run_speech_stage(&mut track, &token).await {
            Ok(_) => true,
            Err(Error::MissingAudio { .. }) => {
                warn!(index, "Prefetch got no speech audio, caching partial track");
                false
            }
            Err(e) => {
                warn!(index, "Prefetch speech stage failed: {}", e);
                return;
            }
        };

        self.cache.merge(track);
        drop(guard);

        debug!(index, complete, "Prefetch finished");
        self.state.broadcast_event(ChapterEvent::PrefetchFinished {
            index,
            complete,
            timestamp: chrono::Utc::now(),
        });
    }
}
