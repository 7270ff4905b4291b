//! Job controller
//!
//! [`Player`] is the sole writer of user-visible state (current index, player
//! state, track snapshot). Every request to make a track current mints a new
//! job; asynchronous work carries the job's token and re-checks it before
//! mutating anything.
//!
//! Synchronization: minting, stopping the active source and every
//! check-then-mutate step happen while holding `inner`. A continuation that
//! finds its token current under that lock cannot be overtaken by a newer job
//! until it releases the lock. The lock is never held across an await.
//!
//! Lock order is `inner` → engine's active-source slot → backend internals.

use crate::audio::AudioBackend;
use crate::error::{Error, Result};
use crate::generator::ContentGenerator;
use crate::playback::cache::TrackCache;
use crate::playback::engine::PlaybackEngine;
use crate::playback::enrichment::{EnrichmentPipeline, StageOutcome};
use crate::playback::events::PlaybackEvent;
use crate::playback::job::{JobEpoch, JobToken};
use crate::playback::prefetch::Prefetcher;
use crate::playlist::{Narrator, Playlist, Track, TrackSnapshot};
use crate::state::{PlayerStatus, SharedState};
use chaptercast_common::events::{ChapterEvent, EnrichmentStage, PlayerState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Navigation direction for [`Player::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Per-player settings
#[derive(Debug, Clone, Copy)]
pub struct PlayerSettings {
    pub narrator: Narrator,
    /// Sample rate generated speech is decoded at
    pub sample_rate: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            narrator: Narrator::default(),
            sample_rate: crate::config::DEFAULT_SAMPLE_RATE,
        }
    }
}

#[derive(Default)]
struct ControllerState {
    index: Option<usize>,
    state: PlayerState,
    snapshot: Option<TrackSnapshot>,
    closed: bool,
}

pub struct Player {
    playlist: Arc<Playlist>,
    cache: Arc<TrackCache>,
    pipeline: Arc<EnrichmentPipeline>,
    prefetcher: Arc<Prefetcher>,
    engine: PlaybackEngine,
    epoch: JobEpoch,
    inner: Mutex<ControllerState>,
    /// Serializes toggles so each one sees the state the previous one left
    toggle: tokio::sync::Mutex<()>,
    shared: Arc<SharedState>,
}

impl Player {
    /// Build a player and start its end-of-track listener
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        playlist: Playlist,
        generator: Arc<dyn ContentGenerator>,
        backend: Arc<dyn AudioBackend>,
        settings: PlayerSettings,
    ) -> Arc<Self> {
        let playlist = Arc::new(playlist);
        let shared = Arc::new(SharedState::new());
        let cache = Arc::new(TrackCache::new());
        let pipeline = Arc::new(EnrichmentPipeline::new(
            generator,
            playlist.topic.clone(),
            settings.narrator,
            settings.sample_rate,
        ));
        let prefetcher = Arc::new(Prefetcher::new(
            Arc::clone(&playlist),
            Arc::clone(&cache),
            Arc::clone(&pipeline),
            Arc::clone(&shared),
        ));
        let (engine, events) = PlaybackEngine::new(backend);

        let player = Arc::new(Self {
            playlist,
            cache,
            pipeline,
            prefetcher,
            engine,
            epoch: JobEpoch::new(),
            inner: Mutex::new(ControllerState::default()),
            toggle: tokio::sync::Mutex::new(()),
            shared,
        });

        tokio::spawn(completion_listener(Arc::downgrade(&player), events));
        info!(
            topic = %player.playlist.topic,
            tracks = player.playlist.len(),
            narrator = %settings.narrator,
            "Player ready"
        );
        player
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================
    // Observation
    // ========================================

    pub fn status(&self) -> PlayerStatus {
        self.shared.status()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChapterEvent> {
        self.shared.subscribe_events()
    }

    pub fn shared_state(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Cached record for `index`, if any
    pub fn cached_track(&self, index: usize) -> Option<Track> {
        self.cache.get(index)
    }

    /// Id of the current job (0 before the first switch)
    pub fn current_job_id(&self) -> u64 {
        self.epoch.current_id()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    // ========================================
    // Locked helpers
    // ========================================

    fn transition(&self, inner: &mut ControllerState, new_state: PlayerState) {
        let old_state = inner.state;
        inner.state = new_state;
        if old_state != new_state {
            debug!(index = ?inner.index, "State {} -> {}", old_state, new_state);
            self.shared.broadcast_event(ChapterEvent::PlayerStateChanged {
                old_state,
                new_state,
                index: inner.index,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    fn publish(&self, inner: &ControllerState) {
        self.shared.publish(PlayerStatus {
            index: inner.index,
            state: inner.state,
            track: inner.snapshot.clone(),
        });
    }

    fn clear_loading(inner: &mut ControllerState) {
        if let Some(snapshot) = inner.snapshot.as_mut() {
            snapshot.loading = false;
        }
    }

    /// Synchronous prefix of a switch: mint, stop, LOADING
    fn begin_switch(&self, inner: &mut ControllerState, index: usize) -> Option<(JobToken, Track)> {
        let Some(stub) = self.playlist.track(index) else {
            debug!(index, "Switch ignored: index out of range");
            return None;
        };

        let token = self.epoch.mint();
        self.engine.stop();

        let track = self.cache.get_or_insert(index, stub);
        inner.index = Some(index);
        inner.snapshot = Some(TrackSnapshot::from_track(&track, true));
        self.transition(inner, PlayerState::Loading);

        info!(index, job = token.id(), title = %track.title, "Switching track");
        self.shared.broadcast_event(ChapterEvent::TrackChanged {
            index,
            title: track.title.clone(),
            timestamp: chrono::Utc::now(),
        });
        self.publish(inner);

        Some((token, track))
    }

    /// Resolve a navigation request; handles end-of-playlist in place
    fn navigation_target(&self, inner: &mut ControllerState, direction: Direction) -> Option<usize> {
        match (direction, inner.index) {
            (Direction::Next, None) => Some(0),
            (Direction::Next, Some(i)) if i + 1 < self.playlist.len() => Some(i + 1),
            (Direction::Next, Some(i)) => {
                let token = self.epoch.mint();
                self.engine.stop();
                Self::clear_loading(inner);
                self.transition(inner, PlayerState::Idle);
                self.publish(inner);
                info!(index = i, job = token.id(), "End of playlist reached");
                None
            }
            (Direction::Previous, Some(i)) if i > 0 => Some(i - 1),
            (Direction::Previous, _) => {
                debug!("Previous ignored at start of playlist");
                None
            }
        }
    }

    fn spawn_job(self: &Arc<Self>, token: JobToken, track: Track) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_job(token, track).await })
    }

    fn fail_locked(&self, inner: &mut ControllerState, index: usize, err: &Error) {
        error!(index, "Track failed: {}", err);
        Self::clear_loading(inner);
        self.transition(inner, PlayerState::Error);
        self.publish(inner);
    }

    fn fail(&self, token: &JobToken, index: usize, err: Error) {
        let mut inner = self.lock();
        if !token.is_current() {
            debug!(index, job = token.id(), "Discarding failure of stale job: {}", err);
            return;
        }
        self.fail_locked(&mut inner, index, &err);
    }

    /// Write a completed stage back to the cache if the job is still current
    fn commit_stage(&self, token: &JobToken, track: &mut Track, stage: EnrichmentStage) -> bool {
        let mut inner = self.lock();
        if !token.is_current() {
            debug!(index = track.index, job = token.id(), %stage, "Discarding stale stage result");
            return false;
        }

        *track = self.cache.merge(track.clone());
        inner.snapshot = Some(TrackSnapshot::from_track(track, true));
        self.shared.broadcast_event(ChapterEvent::TrackEnriched {
            index: track.index,
            stage,
            timestamp: chrono::Utc::now(),
        });
        self.publish(&inner);
        true
    }

    // ========================================
    // Job body
    // ========================================

    async fn run_job(self: Arc<Self>, token: JobToken, mut track: Track) {
        let index = track.index;

        let stages = [EnrichmentStage::Content, EnrichmentStage::Speech];
        for stage in stages {
            let outcome = match stage {
                EnrichmentStage::Content => self.pipeline.run_content_stage(&mut track, &token).await,
                EnrichmentStage::Speech => self.pipeline.run_speech_stage(&mut track, &token).await,
            };

            match outcome {
                Ok(StageOutcome::Skipped) => {}
                Ok(StageOutcome::Completed) => {
                    if !self.commit_stage(&token, &mut track, stage) {
                        return;
                    }
                }
                Ok(StageOutcome::Superseded) => {
                    debug!(index, job = token.id(), %stage, "Job superseded");
                    return;
                }
                Err(e) => {
                    self.fail(&token, index, e);
                    return;
                }
            }
        }

        if !token.is_current() {
            return;
        }
        if let Err(e) = self.engine.ensure_running().await {
            self.fail(&token, index, e);
            return;
        }

        let Some(audio) = track.audio.clone() else {
            self.fail(&token, index, Error::InvalidState(format!("Track {} has no audio", index)));
            return;
        };
        let prepared = match self.engine.prepare(audio).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.fail(&token, index, e);
                return;
            }
        };

        let started = {
            let mut inner = self.lock();
            if !token.is_current() {
                debug!(index, job = token.id(), "Discarding playback start of stale job");
                return;
            }

            match self.engine.start_source(prepared) {
                Ok(source_id) => {
                    inner.snapshot = Some(TrackSnapshot::from_track(&track, false));
                    self.transition(&mut inner, PlayerState::Playing);
                    self.publish(&inner);
                    info!(index, job = token.id(), source_id, "Playing");
                    true
                }
                Err(e) => {
                    self.fail_locked(&mut inner, index, &e);
                    false
                }
            }
        };

        if started {
            self.prefetcher.spawn(index + 1);
        }
    }

    // ========================================
    // Public operations
    // ========================================

    /// Make track `index` current
    ///
    /// Before returning: mints a new job, stops the active source and enters
    /// LOADING. Enrichment and playback continue on the returned task.
    /// Out-of-range indices and calls after [`close`](Self::close) are no-ops.
    pub fn switch_to(self: &Arc<Self>, index: usize) -> Option<JoinHandle<()>> {
        let (token, track) = {
            let mut inner = self.lock();
            if inner.closed {
                debug!(index, "Switch ignored: player closed");
                return None;
            }
            self.begin_switch(&mut inner, index)?
        };
        Some(self.spawn_job(token, track))
    }

    /// Move to the adjacent track
    ///
    /// `Next` past the last track stops playback and goes IDLE; `Previous`
    /// at the first track does nothing.
    pub fn advance(self: &Arc<Self>, direction: Direction) -> Option<JoinHandle<()>> {
        let (token, track) = {
            let mut inner = self.lock();
            if inner.closed {
                return None;
            }
            let target = self.navigation_target(&mut inner, direction)?;
            self.begin_switch(&mut inner, target)?
        };
        Some(self.spawn_job(token, track))
    }

    pub fn next(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.advance(Direction::Next)
    }

    pub fn previous(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.advance(Direction::Previous)
    }

    /// Toggle between PLAYING and PAUSED by suspending/resuming the sink
    ///
    /// No-op from any other state.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        let _toggle = self.toggle.lock().await;
        let (state, job) = {
            let inner = self.lock();
            if inner.closed {
                return Ok(());
            }
            (inner.state, self.epoch.current_id())
        };

        let target = match state {
            PlayerState::Playing => {
                self.engine.pause().await?;
                PlayerState::Paused
            }
            PlayerState::Paused => {
                self.engine.resume().await?;
                PlayerState::Playing
            }
            other => {
                debug!("Toggle ignored in state {}", other);
                return Ok(());
            }
        };

        let overtaken = {
            let mut inner = self.lock();
            let unchanged = !inner.closed && inner.state == state && self.epoch.current_id() == job;
            if unchanged {
                self.transition(&mut inner, target);
                self.publish(&inner);
            }
            !inner.closed && self.epoch.current_id() != job
        };

        if overtaken && target == PlayerState::Paused {
            // A newer job took over while we were suspending; leave its sink running
            warn!("Toggle overtaken by a newer job, resuming sink");
            self.engine.ensure_running().await?;
        }
        Ok(())
    }

    /// Stop playback, tear down the sink and go IDLE
    ///
    /// Every later operation is a no-op.
    pub async fn close(&self) {
        {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            self.epoch.mint();
            self.engine.stop();
            Self::clear_loading(&mut inner);
            self.transition(&mut inner, PlayerState::Idle);
            self.publish(&inner);
        }

        if let Err(e) = self.engine.close().await {
            warn!("Failed to close audio output: {}", e);
        }

        self.shared.broadcast_event(ChapterEvent::PlayerClosed {
            timestamp: chrono::Utc::now(),
        });
        info!("Player closed");
    }

    /// Handle a backend notification (auto-advance on natural end)
    fn handle_playback_event(self: &Arc<Self>, event: PlaybackEvent) {
        match event {
            PlaybackEvent::TrackComplete { source_id } => {
                let (token, track) = {
                    let mut inner = self.lock();
                    if inner.closed {
                        return;
                    }
                    if !self.engine.claim_completion(source_id) {
                        debug!(source_id, "Ignoring completion of inactive source");
                        return;
                    }

                    if let Some(index) = inner.index {
                        info!(index, "Track finished, advancing");
                        self.shared.broadcast_event(ChapterEvent::TrackCompleted {
                            index,
                            timestamp: chrono::Utc::now(),
                        });
                    }

                    let Some(target) = self.navigation_target(&mut inner, Direction::Next) else {
                        return;
                    };
                    let Some(started) = self.begin_switch(&mut inner, target) else {
                        return;
                    };
                    started
                };
                self.spawn_job(token, track);
            }
        }
    }
}

/// Forwards engine notifications to the player while it is alive
async fn completion_listener(player: Weak<Player>, mut events: mpsc::UnboundedReceiver<PlaybackEvent>) {
    while let Some(event) = events.recv().await {
        let Some(player) = player.upgrade() else {
            break;
        };
        player.handle_playback_event(event);
    }
    debug!("Completion listener stopped");
}
