//! Playback engine
//!
//! Owns the output backend (persistent sink + mixing node) and at most one
//! active per-track source. Natural-end notifications are forwarded as
//! [`PlaybackEvent::TrackComplete`]; the controller claims them through
//! [`PlaybackEngine::claim_completion`], which succeeds only for the source
//! that is still registered as active.

use crate::audio::{AudioBackend, SampleBuffer, SourceId};
use crate::error::Result;
use crate::playback::events::PlaybackEvent;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct PlaybackEngine {
    backend: Arc<dyn AudioBackend>,
    active: Mutex<Option<SourceId>>,
    event_tx: mpsc::UnboundedSender<PlaybackEvent>,
}

impl PlaybackEngine {
    /// Create the engine and the receiver for its playback events
    pub fn new(backend: Arc<dyn AudioBackend>) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let engine = Self {
            backend,
            active: Mutex::new(None),
            event_tx,
        };
        (engine, event_rx)
    }

    fn active(&self) -> MutexGuard<'_, Option<SourceId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resume the sink if it is suspended
    pub async fn ensure_running(&self) -> Result<()> {
        if self.backend.is_suspended() {
            debug!("Resuming suspended sink before playback");
            self.backend.resume().await?;
        }
        Ok(())
    }

    /// Let the backend convert `buffer` ahead of [`start_source`](Self::start_source)
    pub async fn prepare(&self, buffer: Arc<SampleBuffer>) -> Result<Arc<SampleBuffer>> {
        self.backend.prepare(buffer).await
    }

    /// Replace the active source with a new one for `buffer` and start it
    ///
    /// Synchronous: the caller is expected to have called
    /// [`ensure_running`](Self::ensure_running) and
    /// [`prepare`](Self::prepare) first.
    pub fn start_source(&self, buffer: Arc<SampleBuffer>) -> Result<SourceId> {
        let mut active = self.active();
        if let Some(previous) = active.take() {
            self.backend.stop(previous);
        }

        let id = self.backend.create_source(buffer)?;
        let started = self.backend.connect(id).and_then(|_| {
            let tx = self.event_tx.clone();
            self.backend.on_natural_end(
                id,
                Box::new(move || {
                    let _ = tx.send(PlaybackEvent::TrackComplete { source_id: id });
                }),
            )?;
            self.backend.start(id)
        });

        if let Err(e) = started {
            self.backend.stop(id);
            return Err(e);
        }

        *active = Some(id);
        info!(source_id = id, "Playback source started");
        Ok(id)
    }

    /// Ensure the sink is running, then start `buffer`
    pub async fn play(&self, buffer: Arc<SampleBuffer>) -> Result<SourceId> {
        self.ensure_running().await?;
        let buffer = self.prepare(buffer).await?;
        self.start_source(buffer)
    }

    /// Halt and release the active source, if any
    pub fn stop(&self) {
        if let Some(id) = self.active().take() {
            self.backend.stop(id);
            debug!(source_id = id, "Playback source stopped");
        }
    }

    /// Suspend the whole sink
    pub async fn pause(&self) -> Result<()> {
        self.backend.suspend().await
    }

    /// Resume the whole sink
    pub async fn resume(&self) -> Result<()> {
        self.backend.resume().await
    }

    pub fn is_suspended(&self) -> bool {
        self.backend.is_suspended()
    }

    pub fn active_source(&self) -> Option<SourceId> {
        *self.active()
    }

    /// Accept a natural-end notification if `source_id` is still active
    ///
    /// Clears the active slot on success, so each source completes at most once.
    pub fn claim_completion(&self, source_id: SourceId) -> bool {
        let mut active = self.active();
        if *active == Some(source_id) {
            *active = None;
            true
        } else {
            false
        }
    }

    /// Stop playback and tear down the sink
    pub async fn close(&self) -> Result<()> {
        self.stop();
        self.backend.close().await
    }
}
