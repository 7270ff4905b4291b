//! Headless output graph driven by the tokio clock
//!
//! Each started source "plays" for its buffer duration on a tokio task and
//! then fires its natural-end callback. Suspending the sink freezes every
//! source's clock until resume. Used by `--no-audio` and by tests running
//! with paused tokio time.

use crate::audio::backend::{AudioBackend, EndCallback, SourceId};
use crate::audio::SampleBuffer;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

struct NullSource {
    duration: Duration,
    connected: bool,
    on_end: Option<EndCallback>,
    task: Option<JoinHandle<()>>,
}

type SourceTable = Arc<Mutex<HashMap<SourceId, NullSource>>>;

fn lock_sources(sources: &SourceTable) -> MutexGuard<'_, HashMap<SourceId, NullSource>> {
    sources.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clock-driven output backend without a device
pub struct NullOutput {
    sources: SourceTable,
    next_id: AtomicU64,
    suspended_tx: watch::Sender<bool>,
    closed: AtomicBool,
}

impl NullOutput {
    pub fn new() -> Self {
        let (suspended_tx, _) = watch::channel(false);
        Self {
            sources: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            suspended_tx,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of sources created and not yet stopped or finished
    pub fn live_sources(&self) -> usize {
        lock_sources(&self.sources).len()
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep for `duration` of unsuspended time
async fn play_for(duration: Duration, mut suspended: watch::Receiver<bool>) {
    let mut remaining = duration;

    loop {
        // Wait out any suspension first
        while *suspended.borrow_and_update() {
            if suspended.changed().await.is_err() {
                return;
            }
        }

        let started = Instant::now();
        tokio::select! {
            _ = tokio::time::sleep(remaining) => return,
            changed = suspended.changed() => {
                if changed.is_err() {
                    return;
                }
                remaining = remaining.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl AudioBackend for NullOutput {
    fn create_source(&self, buffer: Arc<SampleBuffer>) -> Result<SourceId> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::AudioOutput("Output is closed".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock_sources(&self.sources).insert(
            id,
            NullSource {
                duration: buffer.duration(),
                connected: false,
                on_end: None,
                task: None,
            },
        );
        Ok(id)
    }

    fn connect(&self, id: SourceId) -> Result<()> {
        let mut sources = lock_sources(&self.sources);
        let source = sources
            .get_mut(&id)
            .ok_or_else(|| Error::AudioOutput(format!("Unknown source {}", id)))?;
        source.connected = true;
        Ok(())
    }

    fn on_natural_end(&self, id: SourceId, callback: EndCallback) -> Result<()> {
        let mut sources = lock_sources(&self.sources);
        let source = sources
            .get_mut(&id)
            .ok_or_else(|| Error::AudioOutput(format!("Unknown source {}", id)))?;
        source.on_end = Some(callback);
        Ok(())
    }

    fn start(&self, id: SourceId) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::AudioOutput(format!("No runtime for null output: {}", e)))?;

        let mut sources = lock_sources(&self.sources);
        let source = sources
            .get_mut(&id)
            .ok_or_else(|| Error::AudioOutput(format!("Unknown source {}", id)))?;
        if !source.connected {
            return Err(Error::AudioOutput(format!(
                "Source {} started before being connected",
                id
            )));
        }
        if source.task.is_some() {
            return Ok(());
        }

        let duration = source.duration;
        let suspended = self.suspended_tx.subscribe();
        let table = Arc::clone(&self.sources);

        source.task = Some(runtime.spawn(async move {
            play_for(duration, suspended).await;

            let finished = lock_sources(&table).remove(&id);
            if let Some(callback) = finished.and_then(|s| s.on_end) {
                debug!(source_id = id, "Null source reached natural end");
                callback();
            }
        }));
        Ok(())
    }

    fn stop(&self, id: SourceId) {
        if let Some(source) = lock_sources(&self.sources).remove(&id) {
            if let Some(task) = source.task {
                task.abort();
            }
            debug!(source_id = id, "Stopped null source");
        }
    }

    async fn suspend(&self) -> Result<()> {
        self.suspended_tx.send_replace(true);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.suspended_tx.send_replace(false);
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        *self.suspended_tx.borrow()
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<NullSource> = lock_sources(&self.sources).drain().map(|(_, s)| s).collect();
        for source in drained {
            if let Some(task) = source.task {
                task.abort();
            }
        }
        Ok(())
    }
}
