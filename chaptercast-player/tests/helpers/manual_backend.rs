//! Manually driven `AudioBackend`
//!
//! Sources never end on their own: tests call [`ManualBackend::finish`] to
//! simulate natural completion. Every lifecycle step is recorded.
//! `prepare` can be held at a gate and can retag buffers with a device rate.

use async_trait::async_trait;
use chaptercast_player::audio::{AudioBackend, EndCallback, SampleBuffer, SourceId};
use chaptercast_player::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Default)]
struct ManualSource {
    samples: usize,
    sample_rate: u32,
    connected: bool,
    started: bool,
    stopped: bool,
    on_end: Option<EndCallback>,
}

#[derive(Default)]
struct Inner {
    next_id: SourceId,
    sources: HashMap<SourceId, ManualSource>,
    started: Vec<SourceId>,
}

#[derive(Default)]
pub struct ManualBackend {
    inner: Mutex<Inner>,
    suspended: AtomicBool,
    closed: AtomicBool,
    fail_start: AtomicBool,
    yield_on_sink: AtomicBool,
    device_rate: AtomicU32,
    prepare_gate: Mutex<Option<watch::Sender<bool>>>,
    prepare_calls: AtomicUsize,
    suspend_calls: AtomicUsize,
    resume_calls: AtomicUsize,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every source ever started, in start order
    pub fn started_sources(&self) -> Vec<SourceId> {
        self.lock().started.clone()
    }

    /// Sources started and neither stopped nor finished
    pub fn playing_sources(&self) -> Vec<SourceId> {
        let inner = self.lock();
        inner
            .started
            .iter()
            .copied()
            .filter(|id| {
                inner
                    .sources
                    .get(id)
                    .is_some_and(|source| source.started && !source.stopped)
            })
            .collect()
    }

    /// The single playing source, panicking if there is not exactly one
    pub fn playing(&self) -> SourceId {
        let playing = self.playing_sources();
        assert_eq!(playing.len(), 1, "expected exactly one playing source");
        playing[0]
    }

    /// Sample count of a source's buffer
    pub fn samples(&self, id: SourceId) -> Option<usize> {
        self.lock().sources.get(&id).map(|source| source.samples)
    }

    /// Sample rate of the buffer a source was created from
    pub fn sample_rate(&self, id: SourceId) -> Option<u32> {
        self.lock().sources.get(&id).map(|source| source.sample_rate)
    }

    /// Make `prepare` retag buffers with `rate`
    pub fn convert_to(&self, rate: u32) {
        self.device_rate.store(rate, Ordering::SeqCst);
    }

    /// Hold every later `prepare` until [`release_prepare`](Self::release_prepare)
    pub fn hold_prepare(&self) {
        let (tx, _rx) = watch::channel(false);
        *self.prepare_gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    pub fn release_prepare(&self) {
        if let Some(tx) = self
            .prepare_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            tx.send_replace(true);
        }
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    /// Simulate natural completion; false if the source has no callback left
    pub fn finish(&self, id: SourceId) -> bool {
        let callback = {
            let mut inner = self.lock();
            let Some(source) = inner.sources.get_mut(&id) else {
                return false;
            };
            if !source.started || source.stopped {
                return false;
            }
            source.stopped = true;
            source.on_end.take()
        };

        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Make every later `start` fail
    pub fn fail_starts(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// Make suspend/resume yield to the scheduler before taking effect
    pub fn yield_on_sink_calls(&self) {
        self.yield_on_sink.store(true, Ordering::SeqCst);
    }

    async fn maybe_yield(&self) {
        if self.yield_on_sink.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn suspend_calls(&self) -> usize {
        self.suspend_calls.load(Ordering::SeqCst)
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioBackend for ManualBackend {
    async fn prepare(&self, buffer: Arc<SampleBuffer>) -> Result<Arc<SampleBuffer>> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self
            .prepare_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|tx| tx.subscribe());
        if let Some(mut rx) = gate {
            let _ = rx.wait_for(|open| *open).await;
        }

        let rate = self.device_rate.load(Ordering::SeqCst);
        if rate == 0 || rate == buffer.sample_rate {
            return Ok(buffer);
        }
        Ok(Arc::new(SampleBuffer::mono(buffer.samples.clone(), rate)))
    }

    fn create_source(&self, buffer: Arc<SampleBuffer>) -> Result<SourceId> {
        if self.is_closed() {
            return Err(Error::AudioOutput("backend closed".to_string()));
        }
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.sources.insert(
            id,
            ManualSource {
                samples: buffer.samples.len(),
                sample_rate: buffer.sample_rate,
                ..Default::default()
            },
        );
        Ok(id)
    }

    fn connect(&self, id: SourceId) -> Result<()> {
        let mut inner = self.lock();
        let source = inner
            .sources
            .get_mut(&id)
            .ok_or_else(|| Error::AudioOutput(format!("unknown source {}", id)))?;
        source.connected = true;
        Ok(())
    }

    fn on_natural_end(&self, id: SourceId, callback: EndCallback) -> Result<()> {
        let mut inner = self.lock();
        let source = inner
            .sources
            .get_mut(&id)
            .ok_or_else(|| Error::AudioOutput(format!("unknown source {}", id)))?;
        source.on_end = Some(callback);
        Ok(())
    }

    fn start(&self, id: SourceId) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::AudioOutput("start refused".to_string()));
        }
        let mut inner = self.lock();
        let source = inner
            .sources
            .get_mut(&id)
            .ok_or_else(|| Error::AudioOutput(format!("unknown source {}", id)))?;
        if !source.connected {
            return Err(Error::AudioOutput(format!("source {} not connected", id)));
        }
        source.started = true;
        inner.started.push(id);
        Ok(())
    }

    fn stop(&self, id: SourceId) {
        if let Some(source) = self.lock().sources.get_mut(&id) {
            source.stopped = true;
            source.on_end = None;
        }
    }

    async fn suspend(&self) -> Result<()> {
        self.maybe_yield().await;
        self.suspend_calls.fetch_add(1, Ordering::SeqCst);
        self.suspended.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.maybe_yield().await;
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        let mut inner = self.lock();
        for source in inner.sources.values_mut() {
            source.stopped = true;
            source.on_end = None;
        }
        Ok(())
    }
}
