//! Output graph capability interface
//!
//! The playback engine depends only on [`AudioBackend`]: a persistent sink
//! with a permanent mixing node, plus per-track sources that are created,
//! connected, started and stopped individually.
//!
//! Contract every backend honors:
//! - `stop` is tolerant: stopping a finished, stopped or unknown source is Ok
//! - `stop` drops the source's natural-end callback, so callbacks fire only
//!   on natural completion
//! - a natural-end callback fires at most once
//! - after `close`, `create_source` fails with `Error::AudioOutput`
//! - `prepare` does any heavy per-buffer conversion so `create_source` stays
//!   cheap enough to run under the controller's lock

use crate::audio::SampleBuffer;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Backend-assigned source handle
pub type SourceId = u64;

/// Callback invoked when a source reaches its natural end
pub type EndCallback = Box<dyn FnOnce() + Send + 'static>;

#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Convert `buffer` into the form the sink plays
    ///
    /// Called without any player lock held. The default passes the buffer
    /// through unchanged.
    async fn prepare(&self, buffer: Arc<SampleBuffer>) -> Result<Arc<SampleBuffer>> {
        Ok(buffer)
    }

    /// Create a source for `buffer` (not yet connected or started)
    fn create_source(&self, buffer: Arc<SampleBuffer>) -> Result<SourceId>;

    /// Connect a source to the mixing node
    fn connect(&self, id: SourceId) -> Result<()>;

    /// Register the natural-end callback for a source
    fn on_natural_end(&self, id: SourceId, callback: EndCallback) -> Result<()>;

    /// Start a connected source
    fn start(&self, id: SourceId) -> Result<()>;

    /// Halt and disconnect a source, releasing it
    fn stop(&self, id: SourceId);

    /// Suspend the whole sink
    async fn suspend(&self) -> Result<()>;

    /// Resume the whole sink
    async fn resume(&self) -> Result<()>;

    fn is_suspended(&self) -> bool;

    /// Tear down the sink
    async fn close(&self) -> Result<()>;
}
