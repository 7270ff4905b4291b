//! Job identity for cooperative cancellation
//!
//! A job is "make track N current". [`JobEpoch`] holds the id of the current
//! job; [`JobToken`] is the immutable capture a job carries through its
//! asynchronous steps. Ids start at 1, strictly increase and are never reused.
//!
//! A token only answers "is my job still current?". Callers that act on the
//! answer must do so under the controller lock that also guards minting, so
//! no newer job can be minted between the check and the mutation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared cell holding the current job id (0 = no job yet)
#[derive(Debug, Clone, Default)]
pub struct JobEpoch {
    current: Arc<AtomicU64>,
}

impl JobEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede the current job and return a token for the new one
    pub fn mint(&self) -> JobToken {
        let id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        JobToken {
            id,
            epoch: Some(Arc::clone(&self.current)),
        }
    }

    /// Id of the current job
    pub fn current_id(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// Immutable capture of one job's identity
#[derive(Debug, Clone)]
pub struct JobToken {
    id: u64,
    epoch: Option<Arc<AtomicU64>>,
}

impl JobToken {
    /// Token that is always current (background work with no visible effects)
    pub fn detached() -> Self {
        Self { id: 0, epoch: None }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        match &self.epoch {
            Some(epoch) => epoch.load(Ordering::SeqCst) == self.id,
            None => true,
        }
    }
}
