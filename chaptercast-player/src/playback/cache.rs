//! Track cache
//!
//! Index → progressively enriched [`Track`]. Entries are created lazily,
//! enriched by merge only, and never evicted within a session.

use crate::playlist::Track;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct TrackCache {
    entries: Mutex<HashMap<usize, Track>>,
}

impl TrackCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, Track>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the entry for `index`
    pub fn get(&self, index: usize) -> Option<Track> {
        self.lock().get(&index).cloned()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.lock().contains_key(&index)
    }

    /// Copy of the entry for `index`, inserting `stub` first if absent
    pub fn get_or_insert(&self, index: usize, stub: &Track) -> Track {
        self.lock()
            .entry(index)
            .or_insert_with(|| stub.clone())
            .clone()
    }

    /// Merge `track`'s progressive fields into the cached entry
    ///
    /// Creates the entry if absent. Fields already present in the cache win.
    /// Returns the merged record.
    pub fn merge(&self, track: Track) -> Track {
        let mut entries = self.lock();
        match entries.get_mut(&track.index) {
            Some(existing) => {
                existing.merge_from(&track);
                existing.clone()
            }
            None => {
                entries.insert(track.index, track.clone());
                track
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
