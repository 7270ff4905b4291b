//! Persistent mixing node
//!
//! Sums every connected, started source into the device buffer, applies the
//! master gain and clamps. Sources hold mono samples already at the device
//! rate; each sample is duplicated across all output channels.
//!
//! Shared between the control side and the real-time audio callback behind a
//! mutex. The callback never runs end-of-track callbacks while holding the
//! lock: [`Mixer::mix_into`] hands them back to the caller instead.

use crate::audio::backend::{EndCallback, SourceId};
use crate::error::{Error, Result};
use std::collections::HashMap;

struct MixerSource {
    samples: Vec<f32>,
    position: usize,
    connected: bool,
    started: bool,
    on_end: Option<EndCallback>,
}

impl MixerSource {
    fn is_playing(&self) -> bool {
        self.connected && self.started
    }

    fn is_finished(&self) -> bool {
        self.started && self.position >= self.samples.len()
    }
}

pub struct Mixer {
    sources: HashMap<SourceId, MixerSource>,
    next_id: SourceId,
    master_gain: f32,
}

impl Mixer {
    pub fn new(master_gain: f32) -> Self {
        Self {
            sources: HashMap::new(),
            next_id: 1,
            master_gain: master_gain.clamp(0.0, 1.0),
        }
    }

    /// Register a new source (disconnected, not started)
    pub fn add_source(&mut self, samples: Vec<f32>) -> SourceId {
        let id = self.next_id;
        self.next_id += 1;
        self.sources.insert(
            id,
            MixerSource {
                samples,
                position: 0,
                connected: false,
                started: false,
                on_end: None,
            },
        );
        id
    }

    fn source_mut(&mut self, id: SourceId) -> Result<&mut MixerSource> {
        self.sources
            .get_mut(&id)
            .ok_or_else(|| Error::AudioOutput(format!("Unknown source {}", id)))
    }

    pub fn connect(&mut self, id: SourceId) -> Result<()> {
        self.source_mut(id)?.connected = true;
        Ok(())
    }

    pub fn set_end_callback(&mut self, id: SourceId, callback: EndCallback) -> Result<()> {
        self.source_mut(id)?.on_end = Some(callback);
        Ok(())
    }

    pub fn start(&mut self, id: SourceId) -> Result<()> {
        let source = self.source_mut(id)?;
        if !source.connected {
            return Err(Error::AudioOutput(format!(
                "Source {} started before being connected",
                id
            )));
        }
        source.started = true;
        Ok(())
    }

    /// Drop a source and its callback; unknown ids are ignored
    pub fn remove(&mut self, id: SourceId) -> bool {
        self.sources.remove(&id).is_some()
    }

    /// Drop every source without firing callbacks
    pub fn clear(&mut self) {
        self.sources.clear();
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain.clamp(0.0, 1.0);
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Mix playing sources into interleaved `out`
    ///
    /// Sources that reach their end are removed; their end callbacks are
    /// returned for the caller to run outside the lock.
    pub fn mix_into(&mut self, out: &mut [f32], channels: usize) -> Vec<EndCallback> {
        out.iter_mut().for_each(|s| *s = 0.0);
        if channels == 0 {
            return Vec::new();
        }
        let frames = out.len() / channels;

        for source in self.sources.values_mut().filter(|s| s.is_playing()) {
            let remaining = source.samples.len().saturating_sub(source.position);
            let count = remaining.min(frames);
            let window = &source.samples[source.position..source.position + count];

            for (frame, sample) in out.chunks_mut(channels).zip(window) {
                for slot in frame.iter_mut() {
                    *slot += *sample;
                }
            }
            source.position += count;
        }

        let gain = self.master_gain;
        for slot in out.iter_mut() {
            *slot = (*slot * gain).clamp(-1.0, 1.0);
        }

        let finished: Vec<SourceId> = self
            .sources
            .iter()
            .filter(|(_, s)| s.is_finished())
            .map(|(id, _)| *id)
            .collect();

        finished
            .into_iter()
            .filter_map(|id| self.sources.remove(&id).and_then(|s| s.on_end))
            .collect()
    }
}
