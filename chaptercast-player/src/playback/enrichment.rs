//! Enrichment pipeline
//!
//! Two stages run against a caller-owned [`Track`] copy:
//! - content: script text and cover image requested concurrently; both calls
//!   must succeed
//! - speech: synthesis of the script with the narrator voice, then decode
//!
//! Each stage is skipped when its output field is already present. The
//! pipeline checks the job token before and after every generator call and
//! reports [`StageOutcome::Superseded`] instead of touching the track once
//! the job is stale. Writing the track back to the cache is the caller's
//! responsibility.

use crate::audio::decode_pcm16;
use crate::error::{Error, Result};
use crate::generator::ContentGenerator;
use crate::playback::job::JobToken;
use crate::playlist::{Narrator, Track};
use std::sync::Arc;
use tracing::debug;

/// Result of one stage invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Output field was already present, nothing requested
    Skipped,
    /// Stage ran and the track copy was updated
    Completed,
    /// Job went stale; the track copy was left untouched
    Superseded,
}

pub struct EnrichmentPipeline {
    generator: Arc<dyn ContentGenerator>,
    topic: String,
    narrator: Narrator,
    sample_rate: u32,
}

impl EnrichmentPipeline {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        topic: impl Into<String>,
        narrator: Narrator,
        sample_rate: u32,
    ) -> Self {
        Self {
            generator,
            topic: topic.into(),
            narrator,
            sample_rate,
        }
    }

    pub fn narrator(&self) -> Narrator {
        self.narrator
    }

    /// Stage 1: script text ∥ cover image
    pub async fn run_content_stage(&self, track: &mut Track, token: &JobToken) -> Result<StageOutcome> {
        if track.has_content() {
            return Ok(StageOutcome::Skipped);
        }
        if !token.is_current() {
            return Ok(StageOutcome::Superseded);
        }

        let stub = track.stub();
        debug!(
            index = track.index,
            job = token.id(),
            "Requesting script text and cover image"
        );

        let (script, cover) = tokio::try_join!(
            self.generator.generate_script_text(&stub, &self.topic),
            self.generator.generate_cover_image(&stub),
        )?;

        if !token.is_current() {
            return Ok(StageOutcome::Superseded);
        }

        track.script = Some(script);
        if track.cover_image.is_none() {
            track.cover_image = cover;
        }
        Ok(StageOutcome::Completed)
    }

    /// Stage 2: speech synthesis + decode
    ///
    /// # Errors
    /// - `Error::InvalidState` if the script is still absent
    /// - `Error::Generation` if the generator call fails
    /// - `Error::MissingAudio` if the generator returns no audio
    /// - `Error::Decode` if the audio bytes are malformed
    pub async fn run_speech_stage(&self, track: &mut Track, token: &JobToken) -> Result<StageOutcome> {
        if track.has_audio() {
            return Ok(StageOutcome::Skipped);
        }
        let Some(script) = track.script.clone() else {
            return Err(Error::InvalidState(format!(
                "Speech requested for track {} before its script exists",
                track.index
            )));
        };
        if !token.is_current() {
            return Ok(StageOutcome::Superseded);
        }

        debug!(
            index = track.index,
            job = token.id(),
            narrator = %self.narrator,
            "Requesting speech"
        );

        let bytes = self.generator.generate_speech(&script, self.narrator).await?;

        if !token.is_current() {
            return Ok(StageOutcome::Superseded);
        }

        let bytes = bytes.ok_or(Error::MissingAudio { index: track.index })?;
        let buffer = decode_pcm16(&bytes, self.sample_rate)?;

        debug!(
            index = track.index,
            duration_ms = buffer.duration_ms(),
            "Speech decoded"
        );
        track.audio = Some(Arc::new(buffer));
        Ok(StageOutcome::Completed)
    }
}
