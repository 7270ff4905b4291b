//! Track and playlist model
//!
//! A [`Playlist`] is created once per topic from the generator's chapter list.
//! Its [`Track`] records carry immutable stub fields plus progressive fields
//! (script, cover image, decoded audio) that each go from absent to present
//! exactly once.

use crate::audio::SampleBuffer;
use crate::error::{Error, Result};
use crate::generator::ContentGenerator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Narrator voice catalogue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Narrator {
    #[default]
    Puck,
    Kore,
    Fenrir,
    Charon,
    Zephyr,
}

impl Narrator {
    pub const ALL: [Narrator; 5] = [
        Narrator::Puck,
        Narrator::Kore,
        Narrator::Fenrir,
        Narrator::Charon,
        Narrator::Zephyr,
    ];

    /// Prebuilt voice name sent to the speech model
    pub fn voice_name(&self) -> &'static str {
        match self {
            Narrator::Puck => "Puck",
            Narrator::Kore => "Kore",
            Narrator::Fenrir => "Fenrir",
            Narrator::Charon => "Charon",
            Narrator::Zephyr => "Zephyr",
        }
    }
}

impl fmt::Display for Narrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.voice_name())
    }
}

impl FromStr for Narrator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Narrator::ALL
            .iter()
            .copied()
            .find(|n| n.voice_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                Error::Config(format!(
                    "Unknown narrator '{}' (expected one of: Puck, Kore, Fenrir, Charon, Zephyr)",
                    s
                ))
            })
    }
}

/// Chapter stub as produced by the generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterStub {
    pub chapter_number: u32,
    pub title: String,
    pub author: String,
    pub description: String,
}

/// One chapter, progressively enriched
#[derive(Debug, Clone)]
pub struct Track {
    /// Ordinal position in the playlist
    pub index: usize,
    pub chapter_number: u32,
    pub title: String,
    pub author: String,
    pub description: String,

    /// Narration script (stage 1)
    pub script: Option<String>,
    /// Cover image reference, a `data:` URL (stage 1, may legitimately stay absent)
    pub cover_image: Option<String>,
    /// Decoded speech (stage 2)
    pub audio: Option<Arc<SampleBuffer>>,
}

impl Track {
    /// Create a record with only the immutable fields populated
    pub fn from_stub(index: usize, stub: &ChapterStub) -> Self {
        Self {
            index,
            chapter_number: stub.chapter_number,
            title: stub.title.clone(),
            author: stub.author.clone(),
            description: stub.description.clone(),
            script: None,
            cover_image: None,
            audio: None,
        }
    }

    /// Stub view used for generator requests
    pub fn stub(&self) -> ChapterStub {
        ChapterStub {
            chapter_number: self.chapter_number,
            title: self.title.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
        }
    }

    /// Stage 1 done (script present)
    pub fn has_content(&self) -> bool {
        self.script.is_some()
    }

    /// Stage 2 done (audio present)
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn is_fully_enriched(&self) -> bool {
        self.has_content() && self.has_audio()
    }

    /// Fill progressive fields that are absent here but present in `other`
    ///
    /// Present fields are never overwritten.
    pub fn merge_from(&mut self, other: &Track) {
        if self.script.is_none() {
            self.script = other.script.clone();
        }
        if self.cover_image.is_none() {
            self.cover_image = other.cover_image.clone();
        }
        if self.audio.is_none() {
            self.audio = other.audio.clone();
        }
    }
}

/// Render view of a track
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackSnapshot {
    pub index: usize,
    pub chapter_number: u32,
    pub title: String,
    pub author: String,
    pub description: String,
    pub script: Option<String>,
    pub cover_image: Option<String>,
    pub has_audio: bool,
    pub loading: bool,
    pub duration_ms: Option<u64>,
}

impl TrackSnapshot {
    pub fn from_track(track: &Track, loading: bool) -> Self {
        Self {
            index: track.index,
            chapter_number: track.chapter_number,
            title: track.title.clone(),
            author: track.author.clone(),
            description: track.description.clone(),
            script: track.script.clone(),
            cover_image: track.cover_image.clone(),
            has_audio: track.has_audio(),
            loading,
            duration_ms: track.audio.as_ref().map(|a| a.duration_ms()),
        }
    }
}

/// Ordered chapter list for one topic
#[derive(Debug, Clone)]
pub struct Playlist {
    pub topic: String,
    tracks: Vec<Track>,
}

impl Playlist {
    /// Build a playlist from stubs, assigning ordinal indices in list order
    pub fn from_stubs(topic: impl Into<String>, stubs: &[ChapterStub]) -> Result<Self> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(Error::InvalidInput("Topic must not be empty".to_string()));
        }
        if stubs.is_empty() {
            return Err(Error::Generation("Chapter list is empty".to_string()));
        }

        let tracks = stubs
            .iter()
            .enumerate()
            .map(|(index, stub)| Track::from_stub(index, stub))
            .collect();

        Ok(Self { topic, tracks })
    }

    /// Ask the generator for a chapter list and build the playlist
    pub async fn generate(generator: &dyn ContentGenerator, topic: &str) -> Result<Self> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Error::InvalidInput("Topic must not be empty".to_string()));
        }

        debug!(topic = %topic, "Requesting chapter list");
        let stubs = generator.generate_chapter_list(topic).await?;
        let playlist = Self::from_stubs(topic, &stubs)?;

        info!(topic = %topic, chapters = playlist.len(), "Playlist generated");
        Ok(playlist)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Stub-only record for `index`
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}
