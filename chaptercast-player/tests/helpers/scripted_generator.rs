//! Scripted `ContentGenerator` for controller tests
//!
//! Chapter N gets script text `"Narration for chapter N"`, no cover image by
//! default, and a short PCM clip. Individual calls can be held at a gate or
//! made to fail, and every call is counted per chapter.

use async_trait::async_trait;
use chaptercast_player::generator::ContentGenerator;
use chaptercast_player::{ChapterStub, Error, Narrator, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

/// Which collaborator operation a call was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Script,
    Image,
    Speech,
}

/// PCM bytes returned per speech call (50 ms at 24 kHz)
pub const SPEECH_BYTES: usize = 2_400;

pub struct ScriptedGenerator {
    chapters: Vec<ChapterStub>,
    calls: Mutex<HashMap<(CallKind, u32), usize>>,
    gates: Mutex<HashMap<(CallKind, u32), watch::Sender<bool>>>,
    failures: Mutex<HashSet<(CallKind, u32)>>,
    silent: Mutex<HashSet<u32>>,
    with_images: bool,
}

impl ScriptedGenerator {
    /// Generator whose chapter list has `count` chapters numbered from 1
    pub fn new(count: u32) -> Self {
        let chapters = (1..=count)
            .map(|n| ChapterStub {
                chapter_number: n,
                title: format!("Chapter {}", n),
                author: "Test Author".to_string(),
                description: format!("Description {}", n),
            })
            .collect();

        Self {
            chapters,
            calls: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashSet::new()),
            silent: Mutex::new(HashSet::new()),
            with_images: false,
        }
    }

    /// Also return a cover image for every chapter
    pub fn with_images(mut self) -> Self {
        self.with_images = true;
        self
    }

    /// Number of `kind` calls made for `chapter`
    pub fn calls(&self, kind: CallKind, chapter: u32) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(kind, chapter))
            .copied()
            .unwrap_or(0)
    }

    /// Total calls of every kind for `chapter`
    pub fn calls_for_chapter(&self, chapter: u32) -> usize {
        [CallKind::Script, CallKind::Image, CallKind::Speech]
            .into_iter()
            .map(|kind| self.calls(kind, chapter))
            .sum()
    }

    /// Total calls across all chapters
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    /// Hold every later `kind` call for `chapter` until [`release`](Self::release)
    pub fn hold(&self, kind: CallKind, chapter: u32) {
        let (tx, _rx) = watch::channel(false);
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((kind, chapter), tx);
    }

    pub fn release(&self, kind: CallKind, chapter: u32) {
        if let Some(tx) = self
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(kind, chapter))
        {
            tx.send_replace(true);
        }
    }

    /// Make `kind` calls for `chapter` fail with a generation error
    pub fn fail(&self, kind: CallKind, chapter: u32) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((kind, chapter));
    }

    /// Make `kind` calls for `chapter` succeed again
    pub fn heal(&self, kind: CallKind, chapter: u32) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(kind, chapter));
    }

    /// Make speech for `chapter` return no audio
    pub fn silence(&self, chapter: u32) {
        self.silent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chapter);
    }

    async fn enter(&self, kind: CallKind, chapter: u32) -> Result<()> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((kind, chapter))
            .or_insert(0) += 1;

        let gate = self
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(kind, chapter))
            .map(|tx| tx.subscribe());
        if let Some(mut rx) = gate {
            // Sender lives in the map, so wait_for only ends on release
            let _ = rx.wait_for(|open| *open).await;
        }

        let failing = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(kind, chapter));
        if failing {
            return Err(Error::Generation(format!(
                "{:?} failed for chapter {}",
                kind, chapter
            )));
        }
        Ok(())
    }
}

fn chapter_from_script(text: &str) -> u32 {
    text.rsplit(' ')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_chapter_list(&self, _topic: &str) -> Result<Vec<ChapterStub>> {
        Ok(self.chapters.clone())
    }

    async fn generate_script_text(&self, stub: &ChapterStub, _topic: &str) -> Result<String> {
        self.enter(CallKind::Script, stub.chapter_number).await?;
        Ok(format!("Narration for chapter {}", stub.chapter_number))
    }

    async fn generate_cover_image(&self, stub: &ChapterStub) -> Result<Option<String>> {
        self.enter(CallKind::Image, stub.chapter_number).await?;
        if self.with_images {
            return Ok(Some(format!(
                "data:image/png;base64,chapter-{}",
                stub.chapter_number
            )));
        }
        Ok(None)
    }

    async fn generate_speech(&self, text: &str, _narrator: Narrator) -> Result<Option<Vec<u8>>> {
        let chapter = chapter_from_script(text);
        self.enter(CallKind::Speech, chapter).await?;

        let silent = self
            .silent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&chapter);
        if silent {
            return Ok(None);
        }
        Ok(Some(vec![0u8; SPEECH_BYTES]))
    }
}
