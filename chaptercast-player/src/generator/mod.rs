//! Content generator collaborator
//!
//! The player treats generation as an opaque external service. Everything it
//! needs (chapter list, narration script, cover art, speech) goes through
//! [`ContentGenerator`], so tests can substitute a scripted implementation.

pub mod gemini;

pub use gemini::GeminiGenerator;

use crate::error::Result;
use crate::playlist::{ChapterStub, Narrator};
use async_trait::async_trait;

/// Placeholder returned when the script request itself fails
pub const SCRIPT_FAILURE_PLACEHOLDER: &str =
    "Sorry, I couldn't generate the text for this chapter.";

/// Placeholder returned when the script response is empty
pub const SCRIPT_EMPTY_PLACEHOLDER: &str = "Content generation failed.";

/// External generator interface
///
/// All errors are `Error::Generation`.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Turn a topic into an ordered list of chapter stubs
    ///
    /// Fails on a malformed or empty response.
    async fn generate_chapter_list(&self, topic: &str) -> Result<Vec<ChapterStub>>;

    /// Narration script for one chapter
    ///
    /// Implementations may return a placeholder string instead of failing;
    /// callers treat any returned text as success.
    async fn generate_script_text(&self, stub: &ChapterStub, topic: &str) -> Result<String>;

    /// Cover image reference, or `None` when the model produced no image
    async fn generate_cover_image(&self, stub: &ChapterStub) -> Result<Option<String>>;

    /// Raw 16-bit little-endian mono PCM, or `None` when no audio came back
    async fn generate_speech(&self, text: &str, narrator: Narrator) -> Result<Option<Vec<u8>>>;
}
