//! # Chaptercast Player Library
//!
//! Audiobook-style player for generated chapters: each track is enriched on
//! demand (script, cover image, narrated speech), cached, played through a
//! persistent audio sink and followed by a prefetch of the next chapter.
//!
//! **Architecture:** job-based controller over an enrichment pipeline, a
//! per-index track cache and a cpal output graph, with an axum HTTP/SSE
//! control surface.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod generator;
pub mod playback;
pub mod playlist;
pub mod state;

pub use error::{Error, Result};
pub use playback::{Direction, Player, PlayerSettings};
pub use playlist::{ChapterStub, Narrator, Playlist, Track, TrackSnapshot};
pub use state::{PlayerStatus, SharedState};
