//! # Chaptercast Common Library
//!
//! Shared code for the chaptercast workspace including:
//! - Event types (ChapterEvent enum) and the broadcast EventBus
//! - Player state enumeration
//! - Configuration file discovery
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{ChapterEvent, EventBus, PlayerState};
