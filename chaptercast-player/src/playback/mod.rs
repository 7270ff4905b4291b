//! Playback orchestration
//!
//! - [`job`]: monotonic job ids and cancellation tokens
//! - [`cache`]: per-index enriched track records
//! - [`enrichment`]: content and speech stages
//! - [`prefetch`]: best-effort warming of the next track
//! - [`engine`]: active source management on top of an audio backend
//! - [`controller`]: the [`Player`] that ties them together

pub mod cache;
pub mod controller;
pub mod engine;
pub mod enrichment;
pub mod events;
pub mod job;
pub mod prefetch;

pub use cache::TrackCache;
pub use controller::{Direction, Player, PlayerSettings};
pub use engine::PlaybackEngine;
pub use enrichment::{EnrichmentPipeline, StageOutcome};
pub use events::PlaybackEvent;
pub use job::{JobEpoch, JobToken};
pub use prefetch::Prefetcher;
