//! Test helper modules for chaptercast-player integration tests
//!
//! - ScriptedGenerator: gated, failure-injectable content generator
//! - ManualBackend: audio backend whose sources end only when told to

#![allow(dead_code)]

pub mod manual_backend;
pub mod scripted_generator;

pub use manual_backend::ManualBackend;
pub use scripted_generator::{CallKind, ScriptedGenerator, SPEECH_BYTES};

use chaptercast_common::ChapterEvent;
use chaptercast_player::{Player, PlayerSettings, Playlist};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub const TOPIC: &str = "History of Rocketry";

pub struct TestPlayer {
    pub player: Arc<Player>,
    pub generator: Arc<ScriptedGenerator>,
    pub backend: Arc<ManualBackend>,
}

/// Player over a scripted playlist with `count` chapters
pub async fn setup(count: u32) -> TestPlayer {
    setup_with(ScriptedGenerator::new(count)).await
}

pub async fn setup_with(generator: ScriptedGenerator) -> TestPlayer {
    let generator = Arc::new(generator);
    let playlist = Playlist::generate(generator.as_ref(), TOPIC)
        .await
        .expect("playlist");
    let backend = Arc::new(ManualBackend::new());
    let player = Player::new(
        playlist,
        generator.clone(),
        backend.clone(),
        PlayerSettings::default(),
    );

    TestPlayer {
        player,
        generator,
        backend,
    }
}

/// Poll `condition` until it holds, failing after five seconds
pub async fn wait_until<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Drain every event currently queued on `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<ChapterEvent>) -> Vec<ChapterEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
