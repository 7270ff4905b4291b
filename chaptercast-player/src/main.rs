//! Chaptercast Player - Main entry point
//!
//! Generates a chapter list for a topic, then serves the player's HTTP/SSE
//! control surface while narrating chapters on demand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chaptercast_player::audio::{AudioBackend, CpalOutput, NullOutput};
use chaptercast_player::config::TomlConfig;
use chaptercast_player::generator::{ContentGenerator, GeminiGenerator};
use chaptercast_player::{Narrator, Player, PlayerSettings, Playlist};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for chaptercast-player
#[derive(Parser, Debug)]
#[command(name = "chaptercast-player")]
#[command(about = "Narrated chapter player for generated topics")]
#[command(version)]
struct Args {
    /// Topic to build the chapter list for
    #[arg(short, long, env = "CHAPTERCAST_TOPIC")]
    topic: String,

    /// Narrator voice (Puck, Kore, Fenrir, Charon, Zephyr)
    #[arg(short, long, env = "CHAPTERCAST_VOICE")]
    voice: Option<String>,

    /// Index of the track to start with
    #[arg(short, long, default_value = "0")]
    start: usize,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "CHAPTERCAST_PORT")]
    port: Option<u16>,

    /// Run without an audio device (sources advance on the clock)
    #[arg(long)]
    no_audio: bool,

    /// Audio output device name (overrides config)
    #[arg(long, env = "CHAPTERCAST_DEVICE")]
    device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing (RUST_LOG overrides the configured level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "chaptercast_player={},tower_http={}",
                    config.logging.level, config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Chaptercast Player v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let Some(port) = args.port {
        config.api.port = port;
    }
    if args.device.is_some() {
        config.audio.device = args.device.clone();
    }
    let narrator: Narrator = match &args.voice {
        Some(voice) => voice.parse().context("Invalid --voice")?,
        None => config.narrator()?,
    };

    // Generator collaborator
    let api_key = config
        .generator
        .resolve_api_key()
        .context("No generator API key configured")?;
    let generator: Arc<dyn ContentGenerator> = Arc::new(
        GeminiGenerator::new(config.generator.clone(), api_key, config.chapter_count)
            .context("Failed to build generator client")?,
    );

    let playlist = Playlist::generate(generator.as_ref(), &args.topic)
        .await
        .context("Failed to generate chapter list")?;
    if args.start >= playlist.len() {
        bail!(
            "--start {} is out of range (playlist has {} tracks)",
            args.start,
            playlist.len()
        );
    }

    // Output graph
    let backend: Arc<dyn AudioBackend> = if args.no_audio {
        info!("Audio disabled, using clock-driven output");
        Arc::new(NullOutput::new())
    } else {
        Arc::new(
            CpalOutput::open(config.audio.device.clone(), config.audio.volume)
                .context("Failed to open audio output")?,
        )
    };

    let player = Player::new(
        playlist,
        generator,
        backend,
        PlayerSettings {
            narrator,
            sample_rate: config.audio.sample_rate,
        },
    );
    player.switch_to(args.start);

    let shutdown_player = Arc::clone(&player);
    let shutdown = async move {
        shutdown_signal().await;
        info!("Shutting down");
        shutdown_player.close().await;
    };

    chaptercast_player::api::run(&config.api, Arc::clone(&player), shutdown)
        .await
        .context("HTTP server failed")?;

    // Server may exit on its own (bind error path returns above)
    if !player.is_closed() {
        warn!("Server stopped without a shutdown signal");
        player.close().await;
    }

    info!("Chaptercast Player stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
