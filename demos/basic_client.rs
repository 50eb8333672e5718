// ABOUTME: Minimal runnable client wiring the session to a logging stub sink
// ABOUTME: Usage: cargo run --example basic_client -- ws://localhost:8927/ws

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use wavelink::audio::{AudioFormat, AudioSink, FeedRequest, Sample, SinkError, VolumeState};
use wavelink::player::{EngineConfig, PlayerEngine};
use wavelink::{Session, SessionConfig, SessionIdentity};

/// Stand-in for a platform audio backend: logs every call and swallows the
/// samples. Replace with a real sink implementation to hear audio.
struct LoggingSink;

#[async_trait]
impl AudioSink for LoggingSink {
    async fn setup(
        &self,
        format: &AudioFormat,
        _feed_requests: mpsc::Sender<FeedRequest>,
    ) -> Result<(), SinkError> {
        log::info!(
            "sink setup: {} Hz, {} ch, {} bit",
            format.sample_rate,
            format.channels,
            format.bit_depth
        );
        Ok(())
    }

    fn set_feed_threshold(&self, frames: u32) {
        log::info!("sink feed threshold: {} frames", frames);
    }

    async fn start(&self) -> Result<(), SinkError> {
        log::info!("sink start");
        Ok(())
    }

    async fn feed(&self, samples: &[Sample]) -> Result<(), SinkError> {
        log::debug!("sink feed: {} samples", samples.len());
        Ok(())
    }

    async fn release(&self) -> Result<(), SinkError> {
        log::info!("sink release");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:8927/ws".to_string());

    let volume = VolumeState::default();
    let player = PlayerEngine::spawn(
        Arc::new(LoggingSink),
        volume.clone(),
        EngineConfig::default(),
    );
    player.initialize(AudioFormat::default()).await?;

    let config = SessionConfig::new(SessionIdentity::generate("wavelink demo"));
    let session = Session::new(config, player.clone(), volume);

    let mut states = session.connection_states();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            log::info!("connection: {}", *states.borrow());
        }
    });

    log::info!("connecting to {}", url);
    session.connect(&url).await?;

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    session.dispose().await;
    Ok(())
}
