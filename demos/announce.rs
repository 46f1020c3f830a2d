//! Run one announcement from the command line.
//!
//! ```text
//! cargo run --example announce -- zones.json patio 40 http://pi.local/doorbell.mp3
//! ```
//!
//! Playback is simulated with a timer so the receiver side can be tried
//! without a media player attached.

use async_trait::async_trait;
use eiscp_zones::{Announcer, Config, Player, Result};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Pretends to play every clip for a fixed duration
struct TimedPlayer {
    length: Duration,
    started: Mutex<Option<Instant>>,
}

#[async_trait]
impl Player for TimedPlayer {
    async fn play(&self, resource: &str) -> Result<()> {
        println!("Playing {} for {:?}", resource, self.length);
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        Ok(())
    }

    async fn is_playing(&self) -> Result<bool> {
        let started = self.started.lock().ok().and_then(|s| *s);
        Ok(started.is_some_and(|t| t.elapsed() < self.length))
    }

    async fn stop(&self) -> Result<()> {
        if let Ok(mut started) = self.started.lock() {
            *started = None;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [config_path, zone, volume, resource] = args.as_slice() else {
        eprintln!("usage: announce <zones.json> <zone> <volume%> <resource>");
        std::process::exit(2);
    };

    let config = Config::from_file(config_path)?.with_env_overrides();
    println!(
        "Receiver {}:{}, zones: {:?}",
        config.receiver.host,
        config.receiver.port,
        config.zones.keys().collect::<Vec<_>>()
    );

    let player = std::sync::Arc::new(TimedPlayer {
        length: Duration::from_secs(3),
        started: Mutex::new(None),
    });
    let announcer = Announcer::from_config(&config, player);

    let volume: i64 = volume.parse()?;
    let outcome = announcer
        .run_announcement_until(zone, volume, resource, async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await?;

    println!(
        "Announcement {} done: muted={} playback={:?} restore={:?}",
        outcome.id, outcome.muted, outcome.playback, outcome.restore
    );
    Ok(())
}
