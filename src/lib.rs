//! Rust library for controlling multi-zone eISCP receivers
//!
//! This library provides an async API for talking to receivers over the
//! binary-framed eISCP protocol (TCP port 60128) and for running zone
//! announcements. It supports:
//!
//! - Frame encoding and incremental decoding
//! - Per-zone command families (main zone, zone 2, zone 3)
//! - Power, volume, mute and input control with bounded reply windows
//! - Announcements that snapshot a zone, play a clip and restore the zone
//!
//! # Quick Start
//!
//! ```no_run
//! use eiscp_zones::EiscpClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EiscpClient::new("192.168.50.249");
//!
//!     client.power("1", true).await?;
//!     client.input_select("1", "2B").await?;
//!     client.volume_percent("1", 35).await?;
//!
//!     let volume = client.volume_query("1").await?;
//!     println!("Main zone volume: {}", volume);
//!     Ok(())
//! }
//! ```
//!
//! # Announcements
//!
//! An [`Announcer`] needs a [`Player`] that can play the clip; the crate does
//! not launch media tools itself. See [`Announcer`] for a full example.
//!
//! # Architecture
//!
//! - **Frame**: eISCP binary envelope and the per-connection [`FrameReader`]
//! - **Zone**: static command-family table and volume helpers
//! - **Connection**: one TCP transaction per command, prefix-matched replies
//! - **Client**: high-level zone operations
//! - **Announcer**: the snapshot / play / restore sequence

mod announcer;
mod client;
mod config;
mod connection;
mod error;
mod frame;
mod player;
mod snapshot;
mod zone;

// Public exports
pub use announcer::{
    AnnouncementOutcome, AnnouncementTiming, Announcer, PlaybackEnd, RestoreReport, RestoreStep,
};
pub use client::{reply_argument, EiscpClient, ZoneControl};
pub use config::{Config, ReceiverConfig, ZoneEntry, RECEIVER_HOST_ENV};
pub use connection::{Connection, DEFAULT_PORT, DEFAULT_READ_WINDOW};
pub use error::{EiscpError, Result};
pub use frame::{decode, encode, FrameReader, HEADER_SIZE, MAGIC};
pub use player::Player;
pub use snapshot::{ZoneSnapshot, FALLBACK_VOLUME};
pub use zone::{family_for, hex_to_pct, is_hex_code, pct_to_hex, CommandFamily, MAIN_ZONE};
