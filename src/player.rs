//! Playback collaborator used by the announcer.
//!
//! The crate never launches media tools itself; whoever runs announcements
//! plugs in something that can start a clip and report whether it is still
//! playing (an MPD client, a process wrapper, a test double).

use crate::error::Result;
use async_trait::async_trait;

/// Something that can play an announcement clip
#[async_trait]
pub trait Player: Send + Sync {
    /// Start playing `resource` (a URL or path). Should return once playback has started.
    async fn play(&self, resource: &str) -> Result<()>;

    /// Whether the clip is still playing
    async fn is_playing(&self) -> Result<bool>;

    /// Stop playback early. Called when the wait ceiling is hit or the run is cancelled.
    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
