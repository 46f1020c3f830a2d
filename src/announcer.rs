use crate::client::ZoneControl;
use crate::config::{Config, ZoneEntry};
use crate::error::{EiscpError, Result};
use crate::player::Player;
use crate::snapshot::ZoneSnapshot;
use crate::zone::{family_for, hex_to_pct, pct_to_hex};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{sleep, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Delays and bounds used while running an announcement
#[derive(Debug, Clone)]
pub struct AnnouncementTiming {
    /// Pause between consecutive receiver commands
    pub settle: Duration,
    /// How often the player is asked whether it is still playing
    pub poll_interval: Duration,
    /// Longest time to wait for playback to end
    pub max_wait: Duration,
    /// Attempts per restore command before giving up on it
    pub restore_attempts: u32,
    /// Pause between restore attempts
    pub restore_backoff: Duration,
}

impl Default for AnnouncementTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(50),
            poll_interval: Duration::from_millis(200),
            max_wait: Duration::from_secs(120),
            restore_attempts: 3,
            restore_backoff: Duration::from_millis(200),
        }
    }
}

/// How the playback wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The player reported it stopped
    Finished,
    /// The wait ceiling passed; the player was told to stop
    WaitCeilingReached,
}

/// Result of one cleanup command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStep {
    Restored,
    /// Nothing to send: not muted, or the snapshot value was unusable
    Skipped,
    /// Every attempt failed
    Failed,
}

/// What the cleanup phase managed to put back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreReport {
    pub unmute: RestoreStep,
    pub input: RestoreStep,
    pub volume: RestoreStep,
}

/// Summary of a completed announcement
#[derive(Debug, Clone)]
pub struct AnnouncementOutcome {
    pub id: Uuid,
    pub snapshot: ZoneSnapshot,
    pub muted: bool,
    pub playback: PlaybackEnd,
    pub restore: RestoreReport,
}

/// Runs announcements: snapshot a zone, switch it to the announcement input,
/// play a clip, then put the zone back the way it was.
///
/// Runs against the same receiver zone are serialised; different zones can
/// announce at the same time.
///
/// # Example
///
/// ```no_run
/// use eiscp_zones::{Announcer, Config, Player, Result};
/// use std::sync::Arc;
///
/// struct Silent;
///
/// #[async_trait::async_trait]
/// impl Player for Silent {
///     async fn play(&self, _resource: &str) -> Result<()> { Ok(()) }
///     async fn is_playing(&self) -> Result<bool> { Ok(false) }
/// }
///
/// #[tokio::main]
/// async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
///     let config = Config::from_file("zones.json")?.with_env_overrides();
///     let announcer = Announcer::from_config(&config, Arc::new(Silent));
///     announcer.run_announcement("patio", 50, "http://pi.local/doorbell.mp3").await?;
///     Ok(())
/// }
/// ```
pub struct Announcer {
    control: Arc<dyn ZoneControl>,
    player: Arc<dyn Player>,
    zones: BTreeMap<String, ZoneEntry>,
    timing: AnnouncementTiming,
    zone_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Announcer {
    /// Create an announcer over a receiver, a player and a zone table
    pub fn new(
        control: Arc<dyn ZoneControl>,
        player: Arc<dyn Player>,
        zones: BTreeMap<String, ZoneEntry>,
    ) -> Self {
        Self {
            control,
            player,
            zones,
            timing: AnnouncementTiming::default(),
            zone_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create an announcer for the receiver and zones in `config`
    pub fn from_config(config: &Config, player: Arc<dyn Player>) -> Self {
        Self::new(Arc::new(config.client()), player, config.zones.clone())
    }

    /// Replace the default delays and bounds
    pub fn with_timing(mut self, timing: AnnouncementTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Play `resource` on the named zone at `volume_pct` and restore the zone afterwards
    pub async fn run_announcement(
        &self,
        zone_name: &str,
        volume_pct: i64,
        resource: &str,
    ) -> Result<AnnouncementOutcome> {
        self.run_announcement_until(zone_name, volume_pct, resource, std::future::pending())
            .await
    }

    /// Like [`run_announcement`](Self::run_announcement), but gives up waiting
    /// for playback once `cancel` completes.
    ///
    /// A cancelled run still stops the player, unmutes and restores the zone
    /// before returning [`EiscpError::Cancelled`].
    pub async fn run_announcement_until<F>(
        &self,
        zone_name: &str,
        volume_pct: i64,
        resource: &str,
        cancel: F,
    ) -> Result<AnnouncementOutcome>
    where
        F: Future<Output = ()>,
    {
        let entry = self
            .zones
            .get(zone_name)
            .ok_or_else(|| EiscpError::Configuration(format!("unknown zone '{}'", zone_name)))?;

        let id = Uuid::new_v4();
        let span = tracing::info_span!("announcement", %id, zone = zone_name, zone_id = %entry.zone_id);
        self.run(id, entry, volume_pct, resource, cancel)
            .instrument(span)
            .await
    }

    async fn run<F>(
        &self,
        id: Uuid,
        entry: &ZoneEntry,
        volume_pct: i64,
        resource: &str,
        cancel: F,
    ) -> Result<AnnouncementOutcome>
    where
        F: Future<Output = ()>,
    {
        let zone = entry.zone_id.as_str();
        let announcement_input = entry.announcement_input();
        tokio::pin!(cancel);

        // Until the zone state is captured a cancel just walks away.
        let (_guard, snapshot) = tokio::select! {
            biased;
            _ = &mut cancel => {
                tracing::info!("Announcement cancelled before the zone state was captured");
                return Err(EiscpError::Cancelled);
            }
            prepared = self.prepare(zone, &announcement_input, resource, volume_pct) => prepared?,
        };

        // Muting masks the re-select artifact when the zone was already on this input.
        let muted = snapshot.was_on_announcement_input;

        // Switch failures abort without restoring anything; a cancel restores.
        let switched = tokio::select! {
            biased;
            _ = &mut cancel => Err(EiscpError::Cancelled),
            switched = self.switch(zone, &announcement_input, volume_pct, muted) => switched,
        };
        if let Err(e) = switched {
            if matches!(e, EiscpError::Cancelled) {
                tracing::warn!("Announcement cancelled while switching, restoring zone");
                self.restore(zone, &snapshot, muted).await;
            }
            return Err(e);
        }

        // From here on the zone is restored on every exit path.
        let playback = self.play(resource, cancel.as_mut()).await;

        let restore = self.restore(zone, &snapshot, muted).await;

        let playback = playback?;
        tracing::info!(?playback, ?restore, "Announcement finished");
        Ok(AnnouncementOutcome {
            id,
            snapshot,
            muted,
            playback,
            restore,
        })
    }

    /// Take the zone lock, power the zone on and capture its state
    async fn prepare(
        &self,
        zone: &str,
        announcement_input: &str,
        resource: &str,
        volume_pct: i64,
    ) -> Result<(OwnedMutexGuard<()>, ZoneSnapshot)> {
        let guard = self.lock_zone(zone).await;
        tracing::info!("Starting announcement of {} at {}%", resource, volume_pct);

        self.send("power on", self.control.power(zone, true)).await?;
        let snapshot = self.snapshot(zone, announcement_input).await?;
        Ok((guard, snapshot))
    }

    async fn switch(&self, zone: &str, announcement_input: &str, volume_pct: i64, mute: bool) -> Result<()> {
        self.send("select announcement input", self.control.input_select(zone, announcement_input))
            .await?;
        self.send("set announcement volume", self.control.volume_set(zone, &pct_to_hex(volume_pct)))
            .await?;
        if mute {
            self.send("mute", self.control.mute(zone, true)).await?;
        }
        Ok(())
    }

    async fn lock_zone(&self, zone: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.zone_locks.lock().await;
            locks.entry(zone.to_string()).or_default().clone()
        };
        if lock.try_lock().is_err() {
            tracing::info!("Zone {} busy, waiting for running announcement", zone);
        }
        lock.lock_owned().await
    }

    /// Send a set command; a missing reply counts as a failure like any other
    async fn send<Fut>(&self, what: &str, command: Fut) -> Result<()>
    where
        Fut: Future<Output = Result<String>>,
    {
        match command.await {
            Ok(reply) => {
                tracing::debug!("{}: {}", what, reply);
                self.settle().await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", what, e);
                Err(e)
            }
        }
    }

    async fn snapshot(&self, zone: &str, announcement_input: &str) -> Result<ZoneSnapshot> {
        let input = answered(self.control.input_query(zone).await)?;
        self.settle().await;
        let volume = answered(self.control.volume_query(zone).await)?;
        self.settle().await;

        let snapshot = ZoneSnapshot::from_replies(
            family_for(zone),
            input.as_deref(),
            volume.as_deref(),
            announcement_input,
        );
        tracing::info!(
            input = ?snapshot.previous_input,
            volume = %snapshot.previous_volume,
            volume_pct = ?hex_to_pct(&snapshot.previous_volume),
            on_announcement_input = snapshot.was_on_announcement_input,
            "Captured zone state"
        );
        Ok(snapshot)
    }

    async fn play<F>(&self, resource: &str, cancel: F) -> Result<PlaybackEnd>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        let result = tokio::select! {
            biased;
            _ = &mut cancel => {
                tracing::warn!("Announcement cancelled during playback");
                Err(EiscpError::Cancelled)
            }
            result = self.play_to_end(resource) => result,
        };

        if !matches!(result, Ok(PlaybackEnd::Finished)) {
            if let Err(e) = self.player.stop().await {
                tracing::warn!("Failed to stop playback: {}", e);
            }
        }
        result
    }

    async fn play_to_end(&self, resource: &str) -> Result<PlaybackEnd> {
        self.player
            .play(resource)
            .await
            .map_err(|e| playback_error("start", resource, e))?;

        let deadline = Instant::now() + self.timing.max_wait;
        loop {
            let playing = self
                .player
                .is_playing()
                .await
                .map_err(|e| playback_error("poll", resource, e))?;
            if !playing {
                return Ok(PlaybackEnd::Finished);
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!("Playback still running after {:?}, stopping", self.timing.max_wait);
                return Ok(PlaybackEnd::WaitCeilingReached);
            }
            sleep(self.timing.poll_interval.min(deadline - now)).await;
        }
    }

    async fn restore(&self, zone: &str, snapshot: &ZoneSnapshot, muted: bool) -> RestoreReport {
        let unmute = if muted {
            self.retry("unmute", || self.control.mute(zone, false)).await
        } else {
            RestoreStep::Skipped
        };

        let input = match snapshot.restorable_input() {
            Some(code) => self.retry("restore input", || self.control.input_select(zone, code)).await,
            None => {
                tracing::debug!("No usable previous input ({:?})", snapshot.previous_input);
                RestoreStep::Skipped
            }
        };

        let volume = match snapshot.restorable_volume() {
            Some(hex) => self.retry("restore volume", || self.control.volume_set(zone, hex)).await,
            None => {
                tracing::debug!("No usable previous volume ({})", snapshot.previous_volume);
                RestoreStep::Skipped
            }
        };

        RestoreReport { unmute, input, volume }
    }

    async fn retry<F, Fut>(&self, what: &str, mut command: F) -> RestoreStep
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let attempts = self.timing.restore_attempts.max(1);
        for attempt in 1..=attempts {
            if attempt > 1 {
                tracing::info!("Retrying {} (attempt {}/{})", what, attempt, attempts);
                sleep(self.timing.restore_backoff).await;
            }
            if self.send(what, command()).await.is_ok() {
                return RestoreStep::Restored;
            }
        }
        tracing::warn!("Giving up on {} after {} attempts", what, attempts);
        RestoreStep::Failed
    }

    async fn settle(&self) {
        if !self.timing.settle.is_zero() {
            sleep(self.timing.settle).await;
        }
    }
}

fn playback_error(action: &str, resource: &str, error: EiscpError) -> EiscpError {
    match error {
        EiscpError::Playback(_) => error,
        other => EiscpError::Playback(format!("cannot {} {}: {}", action, resource, other)),
    }
}

/// A query that timed out yields `None`; transport failures still abort.
fn answered(reply: Result<String>) -> Result<Option<String>> {
    match reply {
        Ok(reply) => Ok(Some(reply)),
        Err(e) if e.is_timeout() => {
            tracing::warn!("Zone query unanswered: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
