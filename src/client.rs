use crate::connection::{self, Connection, DEFAULT_PORT, DEFAULT_READ_WINDOW};
use crate::error::{EiscpError, Result};
use crate::zone::{family_for, pct_to_hex};
use async_trait::async_trait;
use std::time::Duration;

/// Zone operations the announcer needs from a receiver.
///
/// Every method returns the raw reply payload (for example `"!1ZVL20"`).
#[async_trait]
pub trait ZoneControl: Send + Sync {
    /// Switch a zone on or off
    async fn power(&self, zone: &str, on: bool) -> Result<String>;

    /// Ask which input a zone is on
    async fn input_query(&self, zone: &str) -> Result<String>;

    /// Ask a zone's current volume
    async fn volume_query(&self, zone: &str) -> Result<String>;

    /// Select an input by its two-character code
    async fn input_select(&self, zone: &str, code: &str) -> Result<String>;

    /// Set a zone's volume on the 00-64 hex scale
    async fn volume_set(&self, zone: &str, hex: &str) -> Result<String>;

    /// Mute or unmute a zone
    async fn mute(&self, zone: &str, on: bool) -> Result<String>;
}

/// Client for an eISCP receiver
///
/// Each call resolves the zone's command family, builds the bare command and
/// runs one transaction on a fresh connection.
///
/// # Example
///
/// ```no_run
/// use eiscp_zones::EiscpClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = EiscpClient::new("192.168.50.249");
///     client.power("2", true).await?;
///     client.volume_percent("2", 40).await?;
///     let input = client.input_query("2").await?;
///     println!("Zone 2 input: {}", input);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct EiscpClient {
    connection: Connection,
    read_window: Duration,
}

impl EiscpClient {
    /// Client for a receiver on the standard port 60128
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_port(host, DEFAULT_PORT)
    }

    /// Client for a receiver listening on a non-standard port
    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            connection: Connection::new(host, port),
            read_window: DEFAULT_READ_WINDOW,
        }
    }

    /// Change how long each transaction waits for replies
    pub fn with_read_window(mut self, read_window: Duration) -> Self {
        self.read_window = read_window;
        self
    }

    /// The underlying transport
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Run one transaction with this client's read window
    pub async fn transact(&self, zone: &str, bare_command: &str, expected_prefix: &str) -> Result<String> {
        self.connection
            .transact(zone, bare_command, expected_prefix, self.read_window)
            .await
    }

    /// Send a complete message such as `"!1PWR01\r"` and return the first reply
    pub async fn send_raw(&self, message: &str) -> Result<String> {
        self.connection.send_raw(message, self.read_window).await
    }

    // ========== Power ==========

    /// Switch a zone on or off
    pub async fn power(&self, zone: &str, on: bool) -> Result<String> {
        let family = family_for(zone);
        self.transact(zone, &family.power_command(on), family.power).await
    }

    /// Query a zone's power state
    pub async fn power_query(&self, zone: &str) -> Result<String> {
        let family = family_for(zone);
        self.query(zone, family.power_query, family.power).await
    }

    // ========== Volume ==========

    /// Set a zone's volume from a two-digit hex value
    pub async fn volume_set(&self, zone: &str, hex: &str) -> Result<String> {
        let family = family_for(zone);
        self.transact(zone, &family.volume_command(&hex.to_ascii_uppercase()), family.volume)
            .await
    }

    /// Set a zone's volume from a percentage, clamped to 0..=100
    pub async fn volume_percent(&self, zone: &str, pct: i64) -> Result<String> {
        self.volume_set(zone, &pct_to_hex(pct)).await
    }

    /// Query a zone's volume
    pub async fn volume_query(&self, zone: &str) -> Result<String> {
        let family = family_for(zone);
        self.query(zone, family.volume_query, family.volume).await
    }

    // ========== Mute ==========

    /// Mute or unmute a zone
    pub async fn mute(&self, zone: &str, on: bool) -> Result<String> {
        let family = family_for(zone);
        self.transact(zone, &family.mute_command(on), family.mute).await
    }

    /// Query a zone's mute state
    pub async fn mute_query(&self, zone: &str) -> Result<String> {
        let family = family_for(zone);
        self.query(zone, family.mute_query, family.mute).await
    }

    // ========== Input Selection ==========

    /// Select an input by code, e.g. `"2B"` for network
    pub async fn input_select(&self, zone: &str, code: &str) -> Result<String> {
        let family = family_for(zone);
        self.transact(zone, &family.input_command(&code.to_ascii_uppercase()), family.input)
            .await
    }

    /// Query a zone's selected input
    pub async fn input_query(&self, zone: &str) -> Result<String> {
        let family = family_for(zone);
        self.query(zone, family.input_query, family.input).await
    }

    /// A query reply is only useful when it belongs to the queried family;
    /// the transport's first-frame fallback may hand back a broadcast instead.
    async fn query(&self, zone: &str, command: &str, token: &str) -> Result<String> {
        let reply = self.transact(zone, command, token).await?;
        if connection::matches_prefix(&reply, token) {
            Ok(reply)
        } else {
            Err(EiscpError::UnexpectedResponse {
                expected: token.to_string(),
                received: reply,
            })
        }
    }
}

#[async_trait]
impl ZoneControl for EiscpClient {
    async fn power(&self, zone: &str, on: bool) -> Result<String> {
        EiscpClient::power(self, zone, on).await
    }

    async fn input_query(&self, zone: &str) -> Result<String> {
        EiscpClient::input_query(self, zone).await
    }

    async fn volume_query(&self, zone: &str) -> Result<String> {
        EiscpClient::volume_query(self, zone).await
    }

    async fn input_select(&self, zone: &str, code: &str) -> Result<String> {
        EiscpClient::input_select(self, zone, code).await
    }

    async fn volume_set(&self, zone: &str, hex: &str) -> Result<String> {
        EiscpClient::volume_set(self, zone, hex).await
    }

    async fn mute(&self, zone: &str, on: bool) -> Result<String> {
        EiscpClient::mute(self, zone, on).await
    }
}

/// The argument part of a reply: `"!1SLZ2B"` with token `"SLZ"` gives `"2B"`
pub fn reply_argument<'a>(payload: &'a str, token: &str) -> Option<&'a str> {
    connection::response_body(payload).strip_prefix(token)
}
