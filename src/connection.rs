use crate::error::{EiscpError, Result};
use crate::frame::{self, FrameReader};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};

/// Fixed eISCP receiver port
pub const DEFAULT_PORT: u16 = 60128;

/// How long a transaction keeps reading frames after sending its command
pub const DEFAULT_READ_WINDOW: Duration = Duration::from_millis(300);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const READ_CHUNK: usize = 1024;

/// One-shot TCP transport to a receiver.
///
/// Every call opens its own connection, sends one framed command and reads
/// frames until the window closes. Nothing is kept between calls.
#[derive(Debug, Clone)]
pub struct Connection {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl Connection {
    /// Create a transport for the receiver at `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Override how long opening the socket may take
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// The receiver's `host:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Send `!{zone}{bare_command}` and wait for a reply from `expected_prefix`'s family.
    ///
    /// Frames from other families are unsolicited status broadcasts and are
    /// skipped. When the window closes without a match, the first non-empty
    /// frame is returned instead; when nothing arrived at all the result is
    /// [`EiscpError::Timeout`].
    pub async fn transact(
        &self,
        zone: &str,
        bare_command: &str,
        expected_prefix: &str,
        window: Duration,
    ) -> Result<String> {
        let message = format!("!{}{}", zone, bare_command);
        self.exchange(&message, expected_prefix, window).await
    }

    /// Send an already formed message such as `"!1PWR01\r"` and return the first reply
    pub async fn send_raw(&self, message: &str, window: Duration) -> Result<String> {
        self.exchange(message, "", window).await
    }

    async fn exchange(&self, message: &str, expected_prefix: &str, window: Duration) -> Result<String> {
        let mut stream = self.open().await?;

        tracing::debug!("Sending to {}: {}", self.addr(), message.trim_end());
        stream
            .write_all(&frame::encode(message))
            .await
            .map_err(|e| EiscpError::connectivity(self.addr(), e))?;

        let deadline = Instant::now() + window;
        let mut reader = FrameReader::new();
        let mut fallback: Option<String> = None;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            loop {
                let payload = match reader.next_frame() {
                    Ok(Some(payload)) => payload,
                    Ok(None) => break,
                    Err(e) => match fallback {
                        Some(payload) => {
                            tracing::warn!("Dropping rest of reply stream: {}", e);
                            return Ok(payload);
                        }
                        None => return Err(e),
                    },
                };
                if payload.is_empty() {
                    continue;
                }
                if matches_prefix(&payload, expected_prefix) {
                    tracing::debug!("Received: {}", payload);
                    return Ok(payload);
                }
                tracing::debug!("Skipping unsolicited frame: {}", payload);
                fallback.get_or_insert(payload);
            }

            let read = match timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(read) => read,
                Err(_) => break,
            };
            match read {
                Ok(0) => {
                    tracing::debug!("Receiver closed the connection");
                    break;
                }
                Ok(n) => reader.push(&chunk[..n]),
                Err(e) => return Err(EiscpError::connectivity(self.addr(), e)),
            }
        }

        match fallback {
            Some(payload) => {
                tracing::debug!(
                    "No {} reply for {}, using first frame: {}",
                    expected_prefix,
                    message.trim_end(),
                    payload
                );
                Ok(payload)
            }
            None => Err(EiscpError::Timeout),
        }
    }

    async fn open(&self) -> Result<TcpStream> {
        let addr = self.addr();
        match timeout(self.connect_timeout, TcpStream::connect((self.host.as_str(), self.port))).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(EiscpError::connectivity(addr, e)),
            Err(_) => Err(EiscpError::connectivity(
                addr,
                std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
            )),
        }
    }
}

/// Does `payload` carry a reply from the family `prefix`?
///
/// Replies look like `!1MVL20`: a start character and a unit type, then the
/// family token. An empty prefix matches anything.
pub(crate) fn matches_prefix(payload: &str, prefix: &str) -> bool {
    response_body(payload).starts_with(prefix)
}

/// The part of a reply after the `!` and unit type
pub(crate) fn response_body(payload: &str) -> &str {
    match payload.strip_prefix('!') {
        Some(rest) => rest.get(1..).unwrap_or(""),
        None => payload,
    }
}
