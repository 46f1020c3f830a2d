use crate::client::reply_argument;
use crate::zone::{is_hex_code, CommandFamily};

/// Volume restored when the zone never answered the volume query (50%)
pub const FALLBACK_VOLUME: &str = "32";

/// Zone state captured before an announcement and put back afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSnapshot {
    /// Input code the zone was on, if the receiver told us
    pub previous_input: Option<String>,

    /// Raw volume argument, or [`FALLBACK_VOLUME`] when the query timed out
    pub previous_volume: String,

    /// The zone was already on the announcement input before we switched
    pub was_on_announcement_input: bool,
}

impl ZoneSnapshot {
    /// Build a snapshot from the raw query replies.
    ///
    /// `None` stands for a query that got no usable answer.
    pub fn from_replies(
        family: &CommandFamily,
        input_reply: Option<&str>,
        volume_reply: Option<&str>,
        announcement_input: &str,
    ) -> Self {
        let previous_input = input_reply
            .and_then(|reply| reply_argument(reply, family.input))
            .map(|code| code.trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty());

        let previous_volume = volume_reply
            .and_then(|reply| reply_argument(reply, family.volume))
            .map(|v| v.trim().to_ascii_uppercase())
            .unwrap_or_else(|| FALLBACK_VOLUME.to_string());

        let was_on_announcement_input = previous_input
            .as_deref()
            .is_some_and(|code| code.eq_ignore_ascii_case(announcement_input));

        Self {
            previous_input,
            previous_volume,
            was_on_announcement_input,
        }
    }

    /// Input code to restore, if it is well-formed
    pub fn restorable_input(&self) -> Option<&str> {
        self.previous_input.as_deref().filter(|code| is_hex_code(code))
    }

    /// Volume to restore, if it is well-formed
    pub fn restorable_volume(&self) -> Option<&str> {
        Some(self.previous_volume.as_str()).filter(|v| is_hex_code(v))
    }
}
