//! Per-zone command families and volume helpers.
//!
//! Each receiver zone answers to its own set of ISCP command tokens. The
//! table below is the only place those tokens live; query forms are spelled
//! out literally because the receiver firmware matches them byte for byte.

/// Logical zone identifier of the main zone
pub const MAIN_ZONE: &str = "1";

/// Highest value on the receiver's volume scale
pub const MAX_VOLUME: u8 = 100;

/// ASCII command tokens for one zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFamily {
    pub power: &'static str,
    pub power_query: &'static str,
    pub volume: &'static str,
    pub volume_query: &'static str,
    pub input: &'static str,
    pub input_query: &'static str,
    pub mute: &'static str,
    pub mute_query: &'static str,
}

const MAIN: CommandFamily = CommandFamily {
    power: "PWR",
    power_query: "PWRQSTN",
    volume: "MVL",
    volume_query: "MVLQSTN",
    input: "SLI",
    input_query: "SLIQSTN",
    mute: "AMT",
    mute_query: "AMTQSTN",
};

const ZONE2: CommandFamily = CommandFamily {
    power: "ZPW",
    power_query: "ZPWQSTN",
    volume: "ZVL",
    volume_query: "ZVLQSTN",
    input: "SLZ",
    input_query: "SLZQSTN",
    mute: "ZMT",
    mute_query: "ZMTQSTN",
};

const ZONE3: CommandFamily = CommandFamily {
    power: "PW3",
    power_query: "PW3QSTN",
    volume: "VL3",
    volume_query: "VL3QSTN",
    input: "SL3",
    input_query: "SL3QSTN",
    mute: "MT3",
    mute_query: "MT3QSTN",
};

static FAMILIES: [(&str, CommandFamily); 3] = [(MAIN_ZONE, MAIN), ("2", ZONE2), ("3", ZONE3)];

/// Look up the command family for a zone.
///
/// Zones other than "1", "2" and "3" get the main-zone family.
pub fn family_for(zone: &str) -> &'static CommandFamily {
    FAMILIES
        .iter()
        .find(|(id, _)| *id == zone.trim())
        .map_or(&FAMILIES[0].1, |(_, family)| family)
}

impl CommandFamily {
    /// `PWR01` / `PWR00`
    pub fn power_command(&self, on: bool) -> String {
        format!("{}{}", self.power, on_off(on))
    }

    /// `MVL32`; `hex` is expected to be two uppercase hex digits
    pub fn volume_command(&self, hex: &str) -> String {
        format!("{}{}", self.volume, hex)
    }

    /// `AMT01` / `AMT00`
    pub fn mute_command(&self, on: bool) -> String {
        format!("{}{}", self.mute, on_off(on))
    }

    /// `SLI2B`
    pub fn input_command(&self, code: &str) -> String {
        format!("{}{}", self.input, code)
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "01"
    } else {
        "00"
    }
}

/// Convert a volume percentage to the receiver's two-digit hex scale.
///
/// Out-of-range values are clamped to 0..=100 first.
pub fn pct_to_hex(pct: i64) -> String {
    let clamped = pct.clamp(0, i64::from(MAX_VOLUME));
    format!("{clamped:02X}")
}

/// Parse a two-digit hex volume back to a percentage
pub fn hex_to_pct(hex: &str) -> Option<u8> {
    if !is_hex_code(hex) {
        return None;
    }
    u8::from_str_radix(hex, 16)
        .ok()
        .filter(|v| *v <= MAX_VOLUME)
}

/// Exactly two ASCII hex digits, either case
pub fn is_hex_code(value: &str) -> bool {
    value.len() == 2 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defined_zones_are_distinct() {
        let main = family_for("1");
        let zone2 = family_for("2");
        let zone3 = family_for("3");
        assert_ne!(main, zone2);
        assert_ne!(main, zone3);
        assert_ne!(zone2, zone3);
        assert_eq!(zone2.power, "ZPW");
        assert_eq!(zone3.input_query, "SL3QSTN");
    }

    #[test]
    fn test_unknown_zone_falls_back_to_main() {
        assert_eq!(family_for("9"), family_for("1"));
        assert_eq!(family_for(""), family_for("1"));
        assert_eq!(family_for("zone2"), family_for("1"));
    }

    #[test]
    fn test_query_tokens_extend_base_token() {
        for zone in ["1", "2", "3"] {
            let f = family_for(zone);
            assert!(f.power_query.starts_with(f.power));
            assert!(f.volume_query.starts_with(f.volume));
            assert!(f.input_query.starts_with(f.input));
            assert!(f.mute_query.starts_with(f.mute));
        }
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(family_for("2").power_command(true), "ZPW01");
        assert_eq!(family_for("1").power_command(false), "PWR00");
        assert_eq!(family_for("3").volume_command("32"), "VL332");
        assert_eq!(family_for("2").mute_command(true), "ZMT01");
        assert_eq!(family_for("1").input_command("2B"), "SLI2B");
    }

    #[test]
    fn test_pct_to_hex_clamps() {
        assert_eq!(pct_to_hex(50), "32");
        assert_eq!(pct_to_hex(150), pct_to_hex(100));
        assert_eq!(pct_to_hex(100), "64");
        assert_eq!(pct_to_hex(-5), pct_to_hex(0));
        assert_eq!(pct_to_hex(0), "00");
        assert_eq!(pct_to_hex(10), "0A");
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(hex_to_pct("20"), Some(32));
        assert_eq!(hex_to_pct("64"), Some(100));
        assert_eq!(hex_to_pct("FF"), None);
        assert_eq!(hex_to_pct("N/"), None);
        assert!(is_hex_code("2b"));
        assert!(!is_hex_code("2"));
        assert!(!is_hex_code("2BX"));
    }
}
