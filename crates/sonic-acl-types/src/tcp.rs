//! TCP flag bytes.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The TCP flags byte of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TcpFlags(u8);

const FLAG_NAMES: &[(&str, u8)] = &[
    ("FIN", TcpFlags::FIN),
    ("SYN", TcpFlags::SYN),
    ("RST", TcpFlags::RST),
    ("PSH", TcpFlags::PSH),
    ("ACK", TcpFlags::ACK),
    ("URG", TcpFlags::URG),
    ("ECE", TcpFlags::ECE),
    ("CWR", TcpFlags::CWR),
];

impl TcpFlags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
    pub const ECE: u8 = 0x40;
    pub const CWR: u8 = 0x80;

    pub const NONE: Self = TcpFlags(0);

    pub const fn from_bits(bits: u8) -> Self {
        TcpFlags(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, bit: u8) -> bool {
        self.0 & bit == bit
    }

    /// Looks up a single flag bit by name (case-insensitive).
    pub fn bit_by_name(name: &str) -> Option<u8> {
        let upper = name.trim().to_uppercase();
        FLAG_NAMES
            .iter()
            .find(|(known, _)| *known == upper)
            .map(|(_, bit)| *bit)
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "none");
        }
        let names: Vec<&str> = FLAG_NAMES
            .iter()
            .filter(|(_, bit)| self.contains(*bit))
            .map(|(name, _)| *name)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}

impl FromStr for TcpFlags {
    type Err = ParseError;

    /// Parses `"none"`, a hex byte (`"0x12"`), or flag names separated by
    /// `,` or `|` (`"SYN,ACK"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(TcpFlags::NONE);
        }
        if let Some(hex) = trimmed.strip_prefix("0x") {
            return u8::from_str_radix(hex, 16)
                .map(TcpFlags)
                .map_err(|_| ParseError::InvalidTcpFlag(s.to_string()));
        }

        let mut bits = 0u8;
        for token in trimmed.split([',', '|']) {
            bits |= TcpFlags::bit_by_name(token)
                .ok_or_else(|| ParseError::InvalidTcpFlag(token.to_string()))?;
        }
        Ok(TcpFlags(bits))
    }
}

impl TryFrom<String> for TcpFlags {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TcpFlags> for String {
    fn from(flags: TcpFlags) -> Self {
        flags.to_string()
    }
}
