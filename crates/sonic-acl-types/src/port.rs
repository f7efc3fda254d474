//! L4 port values and ranges.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest valid L4 port.
pub const MAX_PORT: u16 = u16::MAX;

/// Well-known port names accepted in ACL lines (Cisco-style keywords).
const PORT_NAMES: &[(&str, u16)] = &[
    ("bgp", 179),
    ("bootpc", 68),
    ("bootps", 67),
    ("domain", 53),
    ("ftp", 21),
    ("ftp-data", 20),
    ("http", 80),
    ("https", 443),
    ("imap", 143),
    ("isakmp", 500),
    ("ldap", 389),
    ("ntp", 123),
    ("pop3", 110),
    ("smtp", 25),
    ("snmp", 161),
    ("snmptrap", 162),
    ("ssh", 22),
    ("syslog", 514),
    ("tacacs", 49),
    ("telnet", 23),
    ("tftp", 69),
    ("www", 80),
];

/// Looks up a well-known port by name.
pub fn port_by_name(name: &str) -> Option<u16> {
    let lower = name.to_lowercase();
    PORT_NAMES
        .iter()
        .find(|(known, _)| *known == lower)
        .map(|(_, port)| *port)
}

/// Parses a port given as a number or a well-known name.
pub fn parse_port(s: &str) -> Result<u16, ParseError> {
    let trimmed = s.trim();
    trimmed
        .parse::<u16>()
        .ok()
        .or_else(|| port_by_name(trimmed))
        .ok_or_else(|| ParseError::InvalidPort(s.to_string()))
}

/// A closed range of L4 ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl PortRange {
    /// Creates a new range.
    ///
    /// # Errors
    ///
    /// Returns an error if `min > max`.
    pub fn new(min: u16, max: u16) -> Result<Self, ParseError> {
        if min > max {
            return Err(ParseError::InvalidPortRange(format!(
                "min ({}) > max ({})",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub const fn single(port: u16) -> Self {
        Self {
            min: port,
            max: port,
        }
    }

    pub const fn all() -> Self {
        Self {
            min: 0,
            max: MAX_PORT,
        }
    }

    pub const fn contains(&self, port: u16) -> bool {
        port >= self.min && port <= self.max
    }

    pub const fn is_all(&self) -> bool {
        self.min == 0 && self.max == MAX_PORT
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

impl FromStr for PortRange {
    type Err = ParseError;

    /// Parses `"80"`, `"www"` or `"1000-2000"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            // Names such as "ftp-data" contain a dash too.
            Some(_) if port_by_name(s.trim()).is_some() => Ok(Self::single(parse_port(s)?)),
            Some((min, max)) => {
                let min = parse_port(min)
                    .map_err(|_| ParseError::InvalidPortRange(s.to_string()))?;
                let max = parse_port(max)
                    .map_err(|_| ParseError::InvalidPortRange(s.to_string()))?;
                Self::new(min, max)
            }
            None => parse_port(s).map(Self::single),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("53").unwrap(), 53);
        assert_eq!(parse_port("www").unwrap(), 80);
        assert_eq!(parse_port("Domain").unwrap(), 53);
        assert!(parse_port("70000").is_err());
        assert!(parse_port("nope").is_err());
    }

    #[test]
    fn test_port_range_parse() {
        assert_eq!("1000-2000".parse::<PortRange>().unwrap(), PortRange { min: 1000, max: 2000 });
        assert_eq!("ssh".parse::<PortRange>().unwrap(), PortRange::single(22));
        assert_eq!("ftp-data".parse::<PortRange>().unwrap(), PortRange::single(20));
        assert!("2000-1000".parse::<PortRange>().is_err());
        assert!("abc-def".parse::<PortRange>().is_err());
    }

    #[test]
    fn test_port_range_contains() {
        let range = PortRange::new(1000, 2000).unwrap();
        assert!(range.contains(1000));
        assert!(range.contains(2000));
        assert!(!range.contains(999));
        assert!(PortRange::all().is_all());
    }

    #[test]
    fn test_port_range_display() {
        assert_eq!(PortRange::single(80).to_string(), "80");
        assert_eq!(PortRange::new(1, 1023).unwrap().to_string(), "1-1023");
    }
}
