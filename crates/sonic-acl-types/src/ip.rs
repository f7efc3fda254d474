//! IPv4 prefix and wildcard types with safe parsing.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Upper bound on the number of ranges a non-contiguous wildcard may expand to.
pub const MAX_WILDCARD_INTERVALS: usize = 4096;

fn parse_addr(s: &str) -> Result<Ipv4Addr, ParseError> {
    s.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
}

const fn prefix_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len as u32)
    }
}

/// An IPv4 prefix in CIDR notation (e.g., 10.0.0.0/24).
///
/// Host bits are cleared on construction, so `10.1.2.3/8` and `10.0.0.0/8`
/// compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Prefix {
    address: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Prefix {
    /// The prefix matching every IPv4 address (0.0.0.0/0).
    pub const ANY: Self = Ipv4Prefix {
        address: Ipv4Addr::UNSPECIFIED,
        prefix_len: 0,
    };

    /// Creates a new prefix, masking off host bits.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds 32.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > 32 {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum 32",
                prefix_len
            )));
        }

        let network = u32::from(address) & prefix_mask(prefix_len);
        Ok(Ipv4Prefix {
            address: Ipv4Addr::from(network),
            prefix_len,
        })
    }

    /// Creates a /32 host prefix.
    pub const fn host(address: Ipv4Addr) -> Self {
        Ipv4Prefix {
            address,
            prefix_len: 32,
        }
    }

    /// Returns the network address of this prefix.
    pub const fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// First address covered by the prefix, as an integer.
    pub fn first(&self) -> u32 {
        u32::from(self.address)
    }

    /// Last address covered by the prefix, as an integer.
    pub fn last(&self) -> u32 {
        self.first() | !prefix_mask(self.prefix_len)
    }

    /// Returns true if `addr` lies inside this prefix.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let value = u32::from(addr);
        value >= self.first() && value <= self.last()
    }

    /// Returns true if this is a host route (/32).
    pub const fn is_host(&self) -> bool {
        self.prefix_len == 32
    }

    /// Returns true if this is the default route (0.0.0.0/0).
    pub const fn is_any(&self) -> bool {
        self.prefix_len == 0
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('/') {
            Some((addr_str, len_str)) => {
                let address = parse_addr(addr_str)?;
                let prefix_len: u8 = len_str
                    .trim()
                    .parse()
                    .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
                Ipv4Prefix::new(address, prefix_len)
            }
            None => parse_addr(s).map(Ipv4Prefix::host),
        }
    }
}

impl TryFrom<String> for Ipv4Prefix {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Prefix> for String {
    fn from(prefix: Ipv4Prefix) -> Self {
        prefix.to_string()
    }
}

/// An IPv4 address with a wildcard (inverse) mask, as written in ACL lines
/// (e.g., `10.0.0.0 0.0.255.255`).
///
/// Set bits in the wildcard are "don't care". The mask need not be
/// contiguous; a non-contiguous mask matches a union of ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Wildcard {
    address: Ipv4Addr,
    wildcard: Ipv4Addr,
}

impl Ipv4Wildcard {
    /// Creates a new wildcard match, clearing don't-care bits in the address.
    pub fn new(address: Ipv4Addr, wildcard: Ipv4Addr) -> Self {
        let wild = u32::from(wildcard);
        Ipv4Wildcard {
            address: Ipv4Addr::from(u32::from(address) & !wild),
            wildcard,
        }
    }

    /// Parses an address and wildcard mask given as separate tokens.
    pub fn parse(address: &str, wildcard: &str) -> Result<Self, ParseError> {
        let address = parse_addr(address)?;
        let wildcard = parse_addr(wildcard)
            .map_err(|_| ParseError::InvalidWildcard(wildcard.to_string()))?;
        Ok(Self::new(address, wildcard))
    }

    pub const fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub const fn wildcard(&self) -> Ipv4Addr {
        self.wildcard
    }

    /// Returns true if the don't-care bits form one trailing run, i.e. the
    /// match is equivalent to a CIDR prefix.
    pub fn is_contiguous(&self) -> bool {
        let wild = u32::from(self.wildcard);
        wild & wild.wrapping_add(1) == 0
    }

    /// Converts to the equivalent prefix when the mask is contiguous.
    pub fn to_prefix(&self) -> Option<Ipv4Prefix> {
        if !self.is_contiguous() {
            return None;
        }
        let host_bits = u32::from(self.wildcard).count_ones() as u8;
        Ipv4Prefix::new(self.address, 32 - host_bits).ok()
    }

    /// Returns true if `addr` is matched.
    pub fn matches(&self, addr: Ipv4Addr) -> bool {
        let care = !u32::from(self.wildcard);
        u32::from(addr) & care == u32::from(self.address) & care
    }

    /// Expands the match into sorted, disjoint closed ranges.
    ///
    /// The trailing run of don't-care bits is absorbed into each range; every
    /// other don't-care bit doubles the range count.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnsupportedWildcard`] when the expansion would
    /// exceed [`MAX_WILDCARD_INTERVALS`] ranges.
    pub fn intervals(&self) -> Result<Vec<(u32, u32)>, ParseError> {
        let wild = u32::from(self.wildcard);
        let trailing = wild.trailing_ones();
        let low_mask = if trailing == 32 {
            u32::MAX
        } else {
            (1u32 << trailing) - 1
        };
        let high = wild & !low_mask;

        let count = 1usize << high.count_ones();
        if count > MAX_WILDCARD_INTERVALS {
            return Err(ParseError::UnsupportedWildcard(
                self.wildcard.to_string(),
                MAX_WILDCARD_INTERVALS,
            ));
        }

        let base = u32::from(self.address);
        let mut ranges = Vec::with_capacity(count);
        // Walk the submasks of `high` in increasing order.
        let mut sub: u32 = 0;
        loop {
            let start = base | sub;
            ranges.push((start, start | low_mask));
            if sub == high {
                break;
            }
            sub = sub.wrapping_sub(high) & high;
        }
        Ok(ranges)
    }
}

impl fmt::Display for Ipv4Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.wildcard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prefix_parse() {
        let prefix: Ipv4Prefix = "10.0.0.0/24".parse().unwrap();
        assert_eq!(prefix.prefix_len(), 24);
        assert_eq!(prefix.address(), Ipv4Addr::new(10, 0, 0, 0));
    }

    #[test]
    fn test_prefix_masks_host_bits() {
        let prefix: Ipv4Prefix = "2.128.7.9/16".parse().unwrap();
        assert_eq!(prefix.to_string(), "2.128.0.0/16");
        assert_eq!(prefix.first(), u32::from(Ipv4Addr::new(2, 128, 0, 0)));
        assert_eq!(prefix.last(), u32::from(Ipv4Addr::new(2, 128, 255, 255)));
    }

    #[test]
    fn test_prefix_plain_address_is_host() {
        let prefix: Ipv4Prefix = "1.0.1.2".parse().unwrap();
        assert!(prefix.is_host());
        assert_eq!(prefix.first(), prefix.last());
    }

    #[test]
    fn test_prefix_any() {
        assert!(Ipv4Prefix::ANY.is_any());
        assert_eq!(Ipv4Prefix::ANY.first(), 0);
        assert_eq!(Ipv4Prefix::ANY.last(), u32::MAX);
        assert!(Ipv4Prefix::ANY.contains(Ipv4Addr::new(255, 1, 2, 3)));
    }

    #[test]
    fn test_invalid_prefix() {
        assert!("10.0.0.0/33".parse::<Ipv4Prefix>().is_err());
        assert!("10.0.0/8".parse::<Ipv4Prefix>().is_err());
        assert!("10.0.0.0/x".parse::<Ipv4Prefix>().is_err());
    }

    #[test]
    fn test_prefix_into_string() {
        let prefix: Ipv4Prefix = "192.168.0.0/16".parse().unwrap();
        assert_eq!(String::from(prefix), "192.168.0.0/16");
        assert_eq!(
            Ipv4Prefix::try_from("192.168.0.0/16".to_string()).unwrap(),
            prefix
        );
    }

    #[test]
    fn test_wildcard_contiguous() {
        let wc = Ipv4Wildcard::parse("10.1.0.0", "0.0.255.255").unwrap();
        assert!(wc.is_contiguous());
        assert_eq!(wc.to_prefix().unwrap().to_string(), "10.1.0.0/16");
        assert_eq!(
            wc.intervals().unwrap(),
            vec![(
                u32::from(Ipv4Addr::new(10, 1, 0, 0)),
                u32::from(Ipv4Addr::new(10, 1, 255, 255))
            )]
        );
    }

    #[test]
    fn test_wildcard_non_contiguous() {
        // Matches 10.0.X.1 where X is 0 or 1
        let wc = Ipv4Wildcard::parse("10.0.0.1", "0.0.1.0").unwrap();
        assert!(!wc.is_contiguous());
        assert!(wc.to_prefix().is_none());
        assert!(wc.matches(Ipv4Addr::new(10, 0, 1, 1)));
        assert!(!wc.matches(Ipv4Addr::new(10, 0, 2, 1)));

        let ranges = wc.intervals().unwrap();
        assert_eq!(
            ranges,
            vec![
                (
                    u32::from(Ipv4Addr::new(10, 0, 0, 1)),
                    u32::from(Ipv4Addr::new(10, 0, 0, 1))
                ),
                (
                    u32::from(Ipv4Addr::new(10, 0, 1, 1)),
                    u32::from(Ipv4Addr::new(10, 0, 1, 1))
                ),
            ]
        );
    }

    #[test]
    fn test_wildcard_full() {
        let wc = Ipv4Wildcard::parse("0.0.0.0", "255.255.255.255").unwrap();
        assert_eq!(wc.intervals().unwrap(), vec![(0, u32::MAX)]);
    }

    #[test]
    fn test_wildcard_too_many_ranges() {
        let wc = Ipv4Wildcard::parse("0.0.0.0", "255.255.255.0").unwrap();
        assert!(matches!(
            wc.intervals(),
            Err(ParseError::UnsupportedWildcard(_, _))
        ));
    }
}
