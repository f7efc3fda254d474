//! ACL line grammar.
//!
//! ```text
//! line    = action proto addr [port] addr [port] option*
//! action  = permit | deny
//! proto   = ip | tcp | udp | icmp | <0-255> | <name>
//! addr    = any | host A | A/len | A W | A | addrgroup NAME
//! port    = eq P | neq P | lt P | gt P | range P1 P2 | portgroup NAME
//! option  = established | syn | ack | ... | +syn | -ack
//!         | <icmp-type> [<icmp-code>] | <icmp-name>
//!         | fragments | length MIN MAX | log
//! ```

use crate::action::LineAction;
use crate::error::{AclCheckError, Result};
use sonic_acl_types::{
    icmp_by_name, parse_port, IcmpMatch, IpProtocol, Ipv4Prefix, Ipv4Wildcard, PortRange,
    TcpFlags, MAX_PORT,
};
use sonic_headerspace::{HeaderField, IntervalSet};
use std::net::Ipv4Addr;

/// Source or destination address match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressMatch {
    Any,
    Prefix(Ipv4Prefix),
    Wildcard(Ipv4Wildcard),
    /// Named address group.
    Group(String),
}

impl AddressMatch {
    /// Addresses matched by a literal; `None` for group references.
    pub fn literal_set(&self) -> Option<IntervalSet> {
        let max = HeaderField::SrcIp.domain_max();
        match self {
            AddressMatch::Any => Some(IntervalSet::full(max)),
            AddressMatch::Prefix(prefix) => {
                Some(IntervalSet::range(max, prefix.first(), prefix.last()))
            }
            // Expansion size is checked when the wildcard is parsed.
            AddressMatch::Wildcard(wildcard) => Some(IntervalSet::from_ranges(
                max,
                wildcard.intervals().unwrap_or_default(),
            )),
            AddressMatch::Group(_) => None,
        }
    }
}

/// L4 port match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortMatch {
    Eq(u16),
    Neq(u16),
    Lt(u16),
    Gt(u16),
    Range(PortRange),
    /// Named port group.
    Group(String),
}

impl PortMatch {
    /// Ports matched by a literal; `None` for group references.
    pub fn literal_set(&self) -> Option<IntervalSet> {
        let max = u32::from(MAX_PORT);
        let set = match *self {
            PortMatch::Eq(port) => IntervalSet::single(max, u32::from(port)),
            PortMatch::Neq(port) => IntervalSet::single(max, u32::from(port)).complement(),
            PortMatch::Lt(0) => IntervalSet::empty(max),
            PortMatch::Lt(port) => IntervalSet::range(max, 0, u32::from(port) - 1),
            PortMatch::Gt(port) if port == MAX_PORT => IntervalSet::empty(max),
            PortMatch::Gt(port) => IntervalSet::range(max, u32::from(port) + 1, max),
            PortMatch::Range(range) => {
                IntervalSet::range(max, u32::from(range.min), u32::from(range.max))
            }
            PortMatch::Group(_) => return None,
        };
        Some(set)
    }
}

/// TCP flag constraints of a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpFlagMatch {
    /// Bits that must be set.
    pub must_set: u8,
    /// Bits that must be clear.
    pub must_clear: u8,
    /// ACK or RST set.
    pub established: bool,
}

impl TcpFlagMatch {
    pub fn is_unconstrained(&self) -> bool {
        self.must_set == 0 && self.must_clear == 0 && !self.established
    }

    pub fn matches(&self, flags: u8) -> bool {
        flags & self.must_set == self.must_set
            && flags & self.must_clear == 0
            && (!self.established || flags & (TcpFlags::ACK | TcpFlags::RST) != 0)
    }

    /// The set of flag bytes accepted.
    pub fn allowed_bytes(&self) -> IntervalSet {
        IntervalSet::from_values(
            HeaderField::TcpFlags.domain_max(),
            (0..=u8::MAX).filter(|b| self.matches(*b)).map(u32::from),
        )
    }
}

/// Everything a line matches on. Unset parts match anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpec {
    /// `None` for `ip` (any protocol).
    pub protocol: Option<IpProtocol>,
    pub src: AddressMatch,
    pub src_port: Option<PortMatch>,
    pub dst: AddressMatch,
    pub dst_port: Option<PortMatch>,
    pub tcp_flags: TcpFlagMatch,
    pub icmp: Option<IcmpMatch>,
    /// Non-initial fragments only.
    pub fragments: bool,
    pub packet_length: Option<(u16, u16)>,
}

impl MatchSpec {
    /// Matches every packet of `protocol` (or every packet for `None`).
    pub fn any(protocol: Option<IpProtocol>) -> Self {
        Self {
            protocol,
            src: AddressMatch::Any,
            src_port: None,
            dst: AddressMatch::Any,
            dst_port: None,
            tcp_flags: TcpFlagMatch::default(),
            icmp: None,
            fragments: false,
            packet_length: None,
        }
    }

    /// Names of all object groups this line refers to.
    pub fn group_references(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for address in [&self.src, &self.dst] {
            if let AddressMatch::Group(name) = address {
                names.push(name.as_str());
            }
        }
        for port in [&self.src_port, &self.dst_port].into_iter().flatten() {
            if let PortMatch::Group(name) = port {
                names.push(name.as_str());
            }
        }
        names
    }
}

/// Parses one line into its action and match.
pub fn parse_line(text: &str) -> Result<(LineAction, MatchSpec)> {
    let mut cursor = Cursor::new(text);

    let action = match cursor.next("action")?.to_lowercase().as_str() {
        "permit" => LineAction::Accept,
        "deny" => LineAction::Reject,
        other => return Err(cursor.error(format!("unknown action '{}'", other))),
    };

    let proto_token = cursor.next("protocol")?;
    let protocol = if proto_token.eq_ignore_ascii_case("ip") {
        None
    } else {
        Some(
            proto_token
                .parse::<IpProtocol>()
                .map_err(|e| cursor.error(e.to_string()))?,
        )
    };
    let mut spec = MatchSpec::any(protocol);
    let has_ports = protocol.is_some_and(|p| p.has_ports());
    let is_tcp = protocol.is_some_and(|p| p.is_tcp());
    let is_icmp = protocol.is_some_and(|p| p.is_icmp());

    spec.src = parse_address(&mut cursor)?;
    spec.src_port = parse_port_match(&mut cursor, has_ports)?;
    spec.dst = parse_address(&mut cursor)?;
    spec.dst_port = parse_port_match(&mut cursor, has_ports)?;

    while let Some(token) = cursor.advance() {
        let lower = token.to_lowercase();
        match lower.as_str() {
            "log" | "log-input" => {}
            "fragments" => spec.fragments = true,
            "established" if is_tcp => spec.tcp_flags.established = true,
            "length" => {
                let min = cursor.next_u16("minimum length")?;
                let max = cursor.next_u16("maximum length")?;
                if min > max {
                    return Err(cursor.error(format!("length range {}-{} is inverted", min, max)));
                }
                spec.packet_length = Some((min, max));
            }
            _ if is_tcp => {
                let (sign, name) = if let Some(rest) = lower.strip_prefix('+') {
                    (Some(true), rest)
                } else if let Some(rest) = lower.strip_prefix('-') {
                    (Some(false), rest)
                } else {
                    (None, lower.as_str())
                };
                let bit = TcpFlags::bit_by_name(name)
                    .ok_or_else(|| cursor.error(format!("unexpected token '{}'", token)))?;
                if sign == Some(false) {
                    spec.tcp_flags.must_clear |= bit;
                } else {
                    spec.tcp_flags.must_set |= bit;
                }
            }
            _ if is_icmp && spec.icmp.is_none() => {
                spec.icmp = Some(parse_icmp(&mut cursor, token)?);
            }
            _ => return Err(cursor.error(format!("unexpected token '{}'", token))),
        }
    }

    if spec.tcp_flags.must_set & spec.tcp_flags.must_clear != 0 {
        return Err(cursor.error("a TCP flag is both required and forbidden"));
    }
    Ok((action, spec))
}

/// Parses an address given as text, as used in object group members.
pub(crate) fn parse_address_text(text: &str) -> Result<AddressMatch> {
    let mut cursor = Cursor::new(text);
    let address = parse_address(&mut cursor)?;
    match cursor.advance() {
        None => Ok(address),
        Some(extra) => Err(cursor.error(format!("unexpected token '{}'", extra))),
    }
}

fn parse_address(cursor: &mut Cursor<'_>) -> Result<AddressMatch> {
    let token = cursor.next("address")?;
    match token.to_lowercase().as_str() {
        "any" => return Ok(AddressMatch::Any),
        "host" => {
            let addr = cursor.next("host address")?;
            let addr: Ipv4Addr = addr
                .parse()
                .map_err(|_| cursor.error(format!("invalid host address '{}'", addr)))?;
            return Ok(AddressMatch::Prefix(Ipv4Prefix::host(addr)));
        }
        "addrgroup" => return Ok(AddressMatch::Group(cursor.next("group name")?.to_string())),
        _ => {}
    }

    if token.contains('/') {
        let prefix: Ipv4Prefix = token.parse().map_err(|e| cursor.error(format!("{}", e)))?;
        return Ok(AddressMatch::Prefix(prefix));
    }

    let addr: Ipv4Addr = token
        .parse()
        .map_err(|_| cursor.error(format!("invalid address '{}'", token)))?;
    // A bare address followed by another dotted quad is address + wildcard.
    if let Some(mask) = cursor.peek().and_then(|t| t.parse::<Ipv4Addr>().ok()) {
        cursor.advance();
        let wildcard = Ipv4Wildcard::new(addr, mask);
        if let Some(prefix) = wildcard.to_prefix() {
            return Ok(AddressMatch::Prefix(prefix));
        }
        wildcard
            .intervals()
            .map_err(|e| cursor.error(e.to_string()))?;
        return Ok(AddressMatch::Wildcard(wildcard));
    }
    Ok(AddressMatch::Prefix(Ipv4Prefix::host(addr)))
}

fn parse_port_match(cursor: &mut Cursor<'_>, has_ports: bool) -> Result<Option<PortMatch>> {
    let Some(operator) = cursor.peek().map(str::to_lowercase) else {
        return Ok(None);
    };
    if !matches!(
        operator.as_str(),
        "eq" | "neq" | "lt" | "gt" | "range" | "portgroup"
    ) {
        return Ok(None);
    }
    if !has_ports {
        return Err(cursor.error("port matches require tcp or udp"));
    }
    cursor.advance();

    let port_match = match operator.as_str() {
        "eq" => PortMatch::Eq(cursor.next_port()?),
        "neq" => PortMatch::Neq(cursor.next_port()?),
        "lt" => PortMatch::Lt(cursor.next_port()?),
        "gt" => PortMatch::Gt(cursor.next_port()?),
        "range" => {
            let min = cursor.next_port()?;
            let max = cursor.next_port()?;
            PortMatch::Range(PortRange::new(min, max).map_err(|e| cursor.error(e.to_string()))?)
        }
        _ => PortMatch::Group(cursor.next("group name")?.to_string()),
    };
    Ok(Some(port_match))
}

fn parse_icmp(cursor: &mut Cursor<'_>, token: &str) -> Result<IcmpMatch> {
    if let Some(named) = icmp_by_name(token) {
        return Ok(named);
    }
    let code = cursor
        .peek()
        .filter(|t| t.parse::<u8>().is_ok())
        .map(str::to_string);
    if code.is_some() {
        cursor.advance();
    }
    IcmpMatch::parse(token, code.as_deref()).map_err(|_| {
        cursor.error(format!("unexpected token '{}'", token))
    })
}

struct Cursor<'a> {
    line: &'a str,
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            tokens: line.split_whitespace().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<&'a str> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn next(&mut self, what: &str) -> Result<&'a str> {
        self.advance()
            .ok_or_else(|| self.error(format!("expected {}", what)))
    }

    fn next_port(&mut self) -> Result<u16> {
        let token = self.next("port")?;
        parse_port(token).map_err(|e| self.error(e.to_string()))
    }

    fn next_u16(&mut self, what: &str) -> Result<u16> {
        let token = self.next(what)?;
        token
            .parse()
            .map_err(|_| self.error(format!("invalid {} '{}'", what, token)))
    }

    fn error(&self, reason: impl Into<String>) -> AclCheckError {
        AclCheckError::LineSyntax {
            line: self.line.trim().to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> MatchSpec {
        parse_line(text).unwrap().1
    }

    #[test]
    fn test_parse_ip_any_any() {
        let (action, spec) = parse_line("deny ip any any").unwrap();
        assert_eq!(action, LineAction::Reject);
        assert_eq!(spec, MatchSpec::any(None));
    }

    #[test]
    fn test_parse_prefix_and_port() {
        let spec = parse("permit tcp 2.128.0.0/16 any eq www");
        assert_eq!(spec.protocol, Some(IpProtocol::TCP));
        assert_eq!(
            spec.src,
            AddressMatch::Prefix("2.128.0.0/16".parse().unwrap())
        );
        assert_eq!(spec.src_port, None);
        assert_eq!(spec.dst, AddressMatch::Any);
        assert_eq!(spec.dst_port, Some(PortMatch::Eq(80)));
    }

    #[test]
    fn test_parse_host_and_wildcard() {
        let spec = parse("permit udp host 1.0.1.2 10.0.0.0 0.0.0.255 range 1000 2000");
        assert_eq!(
            spec.src,
            AddressMatch::Prefix(Ipv4Prefix::host(Ipv4Addr::new(1, 0, 1, 2)))
        );
        // contiguous wildcards collapse to a prefix
        assert_eq!(spec.dst, AddressMatch::Prefix("10.0.0.0/24".parse().unwrap()));
        assert_eq!(
            spec.dst_port,
            Some(PortMatch::Range(PortRange::new(1000, 2000).unwrap()))
        );
    }

    #[test]
    fn test_parse_non_contiguous_wildcard() {
        let spec = parse("deny ip 10.0.0.1 0.0.1.0 any");
        assert!(matches!(spec.src, AddressMatch::Wildcard(_)));
        let set = spec.src.literal_set().unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_parse_source_port() {
        let spec = parse("permit udp any eq domain host 8.8.8.8");
        assert_eq!(spec.src_port, Some(PortMatch::Eq(53)));
        assert_eq!(spec.dst_port, None);
    }

    #[test]
    fn test_parse_tcp_flags() {
        let spec = parse("permit tcp any any established");
        assert!(spec.tcp_flags.established);
        assert!(spec.tcp_flags.matches(TcpFlags::ACK));
        assert!(!spec.tcp_flags.matches(TcpFlags::SYN));

        let spec = parse("deny tcp any any +syn -ack");
        assert_eq!(spec.tcp_flags.must_set, TcpFlags::SYN);
        assert_eq!(spec.tcp_flags.must_clear, TcpFlags::ACK);

        let spec = parse("deny tcp any any syn fin");
        assert_eq!(spec.tcp_flags.must_set, TcpFlags::SYN | TcpFlags::FIN);
    }

    #[test]
    fn test_parse_icmp() {
        let spec = parse("permit icmp any any echo");
        assert_eq!(spec.icmp, Some(IcmpMatch::new(8, None)));
        let spec = parse("permit icmp any any 3 4");
        assert_eq!(spec.icmp, Some(IcmpMatch::new(3, Some(4))));
        let spec = parse("permit icmp any any port-unreachable log");
        assert_eq!(spec.icmp, Some(IcmpMatch::new(3, Some(3))));
    }

    #[test]
    fn test_parse_options() {
        let spec = parse("deny ip any any fragments");
        assert!(spec.fragments);
        let spec = parse("permit udp any any length 64 1500");
        assert_eq!(spec.packet_length, Some((64, 1500)));
    }

    #[test]
    fn test_parse_groups() {
        let spec = parse("permit tcp addrgroup INSIDE any portgroup WEB");
        assert_eq!(spec.src, AddressMatch::Group("INSIDE".to_string()));
        assert_eq!(spec.dst_port, Some(PortMatch::Group("WEB".to_string())));
        assert_eq!(spec.group_references(), vec!["INSIDE", "WEB"]);
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "allow ip any any",
            "permit ip any",
            "permit ip any any eq 80",
            "permit icmp any any eq 80",
            "permit tcp any any eq 70000",
            "permit tcp any any range 90 80",
            "permit udp any any established",
            "permit tcp any any +syn -syn",
            "permit ip 10.0.0.0/40 any",
            "permit ip any any length 10 5",
            "permit ip host any any",
        ] {
            let err = parse_line(bad).unwrap_err();
            assert!(
                matches!(err, AclCheckError::LineSyntax { .. }),
                "expected syntax error for '{}', got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_port_literal_sets() {
        assert_eq!(PortMatch::Lt(0).literal_set().unwrap().len(), 0);
        assert_eq!(PortMatch::Lt(1024).literal_set().unwrap().len(), 1024);
        assert_eq!(PortMatch::Gt(65535).literal_set().unwrap().len(), 0);
        assert_eq!(PortMatch::Neq(80).literal_set().unwrap().len(), 65535);
        assert!(PortMatch::Group("X".to_string()).literal_set().is_none());
    }
}
