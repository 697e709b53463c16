//! Flat-text encodings shared by both schema strategies: address lists,
//! service triples and NAT protocol labels.

use std::net::IpAddr;

use crate::model::WILDCARD;

/// Interface-group names understood by the edge as `vnicGroupId` values.
const VNIC_GROUPS: [&str; 4] = ["vse", "internal", "external", "all"];

/// Join address entries into one field, single-space separated.
pub fn join_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> String {
    tokens
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a stored field back into its tokens.
pub fn split_tokens(field: &str) -> Vec<&str> {
    field.split(' ').filter(|t| !t.is_empty()).collect()
}

/// True for an empty field or the wildcard in any case.
pub fn is_wildcard(field: &str) -> bool {
    let field = field.trim();
    field.is_empty() || field.eq_ignore_ascii_case(WILDCARD)
}

/// True when `token` is an IP address, CIDR block or `a-b` range.
pub fn is_address(token: &str) -> bool {
    let host = token.split_once('/').map_or(token, |(addr, _)| addr);
    host.split('-')
        .all(|part| !part.is_empty() && part.parse::<IpAddr>().is_ok())
}

/// True when `token` names an interface group rather than a grouping object.
pub fn is_vnic_group(token: &str) -> bool {
    VNIC_GROUPS.iter().any(|g| token.eq_ignore_ascii_case(g))
        || token
            .strip_prefix("vnic-index-")
            .is_some_and(|idx| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()))
}

/// One `protocol:port:sourceport` service entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTriple {
    pub protocol: String,
    pub port: String,
    pub source_port: String,
}

impl ServiceTriple {
    pub fn new(protocol: &str, port: &str, source_port: &str) -> Self {
        Self {
            protocol: protocol.trim().to_string(),
            port: non_empty_or_wildcard(port),
            source_port: non_empty_or_wildcard(source_port),
        }
    }

    pub fn any() -> Self {
        Self::new(WILDCARD, WILDCARD, WILDCARD)
    }

    pub fn icmp() -> Self {
        Self::new("icmp", WILDCARD, WILDCARD)
    }

    pub fn is_any(&self) -> bool {
        self.protocol.eq_ignore_ascii_case(WILDCARD)
    }

    pub fn is_icmp(&self) -> bool {
        self.protocol.eq_ignore_ascii_case("icmp")
    }
}

/// Encode services into the flat field.
///
/// Only the first entry decides whether the field collapses to `Any` or
/// `Icmp`; an empty list matches everything.
pub fn format_services(services: &[ServiceTriple]) -> String {
    match services.first() {
        None => "Any".to_string(),
        Some(first) if first.is_any() => "Any".to_string(),
        Some(first) if first.is_icmp() => "Icmp".to_string(),
        Some(_) => services
            .iter()
            .map(|s| format!("{}:{}:{}", s.protocol, s.port, s.source_port))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Decode the flat service field.
pub fn parse_services(field: &str) -> Vec<ServiceTriple> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("any") {
        return vec![ServiceTriple::any()];
    }
    if field.eq_ignore_ascii_case("icmp") {
        return vec![ServiceTriple::icmp()];
    }
    split_tokens(field)
        .into_iter()
        .map(|token| {
            let mut parts = token.splitn(3, ':');
            let protocol = parts.next().unwrap_or(WILDCARD);
            let port = parts.next().unwrap_or(WILDCARD);
            let source_port = parts.next().unwrap_or(WILDCARD);
            ServiceTriple::new(protocol, port, source_port)
        })
        .collect()
}

/// Display label for a NAT protocol as stored by the device.
pub fn nat_protocol_label(internal: &str) -> String {
    let internal = internal.trim();
    if internal.eq_ignore_ascii_case("tcpudp") {
        return "TCP/UDP".to_string();
    }
    if internal.is_empty() {
        return WILDCARD.to_ascii_uppercase();
    }
    internal.to_ascii_uppercase()
}

/// Device encoding for a NAT protocol display label.
pub fn nat_protocol_internal(label: &str) -> String {
    let label = label.trim();
    if label.eq_ignore_ascii_case("TCP/UDP") {
        return "tcpudp".to_string();
    }
    if label.is_empty() {
        return WILDCARD.to_string();
    }
    label.to_ascii_lowercase()
}

fn non_empty_or_wildcard(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        WILDCARD.to_string()
    } else {
        value.to_string()
    }
}
