//! Flat record types exchanged between the configuration document and the
//! delimited export files.
//!
//! Field order in each struct is the column order of the matching file.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// MTU assumed when a route carries none.
pub const DEFAULT_MTU: u32 = 1500;

/// Wildcard value for ports, protocols and addresses.
pub const WILDCARD: &str = "any";

/// One independently submitted configuration service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Nat,
    Firewall,
    Routing,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Nat, Service::Firewall, Service::Routing];

    pub fn as_str(self) -> &'static str {
        match self {
            Service::Nat => "nat",
            Service::Firewall => "firewall",
            Service::Routing => "routing",
        }
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NatAction {
    Snat,
    Dnat,
}

impl NatAction {
    pub fn as_str(self) -> &'static str {
        match self {
            NatAction::Snat => "SNAT",
            NatAction::Dnat => "DNAT",
        }
    }
}

impl FromStr for NatAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snat" => Ok(NatAction::Snat),
            "dnat" => Ok(NatAction::Dnat),
            other => Err(format!("unknown NAT action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallPolicy {
    Allow,
    Deny,
}

/// One address/port translation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatRule {
    pub rule_id: String,
    pub action: NatAction,
    pub interface_id: String,
    pub interface_name: Option<String>,
    pub interface_href: Option<String>,
    pub original_address: String,
    pub original_port: String,
    pub translated_address: String,
    pub translated_port: String,
    /// Display label: `TCP`, `UDP`, `TCP/UDP`, `ICMP` or `ANY`.
    pub protocol: String,
    pub enabled: bool,
    pub logging: bool,
    pub description: Option<String>,
}

/// One filter entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub rule_id: String,
    pub enabled: bool,
    pub description: Option<String>,
    /// Group reference token, space-separated address list, or `any`. A
    /// leading `!` negates the match.
    pub source: String,
    pub destination: String,
    /// `Any`, `Icmp`, or space-separated `protocol:port:sourceport` triples,
    /// optionally preceded by application object ids.
    pub service: String,
    pub logging: bool,
    pub policy: FirewallPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub description: Option<String>,
    pub interface: String,
    pub network: String,
    pub next_hop: String,
    pub admin_distance: Option<u32>,
    pub mtu: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRoute {
    pub interface: String,
    pub gateway_address: String,
    pub admin_distance: Option<u32>,
    pub mtu: u32,
}

/// Everything exported from, or imported into, one edge gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeRecords {
    pub nat_rules: Vec<NatRule>,
    pub firewall_rules: Vec<FirewallRule>,
    pub static_routes: Vec<StaticRoute>,
    pub default_route: Option<DefaultRoute>,
}

/// Parse an optional numeric MTU, falling back to [`DEFAULT_MTU`].
pub fn mtu_or_default(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_MTU)
}

#[cfg(test)]
mod tests {
    use super::{mtu_or_default, NatAction, Service, DEFAULT_MTU};

    #[test]
    fn nat_action_parses_case_insensitively() {
        assert_eq!(" snat ".parse::<NatAction>(), Ok(NatAction::Snat));
        assert_eq!("DNAT".parse::<NatAction>(), Ok(NatAction::Dnat));
        assert!("masquerade".parse::<NatAction>().is_err());
    }

    #[test]
    fn missing_or_garbled_mtu_defaults() {
        assert_eq!(mtu_or_default(None), DEFAULT_MTU);
        assert_eq!(mtu_or_default(Some("jumbo")), DEFAULT_MTU);
        assert_eq!(mtu_or_default(Some("9000")), 9000);
    }

    #[test]
    fn services_display_lowercase() {
        let names: Vec<String> = Service::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["nat", "firewall", "routing"]);
    }
}
