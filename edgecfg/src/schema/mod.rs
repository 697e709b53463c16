//! Mapping between edge configuration documents and flat records.
//!
//! Two document schemas exist. Each has one [`ConfigSchema`] strategy that
//! both extracts records from a fetched document and rebuilds the request
//! bodies sent back to the API. The strategy is chosen once per run with
//! [`schema_for`].
//!
//! - [`edge_v1`]: edge-native `<edge>` documents. Entries carry a rule type
//!   and only `user` entries are kept.
//! - [`gateway_v2`]: `<EdgeGateway>` service configuration documents. The API
//!   already leaves out service-generated entries. No default route.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use edge_xml::XmlNode;
use serde::{Deserialize, Serialize};

use crate::model::{
    DefaultRoute, EdgeRecords, FirewallRule, NatRule, Service, StaticRoute,
};

pub mod edge_v1;
pub mod gateway_v2;
pub mod tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    V1,
    V2,
}

impl SchemaVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::V1 => "v1",
            SchemaVersion::V2 => "v2",
        }
    }
}

impl Display for SchemaVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(SchemaVersion::V1),
            "v2" | "2" => Ok(SchemaVersion::V2),
            other => Err(format!("unknown schema version '{other}'")),
        }
    }
}

/// Extraction and reconstruction for one document schema.
///
/// Extraction never fails: a missing sub-tree yields no records.
pub trait ConfigSchema {
    fn version(&self) -> SchemaVersion;

    fn extract_nat_rules(&self, doc: &XmlNode) -> Vec<NatRule>;
    fn extract_firewall_rules(&self, doc: &XmlNode) -> Vec<FirewallRule>;
    fn extract_static_routes(&self, doc: &XmlNode) -> Vec<StaticRoute>;
    fn extract_default_route(&self, doc: &XmlNode) -> Option<DefaultRoute>;

    fn build_nat_request(&self, rules: &[NatRule]) -> XmlNode;
    fn build_firewall_request(&self, rules: &[FirewallRule]) -> XmlNode;
    fn build_routing_request(
        &self,
        routes: &[StaticRoute],
        default_route: Option<&DefaultRoute>,
    ) -> XmlNode;

    /// Whether routing requests carry the default route.
    fn supports_default_route(&self) -> bool {
        true
    }

    /// Run every extraction over one document.
    fn extract_all(&self, doc: &XmlNode) -> EdgeRecords {
        EdgeRecords {
            nat_rules: self.extract_nat_rules(doc),
            firewall_rules: self.extract_firewall_rules(doc),
            static_routes: self.extract_static_routes(doc),
            default_route: self.extract_default_route(doc),
        }
    }

    /// Build the request body for one service.
    fn build_request(&self, service: Service, records: &EdgeRecords) -> XmlNode {
        match service {
            Service::Nat => self.build_nat_request(&records.nat_rules),
            Service::Firewall => self.build_firewall_request(&records.firewall_rules),
            Service::Routing => {
                self.build_routing_request(&records.static_routes, records.default_route.as_ref())
            }
        }
    }
}

/// Select the strategy for a schema version.
pub fn schema_for(version: SchemaVersion) -> &'static dyn ConfigSchema {
    match version {
        SchemaVersion::V1 => &edge_v1::EdgeV1,
        SchemaVersion::V2 => &gateway_v2::GatewayV2,
    }
}

/// Trimmed, non-empty text at `path`.
pub(crate) fn opt_text(node: &XmlNode, path: &[&str]) -> Option<String> {
    node.get_text(path)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Boolean flag text; anything but `true` reads as false.
pub(crate) fn flag(node: &XmlNode, path: &[&str]) -> bool {
    node.get_text(path)
        .is_some_and(|t| t.trim().eq_ignore_ascii_case("true"))
}

pub(crate) fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
