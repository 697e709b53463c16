//! Gateway-services schema.
//!
//! Document layout (`GET` on the admin edge gateway resource):
//!
//! ```text
//! <EdgeGateway>
//!   <Configuration>
//!     <EdgeGatewayServiceConfiguration>
//!       <FirewallService>… <FirewallRule>…</FirewallRule></FirewallService>
//!       <NatService>… <NatRule>…</NatRule></NatService>
//!       <StaticRoutingService>… <StaticRoute>…</StaticRoute></StaticRoutingService>
//!     </EdgeGatewayServiceConfiguration>
//!   </Configuration>
//! </EdgeGateway>
//! ```
//!
//! Every listed entry is user-created. Each request body is an
//! `EdgeGatewayServiceConfiguration` holding a single service, and the
//! elements are written in the order the API's XML schema requires.

use edge_xml::XmlNode;
use tracing::warn;

use super::tokens::{
    is_wildcard, nat_protocol_internal, nat_protocol_label, parse_services, ServiceTriple,
};
use super::{bool_text, flag, opt_text, ConfigSchema, SchemaVersion};
use crate::api::lookup::id_from_href;
use crate::model::{
    DefaultRoute, FirewallPolicy, FirewallRule, NatAction, NatRule, StaticRoute, DEFAULT_MTU,
    WILDCARD,
};

const VCLOUD_NS: &str = "http://www.vmware.com/vcloud/v1.5";
const NETWORK_TYPE: &str = "application/vnd.vmware.admin.network+xml";

/// Strategy for `<EdgeGateway>` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayV2;

impl ConfigSchema for GatewayV2 {
    fn version(&self) -> SchemaVersion {
        SchemaVersion::V2
    }

    fn extract_nat_rules(&self, doc: &XmlNode) -> Vec<NatRule> {
        let Some(nat) = service_config(doc).and_then(|s| s.get_child("NatService")) else {
            return Vec::new();
        };

        nat.get_children("NatRule")
            .into_iter()
            .filter_map(|rule| {
                let action = match rule.text_or(&["RuleType"], "").parse::<NatAction>() {
                    Ok(action) => action,
                    Err(err) => {
                        warn!(rule_id = rule.text_or(&["Id"], ""), "skipping NAT rule: {err}");
                        return None;
                    }
                };
                let gateway_rule = rule.get_child("GatewayNatRule");
                let text = |tag: &str| {
                    gateway_rule
                        .map(|g| g.text_or(&[tag], WILDCARD))
                        .unwrap_or(WILDCARD)
                        .to_string()
                };
                let iface = gateway_rule.and_then(|g| g.get_child("Interface"));
                let href = iface
                    .and_then(|i| i.attr("href"))
                    .filter(|h| !h.is_empty())
                    .map(str::to_string);

                Some(NatRule {
                    rule_id: rule.text_or(&["Id"], "").to_string(),
                    action,
                    interface_id: href.as_deref().map(id_from_href).unwrap_or_default(),
                    interface_name: iface
                        .and_then(|i| i.attr("name"))
                        .filter(|n| !n.is_empty())
                        .map(str::to_string),
                    interface_href: href,
                    original_address: text("OriginalIp"),
                    original_port: text("OriginalPort"),
                    translated_address: text("TranslatedIp"),
                    translated_port: text("TranslatedPort"),
                    protocol: nat_protocol_label(&text("Protocol")),
                    enabled: flag(rule, &["IsEnabled"]),
                    logging: false,
                    description: opt_text(rule, &["Description"]),
                })
            })
            .collect()
    }

    fn extract_firewall_rules(&self, doc: &XmlNode) -> Vec<FirewallRule> {
        let Some(firewall) = service_config(doc).and_then(|s| s.get_child("FirewallService"))
        else {
            return Vec::new();
        };

        firewall
            .get_children("FirewallRule")
            .into_iter()
            .map(|rule| FirewallRule {
                rule_id: rule.text_or(&["Id"], "").to_string(),
                enabled: flag(rule, &["IsEnabled"]),
                description: opt_text(rule, &["Description"]),
                source: rule.text_or(&["SourceIp"], WILDCARD).to_string(),
                destination: rule.text_or(&["DestinationIp"], WILDCARD).to_string(),
                service: service_field(rule),
                logging: flag(rule, &["EnableLogging"]),
                policy: if rule.text_or(&["Policy"], "").eq_ignore_ascii_case("allow") {
                    FirewallPolicy::Allow
                } else {
                    FirewallPolicy::Deny
                },
            })
            .collect()
    }

    fn extract_static_routes(&self, doc: &XmlNode) -> Vec<StaticRoute> {
        let Some(routing) = service_config(doc).and_then(|s| s.get_child("StaticRoutingService"))
        else {
            return Vec::new();
        };

        routing
            .get_children("StaticRoute")
            .into_iter()
            .map(|route| {
                let interface = route
                    .get_child("GatewayInterface")
                    .and_then(|g| g.attr("name"))
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| route.text_or(&["Interface"], ""));
                StaticRoute {
                    description: opt_text(route, &["Name"]),
                    interface: interface.to_string(),
                    network: route.text_or(&["Network"], "").to_string(),
                    next_hop: route.text_or(&["NextHopIp"], "").to_string(),
                    admin_distance: None,
                    mtu: DEFAULT_MTU,
                }
            })
            .collect()
    }

    fn supports_default_route(&self) -> bool {
        false
    }

    fn extract_default_route(&self, _doc: &XmlNode) -> Option<DefaultRoute> {
        None
    }

    fn build_nat_request(&self, rules: &[NatRule]) -> XmlNode {
        let mut service = XmlNode::new("NatService");
        service.push_leaf("IsEnabled", "true");
        for rule in rules {
            service.children.push(nat_rule_to_node(rule));
        }
        envelope(service)
    }

    fn build_firewall_request(&self, rules: &[FirewallRule]) -> XmlNode {
        let mut service = XmlNode::new("FirewallService");
        service.push_leaf("IsEnabled", "true");
        service.push_leaf("DefaultAction", "drop");
        service.push_leaf("LogDefaultAction", "false");
        for rule in rules {
            service.children.push(firewall_rule_to_node(rule));
        }
        envelope(service)
    }

    fn build_routing_request(
        &self,
        routes: &[StaticRoute],
        default_route: Option<&DefaultRoute>,
    ) -> XmlNode {
        if default_route.is_some() {
            warn!("default route is not part of the gateway-services schema; ignoring it");
        }

        let mut service = XmlNode::new("StaticRoutingService");
        service.push_leaf("IsEnabled", "true");
        for route in routes {
            let mut node = XmlNode::new("StaticRoute");
            node.push_opt_leaf("Name", route.description.as_deref());
            node.push_leaf("Network", &route.network);
            node.push_leaf("NextHopIp", &route.next_hop);
            match uplink_kind(&route.interface) {
                Some(kind) => node.push_leaf("Interface", kind),
                None => {
                    node.push_leaf("Interface", "External");
                    node.children.push(
                        XmlNode::new("GatewayInterface")
                            .with_attr("name", &route.interface)
                            .with_attr("type", NETWORK_TYPE),
                    );
                }
            }
            service.children.push(node);
        }
        envelope(service)
    }
}

fn service_config(doc: &XmlNode) -> Option<&XmlNode> {
    if doc.tag == "EdgeGatewayServiceConfiguration" {
        return Some(doc);
    }
    doc.find(&["Configuration", "EdgeGatewayServiceConfiguration"])
}

fn envelope(service: XmlNode) -> XmlNode {
    XmlNode::new("EdgeGatewayServiceConfiguration")
        .with_attr("xmlns", VCLOUD_NS)
        .with_child(service)
}

fn uplink_kind(interface: &str) -> Option<&'static str> {
    if interface.eq_ignore_ascii_case("internal") {
        Some("Internal")
    } else if interface.eq_ignore_ascii_case("external") {
        Some("External")
    } else {
        None
    }
}

/// Protocol label from the rule's protocol flags.
///
/// Flags are checked in the order Any, Tcp, Udp, Icmp and the first one set
/// wins, so a rule flagged both Tcp and Udp reads as Tcp.
pub fn protocol_label(protocols: Option<&XmlNode>) -> &'static str {
    let Some(protocols) = protocols else {
        return "Any";
    };
    ["Any", "Tcp", "Udp", "Icmp"]
        .into_iter()
        .find(|label| flag(protocols, &[*label]))
        .unwrap_or("Any")
}

fn service_field(rule: &XmlNode) -> String {
    let label = protocol_label(rule.get_child("Protocols"));
    match label {
        "Any" | "Icmp" => label.to_string(),
        _ => format!(
            "{}:{}:{}",
            label.to_ascii_lowercase(),
            port_range(rule, "DestinationPortRange", "Port"),
            port_range(rule, "SourcePortRange", "SourcePort"),
        ),
    }
}

fn port_range(rule: &XmlNode, range_tag: &str, port_tag: &str) -> String {
    let raw = opt_text(rule, &[range_tag])
        .or_else(|| opt_text(rule, &[port_tag]).filter(|p| p != "-1"))
        .unwrap_or_else(|| WILDCARD.to_string());
    if is_wildcard(&raw) {
        WILDCARD.to_string()
    } else {
        raw
    }
}

fn nat_rule_to_node(rule: &NatRule) -> XmlNode {
    let (original_port, translated_port, protocol) = match rule.action {
        NatAction::Snat => (WILDCARD.to_string(), WILDCARD.to_string(), WILDCARD.to_string()),
        NatAction::Dnat => (
            rule.original_port.clone(),
            rule.translated_port.clone(),
            nat_protocol_internal(&rule.protocol),
        ),
    };

    let mut gateway_rule = XmlNode::new("GatewayNatRule");
    if rule.interface_href.is_some() || rule.interface_name.is_some() {
        let mut iface = XmlNode::new("Interface").with_attr("type", NETWORK_TYPE);
        if let Some(href) = &rule.interface_href {
            iface = iface.with_attr("href", href);
        }
        if let Some(name) = &rule.interface_name {
            iface = iface.with_attr("name", name);
        }
        gateway_rule.children.push(iface);
    }
    gateway_rule.push_leaf("OriginalIp", &rule.original_address);
    gateway_rule.push_leaf("OriginalPort", original_port);
    gateway_rule.push_leaf("TranslatedIp", &rule.translated_address);
    gateway_rule.push_leaf("TranslatedPort", translated_port);
    gateway_rule.push_leaf("Protocol", protocol);

    let mut node = XmlNode::new("NatRule");
    node.push_opt_leaf("Description", rule.description.as_deref());
    node.push_leaf("RuleType", rule.action.as_str());
    node.push_leaf("IsEnabled", bool_text(rule.enabled));
    node.children.push(gateway_rule);
    node
}

fn firewall_rule_to_node(rule: &FirewallRule) -> XmlNode {
    let triples = parse_services(&rule.service);
    if triples.len() > 1 {
        warn!(
            rule_id = rule.rule_id.as_str(),
            "gateway firewall rules carry one service; keeping the first of {}",
            triples.len()
        );
    }
    let triple = triples.into_iter().next().unwrap_or_else(ServiceTriple::any);

    let mut protocols = XmlNode::new("Protocols");
    let protocol = triple.protocol.to_ascii_lowercase();
    match protocol.as_str() {
        "tcp" => protocols.push_leaf("Tcp", "true"),
        "udp" => protocols.push_leaf("Udp", "true"),
        "icmp" => protocols.push_leaf("Icmp", "true"),
        _ => protocols.push_leaf("Any", "true"),
    }

    let mut node = XmlNode::new("FirewallRule");
    node.push_leaf("IsEnabled", bool_text(rule.enabled));
    node.push_leaf("MatchOnTranslate", "false");
    node.push_opt_leaf("Description", rule.description.as_deref());
    node.push_leaf(
        "Policy",
        match rule.policy {
            FirewallPolicy::Allow => "allow",
            FirewallPolicy::Deny => "drop",
        },
    );
    node.children.push(protocols);
    if protocol == "icmp" {
        node.push_leaf("IcmpSubType", WILDCARD);
    }
    node.push_leaf("Port", port_number(&triple.port));
    node.push_leaf("DestinationPortRange", range_text(&triple.port));
    node.push_leaf("DestinationIp", endpoint_text(&rule.destination));
    node.push_leaf("SourcePort", port_number(&triple.source_port));
    node.push_leaf("SourcePortRange", range_text(&triple.source_port));
    node.push_leaf("SourceIp", endpoint_text(&rule.source));
    node.push_leaf("EnableLogging", bool_text(rule.logging));
    node
}

/// Single numeric port, or `-1` for ranges and wildcards.
fn port_number(range: &str) -> String {
    range
        .trim()
        .parse::<u16>()
        .map(|p| p.to_string())
        .unwrap_or_else(|_| "-1".to_string())
}

fn range_text(range: &str) -> String {
    if is_wildcard(range) {
        "Any".to_string()
    } else {
        range.trim().to_string()
    }
}

fn endpoint_text(field: &str) -> String {
    if is_wildcard(field) {
        "Any".to_string()
    } else {
        field.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use edge_xml::{parse, XmlNode};
    use pretty_assertions::assert_eq;

    use super::{protocol_label, GatewayV2};
    use crate::model::{DefaultRoute, FirewallPolicy, NatAction, DEFAULT_MTU};
    use crate::schema::ConfigSchema;

    const GATEWAY: &str = r#"<EdgeGateway xmlns="http://www.vmware.com/vcloud/v1.5" name="edge-01">
  <Configuration>
    <EdgeGatewayServiceConfiguration>
      <FirewallService>
        <IsEnabled>true</IsEnabled>
        <DefaultAction>drop</DefaultAction>
        <FirewallRule>
          <Id>1</Id>
          <IsEnabled>true</IsEnabled>
          <Description>https in</Description>
          <Policy>allow</Policy>
          <Protocols><Tcp>true</Tcp></Protocols>
          <Port>443</Port>
          <DestinationPortRange>443</DestinationPortRange>
          <DestinationIp>10.0.0.10</DestinationIp>
          <SourcePort>-1</SourcePort>
          <SourcePortRange>Any</SourcePortRange>
          <SourceIp>external</SourceIp>
          <EnableLogging>true</EnableLogging>
        </FirewallRule>
        <FirewallRule>
          <Id>2</Id>
          <IsEnabled>true</IsEnabled>
          <Description>tcp and udp</Description>
          <Policy>allow</Policy>
          <Protocols><Tcp>true</Tcp><Udp>true</Udp></Protocols>
          <Port>53</Port>
          <DestinationPortRange>53</DestinationPortRange>
          <DestinationIp>Any</DestinationIp>
          <SourcePort>-1</SourcePort>
          <SourceIp>internal</SourceIp>
          <EnableLogging>false</EnableLogging>
        </FirewallRule>
        <FirewallRule>
          <Id>3</Id>
          <IsEnabled>false</IsEnabled>
          <Description>ping</Description>
          <Policy>drop</Policy>
          <Protocols><Icmp>true</Icmp></Protocols>
          <IcmpSubType>any</IcmpSubType>
          <DestinationIp>Any</DestinationIp>
          <SourceIp>Any</SourceIp>
        </FirewallRule>
      </FirewallService>
      <NatService>
        <IsEnabled>true</IsEnabled>
        <NatRule>
          <Description>web</Description>
          <RuleType>DNAT</RuleType>
          <IsEnabled>true</IsEnabled>
          <Id>65537</Id>
          <GatewayNatRule>
            <Interface href="https://vcd.example/api/admin/network/9f1c" name="ext-net" type="application/vnd.vmware.admin.network+xml"/>
            <OriginalIp>203.0.113.10</OriginalIp>
            <OriginalPort>443</OriginalPort>
            <TranslatedIp>10.0.0.10</TranslatedIp>
            <TranslatedPort>443</TranslatedPort>
            <Protocol>tcpudp</Protocol>
          </GatewayNatRule>
        </NatRule>
        <NatRule>
          <RuleType>SNAT</RuleType>
          <IsEnabled>true</IsEnabled>
          <Id>65538</Id>
          <GatewayNatRule>
            <Interface href="https://vcd.example/api/admin/network/9f1c" name="ext-net"/>
            <OriginalIp>10.0.0.0/24</OriginalIp>
            <TranslatedIp>203.0.113.1</TranslatedIp>
          </GatewayNatRule>
        </NatRule>
      </NatService>
      <StaticRoutingService>
        <IsEnabled>true</IsEnabled>
        <StaticRoute>
          <Name>branch</Name>
          <Network>172.16.0.0/16</Network>
          <NextHopIp>203.0.113.254</NextHopIp>
          <Interface>External</Interface>
          <GatewayInterface href="https://vcd.example/api/admin/network/9f1c" name="ext-net"/>
        </StaticRoute>
        <StaticRoute>
          <Name>lab</Name>
          <Network>192.168.9.0/24</Network>
          <NextHopIp>10.0.0.254</NextHopIp>
          <Interface>Internal</Interface>
        </StaticRoute>
      </StaticRoutingService>
    </EdgeGatewayServiceConfiguration>
  </Configuration>
</EdgeGateway>"#;

    fn doc() -> XmlNode {
        parse(GATEWAY.as_bytes()).expect("parse gateway fixture")
    }

    #[test]
    fn nat_rules_map_interface_reference() {
        let rules = GatewayV2.extract_nat_rules(&doc());
        assert_eq!(rules.len(), 2);

        assert_eq!(rules[0].action, NatAction::Dnat);
        assert_eq!(rules[0].interface_id, "9f1c");
        assert_eq!(rules[0].interface_name.as_deref(), Some("ext-net"));
        assert_eq!(
            rules[0].interface_href.as_deref(),
            Some("https://vcd.example/api/admin/network/9f1c")
        );
        assert_eq!(rules[0].protocol, "TCP/UDP");

        assert_eq!(rules[1].action, NatAction::Snat);
        assert_eq!(rules[1].original_port, "any");
        assert_eq!(rules[1].protocol, "ANY");
    }

    #[test]
    fn firewall_protocol_flags_follow_priority_order() {
        let rules = GatewayV2.extract_firewall_rules(&doc());
        assert_eq!(rules[0].service, "tcp:443:any");
        assert_eq!(rules[0].source, "external");
        assert!(rules[0].logging);
        assert_eq!(rules[1].service, "tcp:53:any");
        assert_eq!(rules[2].service, "Icmp");
        assert_eq!(rules[2].policy, FirewallPolicy::Deny);
    }

    #[test]
    fn udp_rules_emit_lowercase_udp_triple() {
        let gateway = parse(
            br#"<EdgeGateway><Configuration><EdgeGatewayServiceConfiguration><FirewallService>
  <FirewallRule>
    <Policy>allow</Policy>
    <Protocols><Udp>true</Udp></Protocols>
    <DestinationPortRange>53</DestinationPortRange>
    <SourcePortRange>Any</SourcePortRange>
    <SourceIp>internal</SourceIp>
    <DestinationIp>Any</DestinationIp>
  </FirewallRule>
</FirewallService></EdgeGatewayServiceConfiguration></Configuration></EdgeGateway>"#,
        )
        .expect("parse");
        let rules = GatewayV2.extract_firewall_rules(&gateway);
        assert_eq!(rules[0].service, "udp:53:any");
    }

    #[test]
    fn protocol_label_defaults_to_any() {
        assert_eq!(protocol_label(None), "Any");
        let none_set = parse(b"<Protocols><Tcp>false</Tcp></Protocols>").expect("parse");
        assert_eq!(protocol_label(Some(&none_set)), "Any");
        let any_and_udp =
            parse(b"<Protocols><Udp>true</Udp><Any>true</Any></Protocols>").expect("parse");
        assert_eq!(protocol_label(Some(&any_and_udp)), "Any");
    }

    #[test]
    fn routes_use_gateway_interface_name() {
        let routes = GatewayV2.extract_static_routes(&doc());
        assert_eq!(routes[0].interface, "ext-net");
        assert_eq!(routes[0].mtu, DEFAULT_MTU);
        assert_eq!(routes[1].interface, "Internal");
        assert!(GatewayV2.extract_default_route(&doc()).is_none());
    }

    #[test]
    fn missing_services_yield_empty_sets() {
        let bare = parse(b"<EdgeGateway><Configuration/></EdgeGateway>").expect("parse");
        assert!(GatewayV2.extract_nat_rules(&bare).is_empty());
        assert!(GatewayV2.extract_firewall_rules(&bare).is_empty());
        assert!(GatewayV2.extract_static_routes(&bare).is_empty());
    }

    #[test]
    fn request_bodies_wrap_single_service() {
        let records = GatewayV2.extract_all(&doc());
        let body = GatewayV2.build_nat_request(&records.nat_rules);
        assert_eq!(body.tag, "EdgeGatewayServiceConfiguration");
        assert_eq!(
            body.attr("xmlns"),
            Some("http://www.vmware.com/vcloud/v1.5")
        );
        assert_eq!(body.children.len(), 1);

        let rules = body.get_child("NatService").expect("nat").get_children("NatRule");
        let snat = rules[1];
        assert_eq!(snat.get_text(&["GatewayNatRule", "Protocol"]), Some("any"));
        assert_eq!(
            snat.get_text(&["GatewayNatRule", "TranslatedPort"]),
            Some("any")
        );
    }

    #[test]
    fn routing_request_ignores_default_route() {
        let routes = GatewayV2.extract_static_routes(&doc());
        let default_route = DefaultRoute {
            interface: "0".to_string(),
            gateway_address: "203.0.113.254".to_string(),
            admin_distance: None,
            mtu: DEFAULT_MTU,
        };
        let body = GatewayV2.build_routing_request(&routes, Some(&default_route));
        let service = body.get_child("StaticRoutingService").expect("routing");
        assert_eq!(service.get_children("StaticRoute").len(), 2);
        assert!(body.descendants().all(|n| n.tag != "defaultRoute"));
    }

    #[test]
    fn extract_build_extract_round_trip() {
        let original = GatewayV2.extract_all(&doc());

        let nat = GatewayV2.extract_nat_rules(&GatewayV2.build_nat_request(&original.nat_rules));
        let firewall = GatewayV2
            .extract_firewall_rules(&GatewayV2.build_firewall_request(&original.firewall_rules));
        let routes = GatewayV2.extract_static_routes(
            &GatewayV2.build_routing_request(&original.static_routes, None),
        );

        let mut expected_nat = original.nat_rules.clone();
        expected_nat.iter_mut().for_each(|r| r.rule_id.clear());
        assert_eq!(nat, expected_nat);

        let mut expected_firewall = original.firewall_rules.clone();
        expected_firewall.iter_mut().for_each(|r| r.rule_id.clear());
        assert_eq!(firewall, expected_firewall);

        assert_eq!(routes, original.static_routes);
    }
}
