//! Edge-native schema.
//!
//! Document layout (`GET` on the edge resource):
//!
//! ```text
//! <edge>
//!   <features>
//!     <nat><natRules><natRule>…</natRule></natRules></nat>
//!     <firewall><firewallRules><firewallRule>…</firewallRule></firewallRules></firewall>
//!     <routing><staticRouting>
//!       <defaultRoute>…</defaultRoute>
//!       <staticRoutes><route>…</route></staticRoutes>
//!     </staticRouting></routing>
//!   </features>
//! </edge>
//! ```
//!
//! NAT and firewall entries carry `ruleType`, routes carry `type`; anything
//! other than `user` was generated by a platform service and is skipped.
//! Request bodies are `<natRules>`, `<firewallRules>` and `<staticRouting>`.

use edge_xml::XmlNode;
use tracing::warn;

use super::tokens::{
    format_services, is_address, is_vnic_group, is_wildcard, join_tokens, nat_protocol_internal,
    nat_protocol_label, parse_services, split_tokens, ServiceTriple,
};
use super::{bool_text, flag, opt_text, ConfigSchema, SchemaVersion};
use crate::model::{
    mtu_or_default, DefaultRoute, FirewallPolicy, FirewallRule, NatAction, NatRule, StaticRoute,
    WILDCARD,
};

const USER_RULE: &str = "user";
const EXCLUDE_PREFIX: &str = "!";

/// Strategy for `<edge>` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeV1;

impl ConfigSchema for EdgeV1 {
    fn version(&self) -> SchemaVersion {
        SchemaVersion::V1
    }

    fn extract_nat_rules(&self, doc: &XmlNode) -> Vec<NatRule> {
        let Some(rules) = features(doc).and_then(|f| f.find(&["nat", "natRules"])) else {
            return Vec::new();
        };

        rules
            .get_children("natRule")
            .into_iter()
            .filter(|rule| is_user(rule, "ruleType"))
            .filter_map(nat_rule_from_node)
            .collect()
    }

    fn extract_firewall_rules(&self, doc: &XmlNode) -> Vec<FirewallRule> {
        let Some(rules) = features(doc).and_then(|f| f.find(&["firewall", "firewallRules"]))
        else {
            return Vec::new();
        };

        rules
            .get_children("firewallRule")
            .into_iter()
            .filter(|rule| is_user(rule, "ruleType"))
            .map(firewall_rule_from_node)
            .collect()
    }

    fn extract_static_routes(&self, doc: &XmlNode) -> Vec<StaticRoute> {
        let Some(routes) = static_routing(doc).and_then(|s| s.get_child("staticRoutes")) else {
            return Vec::new();
        };

        routes
            .get_children("route")
            .into_iter()
            .filter(|route| is_user(route, "type"))
            .map(|route| StaticRoute {
                description: opt_text(route, &["description"]),
                interface: route.text_or(&["vnic"], "").to_string(),
                network: route.text_or(&["network"], "").to_string(),
                next_hop: route.text_or(&["nextHop"], "").to_string(),
                admin_distance: parse_distance(route),
                mtu: mtu_or_default(route.get_text(&["mtu"])),
            })
            .collect()
    }

    fn extract_default_route(&self, doc: &XmlNode) -> Option<DefaultRoute> {
        let route = static_routing(doc)?.get_child("defaultRoute")?;
        Some(DefaultRoute {
            interface: route.text_or(&["vnic"], "").to_string(),
            gateway_address: route.text_or(&["gatewayAddress"], "").to_string(),
            admin_distance: parse_distance(route),
            mtu: mtu_or_default(route.get_text(&["mtu"])),
        })
    }

    fn build_nat_request(&self, rules: &[NatRule]) -> XmlNode {
        let mut out = XmlNode::new("natRules");
        for rule in rules {
            out.children.push(nat_rule_to_node(rule));
        }
        out
    }

    fn build_firewall_request(&self, rules: &[FirewallRule]) -> XmlNode {
        let mut out = XmlNode::new("firewallRules");
        for rule in rules {
            out.children.push(firewall_rule_to_node(rule));
        }
        out
    }

    fn build_routing_request(
        &self,
        routes: &[StaticRoute],
        default_route: Option<&DefaultRoute>,
    ) -> XmlNode {
        let mut out = XmlNode::new("staticRouting");

        let mut static_routes = XmlNode::new("staticRoutes");
        for route in routes {
            let mut node = XmlNode::new("route");
            node.push_opt_leaf("description", route.description.as_deref());
            node.push_leaf("vnic", &route.interface);
            node.push_leaf("network", &route.network);
            node.push_leaf("nextHop", &route.next_hop);
            node.push_leaf("mtu", route.mtu.to_string());
            if let Some(distance) = route.admin_distance {
                node.push_leaf("adminDistance", distance.to_string());
            }
            node.push_leaf("type", USER_RULE);
            static_routes.children.push(node);
        }
        out.children.push(static_routes);

        if let Some(default_route) = default_route {
            let mut node = XmlNode::new("defaultRoute");
            node.push_leaf("vnic", &default_route.interface);
            node.push_leaf("gatewayAddress", &default_route.gateway_address);
            if let Some(distance) = default_route.admin_distance {
                node.push_leaf("adminDistance", distance.to_string());
            }
            node.push_leaf("mtu", default_route.mtu.to_string());
            out.children.push(node);
        }
        out
    }
}

fn features(doc: &XmlNode) -> Option<&XmlNode> {
    if doc.tag == "features" {
        return Some(doc);
    }
    doc.get_child("features")
}

fn static_routing(doc: &XmlNode) -> Option<&XmlNode> {
    features(doc)?.find(&["routing", "staticRouting"])
}

fn is_user(node: &XmlNode, field: &str) -> bool {
    node.get_text(&[field])
        .is_some_and(|t| t.trim().eq_ignore_ascii_case(USER_RULE))
}

fn parse_distance(node: &XmlNode) -> Option<u32> {
    node.get_text(&["adminDistance"])
        .and_then(|t| t.trim().parse().ok())
}

fn nat_rule_from_node(rule: &XmlNode) -> Option<NatRule> {
    let raw_action = rule.text_or(&["action"], "");
    let action = match raw_action.parse::<NatAction>() {
        Ok(action) => action,
        Err(err) => {
            warn!(rule_id = rule.text_or(&["ruleId"], ""), "skipping NAT rule: {err}");
            return None;
        }
    };

    Some(NatRule {
        rule_id: rule.text_or(&["ruleId"], "").to_string(),
        action,
        interface_id: rule.text_or(&["vnic"], "").to_string(),
        interface_name: None,
        interface_href: None,
        original_address: rule.text_or(&["originalAddress"], WILDCARD).to_string(),
        original_port: rule.text_or(&["originalPort"], WILDCARD).to_string(),
        translated_address: rule.text_or(&["translatedAddress"], WILDCARD).to_string(),
        translated_port: rule.text_or(&["translatedPort"], WILDCARD).to_string(),
        protocol: nat_protocol_label(rule.text_or(&["protocol"], WILDCARD)),
        enabled: flag(rule, &["enabled"]),
        logging: flag(rule, &["loggingEnabled"]),
        description: opt_text(rule, &["description"]),
    })
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

    let mut node = XmlNode::new("natRule");
    node.push_leaf("ruleType", USER_RULE);
    node.push_leaf("action", rule.action.as_str().to_ascii_lowercase());
    node.push_leaf("vnic", &rule.interface_id);
    node.push_leaf("originalAddress", &rule.original_address);
    node.push_leaf("translatedAddress", &rule.translated_address);
    node.push_leaf("originalPort", original_port);
    node.push_leaf("translatedPort", translated_port);
    node.push_leaf("protocol", protocol);
    node.push_leaf("enabled", bool_text(rule.enabled));
    node.push_leaf("loggingEnabled", bool_text(rule.logging));
    node.push_opt_leaf("description", rule.description.as_deref());
    node
}

fn firewall_rule_from_node(rule: &XmlNode) -> FirewallRule {
    let policy = match rule.text_or(&["action"], "").to_ascii_lowercase().as_str() {
        "accept" | "allow" => FirewallPolicy::Allow,
        _ => FirewallPolicy::Deny,
    };

    let application = rule.get_child("application");
    let services: Vec<ServiceTriple> = application
        .map(|app| {
            app.get_children("service")
                .into_iter()
                .map(|svc| {
                    ServiceTriple::new(
                        svc.text_or(&["protocol"], WILDCARD),
                        svc.text_or(&["port"], WILDCARD),
                        svc.text_or(&["sourcePort"], WILDCARD),
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    let application_ids: Vec<&str> = application
        .map(|app| {
            app.get_children("applicationId")
                .into_iter()
                .filter_map(|id| id.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    FirewallRule {
        rule_id: rule.text_or(&["id"], "").to_string(),
        enabled: flag(rule, &["enabled"]),
        description: opt_text(rule, &["name"]).or_else(|| opt_text(rule, &["description"])),
        source: endpoint_field(rule.get_child("source")),
        destination: endpoint_field(rule.get_child("destination")),
        service: service_field(&application_ids, &services),
        logging: flag(rule, &["loggingEnabled"]),
        policy,
    }
}

/// Service objects are kept as bare `applicationId` tokens ahead of any
/// explicit triples; without them the field uses the triple encoding.
fn service_field(application_ids: &[&str], services: &[ServiceTriple]) -> String {
    if application_ids.is_empty() {
        return format_services(services);
    }
    let triples: Vec<String> = services
        .iter()
        .map(|s| format!("{}:{}:{}", s.protocol, s.port, s.source_port))
        .collect();
    join_tokens(
        application_ids
            .iter()
            .copied()
            .chain(triples.iter().map(String::as_str)),
    )
}

/// A service token that names an application object rather than a triple.
fn is_application_id(token: &str) -> bool {
    !token.contains(':') && !is_wildcard(token) && !token.eq_ignore_ascii_case("icmp")
}

/// Group references win over address entries; an absent element matches all.
/// An excluded match is written with a leading `!`.
fn endpoint_field(node: Option<&XmlNode>) -> String {
    let Some(node) = node else {
        return WILDCARD.to_string();
    };

    let members = endpoint_members(node);
    if flag(node, &["exclude"]) && !is_wildcard(&members) {
        format!("{EXCLUDE_PREFIX}{members}")
    } else {
        members
    }
}

fn endpoint_members(node: &XmlNode) -> String {
    let groups: Vec<&str> = node
        .children
        .iter()
        .filter(|c| c.tag == "vnicGroupId" || c.tag == "groupingObjectId")
        .filter_map(|c| c.text.as_deref())
        .collect();
    if !groups.is_empty() {
        return join_tokens(groups);
    }

    let addresses = join_tokens(
        node.get_children("ipAddress")
            .into_iter()
            .filter_map(|c| c.text.as_deref()),
    );
    if addresses.is_empty() {
        WILDCARD.to_string()
    } else {
        addresses
    }
}

fn endpoint_node(tag: &str, field: &str) -> Option<XmlNode> {
    let field = field.trim();
    let (exclude, field) = match field.strip_prefix(EXCLUDE_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, field),
    };
    if is_wildcard(field) {
        return None;
    }

    let mut vnic_groups = Vec::new();
    let mut grouping_objects = Vec::new();
    let mut addresses = Vec::new();
    for token in split_tokens(field) {
        if is_address(token) {
            addresses.push(XmlNode::leaf("ipAddress", token));
        } else if is_vnic_group(token) {
            vnic_groups.push(XmlNode::leaf("vnicGroupId", token));
        } else {
            grouping_objects.push(XmlNode::leaf("groupingObjectId", token));
        }
    }

    let mut node = XmlNode::new(tag);
    node.push_leaf("exclude", bool_text(exclude));
    node.children.extend(vnic_groups);
    node.children.extend(grouping_objects);
    node.children.extend(addresses);
    Some(node)
}

fn application_node(field: &str) -> XmlNode {
    let mut app = XmlNode::new("application");
    let (application_ids, services): (Vec<&str>, Vec<&str>) = split_tokens(field)
        .into_iter()
        .partition(|token| is_application_id(token));
    for id in &application_ids {
        app.push_leaf("applicationId", *id);
    }
    if !application_ids.is_empty() && services.is_empty() {
        return app;
    }

    let services = if application_ids.is_empty() {
        field.to_string()
    } else {
        services.join(" ")
    };
    for triple in parse_services(&services) {
        let mut svc = XmlNode::new("service");
        if triple.is_icmp() {
            svc.push_leaf("protocol", "icmp");
            svc.push_leaf("icmpType", WILDCARD);
        } else {
            svc.push_leaf("protocol", triple.protocol.to_ascii_lowercase());
            svc.push_leaf("port", &triple.port);
            svc.push_leaf("sourcePort", &triple.source_port);
        }
        app.children.push(svc);
    }
    app
}

fn firewall_rule_to_node(rule: &FirewallRule) -> XmlNode {
    let mut node = XmlNode::new("firewallRule");
    node.push_leaf("ruleType", USER_RULE);
    node.push_opt_leaf("name", rule.description.as_deref());
    node.push_leaf("enabled", bool_text(rule.enabled));
    node.push_leaf("loggingEnabled", bool_text(rule.logging));
    node.push_leaf(
        "action",
        match rule.policy {
            FirewallPolicy::Allow => "accept",
            FirewallPolicy::Deny => "deny",
        },
    );
    if let Some(source) = endpoint_node("source", &rule.source) {
        node.children.push(source);
    }
    if let Some(destination) = endpoint_node("destination", &rule.destination) {
        node.children.push(destination);
    }
    node.children.push(application_node(&rule.service));
    node
}
