//! Query-service responses: name resolution and busy state.

use edge_xml::XmlNode;

use super::EdgeRef;
use crate::error::EdgeError;

const RECORD_TAGS: [&str; 2] = ["EdgeGatewayRecord", "AdminEdgeGatewayRecord"];
const ACTIVE_TASK_STATES: [&str; 3] = ["queued", "preRunning", "running"];

/// Pick the single record named `name` out of a query result.
pub fn resolve_edge(records: &XmlNode, name: &str) -> Result<EdgeRef, EdgeError> {
    let matches: Vec<&XmlNode> = records
        .children
        .iter()
        .filter(|c| RECORD_TAGS.contains(&c.tag.as_str()))
        .filter(|c| c.attr("name") == Some(name))
        .collect();

    match matches.as_slice() {
        [] => Err(EdgeError::NotFound(name.to_string())),
        [record] => {
            let href = record.attr("href").unwrap_or_default();
            Ok(EdgeRef {
                id: id_from_href(href),
                name: name.to_string(),
                href: Some(href.to_string()).filter(|h| !h.is_empty()),
            })
        }
        many => Err(EdgeError::Ambiguous {
            name: name.to_string(),
            count: many.len(),
        }),
    }
}

/// Busy when a record says `isBusy="true"` or any task is still active.
pub fn is_busy(doc: &XmlNode) -> bool {
    doc.descendants().any(|node| {
        node.attr("isBusy")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
            || (node.tag == "Task"
                && node
                    .attr("status")
                    .is_some_and(|s| ACTIVE_TASK_STATES.contains(&s)))
    })
}

/// Last path segment of an API reference.
pub fn id_from_href(href: &str) -> String {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
