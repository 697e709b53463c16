//! Export flow: configuration document to record files.

use std::path::{Path, PathBuf};

use edge_xml::XmlNode;
use serde::Serialize;
use tracing::{info, warn};

use crate::model::EdgeRecords;
use crate::records::{write_export, RecordError};
use crate::schema::ConfigSchema;

/// What one export produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub edge: String,
    pub schema: String,
    pub nat_rules: usize,
    pub firewall_rules: usize,
    pub static_routes: usize,
    pub default_route: bool,
    pub files: Vec<PathBuf>,
}

/// Extract every record set from `doc` and write them under `dir`.
pub fn export_document(
    schema: &dyn ConfigSchema,
    doc: &XmlNode,
    edge: &str,
    dir: &Path,
) -> Result<(EdgeRecords, ExportSummary), RecordError> {
    let records = schema.extract_all(doc);
    if is_empty(&records) {
        warn!(edge, schema = %schema.version(), "document yielded no user-defined records");
    }

    let files = write_export(dir, edge, schema.version(), &records)?;
    info!(
        edge,
        nat = records.nat_rules.len(),
        firewall = records.firewall_rules.len(),
        routes = records.static_routes.len(),
        "export written to {}",
        dir.display()
    );

    let summary = ExportSummary {
        edge: edge.to_string(),
        schema: schema.version().to_string(),
        nat_rules: records.nat_rules.len(),
        firewall_rules: records.firewall_rules.len(),
        static_routes: records.static_routes.len(),
        default_route: records.default_route.is_some(),
        files,
    };
    Ok((records, summary))
}

fn is_empty(records: &EdgeRecords) -> bool {
    records.nat_rules.is_empty()
        && records.firewall_rules.is_empty()
        && records.static_routes.is_empty()
        && records.default_route.is_none()
}
