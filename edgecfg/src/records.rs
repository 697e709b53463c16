//! Delimited export files.
//!
//! One CSV file per record kind, named `<edge>_<kind>.csv`, plus a small TOML
//! manifest `<edge>_export.toml` recording which schema produced them. Rows
//! are deserialized straight into the typed records, so a malformed file is
//! rejected before anything is sent to the API.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{DefaultRoute, EdgeRecords, FirewallRule, NatRule, Service, StaticRoute};
use crate::schema::SchemaVersion;

/// Record kinds and their file suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    NatRules,
    FirewallRules,
    StaticRoutes,
    DefaultRoute,
}

impl RecordKind {
    pub fn suffix(self) -> &'static str {
        match self {
            RecordKind::NatRules => "nat_rules.csv",
            RecordKind::FirewallRules => "firewall_rules.csv",
            RecordKind::StaticRoutes => "static_routes.csv",
            RecordKind::DefaultRoute => "default_route.csv",
        }
    }
}

/// Errors raised while reading or writing export files.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid records in {path}: {source}")]
    Csv { path: String, source: csv::Error },
    #[error("{path} holds {count} default routes; at most one is allowed")]
    MultipleDefaultRoutes { path: String, count: usize },
    #[error("failed to read manifest {path}: {reason}")]
    Manifest { path: String, reason: String },
    #[error("edge name '{0}' cannot be used as a file name prefix")]
    InvalidEdgeName(String),
    #[error("{path} was exported with schema {found}, but schema {expected} was selected")]
    SchemaMismatch {
        path: String,
        found: SchemaVersion,
        expected: SchemaVersion,
    },
}

/// Summary written next to the record files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub edge: String,
    pub schema: SchemaVersion,
    pub nat_rules: usize,
    pub firewall_rules: usize,
    pub static_routes: usize,
    pub default_route: bool,
}

impl ExportManifest {
    pub fn new(edge: &str, schema: SchemaVersion, records: &EdgeRecords) -> Self {
        Self {
            edge: edge.to_string(),
            schema,
            nat_rules: records.nat_rules.len(),
            firewall_rules: records.firewall_rules.len(),
            static_routes: records.static_routes.len(),
            default_route: records.default_route.is_some(),
        }
    }
}

/// Records read back for an import, plus which services had files.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub records: EdgeRecords,
    pub available: Vec<Service>,
}

pub fn record_path(dir: &Path, edge: &str, kind: RecordKind) -> PathBuf {
    dir.join(format!("{edge}_{}", kind.suffix()))
}

pub fn manifest_path(dir: &Path, edge: &str) -> PathBuf {
    dir.join(format!("{edge}_export.toml"))
}

/// Write every record set for `edge` into `dir` and return the paths written.
///
/// The default-route file is only written when the schema produced one; a
/// default-route file left by an earlier export is removed otherwise.
pub fn write_export(
    dir: &Path,
    edge: &str,
    schema: SchemaVersion,
    records: &EdgeRecords,
) -> Result<Vec<PathBuf>, RecordError> {
    check_edge_name(edge)?;
    let mut written = Vec::new();

    let path = record_path(dir, edge, RecordKind::NatRules);
    write_csv(&path, &records.nat_rules)?;
    written.push(path);

    let path = record_path(dir, edge, RecordKind::FirewallRules);
    write_csv(&path, &records.firewall_rules)?;
    written.push(path);

    let path = record_path(dir, edge, RecordKind::StaticRoutes);
    write_csv(&path, &records.static_routes)?;
    written.push(path);

    let path = record_path(dir, edge, RecordKind::DefaultRoute);
    match &records.default_route {
        Some(default_route) => {
            write_csv(&path, std::slice::from_ref(default_route))?;
            written.push(path);
        }
        None if path.exists() => {
            fs::remove_file(&path).map_err(|source| RecordError::Io {
                path: path.display().to_string(),
                source,
            })?;
            debug!(path = %path.display(), "removed stale default route");
        }
        None => {}
    }

    let path = manifest_path(dir, edge);
    let manifest = ExportManifest::new(edge, schema, records);
    let raw = toml::to_string_pretty(&manifest).map_err(|err| RecordError::Manifest {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    fs::write(&path, raw).map_err(|source| RecordError::Io {
        path: path.display().to_string(),
        source,
    })?;
    written.push(path);

    Ok(written)
}

/// Read the record files exported for `edge`.
///
/// A missing file leaves its service out of [`LoadedRecords::available`].
/// When a manifest exists its schema must match `expected`, and a
/// default-route file is ignored if the manifest records none.
pub fn read_export(
    dir: &Path,
    edge: &str,
    expected: SchemaVersion,
) -> Result<LoadedRecords, RecordError> {
    check_edge_name(edge)?;
    let manifest = read_manifest(&manifest_path(dir, edge))?;
    if let Some(manifest) = &manifest {
        if manifest.schema != expected {
            return Err(RecordError::SchemaMismatch {
                path: manifest_path(dir, edge).display().to_string(),
                found: manifest.schema,
                expected,
            });
        }
    }
    let default_route_expected = manifest.as_ref().map_or(true, |m| m.default_route);

    let mut loaded = LoadedRecords::default();

    if let Some(rules) = read_csv::<NatRule>(&record_path(dir, edge, RecordKind::NatRules))? {
        loaded.records.nat_rules = rules;
        loaded.available.push(Service::Nat);
    }
    if let Some(rules) =
        read_csv::<FirewallRule>(&record_path(dir, edge, RecordKind::FirewallRules))?
    {
        loaded.records.firewall_rules = rules;
        loaded.available.push(Service::Firewall);
    }
    if let Some(routes) =
        read_csv::<StaticRoute>(&record_path(dir, edge, RecordKind::StaticRoutes))?
    {
        loaded.records.static_routes = routes;
        loaded.available.push(Service::Routing);
    }

    let default_path = record_path(dir, edge, RecordKind::DefaultRoute);
    if !default_route_expected && default_path.exists() {
        warn!(
            path = %default_path.display(),
            "manifest records no default route; ignoring default route file"
        );
        return Ok(loaded);
    }
    if let Some(mut routes) = read_csv::<DefaultRoute>(&default_path)? {
        if routes.len() > 1 {
            return Err(RecordError::MultipleDefaultRoutes {
                path: default_path.display().to_string(),
                count: routes.len(),
            });
        }
        loaded.records.default_route = routes.pop();
        if !loaded.available.contains(&Service::Routing) {
            loaded.available.push(Service::Routing);
        }
    }

    Ok(loaded)
}

/// Edge names become file name prefixes, so they may not leave the directory.
pub fn check_edge_name(edge: &str) -> Result<(), RecordError> {
    let trimmed = edge.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || edge.contains(['/', '\\', '\0'])
    {
        return Err(RecordError::InvalidEdgeName(edge.to_string()));
    }
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Option<ExportManifest>, RecordError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|err| RecordError::Manifest {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
}

/// Serialize records with a header row, in declared field order.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), RecordError> {
    let csv_err = |source| RecordError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| RecordError::Io {
        path: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), rows = rows.len(), "wrote records");
    Ok(())
}

/// Deserialize every row of `path`, or `None` when the file does not exist.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>, RecordError> {
    if !path.exists() {
        return Ok(None);
    }
    let csv_err = |source| RecordError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_err)?;
    debug!(path = %path.display(), rows = rows.len(), "read records");
    Ok(Some(rows))
}
