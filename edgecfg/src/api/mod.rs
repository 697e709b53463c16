//! Control-plane access.
//!
//! [`EdgeApi`] is the seam between the export/import flows and the remote
//! API. [`client::ApiClient`] talks HTTP with a session acquired once at
//! login; [`dry_run::DirectoryTarget`] writes request bodies to disk instead.

use edge_xml::XmlNode;

use crate::error::EdgeError;
use crate::model::Service;

pub mod client;
pub mod dry_run;
pub mod lookup;

/// A resolved edge gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRef {
    pub id: String,
    pub name: String,
    pub href: Option<String>,
}

impl EdgeRef {
    /// Reference for a device that was never looked up.
    pub fn named(name: &str) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            href: None,
        }
    }
}

/// Operations the export and import flows need from the control plane.
pub trait EdgeApi {
    /// Resolve an edge gateway by name.
    fn find_edge(&self, name: &str) -> Result<EdgeRef, EdgeError>;

    /// Read the device's current configuration document.
    fn fetch_config(&self, edge: &EdgeRef) -> Result<XmlNode, EdgeError>;

    /// Send one service's request body.
    fn submit(&self, edge: &EdgeRef, service: Service, body: &XmlNode) -> Result<(), EdgeError>;

    /// Whether the device is still applying a change.
    fn is_busy(&self, edge: &EdgeRef) -> Result<bool, EdgeError>;
}
