//! Export and import of edge gateway network configuration.
//!
//! An edge gateway managed by a cloud control plane exposes its configuration
//! as an XML document. This library flattens the user-defined parts of that
//! document (NAT rules, firewall rules, static routes and the default route)
//! into typed records stored as CSV files, and rebuilds service request
//! bodies from those records for submission to another gateway.
//!
//! # Architecture
//!
//! ## Records
//!
//! - [`model`]: Typed record structs and the [`model::Service`] enum
//! - [`records`]: CSV files and the export manifest
//!
//! ## Schemas
//!
//! - [`schema`]: [`schema::ConfigSchema`] strategies for the edge-native (v1)
//!   and gateway-services (v2) documents
//!
//! ## Control plane
//!
//! - [`api`]: [`api::EdgeApi`] seam, HTTP client and dry-run target
//! - [`profile`]: API profiles with paths, methods and versions per schema
//! - [`poll`]: Busy-state polling for asynchronous changes
//! - [`error`]: API error kinds
//!
//! ## Flows
//!
//! - [`export`]: Document to record files
//! - [`import`]: Record files to per-service submissions
//! - [`report`]: Terminal output for both flows
//!
//! # Examples
//!
//! ```ignore
//! use edge_xml::parse_file;
//! use edgecfg::export::export_document;
//! use edgecfg::schema::{schema_for, SchemaVersion};
//!
//! let doc = parse_file("edge-01.xml".as_ref())?;
//! let schema = schema_for(SchemaVersion::V1);
//! let (_, summary) = export_document(schema, &doc, "edge-01", "out".as_ref())?;
//! println!("{} NAT rules", summary.nat_rules);
//! ```

pub mod api;
pub mod error;
pub mod export;
pub mod import;
pub mod model;
pub mod poll;
pub mod profile;
pub mod records;
pub mod report;
pub mod schema;
