//! Target that writes request bodies to a directory instead of sending them.

use std::path::{Path, PathBuf};

use edge_xml::{write_file, XmlNode};
use tracing::info;

use super::{EdgeApi, EdgeRef};
use crate::error::EdgeError;
use crate::model::Service;

/// Writes each submitted body as `<service>.xml` under `dir`.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    dir: PathBuf,
}

impl DirectoryTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn body_path(&self, service: Service) -> PathBuf {
        self.dir.join(format!("{service}.xml"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl EdgeApi for DirectoryTarget {
    fn find_edge(&self, name: &str) -> Result<EdgeRef, EdgeError> {
        Ok(EdgeRef::named(name))
    }

    fn fetch_config(&self, _edge: &EdgeRef) -> Result<XmlNode, EdgeError> {
        Err(EdgeError::Unsupported("configuration fetch"))
    }

    fn submit(&self, edge: &EdgeRef, service: Service, body: &XmlNode) -> Result<(), EdgeError> {
        let path = self.body_path(service);
        write_file(body, &path).map_err(|source| EdgeError::Encode { service, source })?;
        info!(edge = %edge.name, path = %path.display(), "wrote {service} request body");
        Ok(())
    }

    fn is_busy(&self, _edge: &EdgeRef) -> Result<bool, EdgeError> {
        Ok(false)
    }
}
