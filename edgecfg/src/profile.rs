//! API profiles: resource paths, methods and versions per schema.
//!
//! The defaults are embedded from `profiles/<schema>.toml`. A profiles
//! directory given on the command line takes precedence when it holds a file
//! for the selected schema.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::form_urlencoded;

use crate::model::Service;
use crate::poll::PollSettings;
use crate::schema::SchemaVersion;

/// How a service change is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitMode {
    /// Done once the API answers 2xx.
    SingleShot,
    /// Done once the device stops reporting busy.
    Poll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiProfile {
    pub schema: SchemaVersion,
    pub api_version: String,
    pub login_path: String,
    pub lookup_path: String,
    pub fetch_path: String,
    #[serde(default)]
    pub busy_path: Option<String>,
    pub submit: SubmitMode,
    #[serde(default)]
    pub poll: PollSettings,
    pub nat: Endpoint,
    pub firewall: Endpoint,
    pub routing: Endpoint,
}

impl ApiProfile {
    pub fn endpoint(&self, service: Service) -> &Endpoint {
        match service {
            Service::Nat => &self.nat,
            Service::Firewall => &self.firewall,
            Service::Routing => &self.routing,
        }
    }

    /// `Accept` header carrying the API version.
    pub fn accept_header(&self) -> String {
        format!("application/*+xml;version={}", self.api_version)
    }
}

/// Fill `{id}` and `{name}` placeholders in a path template.
///
/// The name is percent-encoded: form encoding after the `?`, and `%20` for
/// spaces in the path. Ids come from API hrefs and are inserted as-is.
pub fn expand_path(template: &str, id: &str, name: &str) -> String {
    let (path, query) = match template.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (template, None),
    };
    let form_name: String = form_urlencoded::byte_serialize(name.as_bytes()).collect();
    let mut out = path
        .replace("{id}", id)
        .replace("{name}", &form_name.replace('+', "%20"));
    if let Some(query) = query {
        out.push('?');
        out.push_str(&query.replace("{id}", id).replace("{name}", &form_name));
    }
    out
}

#[derive(Debug, Error)]
pub enum ProfileLoadError {
    #[error("failed to read profile {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse profile {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("profile {path} is invalid: {reason}")]
    Invalid { path: String, reason: String },
}

pub fn load_profile(schema: SchemaVersion) -> Result<ApiProfile, ProfileLoadError> {
    load_profile_with_source(schema, None).map(|(profile, _)| profile)
}

/// Load the profile for `schema` and report where it came from
/// (`embedded` or `file:<path>`).
pub fn load_profile_with_source(
    schema: SchemaVersion,
    profiles_dir: Option<&Path>,
) -> Result<(ApiProfile, String), ProfileLoadError> {
    if let Some(dir) = profiles_dir {
        let path = profile_path(dir, schema);
        if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| ProfileLoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let profile = parse_profile(&raw, &path.display().to_string(), schema)?;
            return Ok((profile, format!("file:{}", path.display())));
        }
    }

    let profile = parse_profile(embedded_profile(schema), "embedded", schema)?;
    Ok((profile, "embedded".to_string()))
}

fn embedded_profile(schema: SchemaVersion) -> &'static str {
    match schema {
        SchemaVersion::V1 => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/profiles/v1.toml")),
        SchemaVersion::V2 => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/profiles/v2.toml")),
    }
}

fn profile_path(base: &Path, schema: SchemaVersion) -> PathBuf {
    base.join(format!("{schema}.toml"))
}

fn parse_profile(
    raw: &str,
    path: &str,
    schema: SchemaVersion,
) -> Result<ApiProfile, ProfileLoadError> {
    let profile: ApiProfile = toml::from_str(raw).map_err(|source| ProfileLoadError::Parse {
        path: path.to_string(),
        source,
    })?;

    let invalid = |reason: String| ProfileLoadError::Invalid {
        path: path.to_string(),
        reason,
    };
    if profile.schema != schema {
        return Err(invalid(format!(
            "declares schema {} but {schema} was requested",
            profile.schema
        )));
    }
    if profile.submit == SubmitMode::Poll && profile.busy_path.is_none() {
        return Err(invalid("poll submission requires busy_path".to_string()));
    }
    if profile.poll.max_attempts == 0 {
        return Err(invalid("poll.max_attempts must be at least 1".to_string()));
    }
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use tempfile::tempdir;

    use super::{expand_path, load_profile, load_profile_with_source, HttpMethod, SubmitMode};
    use crate::model::Service;
    use crate::schema::SchemaVersion;

    #[test]
    fn embedded_profiles_load() {
        let v1 = load_profile(SchemaVersion::V1).expect("v1 profile");
        assert_eq!(v1.submit, SubmitMode::SingleShot);
        assert_eq!(v1.endpoint(Service::Nat).method, HttpMethod::Post);
        assert_eq!(v1.endpoint(Service::Routing).method, HttpMethod::Put);

        let v2 = load_profile(SchemaVersion::V2).expect("v2 profile");
        assert_eq!(v2.submit, SubmitMode::Poll);
        assert_eq!(v2.poll.max_attempts, 120);
        assert_eq!(v2.poll.interval(), Duration::from_secs(1));
        assert!(v2.busy_path.is_some());
    }

    #[test]
    fn accept_header_carries_version() {
        let v2 = load_profile(SchemaVersion::V2).expect("v2 profile");
        assert_eq!(v2.accept_header(), "application/*+xml;version=5.6");
    }

    #[test]
    fn expands_placeholders() {
        assert_eq!(
            expand_path("/network/edges/{id}/nat/config/rules", "e-1", "edge"),
            "/network/edges/e-1/nat/config/rules"
        );
        assert_eq!(
            expand_path("/api/query?filter=name=={name}", "e-1", "edge-01"),
            "/api/query?filter=name==edge-01"
        );
    }

    #[test]
    fn encodes_name_in_query_and_path() {
        assert_eq!(
            expand_path(
                "/api/query?type=edgeGateway&format=records&filter=name=={name}",
                "",
                "edge #1&2",
            ),
            "/api/query?type=edgeGateway&format=records&filter=name==edge+%231%262"
        );
        assert_eq!(
            expand_path("/edges/{name}/config", "", "edge #1"),
            "/edges/edge%20%231/config"
        );
    }

    #[test]
    fn profile_source_reports_embedded() {
        let dir = tempdir().expect("tempdir");
        let (_, source) =
            load_profile_with_source(SchemaVersion::V1, Some(dir.path())).expect("profile");
        assert_eq!(source, "embedded");
    }

    #[test]
    fn profile_source_reports_override_dir() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("v1.toml"),
            r#"
schema = "v1"
api_version = "31.0"
login_path = "/cloudapi/1.0.0/sessions"
lookup_path = "/api/query?type=edgeGateway&filter=name=={name}"
fetch_path = "/network/edges/{id}"
submit = "single-shot"

[nat]
method = "PUT"
path = "/network/edges/{id}/nat/config"
content_type = "application/xml"

[firewall]
method = "PUT"
path = "/network/edges/{id}/firewall/config"
content_type = "application/xml"

[routing]
method = "PUT"
path = "/network/edges/{id}/routing/config/static"
content_type = "application/xml"
"#,
        )
        .expect("write profile");

        let (profile, source) =
            load_profile_with_source(SchemaVersion::V1, Some(dir.path())).expect("profile");
        assert!(source.starts_with("file:"));
        assert_eq!(profile.api_version, "31.0");
        assert_eq!(profile.nat.method, HttpMethod::Put);
    }

    #[test]
    fn poll_profile_without_busy_path_is_invalid() {
        let dir = tempdir().expect("tempdir");
        let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/profiles/v2.toml"))
            .lines()
            .filter(|line| !line.starts_with("busy_path"))
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(dir.path().join("v2.toml"), raw).expect("write profile");

        let err = load_profile_with_source(SchemaVersion::V2, Some(dir.path()))
            .expect_err("invalid profile");
        assert!(err.to_string().contains("busy_path"));
    }
}
