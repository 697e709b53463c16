use std::time::Duration;

use anyhow::{Context, Result};
use edgecfg::api::client::{ApiClient, ClientOptions, Credentials};
use edgecfg::profile::{load_profile_with_source, ApiProfile};
use edgecfg::schema::SchemaVersion;
use tracing::info;

use crate::cli::ConnectionArgs;

/// Load the API profile for `schema` and report where it came from.
pub fn profile_for(schema: SchemaVersion, conn: &ConnectionArgs) -> Result<ApiProfile> {
    let (profile, source) = load_profile_with_source(schema, conn.profiles_dir.as_deref())
        .with_context(|| format!("failed to load API profile for schema {schema}"))?;
    info!(%schema, %source, api_version = %profile.api_version, "using API profile");
    Ok(profile)
}

/// Log in with the connection settings; every setting is required here.
pub fn open_session(conn: &ConnectionArgs, profile: ApiProfile) -> Result<ApiClient> {
    let options = ClientOptions {
        host: required(&conn.host, "--host")?,
        insecure: conn.insecure,
        timeout: Duration::from_secs(conn.timeout),
    };
    let credentials = Credentials {
        user: required(&conn.user, "--user (or EDGECFG_USER)")?,
        org: required(&conn.org, "--org")?,
        password: required(&conn.password, "--password (or EDGECFG_PASSWORD)")?,
    };
    ApiClient::login(&options, &credentials, profile)
        .with_context(|| format!("failed to open API session on {}", options.host))
}

fn required(value: &Option<String>, flag: &str) -> Result<String> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .with_context(|| format!("{flag} is required to reach the API"))
}
