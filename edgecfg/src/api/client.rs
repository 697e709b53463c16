//! Blocking HTTP client for the control-plane API.
//!
//! A session token is obtained once by [`ApiClient::login`] and sent with
//! every later request. It is never refreshed.

use std::time::Duration;

use edge_xml::{parse, write_document, XmlNode};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use tracing::{debug, info};

use super::lookup::{is_busy, resolve_edge};
use super::{EdgeApi, EdgeRef};
use crate::error::{EdgeError, Stage};
use crate::model::Service;
use crate::profile::{expand_path, ApiProfile, HttpMethod};

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "x-vcloud-authorization";

const BODY_SNIPPET_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub org: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Hostname, optionally with scheme and port.
    pub host: String,
    /// Accept self-signed certificates.
    pub insecure: bool,
    pub timeout: Duration,
}

/// An authenticated session against one API endpoint.
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: String,
    profile: ApiProfile,
}

impl ApiClient {
    /// Open a session for `user@org`.
    pub fn login(
        options: &ClientOptions,
        credentials: &Credentials,
        profile: ApiProfile,
    ) -> Result<Self, EdgeError> {
        let base_url = base_url(&options.host);
        let url = format!("{base_url}{}", profile.login_path);

        let http = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure)
            .build()
            .map_err(|source| transport(Stage::Login, &url, source))?;

        info!(
            %url,
            user = %credentials.user,
            org = %credentials.org,
            "opening API session"
        );
        let response = http
            .post(&url)
            .header(ACCEPT, profile.accept_header())
            .basic_auth(
                format!("{}@{}", credentials.user, credentials.org),
                Some(&credentials.password),
            )
            .send()
            .map_err(|source| transport(Stage::Login, &url, source))?;
        let response = check(Stage::Login, &url, response)?;

        let token = response
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| EdgeError::Auth {
                stage: Stage::Login,
                reason: format!("login response carried no {TOKEN_HEADER} header"),
            })?;

        Ok(Self {
            http,
            base_url,
            token,
            profile,
        })
    }

    pub fn profile(&self) -> &ApiProfile {
        &self.profile
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(ACCEPT, self.profile.accept_header())
            .header(TOKEN_HEADER, &self.token)
    }

    fn get_xml(&self, stage: Stage, path: &str) -> Result<XmlNode, EdgeError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, %stage, "GET");

        let response = self
            .request(Method::GET, &url)
            .send()
            .map_err(|source| transport(stage, &url, source))?;
        let bytes = check(stage, &url, response)?
            .bytes()
            .map_err(|source| transport(stage, &url, source))?;
        parse(&bytes).map_err(|source| EdgeError::Document { stage, source })
    }
}

impl EdgeApi for ApiClient {
    fn find_edge(&self, name: &str) -> Result<EdgeRef, EdgeError> {
        let path = expand_path(&self.profile.lookup_path, "", name);
        let records = self.get_xml(Stage::Lookup, &path)?;
        resolve_edge(&records, name)
    }

    fn fetch_config(&self, edge: &EdgeRef) -> Result<XmlNode, EdgeError> {
        let path = expand_path(&self.profile.fetch_path, &edge.id, &edge.name);
        self.get_xml(Stage::Fetch, &path)
    }

    fn submit(&self, edge: &EdgeRef, service: Service, body: &XmlNode) -> Result<(), EdgeError> {
        let stage = Stage::Submit(service);
        let endpoint = self.profile.endpoint(service);
        let url = format!(
            "{}{}",
            self.base_url,
            expand_path(&endpoint.path, &edge.id, &edge.name)
        );
        let method = match endpoint.method {
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
        };
        let bytes =
            write_document(body).map_err(|source| EdgeError::Encode { service, source })?;

        debug!(%url, %method, bytes = bytes.len(), "submitting {service}");
        let response = self
            .request(method, &url)
            .header(CONTENT_TYPE, &endpoint.content_type)
            .body(bytes)
            .send()
            .map_err(|source| transport(stage, &url, source))?;
        check(stage, &url, response)?;
        Ok(())
    }

    fn is_busy(&self, edge: &EdgeRef) -> Result<bool, EdgeError> {
        let template = self
            .profile
            .busy_path
            .as_deref()
            .ok_or(EdgeError::Unsupported("busy-state polling"))?;
        let doc = self.get_xml(Stage::Poll, &expand_path(template, &edge.id, &edge.name))?;
        Ok(is_busy(&doc))
    }
}

/// Normalize a host argument into a base URL without trailing slash.
pub fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn transport(stage: Stage, url: &str, source: reqwest::Error) -> EdgeError {
    EdgeError::Transport {
        stage,
        url: url.to_string(),
        source,
    }
}

fn check(stage: Stage, url: &str, response: Response) -> Result<Response, EdgeError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(EdgeError::Auth {
            stage,
            reason: format!("{url} answered HTTP {status}"),
        });
    }
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(EdgeError::Status {
            stage,
            url: url.to_string(),
            status: status.as_u16(),
            body: snippet(&body),
        });
    }
    Ok(response)
}

fn snippet(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= BODY_SNIPPET_CHARS {
        return body.to_string();
    }
    let mut out: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
    out.push('…');
    out
}
