use std::fmt::{self, Display, Formatter};

use edge_xml::{ParseError, WriteError};
use thiserror::Error;

use crate::model::Service;

/// The step of a run an API error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Login,
    Lookup,
    Fetch,
    Submit(Service),
    Poll,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Login => write!(f, "login"),
            Stage::Lookup => write!(f, "lookup"),
            Stage::Fetch => write!(f, "fetch"),
            Stage::Submit(service) => write!(f, "submit {service}"),
            Stage::Poll => write!(f, "poll"),
        }
    }
}

/// Errors raised while talking to the control-plane API.
#[derive(Debug, Error)]
pub enum EdgeError {
    /// No session, or the session was rejected.
    #[error("authentication failed during {stage}: {reason}")]
    Auth { stage: Stage, reason: String },
    /// Name lookup returned no edge gateway.
    #[error("edge gateway '{0}' not found")]
    NotFound(String),
    /// Name lookup returned more than one edge gateway.
    #[error("edge gateway name '{name}' is ambiguous ({count} matches)")]
    Ambiguous { name: String, count: usize },
    /// The HTTP call itself failed.
    #[error("{stage} request to {url} failed: {source}")]
    Transport {
        stage: Stage,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The API answered with a non-success status.
    #[error("{stage} request to {url} returned HTTP {status}: {body}")]
    Status {
        stage: Stage,
        url: String,
        status: u16,
        body: String,
    },
    /// The response body was not a usable XML document.
    #[error("{stage} response could not be parsed: {source}")]
    Document {
        stage: Stage,
        #[source]
        source: ParseError,
    },
    /// A request body could not be serialized.
    #[error("{service} request body could not be encoded: {source}")]
    Encode {
        service: Service,
        #[source]
        source: WriteError,
    },
    /// The device stayed busy for the whole poll window.
    #[error("{service} change still in progress after {attempts} status checks")]
    ScheduleTimeout { service: Service, attempts: u32 },
    /// Operation the selected backend cannot perform.
    #[error("{0} is not supported by this target")]
    Unsupported(&'static str),
}

impl EdgeError {
    /// Lookup and authentication failures leave nothing meaningful to do.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EdgeError::Auth { .. } | EdgeError::NotFound(_) | EdgeError::Ambiguous { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{EdgeError, Stage};
    use crate::model::Service;

    #[test]
    fn messages_name_stage_and_service() {
        let err = EdgeError::Status {
            stage: Stage::Submit(Service::Firewall),
            url: "https://vcd.example/network/edges/e1/firewall/config/rules".to_string(),
            status: 400,
            body: "bad rule".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("submit firewall request"));
        assert!(msg.contains("HTTP 400"));

        let timeout = EdgeError::ScheduleTimeout {
            service: Service::Routing,
            attempts: 120,
        };
        assert_eq!(
            timeout.to_string(),
            "routing change still in progress after 120 status checks"
        );
    }

    #[test]
    fn lookup_errors_are_fatal() {
        assert!(EdgeError::NotFound("edge-01".to_string()).is_fatal());
        assert!(!EdgeError::Unsupported("fetch").is_fatal());
    }
}
