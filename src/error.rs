//! Error types shared by the single fetch data strategy, the hydration
//! bootstrap and the hot reload coordinator.
//!
//! Every failure that can happen while loading route data ends up as an
//! [`Error`] delivered to the route that requested the data, so that the
//! rendering layer can show that route's nearest error boundary.  As one
//! batched exchange may fail for many routes at once, the error type is
//! `Clone`.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::turbo::{DecodeError, TurboValue};

/// Which kind of server handler a client override attempted to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Loader,
    Action,
}

impl HandlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loader => "loader",
            Self::Action => "action",
        }
    }

    /// The name of the call-through function as seen by a client override.
    pub fn server_fn(&self) -> &'static str {
        match self {
            Self::Loader => "serverLoader()",
            Self::Action => "serverAction()",
        }
    }
}

/// Why a call through to the server was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidCallReason {
    /// There is no server in SPA mode.
    SpaMode,
    /// The route declares no server handler of the requested kind.
    NoServerHandler,
}

/// The errors produced by this crate.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The response did not carry the streaming content type.
    #[error("Expected a text/x-turbo response, got {}", .found.as_deref().unwrap_or("no content type"))]
    UnexpectedContentType { found: Option<String> },

    /// The streamed body could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The decoded body did not have the shape of a single fetch result.
    #[error("malformed single fetch result: {0}")]
    MalformedResult(String),

    /// A result carried none of the `data`, `error` or `redirect` tags.
    #[error("No result found for routeId \"{route_id}\"")]
    NoResult { route_id: String },

    /// The route was submitted to but has neither a client nor a server
    /// action.
    #[error(
        "Route \"{route_id}\" does not have an action, but you are trying to submit to it. \
         To fix this, please add an `action` function to the route"
    )]
    NoActionDefined { route_id: String },

    /// A client override called through to a server handler that cannot
    /// exist.
    #[error("{}", invalid_call_message(.kind, .route_id, .reason))]
    InvalidServerHandlerCall {
        kind: HandlerKind,
        route_id: String,
        reason: InvalidCallReason,
    },

    /// The route module was expected to be loaded by the router.
    #[error("Expected a route module for routeId \"{route_id}\"")]
    RouteModuleMissing { route_id: String },

    /// The `{error}` tag of a result, thrown verbatim.
    #[error("route error: {0}")]
    Thrown(TurboValue),

    /// The network exchange itself failed.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The exchange was cancelled by the navigation's abort signal.
    #[error("the request was aborted")]
    Aborted,

    /// The server-embedded bootstrap state could not be read.
    #[error("invalid entry context: {0}")]
    InvalidEntryContext(String),
}

fn invalid_call_message(kind: &HandlerKind, route_id: &str, reason: &InvalidCallReason) -> String {
    match reason {
        InvalidCallReason::SpaMode => format!(
            "You cannot call {} in SPA Mode (routeId: \"{route_id}\")",
            kind.server_fn(),
        ),
        InvalidCallReason::NoServerHandler => format!(
            "You are trying to call {} on a route that does not have a server {} (routeId: \"{route_id}\")",
            kind.server_fn(),
            kind.as_str(),
        ),
    }
}

impl Error {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// The status a rendering layer should associate with this error, if
    /// the error stands in for an error response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::NoActionDefined { .. } => Some(StatusCode::METHOD_NOT_ALLOWED),
            Self::InvalidServerHandlerCall { .. } => Some(StatusCode::BAD_REQUEST),
            _ => None,
        }
    }

    /// The route this error is attributable to, where known.
    pub fn route_id(&self) -> Option<&str> {
        match self {
            Self::NoResult { route_id }
            | Self::NoActionDefined { route_id }
            | Self::InvalidServerHandlerCall { route_id, .. }
            | Self::RouteModuleMissing { route_id } => Some(route_id),
            _ => None,
        }
    }

    /// Protocol violations abort the whole navigation rather than a
    /// single route.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedContentType { .. } | Self::Decode(_) | Self::MalformedResult(_)
        )
    }
}

/// An error response as carried in the hydration state, e.g. a 404 thrown
/// from a server loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub internal: bool,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_action_names_route() {
        let err = Error::NoActionDefined {
            route_id: "routes/contact".into(),
        };
        assert!(err.to_string().contains("\"routes/contact\""));
        assert_eq!(err.status(), Some(StatusCode::METHOD_NOT_ALLOWED));
        assert_eq!(err.route_id(), Some("routes/contact"));
    }

    #[test]
    fn invalid_call_messages() {
        let spa = Error::InvalidServerHandlerCall {
            kind: HandlerKind::Loader,
            route_id: "root".into(),
            reason: InvalidCallReason::SpaMode,
        };
        assert_eq!(
            spa.to_string(),
            "You cannot call serverLoader() in SPA Mode (routeId: \"root\")",
        );

        let missing = Error::InvalidServerHandlerCall {
            kind: HandlerKind::Action,
            route_id: "routes/a".into(),
            reason: InvalidCallReason::NoServerHandler,
        };
        assert_eq!(
            missing.to_string(),
            "You are trying to call serverAction() on a route that does not have a \
             server action (routeId: \"routes/a\")",
        );
        assert_eq!(missing.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn content_type_is_protocol_violation() {
        let err = Error::UnexpectedContentType {
            found: Some("application/json".into()),
        };
        assert!(err.is_protocol_violation());
        assert!(err.to_string().contains("application/json"));
        assert!(!Error::Aborted.is_protocol_violation());
    }
}
