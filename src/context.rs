//! The bootstrap state the server embeds in the rendered page.
//!
//! An [`EntryContext`] is read once at startup with
//! [`EntryContext::from_json`] and configures everything else: the URL the
//! page was rendered for, the hydration state, the SPA mode switch, the
//! future flags forwarded to the router and, in development, where the hot
//! reload runtime lives.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ErrorResponse, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryContext {
    /// The pathname the server rendered.
    pub url: String,
    #[serde(default)]
    pub basename: Option<String>,
    #[serde(default)]
    pub state: HydrationState,
    #[serde(default)]
    pub critical_css: Option<String>,
    #[serde(default)]
    pub future: FutureConfig,
    #[serde(default)]
    pub is_spa_mode: bool,
    /// Count of deferred keys still streaming in with the document.
    #[serde(rename = "a", default)]
    pub deferred_keys: Option<u32>,
    #[serde(default)]
    pub dev: Option<DevConfig>,
}

impl EntryContext {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidEntryContext(e.to_string()))
    }

    /// The pathname portion of [`url`](Self::url), ignoring any query or
    /// fragment.
    pub fn pathname(&self) -> &str {
        let url = self.url.as_str();
        let end = url.find(['?', '#']).unwrap_or(url.len());
        &url[..end]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationState {
    #[serde(default)]
    pub loader_data: IndexMap<String, Value>,
    #[serde(default)]
    pub action_data: Option<IndexMap<String, Value>>,
    #[serde(default)]
    pub errors: Option<IndexMap<String, Value>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureConfig {
    #[serde(rename = "v3_fetcherPersist", default)]
    pub v3_fetcher_persist: bool,
    #[serde(rename = "v3_relativeSplatPath", default)]
    pub v3_relative_splat_path: bool,
    #[serde(rename = "v3_throwAbortReason", default)]
    pub v3_throw_abort_reason: bool,
    #[serde(rename = "unstable_singleFetch", default)]
    pub unstable_single_fetch: bool,
}

impl FutureConfig {
    pub fn router_flags(&self) -> RouterFutureFlags {
        RouterFutureFlags {
            v7_normalize_form_method: true,
            v7_fetcher_persist: self.v3_fetcher_persist,
            v7_partial_hydration: true,
            v7_prepend_basename: true,
            v7_relative_splat_path: self.v3_relative_splat_path,
        }
    }
}

/// The future flags a router is constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterFutureFlags {
    pub v7_normalize_form_method: bool,
    pub v7_fetcher_persist: bool,
    pub v7_partial_hydration: bool,
    pub v7_prepend_basename: bool,
    pub v7_relative_splat_path: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevConfig {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub hmr_runtime: Option<String>,
}

/// Loader data for one route as handed to the router for hydration.
#[derive(Debug, Clone, PartialEq)]
pub enum HydratedLoaderData {
    /// Data the server rendered with.
    Data(Value),
    /// Cleared, so the route's client loader runs during hydration.
    Pending,
    /// The route has no server loader; there is nothing to run.
    NoLoader,
}

/// A route error from the hydration state, revived from its serialized
/// form.
#[derive(Debug, Clone, PartialEq)]
pub enum HydratedError {
    Response(ErrorResponse),
    Error {
        message: String,
        /// e.g. `TypeError`, when the server recorded one.
        kind: Option<String>,
        stack: Option<String>,
    },
    /// Anything that was not tagged as either of the above.
    Value(Value),
}

/// Hydration state in the shape the router consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouterHydrationData {
    pub loader_data: IndexMap<String, HydratedLoaderData>,
    pub action_data: Option<IndexMap<String, Value>>,
    pub errors: Option<IndexMap<String, HydratedError>>,
}

impl RouterHydrationData {
    /// A copy of the server state with the errors revived.
    pub fn from_state(state: &HydrationState) -> Self {
        Self {
            loader_data: state
                .loader_data
                .iter()
                .map(|(id, data)| (id.clone(), HydratedLoaderData::Data(data.clone())))
                .collect(),
            action_data: state.action_data.clone(),
            errors: state.errors.as_ref().map(deserialize_errors),
        }
    }
}

/// Revive serialized route errors.
///
/// Entries tagged `"__type": "RouteErrorResponse"` become
/// [`HydratedError::Response`] and entries tagged `"__type": "Error"`
/// become [`HydratedError::Error`], keeping an optional `__subType`.
/// Everything else is passed through untouched.
pub fn deserialize_errors(errors: &IndexMap<String, Value>) -> IndexMap<String, HydratedError> {
    errors
        .iter()
        .map(|(id, value)| (id.clone(), deserialize_error(value)))
        .collect()
}

fn deserialize_error(value: &Value) -> HydratedError {
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
    match value.get("__type").and_then(Value::as_str) {
        Some("RouteErrorResponse") => match serde_json::from_value(value.clone()) {
            Ok(response) => HydratedError::Response(response),
            Err(_) => HydratedError::Value(value.clone()),
        },
        Some("Error") => HydratedError::Error {
            message: text("message").unwrap_or_default(),
            kind: text("__subType"),
            stack: text("stack"),
        },
        _ => HydratedError::Value(value.clone()),
    }
}
