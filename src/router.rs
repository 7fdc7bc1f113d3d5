//! The interface to the client side router.
//!
//! Route matching and the navigation state machine are not implemented
//! here; this module only describes what the runtime needs from a router
//! and what it hands back to one.  The router calls into the
//! [`DataStrategy`] on every navigation, and the hydration bootstrap and
//! the hot reload coordinator drive the router through the [`Router`]
//! trait.

use std::rc::Rc;

use bytes::Bytes;
use futures::future::LocalBoxFuture;
use http::{header::HeaderValue, HeaderMap, Method, StatusCode};
use indexmap::IndexMap;
use url::Url;

use crate::{
    abort::AbortSignal,
    context::{RouterFutureFlags, RouterHydrationData},
    error::Result,
    routes::ClientRoute,
    turbo::TurboValue,
};

/// Header asking the router to revalidate every current route after a
/// redirect.
pub const X_REMIX_REVALIDATE: &str = "x-remix-revalidate";
/// Header asking the router for a full document reload instead of a client
/// side transition.
pub const X_REMIX_RELOAD_DOCUMENT: &str = "x-remix-reload-document";

pub type Params = IndexMap<String, String>;

/// What a loader or action produced for one route.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Data(TurboValue),
    Redirect(Redirect),
    /// The route legitimately has nothing to return.
    NoData,
}

impl RouteOutcome {
    pub fn data(&self) -> Option<&TurboValue> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }
}

/// A navigation redirect instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub location: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl Redirect {
    pub fn new(location: impl Into<String>, status: StatusCode) -> Self {
        Self {
            location: location.into(),
            status,
            headers: HeaderMap::new(),
        }
    }

    pub(crate) fn with_flag(mut self, name: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static("yes"));
        self
    }

    pub fn revalidate(&self) -> bool {
        self.headers.contains_key(X_REMIX_REVALIDATE)
    }

    pub fn reload_document(&self) -> bool {
        self.headers.contains_key(X_REMIX_RELOAD_DOCUMENT)
    }
}

/// The request a navigation or submission is being made for.
#[derive(Debug, Clone)]
pub struct NavigationRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Fires when the navigation is superseded.
    pub signal: Option<AbortSignal>,
}

impl NavigationRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
            signal: None,
        }
    }

    pub fn post(url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: Some(body.into()),
            signal: None,
        }
    }

    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// The per-route data step handed to [`LoadRoute::load_route`].
pub type RouteHandler = Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<RouteOutcome>>>;

/// Loads a route's module, then runs the data step for it.
pub trait LoadRoute {
    fn load_route(&self, handler: RouteHandler) -> LocalBoxFuture<'static, Result<RouteOutcome>>;
}

/// A route matched for the current navigation.
#[derive(Clone)]
pub struct DataStrategyMatch {
    pub route_id: String,
    pub params: Params,
    /// Whether the router's revalidation policy wants this route loaded.
    pub should_load: bool,
    /// Provided by routers that load modules lazily; without one the data
    /// step runs directly.
    pub loader: Option<Rc<dyn LoadRoute>>,
}

impl DataStrategyMatch {
    pub fn new(route_id: impl Into<String>, should_load: bool) -> Self {
        Self {
            route_id: route_id.into(),
            params: Params::new(),
            should_load,
            loader: None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_loader(mut self, loader: Rc<dyn LoadRoute>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub(crate) fn resolve(
        &self,
        handler: RouteHandler,
    ) -> LocalBoxFuture<'static, Result<RouteOutcome>> {
        match &self.loader {
            Some(loader) => loader.load_route(handler),
            None => handler(),
        }
    }
}

impl std::fmt::Debug for DataStrategyMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStrategyMatch")
            .field("route_id", &self.route_id)
            .field("params", &self.params)
            .field("should_load", &self.should_load)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DataStrategyArgs {
    pub request: NavigationRequest,
    pub matches: Vec<DataStrategyMatch>,
}

/// The outcome of every route the strategy loaded, keyed by route id in
/// match order.
pub type DataStrategyResults = IndexMap<String, Result<RouteOutcome>>;

/// The loading mechanism the router delegates to on every navigation.
pub trait DataStrategy {
    fn run(&self, args: DataStrategyArgs) -> LocalBoxFuture<'static, DataStrategyResults>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidationState {
    Idle,
    Loading,
}

/// The operations the runtime needs from a constructed router.
pub trait Router {
    /// Whether the router has nothing left to load for hydration.
    fn is_initialized(&self) -> bool;
    fn initialize(&self);
    /// Route ids matched by the router's current location.
    fn matched_route_ids(&self) -> Vec<String>;
    /// Swap in a new route tree.
    fn set_routes(&self, routes: Vec<ClientRoute>);
    fn revalidate(&self);
    fn revalidation(&self) -> RevalidationState;
    /// Resolves once the revalidation state returns to idle.
    fn wait_for_idle(&self) -> LocalBoxFuture<'static, ()>;
}

/// Everything a router is constructed with.
pub struct RouterInit {
    pub routes: Vec<ClientRoute>,
    pub basename: Option<String>,
    pub hydration_data: Option<RouterHydrationData>,
    pub future: RouterFutureFlags,
    pub data_strategy: Rc<dyn DataStrategy>,
}

/// Builds routers and performs route matching outside of one.
pub trait RouterFactory {
    /// Match a pathname against a route tree, returning the matched route
    /// ids from root to leaf.
    fn match_routes(&self, routes: &[ClientRoute], pathname: &str) -> Option<Vec<String>>;
    fn create_router(&self, init: RouterInit) -> Rc<dyn Router>;
}
