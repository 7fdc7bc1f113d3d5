#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use bytes::Bytes;
use futures::{future::LocalBoxFuture, stream, FutureExt, StreamExt};
use http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode};
use leptos_single_fetch::{
    error::{Error, Result},
    hmr::{ModuleLoader, RefreshRuntime},
    hydrate::BrowserEnv,
    manifest::RouteManifestEntry,
    module::RouteModule,
    router::{RevalidationState, Router, RouterFactory, RouterInit},
    routes::ClientRoute,
    single_fetch::{
        Fetch, FetchRequest, FetchResponse, SingleFetchResult, SingleFetchResults,
        TURBO_CONTENT_TYPE,
    },
    turbo::{encode, TurboValue},
    Ready,
};

/// A [`Fetch`] answering every request with the same body, recording the
/// requests made.
pub struct MockFetch {
    requests: RefCell<Vec<FetchRequest>>,
    content_type: &'static str,
    body: String,
    hang: bool,
}

impl MockFetch {
    pub fn turbo(value: &TurboValue) -> Rc<Self> {
        Rc::new(Self {
            requests: RefCell::default(),
            content_type: TURBO_CONTENT_TYPE,
            body: encode(value).expect("value should encode"),
            hang: false,
        })
    }

    pub fn loaders<'a>(
        results: impl IntoIterator<Item = (&'a str, SingleFetchResult)>,
    ) -> Rc<Self> {
        Self::turbo(&results.into_iter().collect::<SingleFetchResults>().into_turbo())
    }

    pub fn action(result: SingleFetchResult) -> Rc<Self> {
        Self::turbo(&result.into_turbo())
    }

    pub fn with_content_type(content_type: &'static str, body: &str) -> Rc<Self> {
        Rc::new(Self {
            requests: RefCell::default(),
            content_type,
            body: body.to_string(),
            hang: false,
        })
    }

    /// Never answers.
    pub fn hanging() -> Rc<Self> {
        Rc::new(Self {
            requests: RefCell::default(),
            content_type: TURBO_CONTENT_TYPE,
            body: String::new(),
            hang: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.borrow().clone()
    }
}

impl Fetch for MockFetch {
    fn fetch(&self, request: FetchRequest) -> LocalBoxFuture<'static, Result<FetchResponse>> {
        self.requests.borrow_mut().push(request);
        if self.hang {
            return futures::future::pending().boxed_local();
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        let body = Bytes::from(self.body.clone());
        async move {
            Ok(FetchResponse {
                status: StatusCode::OK,
                headers,
                body: stream::once(async move { Ok::<_, Error>(body) }).boxed_local(),
            })
        }
        .boxed_local()
    }
}

pub struct MockRouter {
    pub init: RouterInit,
    pub matched: Vec<String>,
    initialized: Cell<bool>,
    pub initialize_calls: Cell<usize>,
    pub revalidate_calls: Cell<usize>,
    pub routes: RefCell<Vec<ClientRoute>>,
    idle_gate: RefCell<Option<Ready<()>>>,
}

impl MockRouter {
    /// Hold every `wait_for_idle` until `gate` completes.
    pub fn gate_idle(&self, gate: Ready<()>) {
        *self.idle_gate.borrow_mut() = Some(gate);
    }
}

impl Router for MockRouter {
    fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    fn initialize(&self) {
        self.initialized.set(true);
        self.initialize_calls.set(self.initialize_calls.get() + 1);
    }

    fn matched_route_ids(&self) -> Vec<String> {
        self.matched.clone()
    }

    fn set_routes(&self, routes: Vec<ClientRoute>) {
        *self.routes.borrow_mut() = routes;
    }

    fn revalidate(&self) {
        self.revalidate_calls.set(self.revalidate_calls.get() + 1);
    }

    fn revalidation(&self) -> RevalidationState {
        RevalidationState::Idle
    }

    fn wait_for_idle(&self) -> LocalBoxFuture<'static, ()> {
        match self.idle_gate.borrow().clone() {
            Some(gate) => async move { gate.wait().await }.boxed_local(),
            None => async {}.boxed_local(),
        }
    }
}

/// Creates [`MockRouter`]s, keeping a handle to each.
#[derive(Default)]
pub struct MockFactory {
    /// What `match_routes` answers with.
    pub matches: Vec<String>,
    /// Whether created routers report themselves initialized.
    pub initialized: bool,
    pub created: RefCell<Vec<Rc<MockRouter>>>,
}

impl MockFactory {
    pub fn new(matches: &[&str]) -> Self {
        Self {
            matches: matches.iter().map(|id| id.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn initialized(mut self) -> Self {
        self.initialized = true;
        self
    }

    pub fn router(&self) -> Rc<MockRouter> {
        self.created
            .borrow()
            .last()
            .cloned()
            .expect("a router should have been created")
    }
}

impl RouterFactory for MockFactory {
    fn match_routes(&self, _: &[ClientRoute], _: &str) -> Option<Vec<String>> {
        Some(self.matches.clone())
    }

    fn create_router(&self, init: RouterInit) -> Rc<dyn Router> {
        let router = Rc::new(MockRouter {
            init,
            matched: self.matches.clone(),
            initialized: Cell::new(self.initialized),
            initialize_calls: Cell::new(0),
            revalidate_calls: Cell::new(0),
            routes: RefCell::default(),
            idle_gate: RefCell::default(),
        });
        self.created.borrow_mut().push(router.clone());
        router
    }
}

pub struct MockEnv {
    pub pathname: String,
    pub reloads: Cell<usize>,
}

impl MockEnv {
    pub fn new(pathname: &str) -> Self {
        Self {
            pathname: pathname.to_string(),
            reloads: Cell::new(0),
        }
    }
}

impl BrowserEnv for MockEnv {
    fn pathname(&self) -> String {
        self.pathname.clone()
    }

    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }
}

/// Serves route modules from a fixed set, recording each load.
#[derive(Default)]
pub struct MockModuleLoader {
    pub modules: HashMap<String, RouteModule>,
    pub loads: RefCell<Vec<(String, Option<u64>)>>,
}

impl MockModuleLoader {
    pub fn new(modules: impl IntoIterator<Item = (&'static str, RouteModule)>) -> Self {
        Self {
            modules: modules
                .into_iter()
                .map(|(id, module)| (id.to_string(), module))
                .collect(),
            loads: RefCell::default(),
        }
    }
}

impl ModuleLoader for MockModuleLoader {
    fn load(
        &self,
        route: &RouteManifestEntry,
        cache_bust: Option<u64>,
    ) -> LocalBoxFuture<'static, Result<RouteModule>> {
        self.loads.borrow_mut().push((route.id.clone(), cache_bust));
        let module = self
            .modules
            .get(&route.id)
            .cloned()
            .ok_or_else(|| Error::RouteModuleMissing {
                route_id: route.id.clone(),
            });
        async move { module }.boxed_local()
    }
}

#[derive(Default)]
pub struct MockRefresh {
    pub refreshes: Cell<usize>,
}

impl RefreshRuntime for MockRefresh {
    fn perform_refresh(&self) {
        self.refreshes.set(self.refreshes.get() + 1);
    }
}
