//! The hydration bootstrap.
//!
//! A [`ClientRuntime`] holds everything that lives for the whole page:
//! the entry context, the route registry, the router once constructed and
//! the hot reload coordinator.  [`ClientRuntime::hydrate`] constructs the
//! router exactly once; calling it again hands back the same router.

use std::{
    cell::{Cell, OnceCell},
    collections::HashMap,
    rc::Rc,
    sync::Arc,
};

use leptos::{
    logging::error,
    prelude::{ArcRwSignal, Set},
};

use crate::{
    component::FrameworkContext,
    context::{EntryContext, HydratedLoaderData, RouterHydrationData},
    hmr::HotReloadCoordinator,
    manifest::{AssetsManifest, RouteRegistry},
    module::RouteModule,
    router::{Router, RouterFactory, RouterInit},
    routes::{create_client_routes, should_hydrate_route_loader, ClientRoute},
    single_fetch::{
        Fetch, NoopStylePrefetch, ReqwestFetch, SingleFetchDataStrategy, StylePrefetch,
    },
};

/// What hydration needs from the browser.
pub trait BrowserEnv {
    /// The pathname of the current location.
    fn pathname(&self) -> String;
    /// Force a full page reload.
    fn reload(&self);
}

/// The [`BrowserEnv`] of the page's `window`.
#[cfg(feature = "hydrate")]
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowEnv;

#[cfg(feature = "hydrate")]
impl BrowserEnv for WindowEnv {
    fn pathname(&self) -> String {
        leptos::prelude::window().location().pathname().unwrap_or_default()
    }

    fn reload(&self) {
        if let Err(e) = leptos::prelude::window().location().reload() {
            error!("failed to reload the page: {e:?}");
        }
    }
}

#[derive(Clone)]
pub enum Hydration {
    Hydrated(Rc<dyn Router>),
    /// The page is being reloaded; render nothing.
    Reloading,
}

impl Hydration {
    pub fn router(&self) -> Option<&Rc<dyn Router>> {
        match self {
            Self::Hydrated(router) => Some(router),
            Self::Reloading => None,
        }
    }
}

impl std::fmt::Debug for Hydration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hydrated(_) => f.write_str("Hydrated(..)"),
            Self::Reloading => f.write_str("Reloading"),
        }
    }
}

pub struct ClientRuntime {
    entry: EntryContext,
    registry: Arc<RouteRegistry>,
    fetch: Rc<dyn Fetch>,
    styles: Rc<dyn StylePrefetch>,
    router: OnceCell<Rc<dyn Router>>,
    router_initialized: Cell<bool>,
    hot_reload: HotReloadCoordinator,
    critical_css: ArcRwSignal<Option<String>>,
}

impl ClientRuntime {
    pub fn new(
        entry: EntryContext,
        manifest: AssetsManifest,
        modules: HashMap<String, RouteModule>,
    ) -> Self {
        let registry =
            Arc::new(RouteRegistry::new(manifest, entry.is_spa_mode).with_modules(modules));
        // stale critical css only matters while developing
        let critical_css = if cfg!(debug_assertions) {
            entry.critical_css.clone()
        } else {
            None
        };
        Self {
            hot_reload: HotReloadCoordinator::new(registry.clone()),
            registry,
            fetch: Rc::new(ReqwestFetch::default()),
            styles: Rc::new(NoopStylePrefetch),
            router: OnceCell::new(),
            router_initialized: Cell::new(false),
            critical_css: ArcRwSignal::new(critical_css),
            entry,
        }
    }

    pub fn with_fetch(mut self, fetch: Rc<dyn Fetch>) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_style_prefetch(mut self, styles: Rc<dyn StylePrefetch>) -> Self {
        self.styles = styles;
        self
    }

    pub fn entry(&self) -> &EntryContext {
        &self.entry
    }

    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    pub fn router(&self) -> Option<Rc<dyn Router>> {
        self.router.get().cloned()
    }

    pub fn is_router_initialized(&self) -> bool {
        self.router_initialized.get()
    }

    pub fn hot_reload(&self) -> &HotReloadCoordinator {
        &self.hot_reload
    }

    pub fn data_strategy(&self) -> SingleFetchDataStrategy {
        SingleFetchDataStrategy::new(self.registry.clone(), self.fetch.clone())
            .with_style_prefetch(self.styles.clone())
    }

    /// The context the rendering layer provides to route components.
    pub fn framework_context(&self) -> FrameworkContext {
        FrameworkContext {
            registry: self.registry.clone(),
            future: self.entry.future,
            critical_css: self.critical_css.clone(),
            is_spa_mode: self.entry.is_spa_mode,
        }
    }

    /// Drop the server's critical css once the hot reload runtime has
    /// loaded the real stylesheets.
    pub fn clear_critical_css(&self) {
        self.critical_css.set(None);
    }

    /// Construct the router for this page.
    ///
    /// If the browser has navigated away from the URL the server rendered,
    /// the page is reloaded instead and no router is ever constructed.  In
    /// SPA mode there is no server render to compare with.
    pub fn hydrate(&self, env: &dyn BrowserEnv, factory: &dyn RouterFactory) -> Hydration {
        if let Some(router) = self.router.get() {
            return Hydration::Hydrated(router.clone());
        }

        let pathname = env.pathname();
        let is_spa_mode = self.entry.is_spa_mode;
        if !is_spa_mode && pathname != self.entry.pathname() {
            error!(
                "Initial URL ({}) does not match URL at time of hydration ({}), reloading page...",
                self.entry.pathname(),
                pathname,
            );
            self.hot_reload.router_unavailable();
            env.reload();
            return Hydration::Reloading;
        }

        let manifest = self.registry.manifest();
        let modules = self.registry.modules();
        let routes = create_client_routes(&manifest.routes, &modules, is_spa_mode);

        let hydration_data = (!is_spa_mode).then(|| {
            self.hydration_data(factory, &routes, &pathname, &manifest, &modules)
        });

        let router = factory.create_router(RouterInit {
            routes,
            basename: self.entry.basename.clone(),
            hydration_data,
            future: self.entry.future.router_flags(),
            data_strategy: Rc::new(self.data_strategy()),
        });

        // with nothing to load for hydration the router can start right away
        if router.is_initialized() {
            self.router_initialized.set(true);
            router.initialize();
        }

        let router = self.router.get_or_init(|| router).clone();
        self.hot_reload.on_router_ready(router.clone());
        Hydration::Hydrated(router)
    }

    /// Initialize a router whose initialization was deferred until the
    /// first render had completed.
    pub fn after_first_render(&self) {
        if self.router_initialized.get() {
            return;
        }
        if let Some(router) = self.router.get() {
            self.router_initialized.set(true);
            router.initialize();
        }
    }

    fn hydration_data(
        &self,
        factory: &dyn RouterFactory,
        routes: &[ClientRoute],
        pathname: &str,
        manifest: &AssetsManifest,
        modules: &HashMap<String, RouteModule>,
    ) -> RouterHydrationData {
        let mut data = RouterHydrationData::from_state(&self.entry.state);
        for route_id in factory.match_routes(routes, pathname).unwrap_or_default() {
            let Some(entry) = manifest.routes.get(&route_id) else {
                continue;
            };
            let client_hydrates = modules
                .get(&route_id)
                .is_some_and(|module| should_hydrate_route_loader(entry, module, false));
            if client_hydrates {
                data.loader_data
                    .insert(route_id, HydratedLoaderData::Pending);
            } else if !entry.has_loader {
                data.loader_data
                    .insert(route_id, HydratedLoaderData::NoLoader);
            }
        }
        data
    }
}

impl std::fmt::Debug for ClientRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRuntime")
            .field("entry", &self.entry)
            .field("registry", &self.registry)
            .field("hydrated", &self.router.get().is_some())
            .field("router_initialized", &self.router_initialized.get())
            .finish()
    }
}
