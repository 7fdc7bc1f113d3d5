//! Applying hot updates to a live router.
//!
//! The dev server's hot reload channel delivers a new assets manifest
//! together with the set of routes whose loaders changed.  The
//! [`HotReloadCoordinator`] waits for the router to exist, loads fresh
//! modules for the routes that are matched or already loaded (keeping the
//! live component instances so fast refresh preserves their state), swaps
//! a rebuilt route tree into the router and revalidates it.  Only once the
//! router is idle again is the new manifest published and the UI
//! refreshed.
//!
//! A newer update supersedes any update still in progress; the older one
//! stops before publishing anything.

use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    rc::Rc,
    sync::Arc,
};

use futures::{
    future::{try_join_all, LocalBoxFuture},
    FutureExt,
};
use indexmap::IndexSet;
use leptos::logging::{error, log};

use crate::{
    abort::{AbortController, AbortSignal},
    error::Result,
    manifest::{AssetsManifest, RouteManifestEntry, RouteRegistry},
    module::RouteModule,
    ready::Ready,
    router::Router,
    routes::create_client_routes_with_hmr_opt_out,
};

/// One message from the hot reload channel.
#[derive(Debug, Clone, Default)]
pub struct HmrUpdate {
    pub assets_manifest: AssetsManifest,
    /// Routes whose loaders must rerun on the revalidation that follows.
    pub needs_revalidation: HashSet<String>,
}

/// Loads a route module, bypassing any cached copy when given a cache
/// busting token.
pub trait ModuleLoader {
    fn load(
        &self,
        route: &RouteManifestEntry,
        cache_bust: Option<u64>,
    ) -> LocalBoxFuture<'static, Result<RouteModule>>;
}

/// Re-renders the UI after modules were swapped.
pub trait RefreshRuntime {
    fn perform_refresh(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmrOutcome {
    Applied,
    /// The router was never constructed; the update was dropped.
    RouterNotReady,
    /// A newer update arrived before this one finished.
    Superseded,
}

pub struct HotReloadCoordinator {
    registry: Arc<RouteRegistry>,
    router: Ready<Option<Rc<dyn Router>>>,
    in_flight: RefCell<Option<AbortController>>,
    revalidation: Cell<u64>,
}

impl HotReloadCoordinator {
    pub fn new(registry: Arc<RouteRegistry>) -> Self {
        Self {
            registry,
            router: Ready::new(),
            in_flight: RefCell::new(None),
            revalidation: Cell::new(0),
        }
    }

    /// Hand over the router once hydration has constructed it.
    pub fn on_router_ready(&self, router: Rc<dyn Router>) {
        self.router.complete(Some(router));
    }

    /// Record that no router will ever be constructed for this page.
    pub fn router_unavailable(&self) {
        self.router.complete(None);
    }

    /// Cancel the update in progress, if any, and start tracking a new one.
    pub fn begin_update(&self) -> AbortSignal {
        let controller = AbortController::new();
        let signal = controller.signal();
        if let Some(previous) = self.in_flight.replace(Some(controller)) {
            previous.abort();
        }
        signal
    }

    /// How many hot updates have revalidated the router so far.
    pub fn revalidation_count(&self) -> u64 {
        self.revalidation.get()
    }

    pub async fn accept(
        &self,
        update: HmrUpdate,
        loader: &dyn ModuleLoader,
        refresh: &dyn RefreshRuntime,
    ) -> Result<HmrOutcome> {
        let Some(router) = self.router.wait().await else {
            error!("Failed to accept HMR update because the router was not ready.");
            return Ok(HmrOutcome::RouterNotReady);
        };

        let route_ids: IndexSet<String> = router
            .matched_route_ids()
            .into_iter()
            .chain(self.registry.module_ids())
            .collect();

        let signal = self.begin_update();

        let HmrUpdate {
            assets_manifest,
            needs_revalidation,
        } = update;
        let cache_bust = assets_manifest.hmr.as_ref().and_then(|hmr| hmr.timestamp);
        let loads = route_ids
            .iter()
            .filter_map(|route_id| assets_manifest.routes.get(route_id))
            .map(|route| {
                let route_id = route.id.clone();
                loader
                    .load(route, cache_bust)
                    .map(|module| module.map(|module| (route_id, module)))
            });
        let loaded = try_join_all(loads).await?;

        let modules = loaded
            .into_iter()
            .map(|(route_id, module)| {
                let live = self.registry.module(&route_id);
                (route_id, module.preserving_components(live.as_ref()))
            })
            .collect::<Vec<_>>();
        self.registry.merge_modules(modules);

        let routes = create_client_routes_with_hmr_opt_out(
            &needs_revalidation,
            &assets_manifest.routes,
            &self.registry.modules(),
            self.registry.is_spa_mode(),
        );
        router.set_routes(routes);

        self.revalidation.set(self.revalidation.get() + 1);
        router.revalidate();
        router.wait_for_idle().await;

        if signal.is_aborted() {
            log!("HMR update superseded by a newer update");
            return Ok(HmrOutcome::Superseded);
        }
        self.registry.replace_manifest(assets_manifest);
        refresh.perform_refresh();
        Ok(HmrOutcome::Applied)
    }
}

impl std::fmt::Debug for HotReloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotReloadCoordinator")
            .field("router_ready", &self.router.is_complete())
            .field("revalidation", &self.revalidation.get())
            .finish()
    }
}
