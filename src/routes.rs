//! Building the client route tree handed to the router.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use indexmap::IndexMap;
use leptos::logging::error;

use crate::{
    error::{Error, HandlerKind, InvalidCallReason, Result},
    manifest::{RouteManifestEntry, RouteRegistry},
    module::{RouteModule, ShouldRevalidate},
};

/// One node of the route tree as the router sees it.
#[derive(Debug, Clone)]
pub struct ClientRoute {
    pub id: String,
    pub path: Option<String>,
    pub index: bool,
    pub case_sensitive: bool,
    pub has_loader: bool,
    pub has_action: bool,
    pub has_error_boundary: bool,
    pub has_hydrate_fallback: bool,
    /// Whether the route's loader runs during hydration.
    pub hydrate: bool,
    pub revalidation: RevalidationPolicy,
    pub children: Vec<ClientRoute>,
}

impl ClientRoute {
    /// Every route id of this subtree, depth first.
    pub fn ids(&self) -> Vec<String> {
        let mut ids = vec![self.id.clone()];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }
}

/// Decides whether a route revalidates after a navigation or submission.
#[derive(Clone, Default)]
pub struct RevalidationPolicy {
    should_revalidate: Option<ShouldRevalidate>,
    hot_update: Option<HotUpdateOptOut>,
}

#[derive(Clone)]
struct HotUpdateOptOut {
    needs_revalidation: bool,
    pending: Arc<AtomicBool>,
}

impl RevalidationPolicy {
    fn new(should_revalidate: Option<ShouldRevalidate>) -> Self {
        Self {
            should_revalidate,
            hot_update: None,
        }
    }

    /// Apply a hot update's revalidation opt-out: the first revalidation
    /// after the update only reloads the route if `needs_revalidation`, later
    /// ones go back to the usual policy.
    fn with_hot_update(mut self, needs_revalidation: bool) -> Self {
        self.hot_update = Some(HotUpdateOptOut {
            needs_revalidation,
            pending: Arc::new(AtomicBool::new(true)),
        });
        self
    }

    pub fn should_revalidate(&self, default_should_revalidate: bool) -> bool {
        if let Some(hot_update) = &self.hot_update {
            if hot_update.pending.swap(false, Ordering::SeqCst) {
                return hot_update.needs_revalidation;
            }
        }
        match &self.should_revalidate {
            Some(should_revalidate) => should_revalidate(default_should_revalidate),
            None => default_should_revalidate,
        }
    }
}

impl fmt::Debug for RevalidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevalidationPolicy")
            .field("custom", &self.should_revalidate.is_some())
            .field(
                "hot_update",
                &self.hot_update.as_ref().map(|h| h.needs_revalidation),
            )
            .finish()
    }
}

/// Build the route tree from the manifest and the loaded modules.
pub fn create_client_routes(
    manifest: &IndexMap<String, RouteManifestEntry>,
    modules: &HashMap<String, RouteModule>,
    is_spa_mode: bool,
) -> Vec<ClientRoute> {
    build_routes(manifest, modules, is_spa_mode, None, None)
}

/// Build the route tree for a hot update, where only the routes in
/// `needs_revalidation` reload on the revalidation that follows.
pub fn create_client_routes_with_hmr_opt_out(
    needs_revalidation: &HashSet<String>,
    manifest: &IndexMap<String, RouteManifestEntry>,
    modules: &HashMap<String, RouteModule>,
    is_spa_mode: bool,
) -> Vec<ClientRoute> {
    build_routes(manifest, modules, is_spa_mode, Some(needs_revalidation), None)
}

fn build_routes(
    manifest: &IndexMap<String, RouteManifestEntry>,
    modules: &HashMap<String, RouteModule>,
    is_spa_mode: bool,
    needs_revalidation: Option<&HashSet<String>>,
    parent_id: Option<&str>,
) -> Vec<ClientRoute> {
    manifest
        .values()
        .filter(|entry| entry.parent_id.as_deref() == parent_id)
        .map(|entry| {
            let module = modules.get(&entry.id);
            let mut revalidation =
                RevalidationPolicy::new(module.and_then(|m| m.should_revalidate.clone()));
            if let Some(needs_revalidation) = needs_revalidation {
                revalidation = revalidation.with_hot_update(needs_revalidation.contains(&entry.id));
            }
            ClientRoute {
                id: entry.id.clone(),
                path: entry.path.clone(),
                index: entry.index,
                case_sensitive: entry.case_sensitive,
                has_loader: entry.has_loader,
                has_action: entry.has_action,
                has_error_boundary: entry.has_error_boundary
                    || module.is_some_and(|m| m.error_boundary.is_some()),
                has_hydrate_fallback: module.is_some_and(|m| m.hydrate_fallback.is_some()),
                hydrate: module.is_some_and(|m| should_hydrate_route_loader(entry, m, is_spa_mode)),
                revalidation,
                children: build_routes(
                    manifest,
                    modules,
                    is_spa_mode,
                    needs_revalidation,
                    Some(&entry.id),
                ),
            }
        })
        .collect()
}

/// Whether a route's client loader must run during hydration rather than
/// rendering with the server's data: it has a client loader and either
/// renders a fallback while that runs or has no server data at all.  In
/// SPA mode every route but the root hydrates on the client.
pub fn should_hydrate_route_loader(
    entry: &RouteManifestEntry,
    module: &RouteModule,
    is_spa_mode: bool,
) -> bool {
    (is_spa_mode && entry.id != "root")
        || (module.client_loader.is_some()
            && (module.hydrate_fallback.is_some() || !entry.has_loader))
}

/// Refuse a call through to a server handler that cannot exist, either
/// because there is no server in SPA mode or because the route does not
/// declare a server handler of that kind.
pub fn prevent_invalid_server_handler_call(
    kind: HandlerKind,
    route_id: &str,
    registry: &RouteRegistry,
) -> Result<()> {
    let reason = if registry.is_spa_mode() {
        InvalidCallReason::SpaMode
    } else {
        let declared = registry.route(route_id).is_some_and(|entry| match kind {
            HandlerKind::Loader => entry.has_loader,
            HandlerKind::Action => entry.has_action,
        });
        if declared {
            return Ok(());
        }
        InvalidCallReason::NoServerHandler
    };
    let err = Error::InvalidServerHandlerCall {
        kind,
        route_id: route_id.to_string(),
        reason,
    };
    error!("{err}");
    Err(err)
}

/// The error for a submission to a route with no action at all.
pub fn no_action_defined_error(route_id: &str) -> Error {
    let err = Error::NoActionDefined {
        route_id: route_id.to_string(),
    };
    error!("{err}");
    err
}
