use std::{rc::Rc, sync::Arc};

use futures::{
    future::{join, join_all, LocalBoxFuture},
    FutureExt,
};
use http::Method;

use super::{actions::single_fetch_action, fetch::Fetch, loaders::single_fetch_loaders};
use crate::{
    manifest::{RouteManifestEntry, RouteRegistry},
    module::RouteModule,
    router::{DataStrategy, DataStrategyArgs, DataStrategyResults},
};

/// Prefetches the stylesheets of a route module that is already loaded.
pub trait StylePrefetch {
    fn prefetch(
        &self,
        route: &RouteManifestEntry,
        module: &RouteModule,
    ) -> LocalBoxFuture<'static, ()>;
}

/// A [`StylePrefetch`] that does nothing, for environments without a
/// document.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStylePrefetch;

impl StylePrefetch for NoopStylePrefetch {
    fn prefetch(&self, _: &RouteManifestEntry, _: &RouteModule) -> LocalBoxFuture<'static, ()> {
        async {}.boxed_local()
    }
}

/// The data strategy handed to the router.
///
/// `GET` navigations go through the batched loader path, everything else
/// through the per-route action path.  Stylesheets of cached route modules
/// are prefetched alongside; modules that are not loaded yet prefetch their
/// own styles when the router loads them.
#[derive(Clone)]
pub struct SingleFetchDataStrategy {
    registry: Arc<RouteRegistry>,
    fetch: Rc<dyn Fetch>,
    styles: Rc<dyn StylePrefetch>,
}

impl SingleFetchDataStrategy {
    pub fn new(registry: Arc<RouteRegistry>, fetch: Rc<dyn Fetch>) -> Self {
        Self {
            registry,
            fetch,
            styles: Rc::new(NoopStylePrefetch),
        }
    }

    pub fn with_style_prefetch(mut self, styles: Rc<dyn StylePrefetch>) -> Self {
        self.styles = styles;
        self
    }
}

impl DataStrategy for SingleFetchDataStrategy {
    fn run(&self, args: DataStrategyArgs) -> LocalBoxFuture<'static, DataStrategyResults> {
        let styles = join_all(args.matches.iter().filter_map(|m| {
            let route = self.registry.route(&m.route_id)?;
            let module = self.registry.module(&m.route_id)?;
            Some(self.styles.prefetch(&route, &module))
        }));

        let data = if args.request.method == Method::GET {
            single_fetch_loaders(self.registry.clone(), self.fetch.clone(), args).boxed_local()
        } else {
            single_fetch_action(self.registry.clone(), self.fetch.clone(), args).boxed_local()
        };

        join(data, styles).map(|(results, _)| results).boxed_local()
    }
}

impl std::fmt::Debug for SingleFetchDataStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFetchDataStrategy")
            .field("registry", &self.registry)
            .finish()
    }
}
