//! Loaded route modules and their client side overrides.

use std::{any::Any, fmt, future::Future, sync::Arc};

use futures::{future::LocalBoxFuture, FutureExt};

use crate::{
    error::Result,
    router::{NavigationRequest, Params, RouteOutcome},
    single_fetch::{ServerAction, ServerLoader},
};

/// An opaque handle to a component exported by a route module.
///
/// The runtime never renders components; it only has to tell whether a
/// module exports one and keep the same instance across hot reloads.
#[derive(Clone)]
pub struct ComponentRef(Arc<dyn Any + Send + Sync>);

impl ComponentRef {
    pub fn new<T: Any + Send + Sync>(component: T) -> Self {
        Self(Arc::new(component))
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComponentRef(..)")
    }
}

pub struct ClientLoaderArgs {
    pub request: NavigationRequest,
    pub params: Params,
    /// Calls through to the route's server loader.
    pub server_loader: ServerLoader,
}

pub struct ClientActionArgs {
    pub request: NavigationRequest,
    pub params: Params,
    /// Calls through to the route's server action.
    pub server_action: ServerAction,
}

/// A route's client side loader.
///
/// Implemented for any `Fn(ClientLoaderArgs) -> impl Future`.
pub trait ClientLoader: Send + Sync {
    fn load(&self, args: ClientLoaderArgs) -> LocalBoxFuture<'static, Result<RouteOutcome>>;
}

impl<F, Fut> ClientLoader for F
where
    F: Fn(ClientLoaderArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RouteOutcome>> + 'static,
{
    fn load(&self, args: ClientLoaderArgs) -> LocalBoxFuture<'static, Result<RouteOutcome>> {
        self(args).boxed_local()
    }
}

/// A route's client side action.
pub trait ClientAction: Send + Sync {
    fn submit(&self, args: ClientActionArgs) -> LocalBoxFuture<'static, Result<RouteOutcome>>;
}

impl<F, Fut> ClientAction for F
where
    F: Fn(ClientActionArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RouteOutcome>> + 'static,
{
    fn submit(&self, args: ClientActionArgs) -> LocalBoxFuture<'static, Result<RouteOutcome>> {
        self(args).boxed_local()
    }
}

/// Receives the router's default decision and returns whether the route
/// should revalidate.
pub type ShouldRevalidate = Arc<dyn Fn(bool) -> bool + Send + Sync>;

/// A `<link>` a route module asks to have in the document head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDescriptor {
    pub rel: String,
    pub href: String,
    pub media: Option<String>,
}

impl LinkDescriptor {
    pub fn stylesheet(href: impl Into<String>) -> Self {
        Self {
            rel: "stylesheet".into(),
            href: href.into(),
            media: None,
        }
    }

    pub fn is_stylesheet(&self) -> bool {
        self.rel.eq_ignore_ascii_case("stylesheet")
    }
}

/// The loaded code of one route.
#[derive(Clone, Default)]
pub struct RouteModule {
    pub default: Option<ComponentRef>,
    pub error_boundary: Option<ComponentRef>,
    pub hydrate_fallback: Option<ComponentRef>,
    pub client_loader: Option<Arc<dyn ClientLoader>>,
    pub client_action: Option<Arc<dyn ClientAction>>,
    pub links: Vec<LinkDescriptor>,
    pub should_revalidate: Option<ShouldRevalidate>,
}

impl RouteModule {
    pub fn with_default(mut self, component: ComponentRef) -> Self {
        self.default = Some(component);
        self
    }

    pub fn with_error_boundary(mut self, component: ComponentRef) -> Self {
        self.error_boundary = Some(component);
        self
    }

    pub fn with_hydrate_fallback(mut self, component: ComponentRef) -> Self {
        self.hydrate_fallback = Some(component);
        self
    }

    pub fn with_client_loader(mut self, loader: impl ClientLoader + 'static) -> Self {
        self.client_loader = Some(Arc::new(loader));
        self
    }

    pub fn with_client_action(mut self, action: impl ClientAction + 'static) -> Self {
        self.client_action = Some(Arc::new(action));
        self
    }

    pub fn with_links(mut self, links: impl IntoIterator<Item = LinkDescriptor>) -> Self {
        self.links.extend(links);
        self
    }

    pub fn with_should_revalidate(
        mut self,
        should_revalidate: impl Fn(bool) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_revalidate = Some(Arc::new(should_revalidate));
        self
    }

    /// Carry over the live components of `previous` for every component
    /// this module still exports, so a hot update keeps their instances.
    /// Components this module no longer exports are dropped.
    pub fn preserving_components(mut self, previous: Option<&RouteModule>) -> Self {
        fn keep(fresh: &mut Option<ComponentRef>, live: Option<&ComponentRef>) {
            if let (Some(_), Some(live)) = (fresh.as_ref(), live) {
                *fresh = Some(live.clone());
            }
        }
        keep(&mut self.default, previous.and_then(|m| m.default.as_ref()));
        keep(
            &mut self.error_boundary,
            previous.and_then(|m| m.error_boundary.as_ref()),
        );
        keep(
            &mut self.hydrate_fallback,
            previous.and_then(|m| m.hydrate_fallback.as_ref()),
        );
        self
    }
}

impl fmt::Debug for RouteModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteModule")
            .field("default", &self.default.is_some())
            .field("error_boundary", &self.error_boundary.is_some())
            .field("hydrate_fallback", &self.hydrate_fallback.is_some())
            .field("client_loader", &self.client_loader.is_some())
            .field("client_action", &self.client_action.is_some())
            .field("links", &self.links)
            .finish()
    }
}
