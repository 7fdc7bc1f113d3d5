//! The action half of the data strategy: one exchange per submitting
//! route.

use std::{fmt, future::Future, rc::Rc, sync::Arc};

use futures::{future::join_all, FutureExt};
use http::{header::CONTENT_TYPE, HeaderMap};

use super::{
    fetch::{exchange, Fetch, FetchRequest},
    result::{unwrap_single_fetch_result, SingleFetchResult},
    url::single_fetch_url,
};
use crate::{
    error::{Error, HandlerKind, Result},
    manifest::RouteRegistry,
    module::ClientActionArgs,
    router::{
        DataStrategyArgs, DataStrategyResults, NavigationRequest, Params, RouteHandler,
        RouteOutcome,
    },
    routes::{no_action_defined_error, prevent_invalid_server_handler_call},
};

/// Calls through from a client action to the route's server action.
///
/// Each call is its own exchange.
#[derive(Clone)]
pub struct ServerAction {
    route_id: String,
    request: NavigationRequest,
    fetch: Rc<dyn Fetch>,
    registry: Arc<RouteRegistry>,
}

impl ServerAction {
    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    pub async fn call(&self) -> Result<RouteOutcome> {
        prevent_invalid_server_handler_call(HandlerKind::Action, &self.route_id, &self.registry)?;
        submit(&*self.fetch, &self.request, &self.route_id).await
    }
}

impl fmt::Debug for ServerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerAction")
            .field("route_id", &self.route_id)
            .field("url", &self.request.url.as_str())
            .finish()
    }
}

/// Submit the navigation's request to the action endpoint and unwrap the
/// single result it answers with.
async fn submit(
    fetch: &dyn Fetch,
    request: &NavigationRequest,
    route_id: &str,
) -> Result<RouteOutcome> {
    let mut headers = HeaderMap::new();
    if let Some(content_type) = request.headers.get(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, content_type.clone());
    }
    // the index param is significant for actions, so it is kept
    let fetch_request = FetchRequest {
        method: request.method.clone(),
        url: single_fetch_url(&request.url),
        headers,
        body: request.body.clone(),
    };
    let value = exchange(fetch, fetch_request, request.signal.as_ref()).await?;
    let result = SingleFetchResult::from_turbo(value)?;
    unwrap_single_fetch_result(&result, route_id)
}

/// Run the action of every submitting route.
pub(crate) fn single_fetch_action(
    registry: Arc<RouteRegistry>,
    fetch: Rc<dyn Fetch>,
    args: DataStrategyArgs,
) -> impl Future<Output = DataStrategyResults> {
    let DataStrategyArgs { request, matches } = args;

    let pending = matches
        .into_iter()
        .filter(|m| m.should_load)
        .map(|m| {
            let handler: RouteHandler = Box::new({
                let registry = registry.clone();
                let fetch = fetch.clone();
                let request = request.clone();
                let route_id = m.route_id.clone();
                let params = m.params.clone();
                move || run_route_action(registry, fetch, request, route_id, params).boxed_local()
            });
            let outcome = m.resolve(handler);
            async move { (m.route_id, outcome.await) }
        })
        .collect::<Vec<_>>();

    join_all(pending).map(|outcomes| outcomes.into_iter().collect())
}

async fn run_route_action(
    registry: Arc<RouteRegistry>,
    fetch: Rc<dyn Fetch>,
    request: NavigationRequest,
    route_id: String,
    params: Params,
) -> Result<RouteOutcome> {
    let module = registry
        .module(&route_id)
        .ok_or_else(|| Error::RouteModuleMissing {
            route_id: route_id.clone(),
        })?;
    let has_action = registry.route(&route_id).is_some_and(|route| route.has_action);

    if let Some(client_action) = module.client_action {
        let server_action = ServerAction {
            route_id,
            request: request.clone(),
            fetch,
            registry,
        };
        client_action
            .submit(ClientActionArgs {
                request,
                params,
                server_action,
            })
            .await
    } else if has_action {
        submit(&*fetch, &request, &route_id).await
    } else {
        Err(no_action_defined_error(&route_id))
    }
}
