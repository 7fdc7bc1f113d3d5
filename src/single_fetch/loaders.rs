//! The loader half of the data strategy: one batched exchange per
//! navigation, started lazily by the first route that needs server data.

use std::{cell::RefCell, fmt, future::Future, rc::Rc, sync::Arc};

use futures::{
    future::{join_all, LocalBoxFuture, Shared},
    FutureExt,
};
use http::{HeaderMap, HeaderValue, Method};
use leptos::logging::warn;

use super::{
    fetch::{exchange, Fetch, FetchRequest},
    result::{unwrap_single_fetch_result, SingleFetchResults},
    revalidation::{routes_header, X_REMIX_ROUTES},
    url::{single_fetch_url, strip_index_param},
};
use crate::{
    abort::AbortSignal,
    error::{Error, HandlerKind, Result},
    manifest::RouteRegistry,
    module::ClientLoaderArgs,
    router::{
        DataStrategyArgs, DataStrategyResults, NavigationRequest, Params, RouteHandler,
        RouteOutcome,
    },
    routes::prevent_invalid_server_handler_call,
};

type Exchange = Shared<LocalBoxFuture<'static, Result<Rc<SingleFetchResults>>>>;

/// The single exchange shared by every route of one navigation.
pub(crate) struct SingleFetchBatch {
    state: RefCell<BatchState>,
}

enum BatchState {
    NotStarted(BatchRequest),
    InFlight(Exchange),
    Resolved(Result<Rc<SingleFetchResults>>),
}

#[derive(Clone)]
struct BatchRequest {
    fetch: Rc<dyn Fetch>,
    request: FetchRequest,
    signal: Option<AbortSignal>,
}

impl BatchRequest {
    fn start(self) -> Exchange {
        async move {
            let value = exchange(&*self.fetch, self.request, self.signal.as_ref()).await?;
            Ok(Rc::new(SingleFetchResults::from_turbo(value)?))
        }
        .boxed_local()
        .shared()
    }
}

impl SingleFetchBatch {
    fn new(request: BatchRequest) -> Self {
        Self {
            state: RefCell::new(BatchState::NotStarted(request)),
        }
    }

    /// The decoded results, starting the exchange if nobody has yet.
    async fn results(&self) -> Result<Rc<SingleFetchResults>> {
        let exchange = {
            let mut state = self.state.borrow_mut();
            let (exchange, started) = match &*state {
                BatchState::Resolved(result) => return result.clone(),
                BatchState::InFlight(exchange) => (exchange.clone(), false),
                BatchState::NotStarted(request) => (request.clone().start(), true),
            };
            if started {
                *state = BatchState::InFlight(exchange.clone());
            }
            exchange
        };
        let result = exchange.await;
        *self.state.borrow_mut() = BatchState::Resolved(result.clone());
        result
    }

    /// One route's outcome from the shared exchange.  Routes absent from
    /// the response have no data.
    pub(crate) async fn route_outcome(&self, route_id: &str) -> Result<RouteOutcome> {
        let results = self.results().await?;
        match results.get(route_id) {
            Some(result) => unwrap_single_fetch_result(result, route_id),
            None => Ok(RouteOutcome::NoData),
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        !matches!(*self.state.borrow(), BatchState::NotStarted(_))
    }
}

/// Calls through from a client loader to the route's server loader.
///
/// Every `ServerLoader` of a navigation shares one exchange, so calling
/// any number of them any number of times fetches at most once.
#[derive(Clone)]
pub struct ServerLoader {
    route_id: String,
    batch: Rc<SingleFetchBatch>,
    registry: Arc<RouteRegistry>,
}

impl ServerLoader {
    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    pub async fn call(&self) -> Result<RouteOutcome> {
        prevent_invalid_server_handler_call(HandlerKind::Loader, &self.route_id, &self.registry)?;
        self.batch.route_outcome(&self.route_id).await
    }
}

impl fmt::Debug for ServerLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerLoader")
            .field("route_id", &self.route_id)
            .field("started", &self.batch.is_started())
            .finish()
    }
}

/// Load the data of every route the router wants loaded.
pub(crate) fn single_fetch_loaders(
    registry: Arc<RouteRegistry>,
    fetch: Rc<dyn Fetch>,
    args: DataStrategyArgs,
) -> impl Future<Output = DataStrategyResults> {
    let DataStrategyArgs { request, matches } = args;

    let mut headers = HeaderMap::new();
    if let Some(routes) = routes_header(&registry, &matches) {
        match HeaderValue::from_str(&routes) {
            Ok(value) => {
                headers.insert(X_REMIX_ROUTES, value);
            }
            // without the header the server loads every matched route
            Err(_) => warn!("route ids cannot be sent as a header, loading all routes: {routes}"),
        }
    }
    let batch = Rc::new(SingleFetchBatch::new(BatchRequest {
        fetch,
        request: FetchRequest {
            method: Method::GET,
            url: single_fetch_url(&strip_index_param(&request.url)),
            headers,
            body: None,
        },
        signal: request.signal.clone(),
    }));

    let pending = matches
        .into_iter()
        .filter(|m| m.should_load)
        .map(|m| {
            let handler: RouteHandler = Box::new({
                let registry = registry.clone();
                let batch = batch.clone();
                let request = request.clone();
                let route_id = m.route_id.clone();
                let params = m.params.clone();
                move || load_route_data(registry, batch, request, route_id, params).boxed_local()
            });
            let outcome = m.resolve(handler);
            async move { (m.route_id, outcome.await) }
        })
        .collect::<Vec<_>>();

    join_all(pending).map(|outcomes| outcomes.into_iter().collect())
}

async fn load_route_data(
    registry: Arc<RouteRegistry>,
    batch: Rc<SingleFetchBatch>,
    request: NavigationRequest,
    route_id: String,
    params: Params,
) -> Result<RouteOutcome> {
    let module = registry
        .module(&route_id)
        .ok_or_else(|| Error::RouteModuleMissing {
            route_id: route_id.clone(),
        })?;

    if let Some(client_loader) = module.client_loader {
        let server_loader = ServerLoader {
            route_id,
            batch,
            registry,
        };
        client_loader
            .load(ClientLoaderArgs {
                request,
                params,
                server_loader,
            })
            .await
    } else if registry.has_loader(&route_id) {
        batch.route_outcome(&route_id).await
    } else {
        // routes without a server loader still get a client side loader
        // for their styles, there is simply no data
        Ok(RouteOutcome::NoData)
    }
}
