use crate::{manifest::RouteRegistry, router::DataStrategyMatch};

/// Request header restricting which loaders the server runs.
pub const X_REMIX_ROUTES: &str = "x-remix-routes";

/// The value of the [`X_REMIX_ROUTES`] header for a loader exchange.
///
/// Only routes with a server loader are considered.  When the routes the
/// router wants loaded are exactly the matched ones the header is omitted
/// and the server loads everything matched; otherwise it lists the routes
/// to load, comma separated, in match order.
pub fn routes_header(registry: &RouteRegistry, matches: &[DataStrategyMatch]) -> Option<String> {
    let route_ids = |load_only: bool| {
        matches
            .iter()
            .filter(|m| !load_only || m.should_load)
            .map(|m| m.route_id.as_str())
            .filter(|route_id| registry.has_loader(route_id))
            .collect::<Vec<_>>()
            .join(",")
    };
    let matched = route_ids(false);
    let load = route_ids(true);
    (matched != load).then_some(load)
}
