mod common;

use std::collections::HashMap;

use futures::future::{ready, Ready};

use leptos_single_fetch::{
    context::{EntryContext, HydratedError, HydratedLoaderData},
    error::Error,
    hmr::{HmrOutcome, HmrUpdate},
    hydrate::{ClientRuntime, Hydration},
    manifest::{AssetsManifest, RouteManifestEntry},
    module::{ClientLoaderArgs, ComponentRef, RouteModule},
    router::{DataStrategy, DataStrategyArgs, DataStrategyMatch, NavigationRequest, RouteOutcome},
    single_fetch::SingleFetchResult,
};
use serde_json::json;
use url::Url;

use common::{MockEnv, MockFactory, MockFetch, MockModuleLoader, MockRefresh};

fn entry(value: serde_json::Value) -> EntryContext {
    EntryContext::from_json(&value.to_string()).expect("entry context should parse")
}

fn manifest() -> AssetsManifest {
    AssetsManifest::from_routes([
        RouteManifestEntry::new("root", "/root.js").with_loader(),
        RouteManifestEntry::new("routes/a", "/a.js")
            .with_parent("root")
            .with_path("a")
            .with_loader(),
    ])
}

fn modules() -> HashMap<String, RouteModule> {
    [
        ("root".to_string(), RouteModule::default()),
        ("routes/a".to_string(), RouteModule::default()),
    ]
    .into_iter()
    .collect()
}

fn client_loader(_: ClientLoaderArgs) -> Ready<leptos_single_fetch::Result<RouteOutcome>> {
    ready(Ok(RouteOutcome::NoData))
}

#[tokio::test]
async fn mismatched_url_reloads_without_router() {
    let runtime = ClientRuntime::new(entry(json!({"url": "/a"})), manifest(), modules());
    let env = MockEnv::new("/b");
    let factory = MockFactory::new(&["root", "routes/a"]);

    let hydration = runtime.hydrate(&env, &factory);

    assert!(matches!(hydration, Hydration::Reloading));
    assert_eq!(env.reloads.get(), 1);
    assert!(factory.created.borrow().is_empty());
    assert!(runtime.router().is_none());

    // hot updates arriving afterwards have nothing to apply to
    let outcome = runtime
        .hot_reload()
        .accept(
            HmrUpdate::default(),
            &MockModuleLoader::default(),
            &MockRefresh::default(),
        )
        .await
        .expect("a missing router is not an error");
    assert_eq!(outcome, HmrOutcome::RouterNotReady);
}

#[test]
fn query_does_not_count_as_mismatch() {
    let runtime = ClientRuntime::new(entry(json!({"url": "/a?tab=2"})), manifest(), modules());
    let env = MockEnv::new("/a");
    let factory = MockFactory::new(&["root", "routes/a"]);

    assert!(runtime.hydrate(&env, &factory).router().is_some());
    assert_eq!(env.reloads.get(), 0);
}

#[test]
fn spa_mode_skips_url_check() {
    let runtime = ClientRuntime::new(
        entry(json!({"url": "/", "isSpaMode": true})),
        manifest(),
        modules(),
    );
    let env = MockEnv::new("/a");
    let factory = MockFactory::new(&["root", "routes/a"]);

    assert!(runtime.hydrate(&env, &factory).router().is_some());
    assert_eq!(env.reloads.get(), 0);
    let router = factory.router();
    assert!(router.init.hydration_data.is_none());
    // every route but the root loads on the client
    let root = &router.init.routes[0];
    assert!(!root.hydrate);
    assert!(root.children[0].hydrate);
}

#[test]
fn loader_data_cleared_for_client_hydration() {
    let manifest = AssetsManifest::from_routes([
        RouteManifestEntry::new("root", "/root.js").with_loader(),
        // client loader with a fallback
        RouteManifestEntry::new("routes/a", "/a.js")
            .with_parent("root")
            .with_loader(),
        // client loader and no server loader
        RouteManifestEntry::new("routes/b", "/b.js").with_parent("routes/a"),
        // nothing to load at all
        RouteManifestEntry::new("routes/c", "/c.js").with_parent("routes/b"),
        // client loader rendering with the server's data
        RouteManifestEntry::new("routes/d", "/d.js")
            .with_parent("routes/c")
            .with_loader(),
    ]);
    let modules = [
        ("root", RouteModule::default()),
        (
            "routes/a",
            RouteModule::default()
                .with_client_loader(client_loader)
                .with_hydrate_fallback(ComponentRef::new("fallback")),
        ),
        ("routes/b", RouteModule::default().with_client_loader(client_loader)),
        ("routes/c", RouteModule::default()),
        ("routes/d", RouteModule::default().with_client_loader(client_loader)),
    ]
    .into_iter()
    .map(|(id, module)| (id.to_string(), module))
    .collect();
    let entry = entry(json!({
        "url": "/a/b/c/d",
        "state": {
            "loaderData": {
                "root": {"user": "ferris"},
                "routes/a": {"stale": true},
                "routes/d": {"n": 4},
            },
        },
    }));
    let runtime = ClientRuntime::new(entry, manifest, modules);
    let factory = MockFactory::new(&["root", "routes/a", "routes/b", "routes/c", "routes/d"]);

    runtime.hydrate(&MockEnv::new("/a/b/c/d"), &factory);

    let router = factory.router();
    let hydration_data = router
        .init
        .hydration_data
        .as_ref()
        .expect("server rendered pages hydrate with data");
    let loader_data = &hydration_data.loader_data;
    assert_eq!(
        loader_data.get("root"),
        Some(&HydratedLoaderData::Data(json!({"user": "ferris"}))),
    );
    assert_eq!(loader_data.get("routes/a"), Some(&HydratedLoaderData::Pending));
    assert_eq!(loader_data.get("routes/b"), Some(&HydratedLoaderData::Pending));
    assert_eq!(loader_data.get("routes/c"), Some(&HydratedLoaderData::NoLoader));
    assert_eq!(
        loader_data.get("routes/d"),
        Some(&HydratedLoaderData::Data(json!({"n": 4}))),
    );
}

#[test]
fn router_configuration() {
    let runtime = ClientRuntime::new(
        entry(json!({
            "url": "/app/a",
            "basename": "/app",
            "future": {"v3_fetcherPersist": true},
            "state": {
                "loaderData": {"root": null},
                "errors": {
                    "routes/a": {
                        "__type": "RouteErrorResponse",
                        "status": 404,
                        "statusText": "Not Found",
                        "data": "gone",
                    },
                },
            },
        })),
        manifest(),
        modules(),
    );
    let factory = MockFactory::new(&["root", "routes/a"]);

    runtime.hydrate(&MockEnv::new("/app/a"), &factory);

    let router = factory.router();
    assert_eq!(router.init.basename.as_deref(), Some("/app"));
    let flags = router.init.future;
    assert!(flags.v7_normalize_form_method);
    assert!(flags.v7_partial_hydration);
    assert!(flags.v7_prepend_basename);
    assert!(flags.v7_fetcher_persist);
    assert!(!flags.v7_relative_splat_path);

    let errors = router
        .init
        .hydration_data
        .as_ref()
        .and_then(|data| data.errors.as_ref())
        .expect("errors should be carried over");
    match errors.get("routes/a") {
        Some(HydratedError::Response(response)) => {
            assert_eq!(response.status, 404);
            assert_eq!(response.status_text, "Not Found");
            assert_eq!(response.data, json!("gone"));
        }
        other => panic!("expected an error response, got {other:?}"),
    }
}

#[test]
fn deferred_initialization() {
    let runtime = ClientRuntime::new(entry(json!({"url": "/a"})), manifest(), modules());
    let factory = MockFactory::new(&["root", "routes/a"]);

    runtime.hydrate(&MockEnv::new("/a"), &factory);
    let router = factory.router();
    assert!(!runtime.is_router_initialized());
    assert_eq!(router.initialize_calls.get(), 0);

    runtime.after_first_render();
    runtime.after_first_render();
    assert!(runtime.is_router_initialized());
    assert_eq!(router.initialize_calls.get(), 1);
}

#[test]
fn immediate_initialization() {
    let runtime = ClientRuntime::new(entry(json!({"url": "/a"})), manifest(), modules());
    let factory = MockFactory::new(&["root", "routes/a"]).initialized();

    runtime.hydrate(&MockEnv::new("/a"), &factory);
    let router = factory.router();
    assert!(runtime.is_router_initialized());
    assert_eq!(router.initialize_calls.get(), 1);

    runtime.after_first_render();
    assert_eq!(router.initialize_calls.get(), 1);
}

#[test]
fn router_constructed_once() {
    let runtime = ClientRuntime::new(entry(json!({"url": "/a"})), manifest(), modules());
    let env = MockEnv::new("/a");
    let factory = MockFactory::new(&["root", "routes/a"]);

    runtime.hydrate(&env, &factory);
    // the location moving on no longer matters once hydrated
    let again = runtime.hydrate(&MockEnv::new("/elsewhere"), &factory);

    assert!(again.router().is_some());
    assert_eq!(factory.created.borrow().len(), 1);
}

#[test]
fn framework_context_shares_registry() {
    let runtime = ClientRuntime::new(
        entry(json!({"url": "/a", "criticalCss": ".x{}"})),
        manifest(),
        modules(),
    );

    let context = runtime.framework_context();
    assert!(std::sync::Arc::ptr_eq(&context.registry, runtime.registry()));
    assert!(!context.is_spa_mode);
    if cfg!(debug_assertions) {
        assert_eq!(context.critical_css().as_deref(), Some(".x{}"));
    }
    runtime.clear_critical_css();
    assert_eq!(context.critical_css(), None);
}

#[tokio::test]
async fn router_loads_through_runtime_fetch() {
    let fetch = MockFetch::loaders([
        ("root", SingleFetchResult::data("root")),
        ("routes/a", SingleFetchResult::data("a")),
    ]);
    let runtime = ClientRuntime::new(entry(json!({"url": "/a"})), manifest(), modules())
        .with_fetch(fetch.clone());
    let factory = MockFactory::new(&["root", "routes/a"]);
    runtime.hydrate(&MockEnv::new("/a"), &factory);

    let url = Url::parse("http://localhost/a").expect("valid url");
    let results = factory
        .router()
        .init
        .data_strategy
        .run(DataStrategyArgs {
            request: NavigationRequest::get(url),
            matches: vec![
                DataStrategyMatch::new("root", true),
                DataStrategyMatch::new("routes/a", true),
            ],
        })
        .await;

    assert_eq!(fetch.calls(), 1);
    assert!(results.values().all(|result| matches!(result, Ok(RouteOutcome::Data(_)))));
}

#[test]
fn invalid_entry_context() {
    assert!(matches!(
        EntryContext::from_json("{\"state\": 1}"),
        Err(Error::InvalidEntryContext(_))
    ));
}
