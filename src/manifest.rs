//! The route manifest and the process wide route registry.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::module::RouteModule;

/// The static, build-time description of one route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteManifestEntry {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Where the route module is loaded from.
    pub module: String,
    #[serde(default)]
    pub has_loader: bool,
    #[serde(default)]
    pub has_action: bool,
    #[serde(default)]
    pub has_client_loader: bool,
    #[serde(default)]
    pub has_client_action: bool,
    #[serde(default)]
    pub has_error_boundary: bool,
}

impl RouteManifestEntry {
    pub fn new(id: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            module: module.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_loader(mut self) -> Self {
        self.has_loader = true;
        self
    }

    pub fn with_action(mut self) -> Self {
        self.has_action = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmrInfo {
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub runtime: String,
}

/// The manifest of every route in the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetsManifest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub url: Option<String>,
    pub routes: IndexMap<String, RouteManifestEntry>,
    #[serde(default)]
    pub hmr: Option<HmrInfo>,
}

impl AssetsManifest {
    pub fn from_routes(routes: impl IntoIterator<Item = RouteManifestEntry>) -> Self {
        Self {
            routes: routes
                .into_iter()
                .map(|route| (route.id.clone(), route))
                .collect(),
            ..Default::default()
        }
    }
}

/// The manifest and the loaded route modules, shared by the data
/// strategy, the bootstrap and the hot reload coordinator.
///
/// Readers always get a snapshot; hot reload is the only writer and
/// replaces entries wholesale.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    manifest: RwLock<AssetsManifest>,
    modules: RwLock<HashMap<String, RouteModule>>,
    spa_mode: bool,
}

impl RouteRegistry {
    pub fn new(manifest: AssetsManifest, is_spa_mode: bool) -> Self {
        Self {
            manifest: RwLock::new(manifest),
            modules: RwLock::default(),
            spa_mode: is_spa_mode,
        }
    }

    pub fn with_modules(self, modules: impl IntoIterator<Item = (String, RouteModule)>) -> Self {
        self.merge_modules(modules);
        self
    }

    pub fn is_spa_mode(&self) -> bool {
        self.spa_mode
    }

    pub fn manifest(&self) -> AssetsManifest {
        self.manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn route(&self, route_id: &str) -> Option<RouteManifestEntry> {
        self.manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .routes
            .get(route_id)
            .cloned()
    }

    /// Whether the route declares a server loader.  Unknown routes do not.
    pub fn has_loader(&self, route_id: &str) -> bool {
        self.manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .routes
            .get(route_id)
            .is_some_and(|route| route.has_loader)
    }

    pub fn module(&self, route_id: &str) -> Option<RouteModule> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(route_id)
            .cloned()
    }

    pub fn modules(&self) -> HashMap<String, RouteModule> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn module_ids(&self) -> Vec<String> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn insert_module(&self, route_id: impl Into<String>, module: RouteModule) {
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(route_id.into(), module);
    }

    pub fn merge_modules(&self, modules: impl IntoIterator<Item = (String, RouteModule)>) {
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(modules);
    }

    pub fn replace_manifest(&self, manifest: AssetsManifest) {
        *self.manifest.write().unwrap_or_else(PoisonError::into_inner) = manifest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_manifest() {
        let manifest: AssetsManifest = serde_json::from_str(
            r#"{
                "version": "abc123",
                "url": "/build/manifest-abc123.js",
                "routes": {
                    "root": {"id": "root", "module": "/build/root.js", "hasLoader": true},
                    "routes/_index": {
                        "id": "routes/_index", "parentId": "root", "index": true,
                        "module": "/build/routes/_index.js", "hasClientLoader": true
                    }
                },
                "hmr": {"timestamp": 1700000000, "runtime": "/build/hmr.js"}
            }"#,
        )
        .unwrap();
        let index = &manifest.routes["routes/_index"];
        assert_eq!(index.parent_id.as_deref(), Some("root"));
        assert!(index.index && index.has_client_loader && !index.has_loader);
        assert_eq!(manifest.hmr.and_then(|hmr| hmr.timestamp), Some(1700000000));
    }

    #[test]
    fn registry_lookups() {
        let registry = RouteRegistry::new(
            AssetsManifest::from_routes([
                RouteManifestEntry::new("root", "/root.js").with_loader(),
                RouteManifestEntry::new("routes/a", "/a.js").with_parent("root"),
            ]),
            false,
        )
        .with_modules([("root".to_string(), RouteModule::default())]);

        assert!(registry.has_loader("root"));
        assert!(!registry.has_loader("routes/a"));
        assert!(!registry.has_loader("missing"));
        assert!(registry.module("root").is_some());
        assert!(registry.module("routes/a").is_none());

        registry.replace_manifest(AssetsManifest::default());
        assert!(registry.route("root").is_none());
        assert_eq!(registry.module_ids(), vec!["root".to_string()]);
    }
}
