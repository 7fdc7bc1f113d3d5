//! The context route components render against.

use std::sync::Arc;

use leptos::{
    children::Children,
    component,
    prelude::{provide_context, use_context, ArcRwSignal, Get, Set},
    IntoView,
};

use crate::{context::FutureConfig, manifest::RouteRegistry};

/// What the framework's route components read while rendering: the route
/// registry, the future flags and the critical css emitted by the server.
#[derive(Clone, Debug)]
pub struct FrameworkContext {
    pub registry: Arc<RouteRegistry>,
    pub future: FutureConfig,
    pub critical_css: ArcRwSignal<Option<String>>,
    pub is_spa_mode: bool,
}

impl FrameworkContext {
    pub fn critical_css(&self) -> Option<String> {
        self.critical_css.get()
    }

    /// Drop the critical css once the real stylesheets have loaded, so it
    /// does not linger past the first hot update.
    pub fn clear_critical_css(&self) {
        self.critical_css.set(None);
    }
}

/// Provides the [`FrameworkContext`] to everything below it.
#[component]
pub fn SingleFetchProvider(context: FrameworkContext, children: Children) -> impl IntoView {
    provide_context(context);
    children()
}

pub fn use_framework_context() -> Option<FrameworkContext> {
    use_context::<FrameworkContext>()
}
