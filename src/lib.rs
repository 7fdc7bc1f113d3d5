//! This crate provides the browser half of the single fetch data protocol
//! for Leptos applications served by a Remix style server, together with
//! the hydration bootstrap and the hot update coordinator that sit around
//! it.
//!
//! ## Use case
//!
//! A nested route tree typically has a loader per route.  Fetching each of
//! them separately means a navigation to a page four routes deep makes four
//! requests, each carrying its own serialization overhead, and any loader
//! that depends on another has to wait on a full round trip.  Under single
//! fetch, one `GET <path>.data` request answers for every route of the
//! navigation in a single [`turbo`](crate::turbo) encoded stream, with
//! deferred values streaming in behind the initial payload.
//!
//! The pieces this crate provides:
//!
//! - [`single_fetch`] is the data strategy handed to the router.  It batches
//!   every loader of a navigation into one exchange, which is only made when
//!   some route actually needs server data, and submits actions one route at
//!   a time.
//! - [`turbo`] decodes (and for testing, encodes) the `text/x-turbo` wire
//!   format.
//! - [`hydrate`] constructs the router from the context the server embedded
//!   in the document, nulling out the loader data the client is expected to
//!   load itself, and reloading the page instead if the browser has moved
//!   away from the URL the server rendered.
//! - [`hmr`] swaps updated route modules into the live router during
//!   development.
//!
//! The router itself is not part of this crate; it is reached through the
//! [`Router`](crate::router::Router) and
//! [`RouterFactory`](crate::router::RouterFactory) traits, while the network
//! is reached through [`Fetch`](crate::single_fetch::Fetch), with
//! [`ReqwestFetch`](crate::single_fetch::ReqwestFetch) as the default.
//!
//! # Example
//!
//! ```no_run
//! use std::{collections::HashMap, rc::Rc};
//!
//! use leptos_single_fetch::{
//!     context::EntryContext,
//!     hydrate::{BrowserEnv, ClientRuntime, Hydration},
//!     manifest::AssetsManifest,
//!     router::RouterFactory,
//! };
//!
//! fn start(
//!     entry_json: &str,
//!     manifest: AssetsManifest,
//!     env: &dyn BrowserEnv,
//!     factory: &dyn RouterFactory,
//! ) -> leptos_single_fetch::Result<()> {
//!     let entry = EntryContext::from_json(entry_json)?;
//!     let runtime = Rc::new(ClientRuntime::new(entry, manifest, HashMap::new()));
//!     match runtime.hydrate(env, factory) {
//!         Hydration::Hydrated(_router) => {
//!             // render the app with `runtime.framework_context()`, then
//!             runtime.after_first_render();
//!         }
//!         // nothing to render, the page is going away
//!         Hydration::Reloading => (),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!())
)]

pub mod abort;
pub mod component;
pub mod context;
pub mod error;
pub mod hmr;
pub mod hydrate;
pub mod manifest;
pub mod module;
mod ready;
pub mod router;
pub mod routes;
pub mod single_fetch;
pub mod turbo;


pub use error::{Error, Result};
pub use ready::{Ready, ReadySubscription};
