//! The single fetch data strategy.
//!
//! Rather than one request per route loader, every loader of a navigation
//! is served by one `GET <path>.data` exchange whose `text/x-turbo` body
//! maps route ids to results.  The exchange is only made once some route
//! actually needs server data, which is either a route with a server
//! loader and no client loader, or a client loader calling through its
//! [`ServerLoader`].  Submissions are not batched: each submitting route
//! makes its own `POST <path>.data` exchange, answered with a single
//! result.
//!
//! Each result is unwrapped with [`unwrap_single_fetch_result`] into data,
//! a redirect for the router, or the error the route threw.

mod actions;
mod fetch;
mod loaders;
mod result;
mod revalidation;
mod strategy;
mod url;

pub use actions::ServerAction;
pub use fetch::{Fetch, FetchRequest, FetchResponse, ReqwestFetch, TURBO_CONTENT_TYPE};
pub use loaders::ServerLoader;
pub use result::{
    unwrap_single_fetch_result, SingleFetchRedirect, SingleFetchResult, SingleFetchResults,
};
pub use revalidation::{routes_header, X_REMIX_ROUTES};
pub use strategy::{NoopStylePrefetch, SingleFetchDataStrategy, StylePrefetch};
pub use self::url::{single_fetch_url, strip_index_param};
