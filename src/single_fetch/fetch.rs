use std::future::Future;

use bytes::Bytes;
use futures::{
    future::{select, Either, LocalBoxFuture},
    pin_mut,
    stream::LocalBoxStream,
    FutureExt, StreamExt,
};
use http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode};
use url::Url;

use crate::{
    abort::AbortSignal,
    error::{Error, Result},
    turbo::{self, TurboValue},
};

/// The content type every single fetch response must carry.
pub const TURBO_CONTENT_TYPE: &str = "text/x-turbo";

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: LocalBoxStream<'static, Result<Bytes>>,
}

/// The network transport for single fetch exchanges.
pub trait Fetch {
    fn fetch(&self, request: FetchRequest) -> LocalBoxFuture<'static, Result<FetchResponse>>;
}

/// A [`Fetch`] backed by `reqwest`, which uses the browser's `fetch` when
/// built for wasm.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetch for ReqwestFetch {
    fn fetch(&self, request: FetchRequest) -> LocalBoxFuture<'static, Result<FetchResponse>> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        async move {
            let response = builder.send().await.map_err(Error::transport)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(Error::transport))
                .boxed_local();
            Ok(FetchResponse {
                status,
                headers,
                body,
            })
        }
        .boxed_local()
    }
}

/// Check the content type of a response and decode its root value.
pub(crate) async fn decode_response(response: FetchResponse) -> Result<TurboValue> {
    let content_type = response
        .headers
        .get(CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
    if !content_type
        .as_deref()
        .is_some_and(|value| value.contains(TURBO_CONTENT_TYPE))
    {
        return Err(Error::UnexpectedContentType {
            found: content_type,
        });
    }
    Ok(turbo::decode(response.body).await?.value)
}

/// Run `future` unless `signal` fires first.
pub(crate) async fn abortable<T>(
    signal: Option<&AbortSignal>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some(signal) = signal else {
        return future.await;
    };
    if signal.is_aborted() {
        return Err(Error::Aborted);
    }
    let aborted = signal.aborted();
    pin_mut!(future, aborted);
    match select(future, aborted).await {
        Either::Left((result, _)) => result,
        Either::Right(_) => Err(Error::Aborted),
    }
}

/// Perform one exchange and decode its body.
pub(crate) async fn exchange(
    fetch: &dyn Fetch,
    request: FetchRequest,
    signal: Option<&AbortSignal>,
) -> Result<TurboValue> {
    let response = abortable(signal, fetch.fetch(request)).await?;
    abortable(signal, decode_response(response)).await
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use http::HeaderValue;

    use super::*;
    use crate::abort::AbortController;

    fn response(content_type: Option<&'static str>, body: &'static str) -> FetchResponse {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        FetchResponse {
            status: StatusCode::OK,
            headers,
            body: stream::iter([Ok(Bytes::from_static(body.as_bytes()))]).boxed_local(),
        }
    }

    #[tokio::test]
    async fn requires_turbo_content_type() {
        let err = decode_response(response(Some("application/json"), "{}"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedContentType { found: Some(ref found) } if found == "application/json"
        ));
        assert!(matches!(
            decode_response(response(None, "-5\n")).await,
            Err(Error::UnexpectedContentType { found: None })
        ));
    }

    #[tokio::test]
    async fn content_type_with_parameters() {
        let value = decode_response(response(Some("text/x-turbo; charset=utf-8"), "-5\n"))
            .await
            .unwrap();
        assert_eq!(value, TurboValue::Null);
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let err = decode_response(response(Some("text/x-turbo"), "{oops\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.is_protocol_violation());
    }

    #[tokio::test]
    async fn aborted_before_start() {
        let controller = AbortController::new();
        controller.abort();
        let signal = controller.signal();
        let result = abortable(Some(&signal), async { Ok(1) }).await;
        assert!(matches!(result, Err(Error::Aborted)));
    }

    #[tokio::test]
    async fn abort_interrupts_pending_future() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let pending = abortable(Some(&signal), std::future::pending::<Result<()>>());
        controller.abort();
        assert!(matches!(pending.await, Err(Error::Aborted)));
    }
}
