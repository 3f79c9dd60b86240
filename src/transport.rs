use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;
use http::header::{CACHE_CONTROL, HeaderValue};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use crate::Result;
use crate::descriptor::CachePolicy;
use crate::error::{Error, TransportError, TransportErrorKind};
use crate::response::Response;
use crate::wire::WireRequest;

const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<Response, TransportError>> + Send + 'a>>;

/// Performs the network I/O for one wire request and returns the complete
/// response. Implementations own their connection handling and must be safe
/// to share between concurrent requests.
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, request: &'a WireRequest) -> TransportFuture<'a>;
}

impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    fn send<'a>(&'a self, request: &'a WireRequest) -> TransportFuture<'a> {
        (**self).send(request)
    }
}

type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// HTTP/1.1 + HTTP/2 transport on `hyper` with rustls.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl HyperTransport {
    pub fn try_new() -> Result<Self> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|source| Error::TransportInit {
                message: source.to_string(),
            })?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http);
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(DEFAULT_POOL_IDLE_TIMEOUT)
            .build(https);
        Ok(Self { client })
    }
}

impl Transport for HyperTransport {
    fn send<'a>(&'a self, request: &'a WireRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .request(to_http_request(request))
                .await
                .map_err(|source| {
                    TransportError::network(classify_transport_error(&source), source)
                })?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|source| TransportError::network(TransportErrorKind::Read, source))?
                .to_bytes();
            Ok::<_, TransportError>(Response::new(parts.status, parts.headers, body))
        })
    }
}

fn to_http_request(request: &WireRequest) -> http::Request<Full<Bytes>> {
    let body = request.body().cloned().unwrap_or_default();
    let mut http_request = http::Request::new(Full::new(body));
    *http_request.method_mut() = request.method().clone();
    *http_request.uri_mut() = request.uri().clone();
    *http_request.headers_mut() = request.headers().clone();
    apply_cache_policy(http_request.headers_mut(), request.cache_policy());
    http_request
}

/// Expresses the cache directive as `Cache-Control` unless the caller set one.
pub(crate) fn apply_cache_policy(headers: &mut HeaderMap, cache_policy: CachePolicy) {
    if headers.contains_key(CACHE_CONTROL) {
        return;
    }
    let directive = match cache_policy {
        CachePolicy::UseProtocolCachePolicy => return,
        CachePolicy::ReloadIgnoringLocalCacheData => "no-cache",
        CachePolicy::ReturnCacheDataElseLoad => "max-stale",
        CachePolicy::ReturnCacheDataDontLoad => "only-if-cached",
    };
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(directive));
}

fn classify_transport_error(error: &hyper_util::client::legacy::Error) -> TransportErrorKind {
    let text = error.to_string().to_ascii_lowercase();
    if error.is_connect() {
        if text.contains("dns")
            || text.contains("name or service not known")
            || text.contains("failed to lookup address")
        {
            return TransportErrorKind::Dns;
        }
        if text.contains("tls") || text.contains("certificate") || text.contains("handshake") {
            return TransportErrorKind::Tls;
        }
        return TransportErrorKind::Connect;
    }

    if text.contains("read")
        || text.contains("connection reset")
        || text.contains("broken pipe")
        || text.contains("unexpected eof")
    {
        return TransportErrorKind::Read;
    }

    TransportErrorKind::Other
}
