use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use url::Url;

use crate::Result;
use crate::config::RequestDefaults;
use crate::descriptor::{CachePolicy, RequestDescriptor};
use crate::error::Error;
use crate::util::{merge_headers, parse_header_name, parse_header_value, redact_uri_for_logs};

/// Fully resolved request, ready for a [`Transport`](crate::Transport).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireRequest {
    method: Method,
    url: Url,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Duration,
    cache_policy: CachePolicy,
}

impl WireRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// URL without userinfo, query or fragment, for logs and error messages.
    pub fn redacted_uri(&self) -> String {
        redact_uri_for_logs(self.url.as_str())
    }
}

/// Normalizes `descriptor` into a wire request, layering `defaults` underneath.
///
/// The URL is `domain + path` taken verbatim, followed by the form-encoded
/// query items. Any query already present in the path is kept and the items
/// are appended after it. Fails before any I/O when the result is not an
/// absolute `http`/`https` URL or a header cannot be represented on the wire.
pub fn build_wire_request(
    descriptor: &RequestDescriptor,
    defaults: &RequestDefaults,
) -> Result<WireRequest> {
    let domain = descriptor.domain();
    if domain.is_empty() || domain.trim().len() != domain.len() {
        return Err(Error::InvalidEndpoint {
            endpoint: domain.to_owned(),
        });
    }

    let url_text = format!("{domain}{}", descriptor.path());
    let mut url = Url::parse(&url_text).map_err(|source| Error::BadUrl {
        url: url_text.clone(),
        source: Box::new(source),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::InvalidEndpoint { endpoint: url_text });
    }

    if !descriptor.query_items().is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in descriptor.query_items() {
            pairs.append_pair(name, value);
        }
    }

    let mut target = url.clone();
    target.set_fragment(None);
    let uri = target.as_str().parse::<Uri>().map_err(|source| Error::BadUrl {
        url: url.to_string(),
        source: Box::new(source),
    })?;

    let mut request_headers = HeaderMap::with_capacity(descriptor.headers().len());
    for (name, value) in descriptor.headers() {
        let header_name = parse_header_name(name)?;
        let header_value = parse_header_value(name, value)?;
        request_headers.insert(header_name, header_value);
    }

    Ok(WireRequest {
        method: descriptor.method().into(),
        url,
        uri,
        headers: merge_headers(&defaults.headers, &request_headers),
        body: descriptor.body().cloned(),
        timeout: descriptor.timeout().unwrap_or(defaults.timeout),
        cache_policy: match descriptor.cache_policy() {
            CachePolicy::UseProtocolCachePolicy => defaults.cache_policy,
            explicit => explicit,
        },
    })
}
