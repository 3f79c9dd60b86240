use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use serde::Serialize;

use crate::Result;
use crate::config::RequestDefaults;
use crate::error::Error;
use crate::wire::{WireRequest, build_wire_request};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Cache directive handed to the transport untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CachePolicy {
    #[default]
    UseProtocolCachePolicy,
    ReloadIgnoringLocalCacheData,
    ReturnCacheDataElseLoad,
    ReturnCacheDataDontLoad,
}

/// Immutable description of one HTTP call.
///
/// Construct it with [`RequestDescriptor::builder`] (or one of the method
/// shortcuts), or derive it from an [`Endpoint`] implementation. Turning it
/// into a [`WireRequest`] never mutates the descriptor, so one value can be
/// executed any number of times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    domain: String,
    path: String,
    method: HttpMethod,
    headers: Vec<(String, String)>,
    query_items: BTreeMap<String, String>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    cache_policy: CachePolicy,
}

impl RequestDescriptor {
    pub fn builder(
        method: HttpMethod,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> DescriptorBuilder {
        DescriptorBuilder::new(method, domain.into(), path.into())
    }

    pub fn get(domain: impl Into<String>, path: impl Into<String>) -> DescriptorBuilder {
        Self::builder(HttpMethod::Get, domain, path)
    }

    pub fn post(domain: impl Into<String>, path: impl Into<String>) -> DescriptorBuilder {
        Self::builder(HttpMethod::Post, domain, path)
    }

    pub fn put(domain: impl Into<String>, path: impl Into<String>) -> DescriptorBuilder {
        Self::builder(HttpMethod::Put, domain, path)
    }

    pub fn patch(domain: impl Into<String>, path: impl Into<String>) -> DescriptorBuilder {
        Self::builder(HttpMethod::Patch, domain, path)
    }

    pub fn delete(domain: impl Into<String>, path: impl Into<String>) -> DescriptorBuilder {
        Self::builder(HttpMethod::Delete, domain, path)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn query_items(&self) -> &BTreeMap<String, String> {
        &self.query_items
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Starts a builder pre-filled with this descriptor, for deriving variants.
    pub fn to_builder(&self) -> DescriptorBuilder {
        DescriptorBuilder {
            descriptor: self.clone(),
        }
    }

    /// Normalizes the descriptor without any client-level defaults.
    pub fn build_wire(&self) -> Result<WireRequest> {
        build_wire_request(self, &RequestDefaults::default())
    }
}

#[derive(Clone, Debug)]
pub struct DescriptorBuilder {
    descriptor: RequestDescriptor,
}

impl DescriptorBuilder {
    fn new(method: HttpMethod, domain: String, path: String) -> Self {
        Self {
            descriptor: RequestDescriptor {
                domain,
                path,
                method,
                headers: Vec::new(),
                query_items: BTreeMap::new(),
                body: None,
                timeout: None,
                cache_policy: CachePolicy::default(),
            },
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.descriptor.method = method;
        self
    }

    /// Sets a header. An existing entry with the same name, compared
    /// case-insensitively, is replaced.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        let headers = &mut self.descriptor.headers;
        match headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => *entry = (name, value),
            None => headers.push((name, value)),
        }
        self
    }

    pub fn headers<K, V, I>(self, headers: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.header(name, value))
    }

    pub fn bearer_token(self, token: &str) -> Self {
        self.header("authorization", format!("Bearer {token}"))
    }

    pub fn query_item(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor.query_items.insert(name.into(), value.into());
        self
    }

    pub fn query_items<K, V, I>(mut self, items: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.descriptor.query_items.extend(
            items
                .into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.descriptor.body = Some(body.into());
        self
    }

    pub fn json<T>(self, payload: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload).map_err(|source| Error::SerializeJson { source })?;
        Ok(self
            .body(body)
            .header("content-type", "application/json"))
    }

    pub fn form<T>(self, payload: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let encoded =
            serde_urlencoded::to_string(payload).map_err(|source| Error::SerializeForm { source })?;
        Ok(self
            .body(encoded)
            .header("content-type", "application/x-www-form-urlencoded"))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.descriptor.timeout = Some(timeout.max(Duration::from_millis(1)));
        self
    }

    pub fn cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.descriptor.cache_policy = cache_policy;
        self
    }

    pub fn build(self) -> RequestDescriptor {
        self.descriptor
    }
}

/// Declarative request type: implement the accessors for an API endpoint and
/// obtain the equivalent [`RequestDescriptor`] through [`Endpoint::descriptor`].
pub trait Endpoint {
    fn domain(&self) -> String;

    fn path(&self) -> String;

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn query_items(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn body(&self) -> Result<Option<Bytes>> {
        Ok(None)
    }

    fn timeout(&self) -> Option<Duration> {
        None
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::default()
    }

    fn descriptor(&self) -> Result<RequestDescriptor> {
        let mut builder = RequestDescriptor::builder(self.method(), self.domain(), self.path())
            .headers(self.headers())
            .query_items(self.query_items())
            .cache_policy(self.cache_policy());
        if let Some(body) = self.body()? {
            builder = builder.body(body);
        }
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build())
    }
}
