use bytes::Bytes;
use http::{HeaderMap, Method};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Read,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Read => "read",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

/// Failure reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{kind} failure: {source}")]
    Network {
        kind: TransportErrorKind,
        #[source]
        source: BoxError,
    },
    #[error("transport timed out")]
    Timeout,
    #[error("transport produced no response")]
    NoResponse,
    #[error("transport request was cancelled")]
    Cancelled,
}

impl TransportError {
    pub fn network(
        kind: TransportErrorKind,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Network {
            kind,
            source: source.into(),
        }
    }
}

/// The phase in which a request failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// The descriptor could not be turned into a wire request. Never retried.
    Build,
    /// Connectivity or timeout failure below HTTP.
    Transport,
    /// The server answered with an unacceptable status.
    Protocol,
    /// The response did not have the expected shape.
    Decode,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    InvalidEndpoint,
    BadUrl,
    InvalidHeaderName,
    InvalidHeaderValue,
    SerializeJson,
    SerializeForm,
    TransportInit,
    NoResponse,
    InvalidStatusCode,
    NoData,
    InvalidContentType,
    InvalidJson,
    Validation,
    Network,
    Decoding,
    Timeout,
    Cancelled,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidEndpoint => "invalid_endpoint",
            Self::BadUrl => "bad_url",
            Self::InvalidHeaderName => "invalid_header_name",
            Self::InvalidHeaderValue => "invalid_header_value",
            Self::SerializeJson => "serialize_json",
            Self::SerializeForm => "serialize_form",
            Self::TransportInit => "transport_init",
            Self::NoResponse => "no_response",
            Self::InvalidStatusCode => "invalid_status_code",
            Self::NoData => "no_data",
            Self::InvalidContentType => "invalid_content_type",
            Self::InvalidJson => "invalid_json",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Decoding => "decoding",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::InvalidEndpoint
            | Self::BadUrl
            | Self::InvalidHeaderName
            | Self::InvalidHeaderValue
            | Self::SerializeJson
            | Self::SerializeForm
            | Self::TransportInit => ErrorKind::Build,
            Self::NoResponse | Self::Network | Self::Timeout => ErrorKind::Transport,
            Self::InvalidStatusCode => ErrorKind::Protocol,
            Self::NoData
            | Self::InvalidContentType
            | Self::InvalidJson
            | Self::Validation
            | Self::Decoding => ErrorKind::Decode,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid endpoint: {endpoint}")]
    InvalidEndpoint { endpoint: String },
    #[error("bad url {url}: {source}")]
    BadUrl {
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("invalid header name {name}: {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
    #[error("invalid header value for {name}: {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
    #[error("failed to serialize request json: {source}")]
    SerializeJson {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize request form: {source}")]
    SerializeForm {
        #[source]
        source: serde_urlencoded::ser::Error,
    },
    #[error("failed to initialize http transport: {message}")]
    TransportInit { message: String },
    #[error("no response received for {method} {uri}")]
    NoResponse { method: Method, uri: String },
    #[error("invalid status code {status} for {method} {uri}")]
    InvalidStatusCode {
        status: u16,
        method: Method,
        uri: String,
        headers: Box<HeaderMap>,
        body: Bytes,
    },
    #[error("empty response body with status {status} for {method} {uri}")]
    NoData {
        status: u16,
        method: Method,
        uri: String,
    },
    #[error("unexpected content type {} for {method} {uri}", .actual.as_deref().unwrap_or("<none>"))]
    InvalidContentType {
        actual: Option<String>,
        method: Method,
        uri: String,
    },
    #[error("response body is not valid json for {method} {uri}: {source}")]
    InvalidJson {
        method: Method,
        uri: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("response validation failed for {method} {uri}: {message}")]
    Validation {
        method: Method,
        uri: String,
        message: String,
    },
    #[error("network error ({kind}) for {method} {uri}: {source}")]
    Network {
        kind: TransportErrorKind,
        method: Method,
        uri: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to decode response body: {source}; body={body}")]
    Decoding {
        #[source]
        source: BoxError,
        body: String,
    },
    #[error("request timed out after {timeout_ms}ms for {method} {uri}")]
    Timeout {
        timeout_ms: u128,
        method: Method,
        uri: String,
    },
    #[error("request cancelled for {method} {uri}")]
    Cancelled { method: Method, uri: String },
}

impl Error {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidEndpoint { .. } => ErrorCode::InvalidEndpoint,
            Self::BadUrl { .. } => ErrorCode::BadUrl,
            Self::InvalidHeaderName { .. } => ErrorCode::InvalidHeaderName,
            Self::InvalidHeaderValue { .. } => ErrorCode::InvalidHeaderValue,
            Self::SerializeJson { .. } => ErrorCode::SerializeJson,
            Self::SerializeForm { .. } => ErrorCode::SerializeForm,
            Self::TransportInit { .. } => ErrorCode::TransportInit,
            Self::NoResponse { .. } => ErrorCode::NoResponse,
            Self::InvalidStatusCode { .. } => ErrorCode::InvalidStatusCode,
            Self::NoData { .. } => ErrorCode::NoData,
            Self::InvalidContentType { .. } => ErrorCode::InvalidContentType,
            Self::InvalidJson { .. } => ErrorCode::InvalidJson,
            Self::Validation { .. } => ErrorCode::Validation,
            Self::Network { .. } => ErrorCode::Network,
            Self::Decoding { .. } => ErrorCode::Decoding,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        self.code().kind()
    }

    /// Status code of an `InvalidStatusCode` or `NoData` failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidStatusCode { status, .. } | Self::NoData { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw body of a rejected response, kept for structured API error payloads.
    pub fn response_body(&self) -> Option<&Bytes> {
        match self {
            Self::InvalidStatusCode { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn response_headers(&self) -> Option<&HeaderMap> {
        match self {
            Self::InvalidStatusCode { headers, .. } => Some(headers),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
