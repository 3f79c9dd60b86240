//! `reqkit` is a declarative HTTP request layer for API SDKs.
//!
//! Requests are plain [`RequestDescriptor`] values. A [`Client`] normalizes
//! them into wire requests, sends them over a pluggable [`Transport`],
//! validates the response, decodes the body and retries transient failures
//! according to a [`RetryPolicy`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use reqkit::prelude::{Client, RequestDescriptor, RetryPolicy};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Item {
//!     id: u64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .client_name("my-sdk")
//!         .request_timeout(Duration::from_secs(5))
//!         .retry_policy(RetryPolicy::exponential(
//!             3,
//!             Duration::from_millis(200),
//!             2.0,
//!             Duration::from_secs(2),
//!         ))
//!         .try_build()?;
//!
//!     let request = RequestDescriptor::get("https://api.example.com", "/v1/items")
//!         .query_item("page", "1")
//!         .build();
//!     let items: Vec<Item> = client.execute(&request).await?;
//!
//!     println!("fetched {} items", items.len());
//!     Ok(())
//! }
//! ```
//!
//! # Retries
//!
//! - Network failures, timeouts, missing responses and 5xx statuses are
//!   retried by default.
//! - 4xx statuses, validation and decoding failures are returned at once.
//! - Cancellation always ends the execution, including during backoff.

mod client;
mod config;
mod decode;
mod descriptor;
mod error;
mod metrics;
mod observe;
mod request;
mod response;
mod retry;
mod transport;
mod util;
mod validate;
mod wire;

pub use crate::client::{Client, ClientBuilder};
pub use crate::config::{ClientProfile, ProfileDefaults, RequestDefaults};
pub use crate::decode::{FormDecoder, JsonDecoder, ResponseDecoder, TextDecoder};
pub use crate::descriptor::{CachePolicy, DescriptorBuilder, Endpoint, HttpMethod, RequestDescriptor};
pub use crate::error::{BoxError, Error, ErrorCode, ErrorKind, TransportError, TransportErrorKind};
pub use crate::metrics::ClientMetricsSnapshot;
pub use crate::observe::{NoopLogger, RequestLogger, TracingLogger};
pub use crate::request::PreparedRequest;
pub use crate::response::Response;
pub use crate::retry::{
    Backoff, BackoffSource, RetryAfterBackoff, RetryClassifier, RetryPolicy, is_transient,
};
pub use crate::transport::{HyperTransport, Transport, TransportFuture};
pub use crate::validate::{BODYLESS_STATUSES, StatusRange, ValidationConfig, Validator};
pub use crate::wire::{WireRequest, build_wire_request};
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        Backoff, CachePolicy, CancellationToken, Client, ClientMetricsSnapshot, ClientProfile,
        Endpoint, Error, ErrorCode, ErrorKind, HttpMethod, JsonDecoder, RequestDescriptor,
        RequestLogger, Response, ResponseDecoder, Result, RetryClassifier, RetryPolicy,
        TracingLogger, Transport, TransportError, ValidationConfig, Validator, WireRequest,
    };
}
