use std::sync::Arc;
use std::time::{Duration, Instant};

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use crate::Result;
use crate::config::{ClientProfile, RequestDefaults};
use crate::descriptor::{CachePolicy, Endpoint, RequestDescriptor};
use crate::error::{Error, TransportError};
use crate::metrics::{ClientMetrics, ClientMetricsSnapshot};
use crate::observe::{NoopLogger, RequestLogger, notify};
use crate::request::PreparedRequest;
use crate::response::Response;
use crate::retry::RetryPolicy;
use crate::transport::{HyperTransport, Transport};
use crate::util::{parse_header_name, parse_header_value};
use crate::validate::{ValidationConfig, Validator};
use crate::wire::{WireRequest, build_wire_request};

const DEFAULT_CLIENT_NAME: &str = "reqkit";

/// Per-call overrides resolved against the client configuration.
#[derive(Default)]
pub(crate) struct ExecutionOptions<'a> {
    pub(crate) retry_policy: Option<&'a RetryPolicy>,
    pub(crate) validator: Option<&'a Validator>,
    pub(crate) cancellation: Option<&'a CancellationToken>,
}

pub struct ClientBuilder {
    default_headers: HeaderMap,
    request_timeout: Duration,
    cache_policy: CachePolicy,
    retry_policy: RetryPolicy,
    validator: Validator,
    transport: Option<Arc<dyn Transport>>,
    logger: Arc<dyn RequestLogger>,
    client_name: String,
    metrics_enabled: bool,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        let defaults = ClientProfile::default().defaults();
        Self {
            default_headers: HeaderMap::new(),
            request_timeout: defaults.request_timeout,
            cache_policy: CachePolicy::default(),
            retry_policy: defaults.retry_policy,
            validator: defaults.validation.validator(),
            transport: None,
            logger: Arc::new(NoopLogger),
            client_name: DEFAULT_CLIENT_NAME.to_owned(),
            metrics_enabled: true,
        }
    }

    /// Replaces timeout, retry policy and validation with the profile's values.
    pub fn profile(mut self, profile: ClientProfile) -> Self {
        let defaults = profile.defaults();
        self.request_timeout = defaults.request_timeout;
        self.retry_policy = defaults.retry_policy;
        self.validator = defaults.validation.validator();
        self
    }

    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout.max(Duration::from_millis(1));
        self
    }

    pub fn cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = cache_policy;
        self
    }

    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn try_default_header(self, name: &str, value: &str) -> Result<Self> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        Ok(self.default_header(name, value))
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn validation(mut self, validation: ValidationConfig) -> Self {
        self.validator = validation.validator();
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn transport<T>(self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport_arc(Arc::new(transport))
    }

    pub fn transport_arc(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn logger<L>(self, logger: L) -> Self
    where
        L: RequestLogger + 'static,
    {
        self.logger_arc(Arc::new(logger))
    }

    pub fn logger_arc(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    pub fn metrics_enabled(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Builds the client, creating a [`HyperTransport`] when none was supplied.
    pub fn try_build(self) -> Result<Client> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::try_new()?),
        };

        Ok(Client {
            transport,
            defaults: RequestDefaults {
                headers: self.default_headers,
                timeout: self.request_timeout,
                cache_policy: self.cache_policy,
            },
            retry_policy: self.retry_policy,
            validator: self.validator,
            logger: self.logger,
            client_name: self.client_name,
            metrics: ClientMetrics::new(self.metrics_enabled),
        })
    }
}

/// Executes request descriptors: normalize, send, validate, decode, retry.
///
/// The client only holds immutable configuration and shared handles, so
/// clones are cheap and concurrent executions do not interact.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    defaults: RequestDefaults,
    retry_policy: RetryPolicy,
    validator: Validator,
    logger: Arc<dyn RequestLogger>,
    client_name: String,
    metrics: ClientMetrics,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Client")
            .field("client_name", &self.client_name)
            .field("defaults", &self.defaults)
            .field("retry_policy", &self.retry_policy)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn prepare<'a>(&'a self, descriptor: &'a RequestDescriptor) -> PreparedRequest<'a> {
        PreparedRequest::new(self, descriptor)
    }

    /// Executes `descriptor` and returns the validated response.
    pub async fn send(&self, descriptor: &RequestDescriptor) -> Result<Response> {
        self.prepare(descriptor).send().await
    }

    /// Executes `descriptor` and decodes the body as JSON.
    pub async fn execute<T>(&self, descriptor: &RequestDescriptor) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.prepare(descriptor).json().await
    }

    pub async fn execute_endpoint<T, E>(&self, endpoint: &E) -> Result<T>
    where
        T: DeserializeOwned,
        E: Endpoint + ?Sized,
    {
        let descriptor = endpoint.descriptor()?;
        self.execute(&descriptor).await
    }

    /// Normalizes `descriptor` with this client's default headers and timeout.
    pub fn build_wire_request(&self, descriptor: &RequestDescriptor) -> Result<WireRequest> {
        build_wire_request(descriptor, &self.defaults)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn metrics_snapshot(&self) -> ClientMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) async fn execute_with<T, F>(
        &self,
        descriptor: &RequestDescriptor,
        options: ExecutionOptions<'_>,
        decode: F,
    ) -> Result<T>
    where
        F: Fn(Response) -> Result<T>,
    {
        let _in_flight = self.metrics.record_request_started();
        let started_at = Instant::now();
        let result = self.run_attempts(descriptor, options, decode).await;
        self.metrics
            .record_request_completed(&result, started_at.elapsed());
        result
    }

    async fn run_attempts<T, F>(
        &self,
        descriptor: &RequestDescriptor,
        options: ExecutionOptions<'_>,
        decode: F,
    ) -> Result<T>
    where
        F: Fn(Response) -> Result<T>,
    {
        let request = match self.build_wire_request(descriptor) {
            Ok(request) => request,
            Err(error) => {
                notify(|| self.logger.on_error(&error, None, None));
                return Err(error);
            }
        };
        let retry_policy = options.retry_policy.unwrap_or(&self.retry_policy);
        let validator = options.validator.unwrap_or(&self.validator);
        let max_retries = retry_policy.max_retries();
        let redacted_uri = request.redacted_uri();

        let mut attempt = 0;
        loop {
            let span = info_span!(
                "reqkit.request",
                client = %self.client_name,
                method = %request.method(),
                uri = %redacted_uri,
                attempt = attempt,
                max_retries = max_retries
            );
            if options
                .cancellation
                .is_some_and(CancellationToken::is_cancelled)
            {
                return Err(cancelled_error(&request));
            }

            let attempt_started_at = Instant::now();
            let error = match self
                .attempt(&request, attempt, validator, &decode, options.cancellation)
                .instrument(span.clone())
                .await
            {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            notify(|| {
                self.logger
                    .on_error(&error, Some(&request), Some(attempt_started_at.elapsed()))
            });

            if error.is_cancelled()
                || attempt >= max_retries
                || !retry_policy.should_retry(&error, attempt)
            {
                return Err(error);
            }

            let delay = retry_policy.delay_for(&error, attempt);
            span.in_scope(|| {
                warn!(
                    code = error.code().as_str(),
                    delay_ms = delay.as_millis() as u64,
                    "retrying request"
                )
            });
            notify(|| self.logger.on_retry(&request, &error, attempt, delay));
            self.metrics.record_retry();

            if !delay.is_zero() {
                match options.cancellation {
                    Some(token) => {
                        tokio::select! {
                            _ = token.cancelled() => return Err(cancelled_error(&request)),
                            _ = sleep(delay) => {}
                        }
                    }
                    None => sleep(delay).await,
                }
            }
            attempt += 1;
        }
    }

    async fn attempt<T, F>(
        &self,
        request: &WireRequest,
        attempt: usize,
        validator: &Validator,
        decode: &F,
        cancellation: Option<&CancellationToken>,
    ) -> Result<T>
    where
        F: Fn(Response) -> Result<T>,
    {
        notify(|| self.logger.on_request(request, attempt));
        self.metrics.record_attempt();
        debug!("sending request");

        let sent_at = Instant::now();
        let response = self.send_transport(request, cancellation).await?;
        let elapsed = sent_at.elapsed();
        debug!(
            status = response.status().as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "response received"
        );
        notify(|| self.logger.on_response(request, &response, elapsed));
        self.metrics.record_status(response.status().as_u16());

        validator.validate(request, &response)?;
        decode(response)
    }

    async fn send_transport(
        &self,
        request: &WireRequest,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response> {
        let send = timeout(request.timeout(), self.transport.send(request));
        let outcome = match cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled_error(request)),
                    outcome = send => outcome,
                }
            }
            None => send.await,
        };

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => Err(classify_transport_failure(error, request)),
            Err(_) => Err(timeout_error(request)),
        }
    }
}

fn classify_transport_failure(error: TransportError, request: &WireRequest) -> Error {
    match error {
        TransportError::Network { kind, source } => Error::Network {
            kind,
            method: request.method().clone(),
            uri: request.redacted_uri(),
            source,
        },
        TransportError::Timeout => timeout_error(request),
        TransportError::NoResponse => Error::NoResponse {
            method: request.method().clone(),
            uri: request.redacted_uri(),
        },
        TransportError::Cancelled => cancelled_error(request),
    }
}

fn timeout_error(request: &WireRequest) -> Error {
    Error::Timeout {
        timeout_ms: request.timeout().as_millis(),
        method: request.method().clone(),
        uri: request.redacted_uri(),
    }
}

fn cancelled_error(request: &WireRequest) -> Error {
    Error::Cancelled {
        method: request.method().clone(),
        uri: request.redacted_uri(),
    }
}
