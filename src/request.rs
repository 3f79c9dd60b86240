use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::client::{Client, ExecutionOptions};
use crate::decode::{JsonDecoder, ResponseDecoder};
use crate::descriptor::RequestDescriptor;
use crate::response::Response;
use crate::retry::RetryPolicy;
use crate::validate::{ValidationConfig, Validator};

/// One execution of a descriptor with optional per-call overrides.
///
/// Created by [`Client::prepare`]. Nothing is sent until one of the
/// terminal methods is awaited.
pub struct PreparedRequest<'a> {
    client: &'a Client,
    descriptor: &'a RequestDescriptor,
    retry_policy: Option<RetryPolicy>,
    validator: Option<Validator>,
    cancellation: Option<CancellationToken>,
}

impl<'a> PreparedRequest<'a> {
    pub(crate) fn new(client: &'a Client, descriptor: &'a RequestDescriptor) -> Self {
        Self {
            client,
            descriptor,
            retry_policy: None,
            validator: None,
            cancellation: None,
        }
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn validation(self, validation: ValidationConfig) -> Self {
        self.validator(validation.validator())
    }

    /// Aborts the in-flight attempt or pending backoff once `token` fires.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub async fn send(self) -> Result<Response> {
        self.client
            .execute_with(self.descriptor, self.options(), Ok)
            .await
    }

    pub async fn json<T>(self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.decode_with(&JsonDecoder).await
    }

    /// Decodes each validated response with `decoder`. A decoding failure is
    /// returned as-is and never retried by the built-in classification.
    pub async fn decode_with<T, D>(self, decoder: &D) -> Result<T>
    where
        D: ResponseDecoder<T> + ?Sized,
    {
        self.client
            .execute_with(self.descriptor, self.options(), |response: Response| {
                decoder.decode_body(response.body())
            })
            .await
    }

    fn options(&self) -> ExecutionOptions<'_> {
        ExecutionOptions {
            retry_policy: self.retry_policy.as_ref(),
            validator: self.validator.as_ref(),
            cancellation: self.cancellation.as_ref(),
        }
    }
}

impl std::fmt::Debug for PreparedRequest<'_> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PreparedRequest")
            .field("descriptor", &self.descriptor)
            .field("retry_policy", &self.retry_policy)
            .field("validator", &self.validator)
            .field("cancelled", &self.cancellation.as_ref().map(CancellationToken::is_cancelled))
            .finish()
    }
}
