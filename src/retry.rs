use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rand::Rng;

use crate::error::Error;
use crate::util::parse_retry_after;

/// Decides whether a failed attempt is worth repeating.
pub trait RetryClassifier: Send + Sync {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

impl<F> RetryClassifier for F
where
    F: Fn(&Error, usize) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self(error, attempt)
    }
}

/// Computes the wait before the next attempt with the failure at hand.
pub trait BackoffSource: Send + Sync {
    fn backoff_for_retry(&self, error: &Error, attempt: usize) -> Duration;
}

impl<F> BackoffSource for F
where
    F: Fn(&Error, usize) -> Duration + Send + Sync,
{
    fn backoff_for_retry(&self, error: &Error, attempt: usize) -> Duration {
        self(error, attempt)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Backoff {
    None,
    Linear {
        delay: Duration,
    },
    /// `min(base * multiplier^attempt, max)`.
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
    },
    /// Exponential delay plus `uniform[0, jitter] * delay`, capped at `max`
    /// after the jitter is added.
    JitteredExponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
        jitter: f64,
    },
}

impl Backoff {
    pub fn delay(&self, attempt: usize) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Linear { delay } => delay,
            Self::Exponential {
                base,
                multiplier,
                max,
            } => capped(exponential_secs(base, multiplier, attempt), max),
            Self::JitteredExponential {
                base,
                multiplier,
                max,
                jitter,
            } => {
                let raw = exponential_secs(base, multiplier, attempt);
                capped(raw + sample_jitter(jitter) * raw, max)
            }
        }
    }
}

fn exponential_secs(base: Duration, multiplier: f64, attempt: usize) -> f64 {
    let exponent = attempt.min(i32::MAX as usize) as i32;
    base.as_secs_f64() * multiplier.powi(exponent)
}

fn capped(delay_secs: f64, max: Duration) -> Duration {
    let max_secs = max.as_secs_f64();
    if !delay_secs.is_finite() || delay_secs >= max_secs {
        return max;
    }
    Duration::from_secs_f64(delay_secs.max(0.0))
}

fn sample_jitter(jitter: f64) -> f64 {
    if !jitter.is_finite() || jitter <= f64::EPSILON {
        return 0.0;
    }
    rand::rng().random_range(0.0..=jitter.min(1.0))
}

fn normalize_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_nan() {
        return 1.0;
    }
    multiplier.max(1.0)
}

fn normalize_jitter(jitter: f64) -> f64 {
    if jitter.is_nan() {
        return 0.0;
    }
    jitter.clamp(0.0, 1.0)
}

/// Retry rules shared by every request that uses them.
///
/// A policy holds no per-request state; the executor passes the zero-based
/// attempt index in. Attempts at or past `max_retries` are never retried,
/// whatever the classifier says.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    backoff: Backoff,
    retry_classifier: Option<Arc<dyn RetryClassifier>>,
    backoff_source: Option<Arc<dyn BackoffSource>>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("custom_classifier", &self.retry_classifier.is_some())
            .field("custom_backoff", &self.backoff_source.is_some())
            .finish()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::None,
            retry_classifier: None,
            backoff_source: None,
        }
    }

    pub fn linear(max_retries: usize, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Linear { delay },
            retry_classifier: None,
            backoff_source: None,
        }
    }

    pub fn exponential(max_retries: usize, base: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential {
                base,
                multiplier: normalize_multiplier(multiplier),
                max: max.max(base),
            },
            retry_classifier: None,
            backoff_source: None,
        }
    }

    pub fn jittered_exponential(
        max_retries: usize,
        base: Duration,
        multiplier: f64,
        max: Duration,
        jitter: f64,
    ) -> Self {
        Self {
            max_retries,
            backoff: Backoff::JitteredExponential {
                base,
                multiplier: normalize_multiplier(multiplier),
                max: max.max(base),
                jitter: normalize_jitter(jitter),
            },
            retry_classifier: None,
            backoff_source: None,
        }
    }

    /// Policy driven entirely by injected decision and delay functions.
    pub fn custom<C, B>(max_retries: usize, retry_classifier: C, backoff_source: B) -> Self
    where
        C: RetryClassifier + 'static,
        B: BackoffSource + 'static,
    {
        Self {
            max_retries,
            backoff: Backoff::None,
            retry_classifier: Some(Arc::new(retry_classifier)),
            backoff_source: Some(Arc::new(backoff_source)),
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_classifier(mut self, retry_classifier: Arc<dyn RetryClassifier>) -> Self {
        self.retry_classifier = Some(retry_classifier);
        self
    }

    pub fn backoff_source(mut self, backoff_source: Arc<dyn BackoffSource>) -> Self {
        self.backoff_source = Some(backoff_source);
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    pub fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        match &self.retry_classifier {
            Some(retry_classifier) => retry_classifier.should_retry(error, attempt),
            None => is_transient(error),
        }
    }

    pub fn delay(&self, attempt: usize) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Delay before the attempt following `attempt`; consults the custom
    /// backoff source when one is installed.
    pub fn delay_for(&self, error: &Error, attempt: usize) -> Duration {
        match &self.backoff_source {
            Some(backoff_source) => backoff_source.backoff_for_retry(error, attempt),
            None => self.delay(attempt),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Built-in classification: transport failures and 5xx statuses are transient.
pub fn is_transient(error: &Error) -> bool {
    match error {
        Error::Network { .. } | Error::Timeout { .. } | Error::NoResponse { .. } => true,
        Error::InvalidStatusCode { status, .. } => (500..600).contains(status),
        _ => false,
    }
}

/// Honours a `Retry-After` header on rejected responses and otherwise
/// falls back to `fallback`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryAfterBackoff {
    fallback: Backoff,
    max_delay: Option<Duration>,
}

impl RetryAfterBackoff {
    pub fn new(fallback: Backoff) -> Self {
        Self {
            fallback,
            max_delay: None,
        }
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }
}

impl BackoffSource for RetryAfterBackoff {
    fn backoff_for_retry(&self, error: &Error, attempt: usize) -> Duration {
        let requested = error
            .response_headers()
            .and_then(|headers| parse_retry_after(headers, SystemTime::now()));
        let delay = requested.unwrap_or_else(|| self.fallback.delay(attempt));
        match self.max_delay {
            Some(max_delay) => delay.min(max_delay),
            None => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use http::header::RETRY_AFTER;
    use http::{HeaderMap, HeaderValue, Method};

    use super::{Backoff, BackoffSource, RetryAfterBackoff, RetryPolicy};
    use crate::error::{Error, TransportErrorKind};

    fn status_error(status: u16) -> Error {
        status_error_with_headers(status, HeaderMap::new())
    }

    fn status_error_with_headers(status: u16, headers: HeaderMap) -> Error {
        Error::InvalidStatusCode {
            status,
            method: Method::GET,
            uri: "https://api.test/items".to_owned(),
            headers: Box::new(headers),
            body: Bytes::new(),
        }
    }

    fn network_error() -> Error {
        Error::Network {
            kind: TransportErrorKind::Connect,
            method: Method::GET,
            uri: "https://api.test/items".to_owned(),
            source: "connection refused".into(),
        }
    }

    fn decoding_error() -> Error {
        Error::Decoding {
            source: "expected value".into(),
            body: "<html>".to_owned(),
        }
    }

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn exponential_delays_double_then_cap() {
        let policy = RetryPolicy::exponential(10, secs(1), 2.0, secs(30));
        let delays: Vec<Duration> = (0..=5).map(|attempt| policy.delay(attempt)).collect();
        assert_eq!(delays, vec![secs(1), secs(2), secs(4), secs(8), secs(16), secs(30)]);
        assert_eq!(policy.delay(usize::MAX), secs(30));
    }

    #[test]
    fn linear_delay_is_constant() {
        let policy = RetryPolicy::linear(3, Duration::from_millis(250));
        for attempt in 0..5 {
            assert_eq!(policy.delay(attempt), Duration::from_millis(250));
        }
    }

    #[test]
    fn jittered_delay_stays_between_raw_and_cap() {
        let policy = RetryPolicy::jittered_exponential(10, secs(1), 2.0, secs(30), 0.5);
        for _ in 0..256 {
            let delay = policy.delay(2);
            assert!(delay >= secs(4), "delay {delay:?} below raw exponential");
            assert!(delay <= secs(6), "delay {delay:?} above jitter bound");
        }
        for _ in 0..256 {
            assert!(policy.delay(5) <= secs(30));
        }
    }

    #[test]
    fn jitter_is_applied_before_the_cap() {
        let backoff = Backoff::JitteredExponential {
            base: secs(1),
            multiplier: 2.0,
            max: secs(20),
            jitter: 1.0,
        };
        // raw 16s with up to 100% jitter can exceed 16s but never 20s
        let samples: Vec<Duration> = (0..512).map(|_| backoff.delay(4)).collect();
        assert!(samples.iter().all(|delay| *delay >= secs(16) && *delay <= secs(20)));
        assert!(samples.iter().any(|delay| *delay > secs(16)));
    }

    #[test]
    fn unclamped_jitter_values_never_panic() {
        for jitter in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.5] {
            let backoff = Backoff::JitteredExponential {
                base: secs(1),
                multiplier: 2.0,
                max: secs(30),
                jitter,
            };
            assert_eq!(backoff.delay(0), secs(1), "jitter={jitter}");
            let source = RetryAfterBackoff::new(backoff);
            assert_eq!(source.backoff_for_retry(&network_error(), 1), secs(2));
        }

        let oversized = Backoff::JitteredExponential {
            base: secs(1),
            multiplier: 2.0,
            max: secs(30),
            jitter: 5.0,
        };
        for _ in 0..256 {
            let delay = oversized.delay(1);
            assert!(delay >= secs(2) && delay <= secs(4), "delay {delay:?} above clamped jitter");
        }
    }

    #[test]
    fn none_policy_never_retries() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries(), 0);
        assert!(!policy.should_retry(&network_error(), 0));
        assert_eq!(policy.delay(0), Duration::ZERO);
    }

    #[test]
    fn client_errors_are_never_retried() {
        let policies = [
            RetryPolicy::default(),
            RetryPolicy::linear(5, Duration::ZERO),
            RetryPolicy::exponential(5, secs(1), 2.0, secs(30)),
            RetryPolicy::jittered_exponential(5, secs(1), 2.0, secs(30), 0.2),
        ];
        for policy in &policies {
            for attempt in 0..6 {
                assert!(!policy.should_retry(&status_error(404), attempt));
                assert!(!policy.should_retry(&status_error(400), attempt));
                assert!(!policy.should_retry(&status_error(499), attempt));
            }
        }
    }

    #[test]
    fn server_and_network_errors_retry_until_ceiling() {
        let policy = RetryPolicy::linear(2, Duration::ZERO);
        assert!(policy.should_retry(&status_error(500), 0));
        assert!(policy.should_retry(&status_error(599), 1));
        assert!(!policy.should_retry(&status_error(503), 2));
        assert!(policy.should_retry(&network_error(), 1));
        assert!(!policy.should_retry(&network_error(), 2));
        assert!(!policy.should_retry(&status_error(600), 0));
        assert!(!policy.should_retry(&status_error(302), 0));
    }

    #[test]
    fn decoding_errors_are_never_retried() {
        let policy = RetryPolicy::exponential(3, secs(1), 2.0, secs(30));
        assert!(!policy.should_retry(&decoding_error(), 0));
    }

    #[test]
    fn custom_classifier_and_backoff_are_consulted() {
        let policy = RetryPolicy::custom(
            3,
            |error: &Error, _attempt: usize| error.status() == Some(429),
            |_error: &Error, attempt: usize| Duration::from_millis(10 * (attempt as u64 + 1)),
        );

        assert!(policy.should_retry(&status_error(429), 0));
        assert!(!policy.should_retry(&status_error(503), 0));
        assert!(!policy.should_retry(&status_error(429), 3));
        assert_eq!(
            policy.delay_for(&status_error(429), 1),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn classifier_can_be_layered_on_builtin_backoff() {
        let policy = RetryPolicy::linear(1, secs(2)).retry_classifier(Arc::new(
            |error: &Error, _attempt: usize| error.status() == Some(409),
        ));
        assert!(policy.should_retry(&status_error(409), 0));
        assert_eq!(policy.delay_for(&status_error(409), 0), secs(2));
    }

    #[test]
    fn retry_after_backoff_prefers_header_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        let source = RetryAfterBackoff::new(Backoff::Linear { delay: secs(1) });

        assert_eq!(
            source.backoff_for_retry(&status_error_with_headers(503, headers.clone()), 0),
            secs(7)
        );
        assert_eq!(source.backoff_for_retry(&network_error(), 0), secs(1));
        assert_eq!(
            source
                .max_delay(secs(3))
                .backoff_for_retry(&status_error_with_headers(503, headers), 0),
            secs(3)
        );
    }
}
