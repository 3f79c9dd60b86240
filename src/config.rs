use std::time::Duration;

use http::HeaderMap;

use crate::descriptor::CachePolicy;
use crate::retry::RetryPolicy;
use crate::validate::ValidationConfig;

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientProfile {
    #[default]
    Standard,
    Resilient,
}

#[derive(Clone, Debug)]
pub struct ProfileDefaults {
    pub request_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub validation: ValidationConfig,
}

impl ClientProfile {
    pub fn defaults(self) -> ProfileDefaults {
        match self {
            Self::Standard => ProfileDefaults {
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
                retry_policy: RetryPolicy::exponential(
                    2,
                    Duration::from_millis(500),
                    2.0,
                    Duration::from_secs(5),
                ),
                validation: ValidationConfig::default(),
            },
            Self::Resilient => ProfileDefaults {
                request_timeout: Duration::from_secs(60),
                retry_policy: RetryPolicy::jittered_exponential(
                    5,
                    Duration::from_secs(1),
                    2.0,
                    Duration::from_secs(30),
                    0.2,
                ),
                validation: ValidationConfig::default(),
            },
        }
    }
}

/// Client-level values merged under every descriptor during normalization.
#[derive(Clone, Debug)]
pub struct RequestDefaults {
    pub headers: HeaderMap,
    pub timeout: Duration,
    /// Applied when the descriptor keeps [`CachePolicy::UseProtocolCachePolicy`].
    pub cache_policy: CachePolicy,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_policy: CachePolicy::default(),
        }
    }
}
