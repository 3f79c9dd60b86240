use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use http::Method;
use serde::de::IgnoredAny;

use crate::Result;
use crate::error::Error;
use crate::response::Response;
use crate::util::media_type;
use crate::wire::WireRequest;

/// Statuses that conventionally carry no body.
pub const BODYLESS_STATUSES: [u16; 3] = [204, 205, 304];

/// Half-open range of acceptable status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StatusRange {
    start: u16,
    end: u16,
}

impl StatusRange {
    pub const SUCCESS: Self = Self::new(200, 300);

    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub const fn contains(self, status: u16) -> bool {
        self.start <= status && status < self.end
    }
}

impl Default for StatusRange {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<Range<u16>> for StatusRange {
    fn from(range: Range<u16>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// Data describing which responses are acceptable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationConfig {
    pub acceptable_status: StatusRange,
    pub content_types: Option<BTreeSet<String>>,
    pub require_json: bool,
}

impl ValidationConfig {
    pub fn with_acceptable_status(mut self, acceptable_status: impl Into<StatusRange>) -> Self {
        self.acceptable_status = acceptable_status.into();
        self
    }

    pub fn with_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.content_types = Some(normalize_content_types(content_types));
        self
    }

    pub fn with_require_json(mut self, require_json: bool) -> Self {
        self.require_json = require_json;
        self
    }

    /// Compiles the config into the ordered composite: status, content type,
    /// body presence, then JSON structure.
    pub fn validator(&self) -> Validator {
        let mut steps = vec![Validator::Status(self.acceptable_status)];
        if let Some(content_types) = &self.content_types {
            steps.push(Validator::ContentType(content_types.clone()));
        }
        steps.push(Validator::NonEmptyBody);
        if self.require_json {
            steps.push(Validator::Json);
        }
        Validator::All(steps)
    }

    pub fn validate(&self, request: &WireRequest, response: &Response) -> Result<()> {
        self.validator().validate(request, response)
    }
}

type CustomValidator = Arc<dyn Fn(&WireRequest, &Response) -> Result<()> + Send + Sync>;

/// A response check. `All` runs its members in order and stops at the first failure.
#[derive(Clone)]
pub enum Validator {
    Status(StatusRange),
    /// Allow-list of media types, matched ASCII-case-insensitively.
    ContentType(BTreeSet<String>),
    NonEmptyBody,
    Json,
    All(Vec<Validator>),
    Custom(CustomValidator),
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(range) => formatter.debug_tuple("Status").field(range).finish(),
            Self::ContentType(types) => formatter.debug_tuple("ContentType").field(types).finish(),
            Self::NonEmptyBody => formatter.write_str("NonEmptyBody"),
            Self::Json => formatter.write_str("Json"),
            Self::All(validators) => formatter.debug_tuple("All").field(validators).finish(),
            Self::Custom(_) => formatter.write_str("Custom(..)"),
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        ValidationConfig::default().validator()
    }
}

impl Validator {
    pub fn content_types<I, S>(content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::ContentType(normalize_content_types(content_types))
    }

    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&WireRequest, &Response) -> Result<()> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(check))
    }

    /// Appends `next` so it runs after every check already in `self`.
    pub fn then(self, next: Validator) -> Self {
        match self {
            Self::All(mut validators) => {
                validators.push(next);
                Self::All(validators)
            }
            other => Self::All(vec![other, next]),
        }
    }

    pub fn validate(&self, request: &WireRequest, response: &Response) -> Result<()> {
        let method = request.method();
        let status = response.status().as_u16();
        match self {
            Self::Status(range) => {
                if range.contains(status) {
                    return Ok(());
                }
                Err(Error::InvalidStatusCode {
                    status,
                    method: method.clone(),
                    uri: request.redacted_uri(),
                    headers: Box::new(response.headers().clone()),
                    body: response.body().clone(),
                })
            }
            Self::ContentType(allowed) => {
                let actual = media_type(response.headers());
                let accepted = actual
                    .as_deref()
                    .is_some_and(|media_type| {
                        allowed
                            .iter()
                            .any(|candidate| candidate.trim().eq_ignore_ascii_case(media_type))
                    });
                if accepted {
                    return Ok(());
                }
                Err(Error::InvalidContentType {
                    actual,
                    method: method.clone(),
                    uri: request.redacted_uri(),
                })
            }
            Self::NonEmptyBody => {
                if !response.body().is_empty()
                    || BODYLESS_STATUSES.contains(&status)
                    || *method == Method::HEAD
                {
                    return Ok(());
                }
                Err(Error::NoData {
                    status,
                    method: method.clone(),
                    uri: request.redacted_uri(),
                })
            }
            Self::Json if response.body().is_empty() && BODYLESS_STATUSES.contains(&status) => Ok(()),
            Self::Json => serde_json::from_slice::<IgnoredAny>(response.body())
                .map(|_| ())
                .map_err(|source| Error::InvalidJson {
                    method: method.clone(),
                    uri: request.redacted_uri(),
                    source,
                }),
            Self::All(validators) => validators
                .iter()
                .try_for_each(|validator| validator.validate(request, response)),
            Self::Custom(check) => check(request, response),
        }
    }
}

impl Error {
    /// Rejection raised by a custom validator.
    pub fn validation(request: &WireRequest, message: impl Into<String>) -> Self {
        Self::Validation {
            method: request.method().clone(),
            uri: request.redacted_uri(),
            message: message.into(),
        }
    }
}

fn normalize_content_types<I, S>(content_types: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    content_types
        .into_iter()
        .map(|content_type| content_type.as_ref().trim().to_ascii_lowercase())
        .collect()
}
