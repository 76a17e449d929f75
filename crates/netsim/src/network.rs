//! Network Request Model
//!
//! Requests, synthetic responses, abort reasons and URL patterns shared by
//! the route interceptor, the upstreams and every condition strategy.
//!
//! ## Toyota Way Application
//!
//! - **Poka-Yoke**: URL patterns are compiled once, so an invalid regex fails
//!   at registration time instead of silently never matching
//! - **Muda**: Only intercept relevant requests

use crate::result::{NetsimError, NetsimResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reasons for aborting a network request, one per error the strategies
/// inject plus the timeout and offline outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbortReason {
    /// Request failed
    Failed,
    /// Request timed out
    TimedOut,
    /// Internet is disconnected
    InternetDisconnected,
    /// DNS name could not be resolved
    NameNotResolved,
}

impl AbortReason {
    /// Get the browser error message for this abort reason
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Failed => "net::ERR_FAILED",
            Self::TimedOut => "net::ERR_TIMED_OUT",
            Self::InternetDisconnected => "net::ERR_INTERNET_DISCONNECTED",
            Self::NameNotResolved => "net::ERR_NAME_NOT_RESOLVED",
        }
    }

    /// Short error code, as accepted by route abort APIs (`failed`, `timedout`, ...)
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::TimedOut => "timedout",
            Self::InternetDisconnected => "internetdisconnected",
            Self::NameNotResolved => "namenotresolved",
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// HTTP methods for request matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
    /// PATCH request
    Patch,
    /// HEAD request
    Head,
    /// OPTIONS request
    Options,
    /// Any method
    Any,
}

impl HttpMethod {
    /// Parse from string, unknown verbs map to `Any`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => Self::Any,
        }
    }

    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "*",
        }
    }

    /// Check if this method matches another
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        *self == Self::Any || *other == Self::Any || *self == *other
    }
}

/// An outbound request leaving the browsing context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptedRequest {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body
    pub body: Option<Vec<u8>>,
}

impl InterceptedRequest {
    /// Create a new request
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Create a GET request
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Create a POST request with a body
    #[must_use]
    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(HttpMethod::Post, url).with_body(body)
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Set body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Get body as string
    #[must_use]
    pub fn body_string(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).to_string())
    }

    /// Path component of the URL (everything after the authority, query included)
    #[must_use]
    pub fn path(&self) -> &str {
        let rest = self
            .url
            .split_once("://")
            .map_or(self.url.as_str(), |(_, rest)| rest);
        rest.find('/').map_or("/", |idx| &rest[idx..])
    }
}

/// A synthetic or fetched HTTP response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Vec<u8>,
    /// Content type
    pub content_type: String,
}

impl Default for FulfillResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
            content_type: "application/json".to_string(),
        }
    }
}

impl FulfillResponse {
    /// Create a new empty 200 response
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSON response
    pub fn json<T: Serialize>(data: &T) -> NetsimResult<Self> {
        let body = serde_json::to_vec(data)?;
        Ok(Self {
            body,
            ..Self::default()
        })
    }

    /// Create a text response
    #[must_use]
    pub fn text(content: &str) -> Self {
        Self {
            body: content.as_bytes().to_vec(),
            content_type: "text/plain".to_string(),
            ..Self::default()
        }
    }

    /// Create a server-sent events response
    #[must_use]
    pub fn event_stream(events: &str) -> Self {
        Self {
            body: events.as_bytes().to_vec(),
            content_type: "text/event-stream".to_string(),
            ..Self::default()
        }
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set body
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Set content type
    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    /// Case-insensitive header lookup
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Declared `content-length`, if present and numeric
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|value| value.trim().parse().ok())
    }

    /// Payload size: declared length, falling back to the body length
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        self.content_length().unwrap_or(self.body.len() as u64)
    }

    /// Whether this is a `text/event-stream` response
    #[must_use]
    pub fn is_event_stream(&self) -> bool {
        let content_type = self.header("content-type").unwrap_or(&self.content_type);
        content_type
            .to_ascii_lowercase()
            .starts_with("text/event-stream")
    }

    /// Get body as string
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse body as JSON
    pub fn body_json<T: for<'de> Deserialize<'de>>(&self) -> NetsimResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Pattern for matching request URLs
///
/// Regexes are compiled when the pattern is built, never per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PatternSpec", into = "PatternSpec")]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Contains at least one of the substrings
    ContainsAny(Vec<String>),
    /// Regex match
    Regex(Regex),
    /// Glob pattern (e.g., "**/api/users/*")
    Glob(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Substring pattern
    #[must_use]
    pub fn contains(needle: impl Into<String>) -> Self {
        Self::Contains(needle.into())
    }

    /// Pattern matching URLs containing any of `needles`
    #[must_use]
    pub fn contains_any<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ContainsAny(needles.into_iter().map(Into::into).collect())
    }

    /// Compile a regex pattern
    pub fn regex(pattern: &str) -> NetsimResult<Self> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern.as_str()),
            Self::Contains(pattern) => url.contains(pattern.as_str()),
            Self::ContainsAny(needles) => needles.iter().any(|n| url.contains(n.as_str())),
            Self::Regex(re) => re.is_match(url),
            Self::Glob(pattern) => Self::glob_matches(pattern, url),
            Self::Any => true,
        }
    }

    /// Simple glob matching for URLs
    fn glob_matches(pattern: &str, url: &str) -> bool {
        let parts: Vec<&str> = pattern.split('*').collect();
        let mut pos = 0;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            match url[pos..].find(part) {
                Some(found) if i == 0 && found != 0 => return false,
                Some(found) => pos += found + part.len(),
                None => return false,
            }
        }

        // A trailing '*' accepts any remainder
        pattern.ends_with('*') || pos == url.len()
    }
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(s) | Self::Prefix(s) | Self::Contains(s) | Self::Glob(s) => {
                write!(f, "{}", s)
            }
            Self::ContainsAny(needles) => write!(f, "{}", needles.join("|")),
            Self::Regex(re) => write!(f, "{}", re.as_str()),
            Self::Any => write!(f, "*"),
        }
    }
}

/// Serialized form of [`UrlPattern`] (regex kept as source text)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSpec {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Contains at least one substring
    ContainsAny(Vec<String>),
    /// Regex source
    Regex(String),
    /// Glob pattern
    Glob(String),
    /// Match any URL
    Any,
}

impl TryFrom<PatternSpec> for UrlPattern {
    type Error = NetsimError;

    fn try_from(value: PatternSpec) -> Result<Self, Self::Error> {
        Ok(match value {
            PatternSpec::Exact(s) => Self::Exact(s),
            PatternSpec::Prefix(s) => Self::Prefix(s),
            PatternSpec::Contains(s) => Self::Contains(s),
            PatternSpec::ContainsAny(v) => Self::ContainsAny(v),
            PatternSpec::Regex(s) => Self::regex(&s)?,
            PatternSpec::Glob(s) => Self::Glob(s),
            PatternSpec::Any => Self::Any,
        })
    }
}

impl From<UrlPattern> for PatternSpec {
    fn from(pattern: UrlPattern) -> Self {
        match pattern {
            UrlPattern::Exact(s) => Self::Exact(s),
            UrlPattern::Prefix(s) => Self::Prefix(s),
            UrlPattern::Contains(s) => Self::Contains(s),
            UrlPattern::ContainsAny(v) => Self::ContainsAny(v),
            UrlPattern::Regex(re) => Self::Regex(re.as_str().to_string()),
            UrlPattern::Glob(s) => Self::Glob(s),
            UrlPattern::Any => Self::Any,
        }
    }
}
