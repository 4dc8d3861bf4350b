//! Response classification: maps an HTTP status code to a typed outcome.
//!
//! The classifier is a pure function of the numeric status code. Headers and body never
//! influence the outcome; the deprecation header only triggers a warning elsewhere.
//!
//! | Status | Outcome |
//! |--------|---------|
//! | 500, 503, other >= 500 | [`ErrorKind::ServerError`] |
//! | 429 | [`ErrorKind::RateLimited`] |
//! | 415 | [`ErrorKind::UnsupportedMedia`] |
//! | 404 | [`ErrorKind::NotFound`] |
//! | 403 | [`ErrorKind::Forbidden`] |
//! | 401 | [`ErrorKind::Unauthorized`] |
//! | 400 | [`ErrorKind::BadRequest`] |
//! | other 4xx | [`ErrorKind::UnspecifiedClientError`] |
//! | anything else | [`Outcome::Success`] |
//!
//! ## Example
//!
//! ```rust
//! use callgate::classify::{classify, ErrorKind, Outcome};
//!
//! assert_eq!(classify(429), Outcome::Failure(ErrorKind::RateLimited));
//! assert!(classify(200).is_success());
//! ```

use std::fmt;

/// Every way a single call can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A before-hook vetoed the call, typically rate-limit exhaustion
    RequestAborted,
    /// Replay requested, no recorded fixture, recording disabled
    FixtureMissing,
    /// No response was obtained at all
    TransportFailure,
    /// 500, 503 and any unlisted status >= 500
    ServerError,
    /// 429
    RateLimited,
    /// 415
    UnsupportedMedia,
    /// 404
    NotFound,
    /// 403
    Forbidden,
    /// 401
    Unauthorized,
    /// 400
    BadRequest,
    /// Any unlisted 4xx
    UnspecifiedClientError,
}

impl ErrorKind {
    /// Returns the stable name (e.g., `"rate_limited"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestAborted => "request_aborted",
            Self::FixtureMissing => "fixture_missing",
            Self::TransportFailure => "transport_failure",
            Self::ServerError => "server_error",
            Self::RateLimited => "rate_limited",
            Self::UnsupportedMedia => "unsupported_media",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Unauthorized => "unauthorized",
            Self::BadRequest => "bad_request",
            Self::UnspecifiedClientError => "unspecified_client_error",
        }
    }

    /// Whether a caller may reasonably retry after backoff.
    ///
    /// Advisory only: the pipeline itself never retries.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::TransportFailure
        )
    }

    /// Human-readable summary used as the error message prefix.
    fn summary(&self, status: u16) -> String {
        match (self, status) {
            (Self::ServerError, 503) => "Service is temporarily unavailable.".to_string(),
            (Self::ServerError, 500) => "Internal server error occured.".to_string(),
            (Self::RateLimited, _) => "Rate limit for this API key was exceeded.".to_string(),
            (Self::UnsupportedMedia, _) => "Unsupported media type.".to_string(),
            (Self::NotFound, _) => "Not Found.".to_string(),
            (Self::Forbidden, _) => "Forbidden.".to_string(),
            (Self::Unauthorized, _) => "Unauthorized.".to_string(),
            (Self::BadRequest, _) => "Request is invalid.".to_string(),
            _ => format!("Unspecified error occured ({}).", status),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of classifying one status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(ErrorKind),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Map an HTTP status code to its outcome.
pub fn classify(status: u16) -> Outcome {
    let kind = match status {
        503 | 500 => ErrorKind::ServerError,
        429 => ErrorKind::RateLimited,
        415 => ErrorKind::UnsupportedMedia,
        404 => ErrorKind::NotFound,
        403 => ErrorKind::Forbidden,
        401 => ErrorKind::Unauthorized,
        400 => ErrorKind::BadRequest,
        s if s >= 500 => ErrorKind::ServerError,
        s if s >= 400 => ErrorKind::UnspecifiedClientError,
        _ => return Outcome::Success,
    };
    Outcome::Failure(kind)
}

/// Turn a classified failure into the crate error, pulling `status.message` out of a JSON body.
pub(crate) fn remote_error(status: u16, kind: ErrorKind, body: &str) -> crate::Error {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("status")
                .and_then(|s| s.get("message"))
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
        });
    let summary = kind.summary(status);
    let message = match detail {
        Some(d) if !d.is_empty() => format!("{} {}", summary, d),
        _ => summary,
    };
    crate::Error::Remote {
        status,
        kind,
        message,
    }
}
