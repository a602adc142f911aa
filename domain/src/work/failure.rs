//! Failure classification for worker errors.
//!
//! Worker failures arrive as free-form text (stderr, exception messages).
//! [`FailureKind::classify`] maps that text onto a small taxonomy that
//! drives the retry decision and the `termination_reason` label.
//!
//! | Kind | Retryable? | Termination reason |
//! |------|-----------|--------------------|
//! | `Authentication` | No | "authentication failure detected" |
//! | `RateLimit` | Yes | "rate limit pattern detected" |
//! | `ServerError` | Yes | "server error pattern detected" |
//! | `Timeout` | Yes | "timeout pattern detected" |
//! | `Other` | Yes | none |

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static AUTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(401|403)\b|unauthori[sz]ed|authentication|forbidden|permission denied|invalid api key|not logged in",
    )
    .unwrap()
});

static RATE_LIMIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b429\b|rate[ _-]?limit|too many requests|quota exceeded|usage limit").unwrap()
});

static SERVER_ERROR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b50[0234]\b|internal server error|service unavailable|bad gateway|gateway timeout|overloaded",
    )
    .unwrap()
});

static TIMEOUT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)timed out|time-?out|deadline exceeded").unwrap());

/// Classified kind of a worker failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimit,
    Authentication,
    Timeout,
    ServerError,
    Other,
}

impl FailureKind {
    /// Classify error text.
    ///
    /// Precedence: authentication > rate limit > server error > timeout.
    /// A "504 gateway timeout" is therefore a server error.
    ///
    /// ```
    /// use ensemble_domain::FailureKind;
    ///
    /// assert_eq!(FailureKind::classify("HTTP 429 Too Many Requests"), FailureKind::RateLimit);
    /// assert_eq!(FailureKind::classify("Error: invalid API key"), FailureKind::Authentication);
    /// assert_eq!(FailureKind::classify("segfault"), FailureKind::Other);
    /// ```
    pub fn classify(error_text: &str) -> Self {
        if AUTH_PATTERN.is_match(error_text) {
            FailureKind::Authentication
        } else if RATE_LIMIT_PATTERN.is_match(error_text) {
            FailureKind::RateLimit
        } else if SERVER_ERROR_PATTERN.is_match(error_text) {
            FailureKind::ServerError
        } else if TIMEOUT_PATTERN.is_match(error_text) {
            FailureKind::Timeout
        } else {
            FailureKind::Other
        }
    }

    /// Whether a failure of this kind may be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureKind::Authentication)
    }

    /// Label attached to `WorkResult::termination_reason` when a known pattern matched.
    pub fn termination_reason(&self) -> Option<&'static str> {
        match self {
            FailureKind::RateLimit => Some("rate limit pattern detected"),
            FailureKind::Authentication => Some("authentication failure detected"),
            FailureKind::Timeout => Some("timeout pattern detected"),
            FailureKind::ServerError => Some("server error pattern detected"),
            FailureKind::Other => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimit => "rate_limit",
            FailureKind::Authentication => "authentication",
            FailureKind::Timeout => "timeout",
            FailureKind::ServerError => "server_error",
            FailureKind::Other => "other",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
