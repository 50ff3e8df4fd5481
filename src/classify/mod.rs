// ABOUTME: Classifies registry tool failures from their stderr text.
// ABOUTME: Auth failures always win and are never treated as recoverable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel stderr produced by the subprocess layer when a command exceeds its deadline.
pub const TIMEOUT_SENTINEL: &str = "timeout";

/// Authentication/authorization failures. Permanent: no fallback can fix a credential problem.
pub const AUTH_PATTERNS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "denied",
    "authentication required",
    "access denied",
    "no basic auth credentials",
    "authentication failed",
    "not authorized",
    "authorization failed",
    "permission denied",
    "caller does not have permission",
    "request had insufficient authentication scopes",
];

pub const RATE_LIMIT_PATTERNS: &[&str] = &[
    "429",
    "toomanyrequests",
    "rate limit",
    "too many requests",
];

pub const NOT_FOUND_PATTERNS: &[&str] = &[
    "404",
    "not found",
    "manifest unknown",
    "does not exist",
    "no such image",
];

/// Network-level failures, recoverable like a timeout.
pub const CONNECTION_PATTERNS: &[&str] = &["no such host", "connection refused", "dial tcp"];

/// Closed set of registry failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    RateLimit,
    NotFound,
    Timeout,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Auth => "auth",
            FailureKind::RateLimit => "rate_limit",
            FailureKind::NotFound => "not_found",
            FailureKind::Timeout => "timeout",
            FailureKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn matches_any(stderr_lower: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| stderr_lower.contains(p))
}

pub fn is_auth_error(stderr: &str) -> bool {
    matches_any(&stderr.to_lowercase(), AUTH_PATTERNS)
}

pub fn is_rate_limit_error(stderr: &str) -> bool {
    matches_any(&stderr.to_lowercase(), RATE_LIMIT_PATTERNS)
}

pub fn is_not_found_error(stderr: &str) -> bool {
    matches_any(&stderr.to_lowercase(), NOT_FOUND_PATTERNS)
}

/// Classify a failure. The timeout sentinel is checked before any pattern,
/// then auth, rate limit and not-found in that order.
pub fn classify(stderr: &str) -> FailureKind {
    if stderr == TIMEOUT_SENTINEL {
        return FailureKind::Timeout;
    }

    let lower = stderr.to_lowercase();
    if matches_any(&lower, AUTH_PATTERNS) {
        FailureKind::Auth
    } else if matches_any(&lower, RATE_LIMIT_PATTERNS) {
        FailureKind::RateLimit
    } else if matches_any(&lower, NOT_FOUND_PATTERNS) {
        FailureKind::NotFound
    } else {
        FailureKind::Unknown
    }
}

/// Whether a fallback image or a delayed retry may succeed.
///
/// Never true for auth failures, whatever else the text contains.
pub fn is_recoverable(stderr: &str) -> bool {
    if stderr == TIMEOUT_SENTINEL {
        return true;
    }

    let lower = stderr.to_lowercase();
    if matches_any(&lower, AUTH_PATTERNS) {
        return false;
    }

    matches_any(&lower, NOT_FOUND_PATTERNS)
        || matches_any(&lower, RATE_LIMIT_PATTERNS)
        || matches_any(&lower, CONNECTION_PATTERNS)
}

/// Failures that re-running the same batch will not fix.
pub fn is_permanent(stderr: &str) -> bool {
    matches!(classify(stderr), FailureKind::Auth | FailureKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_sentinel_is_exact() {
        assert_eq!(classify("timeout"), FailureKind::Timeout);
        assert!(is_recoverable("timeout"));
        // Only the verbatim sentinel short-circuits.
        assert_eq!(classify("Timeout"), FailureKind::Unknown);
    }

    #[test]
    fn connection_errors_are_recoverable_but_unknown() {
        let stderr = "dial tcp 10.0.0.1:443: connect: connection refused";
        assert_eq!(classify(stderr), FailureKind::Unknown);
        assert!(is_recoverable(stderr));
    }

    #[test]
    fn auth_beats_rate_limit() {
        let stderr = "toomanyrequests: unauthorized";
        assert_eq!(classify(stderr), FailureKind::Auth);
        assert!(!is_recoverable(stderr));
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify("MANIFEST UNKNOWN"), FailureKind::NotFound);
        assert_eq!(classify("Too Many Requests"), FailureKind::RateLimit);
    }

    #[test]
    fn unknown_is_not_recoverable() {
        assert_eq!(classify("disk full"), FailureKind::Unknown);
        assert!(!is_recoverable("disk full"));
    }

    #[test]
    fn permanent_covers_auth_and_not_found() {
        assert!(is_permanent("unauthorized: authentication required"));
        assert!(is_permanent("manifest unknown: image not found"));
        assert!(!is_permanent("Connection timeout"));
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::RateLimit).unwrap();
        assert_eq!(json, "\"rate_limit\"");
    }
}
