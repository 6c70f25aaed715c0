//! Error taxonomy for the fetch and enrichment paths.
//!
//! Every variant has a short user-facing message (`user_message`) that never
//! includes status codes, URLs or transport details. `Display` is meant for logs.

use std::time::Duration;

/// Failures of a listing fetch (validation, local budget, upstream, parsing).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Bad input, never sent upstream. The message is shown to users as-is.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Local call budget exhausted.
    #[error("rate limited locally, retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("source not found")]
    SourceNotFound,

    #[error("source forbidden")]
    SourceForbidden,

    /// Overloaded/unavailable upstream or any other non-success status.
    #[error("upstream unavailable (status: {status:?})")]
    UpstreamUnavailable { status: Option<u16> },

    #[error("upstream request timed out")]
    Timeout,

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Short, stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidArgument(_) => "invalid_argument",
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::SourceNotFound => "source_not_found",
            FetchError::SourceForbidden => "source_forbidden",
            FetchError::UpstreamUnavailable { .. } => "upstream_unavailable",
            FetchError::Timeout => "timeout",
            FetchError::MalformedResponse(_) => "malformed_response",
        }
    }

    /// Whether the failure is attributable to the source name itself.
    pub fn is_source_specific(&self) -> bool {
        matches!(self, FetchError::SourceNotFound | FetchError::SourceForbidden)
    }

    /// Human-readable message safe to render to end users.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::InvalidArgument(msg) => msg.clone(),
            FetchError::RateLimited { retry_after_ms } => {
                let secs = Duration::from_millis(*retry_after_ms).as_secs_f64().ceil() as u64;
                format!("Too many requests. Please wait {secs} seconds before trying again.")
            }
            FetchError::SourceNotFound => {
                "Subreddit not found. Please check the subreddit name.".to_string()
            }
            FetchError::SourceForbidden => {
                "Access denied. This subreddit may be private or restricted.".to_string()
            }
            FetchError::UpstreamUnavailable { .. } => {
                "Upstream service temporarily unavailable. Please try again later.".to_string()
            }
            FetchError::Timeout => "Request timed out. Please try again.".to_string(),
            FetchError::MalformedResponse(_) => {
                "Received an unexpected response from upstream.".to_string()
            }
        }
    }
}

/// Failures of the enrichment (summary) path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrichError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage layer error; never retried internally.
    #[error("summary storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Generator failed or produced a blank result.
    #[error("summary generation failed: {0}")]
    GenerationFailed(String),
}

impl EnrichError {
    pub fn user_message(&self) -> String {
        match self {
            EnrichError::InvalidArgument(msg) => msg.clone(),
            EnrichError::StorageUnavailable(_) => "Summary storage is unavailable.".to_string(),
            EnrichError::GenerationFailed(_) => "Failed to generate summary".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_message_rounds_seconds_up() {
        let e = FetchError::RateLimited {
            retry_after_ms: 1_200,
        };
        assert_eq!(
            e.user_message(),
            "Too many requests. Please wait 2 seconds before trying again."
        );
    }

    #[test]
    fn user_messages_do_not_leak_status_codes() {
        let e = FetchError::UpstreamUnavailable { status: Some(502) };
        assert!(!e.user_message().contains("502"));
        assert!(e.to_string().contains("502"));
    }

    #[test]
    fn only_not_found_and_forbidden_are_source_specific() {
        assert!(FetchError::SourceNotFound.is_source_specific());
        assert!(FetchError::SourceForbidden.is_source_specific());
        assert!(!FetchError::Timeout.is_source_specific());
        assert!(!FetchError::RateLimited { retry_after_ms: 1 }.is_source_specific());
    }
}
