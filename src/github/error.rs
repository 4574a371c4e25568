use http::StatusCode;
use std::fmt;
use thiserror::Error;

/// Coarse classification of an API failure. The retry wrapper only looks at
/// this discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    RateLimited,
    NotFound,
    Other,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::RateLimited => write!(f, "rate limited"),
            ApiErrorKind::NotFound => write!(f, "not found"),
            ApiErrorKind::Other => write!(f, "error"),
        }
    }
}

/// A failed GitHub API call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed ({kind}): {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub operation: String,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn rate_limited(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::RateLimited, operation, message)
    }

    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, operation, message)
    }

    pub fn other(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Other, operation, message)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == ApiErrorKind::RateLimited
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid repository '{0}': expected owner/repo")]
pub struct InvalidRepoError(pub String);

/// Classify a GitHub error response.
///
/// GitHub reports primary and secondary rate limits as 403 or 429 with a
/// message (or documentation link) mentioning the rate limit. A bare 403 is a
/// permission problem and is not retried.
pub fn classify_response(
    status: StatusCode,
    message: &str,
    documentation_url: Option<&str>,
) -> ApiErrorKind {
    let is_rate_limit_status = matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
    );
    let mentions_rate_limit = message.to_lowercase().contains("rate limit")
        || documentation_url.is_some_and(|url| url.contains("rate-limit"));

    if is_rate_limit_status && mentions_rate_limit {
        ApiErrorKind::RateLimited
    } else if status == StatusCode::NOT_FOUND {
        ApiErrorKind::NotFound
    } else {
        ApiErrorKind::Other
    }
}

pub(crate) fn map_octocrab_error(operation: &str, error: &octocrab::Error) -> ApiError {
    if let octocrab::Error::GitHub { source, .. } = error {
        let kind = classify_response(
            source.status_code,
            &source.message,
            source.documentation_url.as_deref(),
        );
        return ApiError::new(
            kind,
            operation,
            format!("GitHub returned {}: {}", source.status_code, source.message),
        );
    }

    ApiError::other(operation, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_by_message() {
        let kind = classify_response(
            StatusCode::FORBIDDEN,
            "API rate limit exceeded for user ID 1.",
            None,
        );
        assert_eq!(kind, ApiErrorKind::RateLimited);
    }

    #[test]
    fn test_secondary_rate_limit_by_doc_url() {
        let kind = classify_response(
            StatusCode::TOO_MANY_REQUESTS,
            "You have exceeded a secondary limit",
            Some("https://docs.github.com/rest/overview/rate-limits-for-the-rest-api"),
        );
        assert_eq!(kind, ApiErrorKind::RateLimited);
    }

    #[test]
    fn test_plain_forbidden_is_not_rate_limit() {
        let kind = classify_response(StatusCode::FORBIDDEN, "Resource not accessible", None);
        assert_eq!(kind, ApiErrorKind::Other);
    }

    #[test]
    fn test_not_found() {
        let kind = classify_response(StatusCode::NOT_FOUND, "Not Found", None);
        assert_eq!(kind, ApiErrorKind::NotFound);
    }

    #[test]
    fn test_display_includes_operation_and_kind() {
        let err = ApiError::rate_limited("get pull request #7", "slow down");
        assert_eq!(err.to_string(), "get pull request #7 failed (rate limited): slow down");
        assert!(err.is_rate_limited());
    }
}
