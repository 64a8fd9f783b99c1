use thiserror::Error;

/// Classification of an upstream provider failure.
///
/// Decides whether failover advances to the next candidate: everything except
/// `InvalidInput` is worth retrying against a different provider, while an
/// input rejection cannot be fixed by switching backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The attempt exceeded its deadline.
    Timeout,
    /// The provider could not be reached.
    Connection,
    /// The provider returned a 5xx-equivalent status.
    Upstream,
    /// The provider rejected the caller's input (content policy, malformed prompt).
    InvalidInput,
}

impl ErrorClass {
    /// Whether failover should advance to the next candidate after this failure.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidInput)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connection => write!(f, "connection"),
            Self::Upstream => write!(f, "upstream"),
            Self::InvalidInput => write!(f, "invalid_input"),
        }
    }
}

/// Core engine errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Rate limited: retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Unavailable: {message}")]
    Unavailable { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Raw provider failure. Never returned to callers verbatim; the
    /// orchestrator sanitizes it and keeps the detail in server-side logs.
    #[error("Provider error: {provider} ({class}) - {detail}")]
    Upstream {
        provider: String,
        class: ErrorClass,
        detail: String,
    },
}

impl GatewayError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        Self::RateLimited {
            retry_after_seconds,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn upstream(
        provider: impl Into<String>,
        class: ErrorClass,
        detail: impl Into<String>,
    ) -> Self {
        Self::Upstream {
            provider: provider.into(),
            class,
            detail: detail.into(),
        }
    }

    /// Classify this error for failover purposes.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Upstream { class, .. } => *class,
            Self::InvalidArgument { .. } => ErrorClass::InvalidInput,
            _ => ErrorClass::Upstream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let error = GatewayError::invalid_argument("no candidate providers");
        assert_eq!(
            error.to_string(),
            "Invalid argument: no candidate providers"
        );
    }

    #[test]
    fn test_error_class_retryability() {
        assert!(ErrorClass::Timeout.is_retryable());
        assert!(ErrorClass::Connection.is_retryable());
        assert!(ErrorClass::Upstream.is_retryable());
        assert!(!ErrorClass::InvalidInput.is_retryable());
    }

    #[test]
    fn test_classify_upstream() {
        let error = GatewayError::upstream("openai", ErrorClass::Timeout, "deadline exceeded");
        assert_eq!(error.classify(), ErrorClass::Timeout);
    }

    #[test]
    fn test_classify_invalid_argument_is_fatal() {
        let error = GatewayError::invalid_argument("empty prompt");
        assert!(!error.classify().is_retryable());
    }
}
