use conduit_core::HttpError;
use conduit_schema::ValidationFailure;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified category of an upstream provider failure
///
/// Every provider error is classified into exactly one kind, once, near
/// the adapter. The fallback policy engine consumes the kind as data;
/// nothing downstream re-inspects status codes or bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Provider rejected the request due to rate or quota limits
    RateLimited,
    /// Provider's safety layer refused the content
    ContentModerated,
    /// Provider cannot honor the requested structured-output mode
    StructuredGenerationUnsupported,
    /// Timeout or connection-level failure that may succeed on retry
    TransientNetwork,
    /// Provider reported an internal failure or overload
    ProviderDown,
    /// The request itself is malformed; retrying cannot help
    InvalidRequest,
    /// Anything the classifier could not place
    Unknown,
}

impl ErrorKind {
    /// Stable snake_case name used in logs and error bodies
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::ContentModerated => "content_moderated",
            Self::StructuredGenerationUnsupported => "structured_generation_unsupported",
            Self::TransientNetwork => "transient_network",
            Self::ProviderDown => "provider_down",
            Self::InvalidRequest => "invalid_request",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the fallback policy engine may propose another candidate
    pub const fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::ContentModerated
                | Self::StructuredGenerationUnsupported
                | Self::TransientNetwork
                | Self::ProviderDown
        )
    }
}

/// An upstream failure carried as data rather than control flow
#[derive(Debug, Clone, Error)]
#[error("{message} [{}]", .kind.as_str())]
pub struct ProviderFailure {
    /// Classified failure category
    pub kind: ErrorKind,
    /// Detail from the provider or transport
    pub message: String,
    /// Upstream HTTP status, when one was received
    pub status: Option<u16>,
}

impl ProviderFailure {
    /// Build a failure without an HTTP status (transport-level)
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Build a failure from an upstream HTTP response
    pub fn with_status(kind: ErrorKind, message: impl Into<String>, status: u16) -> Self {
        Self {
            kind,
            message: message.into(),
            status: Some(status),
        }
    }
}

/// Errors surfaced by the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Requested model was not found in any configured provider
    #[error("model not found: {model}")]
    ModelNotFound {
        /// Requested model identifier
        model: String,
    },

    /// Named provider does not exist in configuration
    #[error("provider not found: {provider}")]
    ProviderNotFound {
        /// Requested provider name
        provider: String,
    },

    /// All fallback candidates exhausted; carries the last attempted pair
    #[error("{provider}/{model}: {failure}")]
    Provider {
        /// Last provider attempted
        provider: String,
        /// Last model attempted
        model: String,
        /// The classified failure from that attempt
        failure: ProviderFailure,
    },

    /// Model output does not conform to the caller's schema
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Error during streaming response delivery
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Cache store failed; handled as a miss, never surfaced mid-request
    #[error("cache store unavailable: {0}")]
    CacheStoreUnavailable(String),

    /// Conversation store failed; handled as a miss, never surfaced
    #[error("conversation store unavailable: {0}")]
    ConversationStoreUnavailable(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HttpError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ModelNotFound { .. } | Self::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Provider { failure, .. } => match failure.kind {
                ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                ErrorKind::ContentModerated => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Streaming(_)
            | Self::CacheStoreUnavailable(_)
            | Self::ConversationStoreUnavailable(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Self::ModelNotFound { .. } => "model_not_found",
            Self::ProviderNotFound { .. } => "provider_not_found",
            Self::Provider { failure, .. } => failure.kind.as_str(),
            Self::Validation(_) => "validation_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Streaming(_) => "streaming_error",
            Self::CacheStoreUnavailable(_) => "cache_store_unavailable",
            Self::ConversationStoreUnavailable(_) => "conversation_store_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds() {
        assert!(ErrorKind::RateLimited.is_recoverable());
        assert!(ErrorKind::ContentModerated.is_recoverable());
        assert!(ErrorKind::StructuredGenerationUnsupported.is_recoverable());
        assert!(ErrorKind::TransientNetwork.is_recoverable());
        assert!(ErrorKind::ProviderDown.is_recoverable());

        assert!(!ErrorKind::InvalidRequest.is_recoverable());
        assert!(!ErrorKind::Unknown.is_recoverable());
    }

    #[test]
    fn provider_error_surfaces_last_attempted_pair() {
        let error = GatewayError::Provider {
            provider: "openai".to_owned(),
            model: "gpt-4o".to_owned(),
            failure: ProviderFailure::with_status(ErrorKind::RateLimited, "too many requests", 429),
        };

        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error.error_code(), "rate_limited");
        assert!(error.client_message().contains("openai/gpt-4o"));
    }
}
