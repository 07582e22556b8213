use secrecy::SecretString;

/// Runtime context for a single inbound request
///
/// Carries the pieces of the HTTP request that provider adapters need
/// without coupling them to axum extractors.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Inbound request headers
    headers: http::HeaderMap,
    /// Caller-provided API key that overrides the configured provider key
    pub api_key: Option<SecretString>,
}

impl RequestContext {
    /// Build a context from inbound request headers
    ///
    /// Extracts a bearer token from the `Authorization` header, if present,
    /// so providers configured with `forward_authorization` can reuse it.
    pub fn from_headers(headers: http::HeaderMap) -> Self {
        let api_key = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| SecretString::from(token.to_owned()));

        Self { headers, api_key }
    }

    /// Create a minimal context for embedded (non-HTTP) use
    pub fn empty() -> Self {
        Self {
            headers: http::HeaderMap::new(),
            api_key: None,
        }
    }

    /// Access request headers
    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn empty_context_has_no_key() {
        let ctx = RequestContext::empty();
        assert!(ctx.api_key.is_none());
        assert!(ctx.headers().is_empty());
    }

    #[test]
    fn bearer_token_extracted() {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Bearer sk-test-123".parse().unwrap());

        let ctx = RequestContext::from_headers(headers);
        assert_eq!(ctx.api_key.unwrap().expose_secret(), "sk-test-123");
    }

    #[test]
    fn non_bearer_authorization_ignored() {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());

        let ctx = RequestContext::from_headers(headers);
        assert!(ctx.api_key.is_none());
    }
}
