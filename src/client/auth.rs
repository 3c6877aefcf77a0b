//! Bearer token sources for the remote analyzer.
//!
//! A token is fetched before every outbound attempt so rotated credentials
//! are picked up without restarting.

use async_trait::async_trait;

use crate::error::{AppError, Result};

/// Trait for bearer token providers.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a token for the next request.
    async fn token(&self) -> Result<String>;
}

/// Fixed token, mostly for tests and local deployments.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl TokenProvider for EnvToken {
    async fn token(&self) -> Result<String> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            Ok(_) => Err(AppError::Token(format!("{} is empty", self.var))),
            Err(_) => Err(AppError::Token(format!("{} is not set", self.var))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned() {
        assert_eq!(StaticToken::new("abc").token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn missing_env_var_is_a_token_error() {
        let provider = EnvToken::new("BIDREVIEW_TEST_TOKEN_THAT_IS_NEVER_SET");
        let err = provider.token().await.unwrap_err();

        assert!(matches!(err, AppError::Token(_)));
        assert!(!err.is_retryable());
        assert!(!err.trips_breaker());
    }
}
