//! Session-validity oracle.
//!
//! Whoever embeds the viewer asks this before opening a session. The viewer
//! core never calls it; token exchange and validation live behind it.

use async_trait::async_trait;

/// Answers "may this caller view streams right now"
#[async_trait]
pub trait SessionValidity: Send + Sync {
    async fn is_authenticated(&self) -> bool;
}

/// Plain predicates work as oracles
#[async_trait]
impl<F> SessionValidity for F
where
    F: Fn() -> bool + Send + Sync,
{
    async fn is_authenticated(&self) -> bool {
        self()
    }
}

/// Oracle backed by the presence of a non-empty bearer token
#[derive(Debug, Clone, Default)]
pub struct TokenPresence {
    token: Option<String>,
}

impl TokenPresence {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// Read the token from an environment variable
    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).ok())
    }
}

#[async_trait]
impl SessionValidity for TokenPresence {
    async fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_oracle() {
        let allow = || true;
        let deny = || false;
        assert!(allow.is_authenticated().await);
        assert!(!deny.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_token_presence() {
        assert!(TokenPresence::new(Some("abc".into())).is_authenticated().await);
        assert!(!TokenPresence::new(Some("  ".into())).is_authenticated().await);
        assert!(!TokenPresence::new(None).is_authenticated().await);
    }
}
