//! Sources for the GitHub API token.

use crate::error::TokenError;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

pub trait TokenProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn acquire(&self) -> Result<String, TokenError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

fn non_empty(token: Option<String>) -> Result<String, TokenError> {
    match token.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(TokenError::Empty),
    }
}

/// `GET <endpoint>` answering `{ "token": "..." }`
pub struct HttpTokenProvider {
    client: Client,
    endpoint: String,
}

impl HttpTokenProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TokenError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl TokenProvider for HttpTokenProvider {
    fn name(&self) -> &str {
        "token-endpoint"
    }

    fn acquire(&self) -> Result<String, TokenError> {
        debug!(endpoint = %self.endpoint, "Requesting GitHub token");
        let response = self.client.get(&self.endpoint).send()?;
        if !response.status().is_success() {
            return Err(TokenError::Status(response.status().as_u16()));
        }
        let body: TokenResponse = response.json()?;
        non_empty(body.token)
    }
}

/// Reads the token from an environment variable
pub struct EnvTokenProvider {
    var: &'static str,
}

impl EnvTokenProvider {
    pub fn new(var: &'static str) -> Self {
        Self { var }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new("GITHUB_TOKEN")
    }
}

impl TokenProvider for EnvTokenProvider {
    fn name(&self) -> &str {
        self.var
    }

    fn acquire(&self) -> Result<String, TokenError> {
        let value = std::env::var(self.var).map_err(|_| TokenError::MissingEnv(self.var))?;
        non_empty(Some(value))
    }
}

/// Asks an authenticated gh cli for its token
pub struct GhCliTokenProvider;

impl TokenProvider for GhCliTokenProvider {
    fn name(&self) -> &str {
        "gh"
    }

    fn acquire(&self) -> Result<String, TokenError> {
        let output = Command::new("gh")
            .args(["auth", "token"])
            .output()
            .map_err(|e| TokenError::Command(e.to_string()))?;

        if !output.status.success() {
            return Err(TokenError::Command(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        non_empty(Some(String::from_utf8_lossy(&output.stdout).to_string()))
    }
}

/// Tries each provider in order; the first token wins.
pub struct ChainTokenProvider {
    providers: Vec<Box<dyn TokenProvider>>,
}

impl ChainTokenProvider {
    pub fn new(providers: Vec<Box<dyn TokenProvider>>) -> Self {
        Self { providers }
    }
}

impl TokenProvider for ChainTokenProvider {
    fn name(&self) -> &str {
        "chain"
    }

    fn acquire(&self) -> Result<String, TokenError> {
        for provider in &self.providers {
            match provider.acquire() {
                Ok(token) => {
                    debug!(source = provider.name(), "Acquired GitHub token");
                    return Ok(token);
                }
                Err(err) => debug!(source = provider.name(), error = %err, "Token source failed"),
            }
        }
        Err(TokenError::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    impl TokenProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn acquire(&self) -> Result<String, TokenError> {
            non_empty(self.0.map(str::to_string))
        }
    }

    #[test]
    fn blank_tokens_are_rejected() {
        assert!(matches!(non_empty(None), Err(TokenError::Empty)));
        assert!(matches!(
            non_empty(Some("  \n".to_string())),
            Err(TokenError::Empty)
        ));
        assert_eq!(non_empty(Some("abc\n".to_string())).unwrap(), "abc");
    }

    #[test]
    fn chain_returns_first_success() {
        let chain = ChainTokenProvider::new(vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some("second"))),
            Box::new(Fixed(Some("third"))),
        ]);
        assert_eq!(chain.acquire().unwrap(), "second");
    }

    #[test]
    fn empty_chain_is_exhausted() {
        let chain = ChainTokenProvider::new(vec![Box::new(Fixed(None))]);
        assert!(matches!(chain.acquire(), Err(TokenError::Exhausted)));
    }

    #[test]
    fn missing_env_var_is_reported_by_name() {
        let provider = EnvTokenProvider::new("PRBOARD_TEST_TOKEN_THAT_IS_NEVER_SET");
        match provider.acquire() {
            Err(TokenError::MissingEnv(var)) => {
                assert_eq!(var, "PRBOARD_TEST_TOKEN_THAT_IS_NEVER_SET")
            }
            other => panic!("expected MissingEnv, got {:?}", other),
        }
    }
}
