//! Authentication chain for trying multiple strategies.

use std::path::PathBuf;

use async_trait::async_trait;
use russh::client;
use tracing::debug;

use crate::mcp::error::RemoteError;
use crate::mcp::transport::Credentials;
use crate::mcp::transport::ssh::SshClientHandler;

use super::traits::AuthStrategy;
use super::{AgentAuth, KeyAuth, PasswordAuth};

/// Ordered list of strategies; the first one the server accepts wins.
///
/// ```ignore
/// let chain = AuthChain::from_credentials(&target.credentials);
/// chain.authenticate(&mut handle, &target.user).await?;
/// ```
pub struct AuthChain {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Build the chain for the configured credentials.
    ///
    /// Password first, then key file. With neither configured the SSH agent
    /// is the only strategy.
    pub fn from_credentials(credentials: &Credentials) -> Self {
        let mut chain = Self::new();

        if let Some(password) = &credentials.password {
            chain = chain.with_password(password.clone());
        }
        if let Some(key_path) = &credentials.key_path {
            chain = chain.with_key(key_path.clone());
        }
        if chain.is_empty() {
            chain = chain.with_agent();
        }

        chain
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.strategies.push(Box::new(PasswordAuth::new(password)));
        self
    }

    pub fn with_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.strategies.push(Box::new(KeyAuth::new(key_path)));
        self
    }

    pub fn with_agent(mut self) -> Self {
        self.strategies.push(Box::new(AgentAuth::new()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    #[cfg(test)]
    fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl Default for AuthChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthStrategy for AuthChain {
    /// Never returns `Ok(false)`: exhausting the chain is an
    /// [`RemoteError::Authentication`] carrying the last failure.
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, RemoteError> {
        if self.strategies.is_empty() {
            return Err(RemoteError::Authentication(
                "No authentication strategies configured".to_string(),
            ));
        }

        let mut last_error = None;

        for strategy in &self.strategies {
            debug!("Trying authentication strategy: {}", strategy.name());

            match strategy.authenticate(handle, username).await {
                Ok(true) => {
                    debug!("Authenticated with strategy: {}", strategy.name());
                    return Ok(true);
                }
                Ok(false) => {
                    last_error = Some(RemoteError::Authentication(format!(
                        "{} authentication rejected",
                        strategy.name()
                    )));
                }
                // A dropped connection will not recover for the next strategy
                Err(e @ RemoteError::Connect(_)) => return Err(e),
                Err(e) => {
                    debug!("Strategy {} failed: {}", strategy.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            RemoteError::Authentication("All authentication methods failed".to_string())
        }))
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
