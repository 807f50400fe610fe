//! Login password authentication.

use async_trait::async_trait;
use russh::client;
use tracing::debug;

use crate::mcp::error::{RemoteError, classify_transport_error};
use crate::mcp::transport::ssh::SshClientHandler;

use super::traits::AuthStrategy;

/// Presents `REMOTE_PASSWORD` to the server.
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, RemoteError> {
        if self.password.is_empty() {
            debug!("Empty password configured; not offering it");
            return Ok(false);
        }

        let accepted = handle
            .authenticate_password(username, &self.password)
            .await
            .map_err(|e| {
                classify_transport_error(format!(
                    "Password authentication failed for {}: {}",
                    username, e
                ))
            })?
            .success();
        debug!("Password for {} accepted: {}", username, accepted);
        Ok(accepted)
    }

    fn name(&self) -> &'static str {
        "password"
    }
}
