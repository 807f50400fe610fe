//! Authentication through the running SSH agent.

use async_trait::async_trait;
use russh::{client, keys};
use tracing::{debug, info};

use crate::mcp::error::RemoteError;
use crate::mcp::transport::ssh::SshClientHandler;

use super::traits::{AuthStrategy, negotiated_rsa_hash};

/// Offers each identity held by the agent at `SSH_AUTH_SOCK` in turn.
///
/// The fallback when no password or key file is configured.
#[derive(Default)]
pub struct AgentAuth;

impl AgentAuth {
    pub fn new() -> Self {
        Self
    }
}

fn agent_error(what: &str, e: impl std::fmt::Display) -> RemoteError {
    RemoteError::Authentication(format!("ssh agent: {}: {}", what, e))
}

#[async_trait]
impl AuthStrategy for AgentAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, RemoteError> {
        let mut agent = keys::agent::client::AgentClient::connect_env()
            .await
            .map_err(|e| agent_error("cannot connect (is SSH_AUTH_SOCK set?)", e))?;
        let identities = agent
            .request_identities()
            .await
            .map_err(|e| agent_error("cannot list identities", e))?;
        if identities.is_empty() {
            return Err(agent_error("no identities loaded", "run ssh-add"));
        }

        let hash = negotiated_rsa_hash(handle).await;
        let offered = identities.len();
        for identity in identities {
            let comment = identity.comment().to_string();
            match handle
                .authenticate_publickey_with(username, identity, hash, &mut agent)
                .await
            {
                Ok(result) if result.success() => {
                    info!("Logged in as {} with agent identity {:?}", username, comment);
                    return Ok(true);
                }
                Ok(_) => debug!("Agent identity {:?} rejected", comment),
                Err(e) => debug!("Agent identity {:?} failed: {}", comment, e),
            }
        }

        debug!("All {} agent identities rejected for {}", offered, username);
        Ok(false)
    }

    fn name(&self) -> &'static str {
        "agent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        assert_eq!(AgentAuth::new().name(), "agent");
    }

    #[test]
    fn test_agent_errors_are_authentication_errors() {
        let err = agent_error("no identities loaded", "run ssh-add");
        assert!(matches!(err, RemoteError::Authentication(_)));
        assert!(err.to_string().contains("ssh agent: no identities loaded: run ssh-add"));
    }
}
