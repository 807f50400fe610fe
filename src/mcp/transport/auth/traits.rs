//! Authentication strategy trait definition.

use async_trait::async_trait;
use russh::{client, keys};

use crate::mcp::error::RemoteError;
use crate::mcp::transport::ssh::SshClientHandler;

/// One way of proving identity to the SSH server.
///
/// Implementations must be `Send + Sync` so a chain can be held across
/// await points inside the connect future.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate `username` on an open, unauthenticated handle.
    ///
    /// * `Ok(true)` - the server accepted the credential
    /// * `Ok(false)` - the server rejected it; the next strategy may be tried
    /// * `Err(_)` - the credential could not even be presented (unreadable
    ///   key, no agent, transport failure)
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, RemoteError>;

    /// Short name used in log lines and error messages.
    fn name(&self) -> &'static str;
}

/// Signature hash to pair with an RSA key, as negotiated by the server.
///
/// `None` means either a non-RSA server preference or a server that did not
/// advertise one; russh then falls back to its own default.
pub(super) async fn negotiated_rsa_hash(
    handle: &client::Handle<SshClientHandler>,
) -> Option<keys::HashAlg> {
    handle.best_supported_rsa_hash().await.ok().flatten().flatten()
}
