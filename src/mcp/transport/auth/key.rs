//! Private key file authentication (`REMOTE_KEY`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::mcp::error::{RemoteError, classify_transport_error};
use crate::mcp::transport::ssh::SshClientHandler;

use super::traits::{AuthStrategy, negotiated_rsa_hash};

/// Public key login with an unencrypted private key file.
pub struct KeyAuth {
    key_path: PathBuf,
}

impl KeyAuth {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    fn load(&self) -> Result<keys::PrivateKey, RemoteError> {
        if !self.key_path.is_file() {
            return Err(RemoteError::Authentication(format!(
                "key file {} does not exist",
                self.key_path.display()
            )));
        }
        // Passphrases are not configurable, so an encrypted key fails here
        keys::load_secret_key(&self.key_path, None).map_err(|e| {
            RemoteError::Authentication(format!(
                "cannot read key file {}: {}",
                self.key_path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, RemoteError> {
        let key = self.load()?;
        let hash = negotiated_rsa_hash(handle).await;
        debug!(
            "Offering key {} for {} (rsa hash {:?})",
            self.key_path.display(),
            username,
            hash
        );

        let accepted = handle
            .authenticate_publickey(username, keys::PrivateKeyWithHashAlg::new(Arc::new(key), hash))
            .await
            .map_err(|e| {
                classify_transport_error(format!("Key authentication failed for {}: {}", username, e))
            })?
            .success();
        Ok(accepted)
    }

    fn name(&self) -> &'static str {
        "key"
    }
}
