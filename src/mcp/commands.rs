//! MCP tool implementations.
//!
//! Thin wrappers over [`RemoteTools`] for `poem-mcpserver`:
//!
//! - `run_remote_command`: Run a command after the environment bootstrap
//! - `upload_to_remote`: Upload one file
//! - `download_from_remote`: Download one file
//! - `sync_to_remote`: Upload the local work tree
//!
//! Every tool returns `Ok` text; failures are rendered as `ERROR (...)` lines.

use std::sync::Arc;

use poem_mcpserver::{Tools, content::Text};

use super::config::RemoteConfig;
use super::tools::RemoteTools;
use super::transport::SshTransport;

/// MCP remote tools over SSH.
pub struct McpRemoteTools {
    tools: RemoteTools<SshTransport>,
}

impl McpRemoteTools {
    pub fn new(config: Arc<RemoteConfig>) -> Self {
        Self {
            tools: RemoteTools::ssh(config),
        }
    }
}

#[Tools]
impl McpRemoteTools {
    /// Run a shell command on the remote host in an interactive session.
    ///
    /// The toolchain environment is loaded first. The reply contains a
    /// `[bootstrap: ...]` section, a `[command output]` section and an
    /// `[EXIT_CODE:n]` line. Long jobs that exceed the command timeout return
    /// their partial output with a `[WARNING: timed out ...]` line.
    async fn run_remote_command(
        &self,
        /// Shell command to run, e.g. "cd ~/work && make synth"
        command: String,
    ) -> Result<Text<String>, String> {
        Ok(Text(self.tools.run_remote_command(&command).await))
    }

    /// Upload one local file to the remote host. Remote parent directories
    /// are created as needed.
    async fn upload_to_remote(
        &self,
        /// Local file, relative to the local work directory or absolute
        local_path: String,
        /// Destination, relative to the remote work directory or absolute
        remote_path: String,
    ) -> Result<Text<String>, String> {
        Ok(Text(
            self.tools.upload_to_remote(&local_path, &remote_path).await,
        ))
    }

    /// Download one remote file. Local parent directories are created as
    /// needed.
    async fn download_from_remote(
        &self,
        /// Source file, relative to the remote work directory or absolute
        remote_path: String,
        /// Destination, relative to the local work directory or absolute
        local_path: String,
    ) -> Result<Text<String>, String> {
        Ok(Text(
            self.tools
                .download_from_remote(&remote_path, &local_path)
                .await,
        ))
    }

    /// Upload every source file of the local work directory to the remote
    /// work directory. Extensions and excluded names are fixed configuration.
    async fn sync_to_remote(&self) -> Result<Text<String>, String> {
        Ok(Text(self.tools.sync_to_remote().await))
    }
}
