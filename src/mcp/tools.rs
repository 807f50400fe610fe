//! Tool façade: the named operations a controller can invoke.
//!
//! Every operation returns text. Failures are rendered as
//! `ERROR (<operation>): <description>` so a controller never needs error
//! handling to use these tools. Each call opens and closes its own
//! connection; nothing is shared between calls except the read-only
//! configuration.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::config::RemoteConfig;
use super::error::RemoteError;
use super::message::{
    RemoteCommandMessageBuilder, SyncMessageBuilder, download_message, error_message,
    upload_message,
};
use super::pty::run_remote_command;
use super::transfer::{
    TransferTimeouts, download_file, resolve_local, resolve_remote, sync_tree, upload_file,
};
use super::transport::{SshTransport, Transport};
use super::types::{DownloadInput, RunRemoteCommandInput, SyncInput, ToolSpec, UploadInput};

pub const RUN_REMOTE_COMMAND: &str = "run_remote_command";
pub const UPLOAD_TO_REMOTE: &str = "upload_to_remote";
pub const DOWNLOAD_FROM_REMOTE: &str = "download_from_remote";
pub const SYNC_TO_REMOTE: &str = "sync_to_remote";

/// Remote operations bound to one configuration and transport.
pub struct RemoteTools<T: Transport = SshTransport> {
    transport: T,
    config: Arc<RemoteConfig>,
}

impl RemoteTools<SshTransport> {
    /// Tools over real SSH connections.
    pub fn ssh(config: Arc<RemoteConfig>) -> Self {
        Self::new(SshTransport, config)
    }
}

impl<T: Transport> RemoteTools<T> {
    pub fn new(transport: T, config: Arc<RemoteConfig>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// The tool catalogue offered to controllers.
    pub fn catalog() -> Vec<ToolSpec> {
        vec![
            ToolSpec::for_input::<RunRemoteCommandInput>(
                RUN_REMOTE_COMMAND,
                "Run a shell command on the remote host inside an interactive session \
                 with the toolchain environment loaded. Returns the bootstrap output, \
                 the command output and the exit code.",
            ),
            ToolSpec::for_input::<UploadInput>(
                UPLOAD_TO_REMOTE,
                "Upload one local file to the remote host, creating remote directories.",
            ),
            ToolSpec::for_input::<DownloadInput>(
                DOWNLOAD_FROM_REMOTE,
                "Download one remote file, creating local directories.",
            ),
            ToolSpec::for_input::<SyncInput>(
                SYNC_TO_REMOTE,
                "Upload every source file of the local work directory to the remote \
                 work directory. Filters are fixed configuration.",
            ),
        ]
    }

    /// Invoke a tool by name with JSON arguments.
    pub async fn dispatch(&self, name: &str, arguments: serde_json::Value) -> String {
        match name {
            RUN_REMOTE_COMMAND => match parse_arguments::<RunRemoteCommandInput>(name, arguments) {
                Ok(input) => self.run_remote_command(&input.command).await,
                Err(message) => message,
            },
            UPLOAD_TO_REMOTE => match parse_arguments::<UploadInput>(name, arguments) {
                Ok(input) => {
                    self.upload_to_remote(&input.local_path, &input.remote_path)
                        .await
                }
                Err(message) => message,
            },
            DOWNLOAD_FROM_REMOTE => match parse_arguments::<DownloadInput>(name, arguments) {
                Ok(input) => {
                    self.download_from_remote(&input.remote_path, &input.local_path)
                        .await
                }
                Err(message) => message,
            },
            SYNC_TO_REMOTE => self.sync_to_remote().await,
            other => {
                warn!("Unknown remote tool requested: {}", other);
                format!("ERROR: Unknown remote tool '{}'", other)
            }
        }
    }

    /// Run `command` after the environment bootstrap, in a fresh session.
    pub async fn run_remote_command(&self, command: &str) -> String {
        if command.trim().is_empty() {
            return error_message(
                RUN_REMOTE_COMMAND,
                &RemoteError::Configuration("command must not be empty".to_string()),
            );
        }

        let target = match self.config.target() {
            Ok(target) => target,
            Err(e) => return error_message(RUN_REMOTE_COMMAND, &e),
        };
        let plan = self.config.session_plan(command);

        match run_remote_command(&self.transport, &target, &plan).await {
            Ok(result) => RemoteCommandMessageBuilder::new(&result).build(),
            Err(e) => error_message(RUN_REMOTE_COMMAND, &e),
        }
    }

    pub async fn upload_to_remote(&self, local_path: &str, remote_path: &str) -> String {
        let target = match self.config.target() {
            Ok(target) => target,
            Err(e) => return error_message(UPLOAD_TO_REMOTE, &e),
        };
        let local = resolve_local(&self.config.local_work_dir, local_path);
        let remote = resolve_remote(&self.config.remote_work_dir, remote_path);

        match upload_file(&self.transport, &target, &local, &remote, self.transfer_timeouts()).await
        {
            Ok(bytes) => {
                info!("Uploaded {} -> {}", local.display(), remote);
                upload_message(local_path, &remote, bytes)
            }
            Err(e) => error_message(UPLOAD_TO_REMOTE, &e),
        }
    }

    pub async fn download_from_remote(&self, remote_path: &str, local_path: &str) -> String {
        let target = match self.config.target() {
            Ok(target) => target,
            Err(e) => return error_message(DOWNLOAD_FROM_REMOTE, &e),
        };
        let remote = resolve_remote(&self.config.remote_work_dir, remote_path);
        let local = resolve_local(&self.config.local_work_dir, local_path);

        match download_file(&self.transport, &target, &remote, &local, self.transfer_timeouts())
            .await
        {
            Ok(bytes) => download_message(&remote, &local, bytes),
            Err(e) => error_message(DOWNLOAD_FROM_REMOTE, &e),
        }
    }

    pub async fn sync_to_remote(&self) -> String {
        let target = match self.config.target() {
            Ok(target) => target,
            Err(e) => return error_message(SYNC_TO_REMOTE, &e),
        };

        match sync_tree(
            &self.transport,
            &target,
            &self.config.local_work_dir,
            &self.config.remote_work_dir,
            &self.config.sync_filter,
            self.transfer_timeouts(),
        )
        .await
        {
            Ok(report) => SyncMessageBuilder::new(&report).build(),
            Err(e) => error_message(SYNC_TO_REMOTE, &e),
        }
    }

    fn transfer_timeouts(&self) -> TransferTimeouts {
        TransferTimeouts {
            connect: self.config.timeouts.connect,
            exec: self.config.timeouts.exec,
        }
    }
}

fn parse_arguments<I: DeserializeOwned>(tool: &str, arguments: serde_json::Value) -> Result<I, String> {
    // Controllers may send null for tools without arguments
    let arguments = if arguments.is_null() {
        serde_json::json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| {
        error_message(
            tool,
            &RemoteError::Configuration(format!("invalid arguments: {}", e)),
        )
    })
}
