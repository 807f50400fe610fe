//! Transport abstraction for reaching the remote host.
//!
//! A [`Transport`] produces an authenticated [`Connection`]. A connection can
//! run one-shot commands (structured stdout/stderr/exit status, no terminal)
//! or open an [`InteractiveChannel`]: a full-duplex pseudo-terminal stream with
//! no framing of its own. The interactive channel exists because the remote
//! toolchain is activated by a shell-local step whose effects do not survive
//! across independent one-shot invocations.
//!
//! # Lifecycle
//!
//! Connections are created per operation and never pooled. `close` must be
//! idempotent so callers can invoke it unconditionally on every exit path.
//!
//! The production implementation lives in [`ssh`]; tests drive the session
//! logic through in-memory implementations of the same traits.

pub(crate) mod auth;
pub(crate) mod ssh;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::error::RemoteError;

pub use ssh::SshTransport;

/// Fixed pseudo-terminal size requested for interactive sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGeometry {
    pub width: u32,
    pub height: u32,
}

impl Default for TerminalGeometry {
    fn default() -> Self {
        Self {
            width: 220,
            height: 50,
        }
    }
}

/// Credentials available for authentication.
///
/// Methods are tried in order: password, key file, then the SSH agent when
/// neither of the first two is configured.
#[derive(Clone, Default)]
pub struct Credentials {
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .finish()
    }
}

/// Fully validated connection parameters.
#[derive(Debug, Clone)]
pub struct RemoteTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credentials: Credentials,
}

impl RemoteTarget {
    /// `user@host:port` for log lines and messages.
    pub fn display(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Output of a one-shot command channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the server closed the channel without reporting a status.
    pub exit_code: Option<u32>,
}

/// Establishes connections to the remote host.
#[async_trait]
pub trait Transport: Send + Sync {
    type Connection: Connection;

    /// Connect and authenticate within `timeout`.
    ///
    /// Fails with [`RemoteError::Authentication`] on rejected credentials and
    /// [`RemoteError::Connect`] (or a connect-phase timeout) otherwise.
    async fn connect(
        &self,
        target: &RemoteTarget,
        timeout: Duration,
    ) -> Result<Self::Connection, RemoteError>;
}

/// An authenticated connection owned by exactly one operation.
#[async_trait]
pub trait Connection: Send {
    /// Run `command` on a one-shot channel and wait for it to terminate.
    async fn exec(&mut self, command: &str, timeout: Duration)
    -> Result<CommandOutput, RemoteError>;

    /// Open a pseudo-terminal shell channel of the given geometry.
    async fn open_interactive(
        &mut self,
        geometry: TerminalGeometry,
    ) -> Result<Box<dyn InteractiveChannel>, RemoteError>;

    /// Open the file-transfer sub-channel (SFTP) on this connection.
    async fn open_file_transfer(&mut self) -> Result<Box<dyn FileTransfer>, RemoteError>;

    /// Release the remote connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Live duplex terminal stream. The caller does all framing.
#[async_trait]
pub trait InteractiveChannel: Send {
    /// Write raw input (keystrokes, command lines) to the terminal.
    async fn send(&mut self, input: &str) -> Result<(), RemoteError>;

    /// Wait for the next fragment of terminal output.
    ///
    /// Returns `None` once the remote side has closed the stream. Must be
    /// cancel-safe: dropping the future loses no data.
    async fn next_chunk(&mut self) -> Option<String>;

    /// Close the channel. Safe to call more than once.
    async fn close(&mut self);
}

/// Point-to-point file copies over the file-transfer sub-channel.
///
/// Remote files are created or truncated, so repeating an upload leaves the
/// same remote content. Parent directories are the caller's concern.
#[async_trait]
pub trait FileTransfer: Send {
    /// Copy a local file to `remote`, returning the number of bytes written.
    async fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, RemoteError>;

    /// Copy `remote` to a local file, returning the number of bytes written.
    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64, RemoteError>;

    /// End the sub-channel. Safe to call more than once.
    async fn close(&mut self);
}

/// Parse address string into host and port components.
///
/// Supports `host:port` and bare `host` (default port 22). IPv6 addresses
/// must be bracketed (`[::1]` or `[::1]:22`); the brackets stay on the host.
pub(crate) fn parse_address(address: &str) -> Result<(String, u16), String> {
    if address.starts_with('[') && address.ends_with(']') {
        return Ok((address.to_string(), 22));
    }
    if !address.starts_with('[') && address.matches(':').count() > 1 {
        return Err(format!(
            "IPv6 address {:?} must be bracketed, e.g. [{}]:22",
            address, address
        ));
    }
    if let Some((host, port_str)) = address.rsplit_once(':') {
        let port = port_str
            .parse::<u16>()
            .map_err(|e| format!("Invalid port number: {}", e))?;
        Ok((host.to_string(), port))
    } else {
        Ok((address.to_string(), 22))
    }
}

/// Quote a value for safe interpolation into a remote `sh` command line.
pub(crate) fn shell_quote(value: &str) -> Result<String, RemoteError> {
    shlex::try_quote(value)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| RemoteError::Protocol(format!("cannot quote {:?}: {}", value, e)))
}
