//! russh-backed implementation of the transport traits.
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: keepalive every 30 seconds, no inactivity
//!    timeout. Remote jobs may stay silent for minutes; deadlines are enforced
//!    by the session driver instead.
//!
//! 2. **Connection Establishment**: TCP connect plus handshake bounded by the
//!    connect timeout.
//!
//! 3. **Authentication**: [`AuthChain`] built from the configured credentials,
//!    bounded by the same timeout.
//!
//! 4. **Channels**: one-shot `exec` channels, PTY shell channels and the
//!    `sftp` subsystem are all opened on the same handle.
//!
//! 5. **Teardown**: `close` sends an application disconnect exactly once.
//!
//! Host keys are accepted without verification, like
//! `StrictHostKeyChecking=no`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::{ChannelMsg, Disconnect, client, keys};
use russh_sftp::client::SftpSession;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::auth::{AuthChain, AuthStrategy};
use super::{
    CommandOutput, Connection, FileTransfer, InteractiveChannel, RemoteTarget, TerminalGeometry,
    Transport,
};
use crate::mcp::error::{RemoteError, TimeoutPhase, classify_transport_error};

/// Terminal type announced in the PTY request.
const TERM: &str = "xterm";

/// Client handler for russh that accepts all host keys.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Build the russh client configuration.
///
/// No inactivity timeout: a remote build may print nothing for longer than
/// any sensible idle limit, and every wait in this crate has its own deadline.
pub(crate) fn build_client_config() -> Arc<client::Config> {
    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    })
}

/// Connects with russh. Stateless; one value serves the whole process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshTransport;

#[async_trait]
impl Transport for SshTransport {
    type Connection = SshConnection;

    async fn connect(
        &self,
        target: &RemoteTarget,
        timeout: Duration,
    ) -> Result<SshConnection, RemoteError> {
        let label = target.display();
        info!("Connecting to {} (timeout {:?})", label, timeout);

        // Brackets are URL syntax, not part of the resolvable host name
        let host = target.host.trim_start_matches('[').trim_end_matches(']');

        let connect_future = client::connect(
            build_client_config(),
            (host, target.port),
            SshClientHandler,
        );

        let mut handle = tokio::time::timeout(timeout, connect_future)
            .await
            .map_err(|_| RemoteError::timeout(TimeoutPhase::Connect, timeout))?
            .map_err(|e| classify_transport_error(format!("Failed to connect: {}", e)))?;

        let chain = AuthChain::from_credentials(&target.credentials);
        let auth = tokio::time::timeout(timeout, chain.authenticate(&mut handle, &target.user))
            .await
            .map_err(|_| RemoteError::timeout(TimeoutPhase::Connect, timeout))
            .and_then(|result| result)
            .and_then(|accepted| {
                if accepted {
                    Ok(())
                } else {
                    Err(RemoteError::Authentication(
                        "All authentication methods failed".to_string(),
                    ))
                }
            });

        if let Err(e) = auth {
            warn!("Authentication to {} failed: {}", label, e);
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(e);
        }

        info!("Connected to {}", label);
        Ok(SshConnection {
            handle: Some(handle),
            label,
        })
    }
}

/// One authenticated SSH connection.
pub struct SshConnection {
    handle: Option<client::Handle<SshClientHandler>>,
    label: String,
}

impl SshConnection {
    fn handle(&self) -> Result<&client::Handle<SshClientHandler>, RemoteError> {
        self.handle
            .as_ref()
            .ok_or_else(|| RemoteError::Channel(format!("connection to {} is closed", self.label)))
    }

    async fn open_session_channel(&self) -> Result<russh::Channel<client::Msg>, RemoteError> {
        self.handle()?
            .channel_open_session()
            .await
            .map_err(|e| RemoteError::Channel(format!("Failed to open channel: {}", e)))
    }
}

#[async_trait]
impl Connection for SshConnection {
    async fn exec(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, RemoteError> {
        let mut channel = self.open_session_channel().await?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| RemoteError::Channel(format!("Failed to execute command: {}", e)))?;

        let mut stdout = Vec::with_capacity(1024);
        let mut stderr = Vec::new();
        let mut exit_code: Option<u32> = None;

        let finished = tokio::time::timeout(timeout, async {
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                    // ext == 1 is stderr in SSH protocol
                    Some(ChannelMsg::ExtendedData { data, ext }) if ext == 1 => {
                        stderr.extend_from_slice(&data)
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                    Some(ChannelMsg::Eof) if exit_code.is_some() => break,
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }
        })
        .await;

        let _ = channel.close().await;

        if finished.is_err() {
            warn!("One-shot command timed out after {:?}: {}", timeout, command);
            return Err(RemoteError::timeout(TimeoutPhase::Exec, timeout));
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }

    async fn open_interactive(
        &mut self,
        geometry: TerminalGeometry,
    ) -> Result<Box<dyn InteractiveChannel>, RemoteError> {
        let channel = self.open_session_channel().await?;

        channel
            .request_pty(false, TERM, geometry.width, geometry.height, 0, 0, &[])
            .await
            .map_err(|e| RemoteError::Channel(format!("Failed to request PTY: {}", e)))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| RemoteError::Channel(format!("Failed to start shell: {}", e)))?;

        debug!(
            "Opened {}x{} PTY shell on {}",
            geometry.width, geometry.height, self.label
        );

        Ok(Box::new(SshShell {
            channel,
            pending: Vec::new(),
            open: true,
        }))
    }

    async fn open_file_transfer(&mut self) -> Result<Box<dyn FileTransfer>, RemoteError> {
        let channel = self.open_session_channel().await?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| RemoteError::Transfer(format!("Failed to request sftp subsystem: {}", e)))?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| RemoteError::Transfer(format!("Failed to start SFTP session: {}", e)))?;

        Ok(Box::new(SftpTransfer {
            sftp: Some(sftp),
        }))
    }

    async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Disconnecting from {}", self.label);
            if let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "operation complete", "en")
                .await
            {
                debug!("Error during disconnect from {}: {}", self.label, e);
            }
        }
    }
}

/// PTY shell channel.
struct SshShell {
    channel: russh::Channel<client::Msg>,
    /// Trailing bytes of a UTF-8 sequence split across two packets
    pending: Vec<u8>,
    open: bool,
}

#[async_trait]
impl InteractiveChannel for SshShell {
    async fn send(&mut self, input: &str) -> Result<(), RemoteError> {
        self.channel
            .data(input.as_bytes())
            .await
            .map_err(|e| RemoteError::Channel(format!("Failed to write to shell: {}", e)))
    }

    async fn next_chunk(&mut self) -> Option<String> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    let text = decode_utf8_chunk(&mut self.pending, &data);
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    self.open = false;
                    return None;
                }
                Some(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            let _ = self.channel.eof().await;
            let _ = self.channel.close().await;
        }
    }
}

/// Decode `data` appended to `pending`, keeping an incomplete trailing
/// UTF-8 sequence in `pending` for the next packet. Invalid bytes become
/// U+FFFD.
pub(crate) fn decode_utf8_chunk(pending: &mut Vec<u8>, data: &[u8]) -> String {
    pending.extend_from_slice(data);
    let mut out = String::with_capacity(pending.len());
    let mut rest: &[u8] = pending;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                rest = &[];
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                // valid_up_to guarantees this prefix is UTF-8
                out.push_str(&String::from_utf8_lossy(valid));
                match e.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[bad..];
                    }
                    // Incomplete sequence at the end: wait for more bytes
                    None => {
                        rest = after;
                        break;
                    }
                }
            }
        }
    }

    let carry = rest.to_vec();
    *pending = carry;
    out
}

/// SFTP subsystem session.
struct SftpTransfer {
    sftp: Option<SftpSession>,
}

impl SftpTransfer {
    fn session(&self) -> Result<&SftpSession, RemoteError> {
        self.sftp
            .as_ref()
            .ok_or_else(|| RemoteError::Transfer("SFTP session is closed".to_string()))
    }
}

#[async_trait]
impl FileTransfer for SftpTransfer {
    async fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, RemoteError> {
        let mut source = tokio::fs::File::open(local).await?;
        let mut target = self
            .session()?
            .create(remote)
            .await
            .map_err(|e| RemoteError::Transfer(format!("Failed to create {}: {}", remote, e)))?;

        let written = tokio::io::copy(&mut source, &mut target)
            .await
            .map_err(|e| RemoteError::Transfer(format!("Failed to write {}: {}", remote, e)))?;
        target
            .shutdown()
            .await
            .map_err(|e| RemoteError::Transfer(format!("Failed to close {}: {}", remote, e)))?;

        debug!("Uploaded {} bytes to {}", written, remote);
        Ok(written)
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64, RemoteError> {
        let mut source = self
            .session()?
            .open(remote)
            .await
            .map_err(|e| RemoteError::Transfer(format!("Failed to open {}: {}", remote, e)))?;
        let mut target = tokio::fs::File::create(local).await?;

        let written = tokio::io::copy(&mut source, &mut target)
            .await
            .map_err(|e| RemoteError::Transfer(format!("Failed to read {}: {}", remote, e)))?;
        target.flush().await?;

        debug!("Downloaded {} bytes from {}", written, remote);
        Ok(written)
    }

    async fn close(&mut self) {
        if let Some(sftp) = self.sftp.take()
            && let Err(e) = sftp.close().await
        {
            debug!("Error closing SFTP session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod client_config {
        use super::*;

        #[test]
        fn test_no_inactivity_timeout() {
            let config = build_client_config();
            assert_eq!(config.inactivity_timeout, None);
        }

        #[test]
        fn test_keepalive() {
            let config = build_client_config();
            assert_eq!(config.keepalive_interval, Some(Duration::from_secs(30)));
            assert_eq!(config.keepalive_max, 3);
        }
    }

    mod utf8_decoding {
        use super::*;

        #[test]
        fn test_ascii_passthrough() {
            let mut pending = Vec::new();
            assert_eq!(decode_utf8_chunk(&mut pending, b"hello\r\n"), "hello\r\n");
            assert!(pending.is_empty());
        }

        #[test]
        fn test_split_multibyte_sequence() {
            // "é" is 0xC3 0xA9
            let mut pending = Vec::new();
            assert_eq!(decode_utf8_chunk(&mut pending, b"caf\xC3"), "caf");
            assert_eq!(pending, vec![0xC3]);
            assert_eq!(decode_utf8_chunk(&mut pending, b"\xA9!"), "é!");
            assert!(pending.is_empty());
        }

        #[test]
        fn test_invalid_byte_replaced() {
            let mut pending = Vec::new();
            let text = decode_utf8_chunk(&mut pending, b"a\xFFb");
            assert_eq!(text, "a\u{FFFD}b");
            assert!(pending.is_empty());
        }

        #[test]
        fn test_four_byte_sequence_split_three_ways() {
            // U+1F600 is F0 9F 98 80
            let mut pending = Vec::new();
            assert_eq!(decode_utf8_chunk(&mut pending, b"\xF0"), "");
            assert_eq!(decode_utf8_chunk(&mut pending, b"\x9F\x98"), "");
            assert_eq!(decode_utf8_chunk(&mut pending, b"\x80"), "\u{1F600}");
        }
    }

    #[test]
    fn test_transport_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SshTransport>();
    }
}
