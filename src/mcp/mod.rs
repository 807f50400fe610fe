//! Remote PTY tools module.
//!
//! This module is organized into the following submodules:
//!
//! - `error`: Error taxonomy and transport error classification
//! - `config`: Configuration resolution with environment variable support
//! - `transport`: SSH connection, authentication, PTY and SFTP channels
//! - `pty`: Output framing, markers and the interactive session driver
//! - `transfer`: Upload, download and tree sync
//! - `message`: Response text builders
//! - `types`: Tool contract types
//! - `tools`: Transport-agnostic tool façade
//! - `commands`: MCP tool implementations

pub mod commands;
pub mod config;
pub mod error;
pub mod message;
pub mod pty;
pub mod tools;
pub mod transfer;
pub mod transport;
pub mod types;

pub use commands::McpRemoteTools;
pub use config::RemoteConfig;
pub use error::RemoteError;
pub use tools::RemoteTools;
