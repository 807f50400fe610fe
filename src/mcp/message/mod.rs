//! Message building utilities for tool responses.
//!
//! Every tool returns human-readable text with labelled sections. The builders
//! here own that format so the façade and both server surfaces agree on it.

mod builder;

pub use builder::{
    RemoteCommandMessageBuilder, SyncMessageBuilder, download_message, error_message,
    upload_message,
};
