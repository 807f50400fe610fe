//! Builder patterns for constructing tool response text.
//!
//! Controllers match on the section labels with substring checks, so the
//! labels produced here are stable.

use std::path::Path;

use crate::mcp::error::RemoteError;
use crate::mcp::pty::SessionResult;
use crate::mcp::transfer::SyncReport;

/// Placeholder for a section with no text.
const EMPTY_SECTION: &str = "(no output)";

/// Builder for `run_remote_command` results.
///
/// Sections are separated by a blank line:
///
/// ```text
/// [bootstrap: synopsys]
/// Loading synopsys/2024
///
/// [command output]
/// hello
///
/// [EXIT_CODE:0]
/// ```
pub struct RemoteCommandMessageBuilder<'a> {
    result: &'a SessionResult,
}

impl<'a> RemoteCommandMessageBuilder<'a> {
    pub fn new(result: &'a SessionResult) -> Self {
        Self { result }
    }

    pub fn build(&self) -> String {
        let result = self.result;
        let mut sections = Vec::new();

        let bootstrap = result.bootstrap_output();
        if !bootstrap.is_empty() || result.bootstrap_timed_out() {
            let header = match &result.environment.label {
                Some(label) => format!("[bootstrap: {}]", label),
                None => "[bootstrap]".to_string(),
            };
            let mut section = vec![header];
            if !bootstrap.is_empty() {
                section.push(bootstrap.to_string());
            }
            if result.bootstrap_timed_out() {
                section.push(format!(
                    "[WARNING: bootstrap timed out after {}s; output is best-effort]",
                    result.environment.bootstrap_timeout.as_secs()
                ));
            }
            sections.push(section.join("\n"));
        }

        let output = if result.command_output.is_empty() {
            EMPTY_SECTION
        } else {
            result.command_output.as_str()
        };
        sections.push(format!("[command output]\n{}", output));

        let mut status = vec![match result.exit_code {
            Some(code) => format!("[EXIT_CODE:{}]", code),
            None => "[EXIT_CODE: unavailable]".to_string(),
        }];
        if result.timed_out {
            status.push(format!(
                "[WARNING: timed out after {}s]",
                result.command_timeout.as_secs()
            ));
        }
        if result.stream_closed {
            status.push("[WARNING: session closed before the command finished]".to_string());
        }
        sections.push(status.join("\n"));

        sections.join("\n\n")
    }
}

/// Builder for `sync_to_remote` results.
pub struct SyncMessageBuilder<'a> {
    report: &'a SyncReport,
}

impl<'a> SyncMessageBuilder<'a> {
    pub fn new(report: &'a SyncReport) -> Self {
        Self { report }
    }

    pub fn build(&self) -> String {
        let report = self.report;
        let mut lines = vec![
            format!("OK: Synced to {}", report.remote_root),
            format!("  Uploaded ({}):", report.uploaded.len()),
        ];
        let mut uploaded: Vec<&String> = report.uploaded.iter().collect();
        uploaded.sort();
        lines.extend(uploaded.into_iter().map(|path| format!("    {}", path)));
        lines.push(format!(
            "  Skipped ({}): {}",
            report.skipped_count,
            report.skipped_names.join(", ")
        ));
        lines.join("\n")
    }
}

/// Success line for a single-file upload.
pub fn upload_message(local: &str, remote: &str, bytes: u64) -> String {
    format!("OK: Uploaded '{}' -> {} ({} bytes)", local, remote, bytes)
}

/// Success line for a single-file download.
pub fn download_message(remote: &str, local: &Path, bytes: u64) -> String {
    format!(
        "OK: Downloaded {} -> '{}' ({} bytes)",
        remote,
        local.display(),
        bytes
    )
}

/// Failure line. Tools return this instead of an error.
pub fn error_message(operation: &str, error: &RemoteError) -> String {
    format!("ERROR ({}): {}", operation, error)
}
