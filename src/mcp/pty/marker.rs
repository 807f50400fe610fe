//! Stream delimiters for the interactive session.

use chrono::Utc;
use uuid::Uuid;

/// Which section of the session a marker closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Bootstrap,
    Command,
}

impl MarkerKind {
    fn tag(self) -> &'static str {
        match self {
            MarkerKind::Bootstrap => "BOOT",
            MarkerKind::Command => "DONE",
        }
    }
}

/// A token that will not plausibly occur in remote output.
///
/// The token is a fixed prefix followed by a nanosecond UTC timestamp and a
/// random suffix. The shell prints it from two separately quoted fragments,
/// so a terminal echo of the input line never contains it contiguously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    prefix: String,
    suffix: String,
}

impl Marker {
    pub fn new(kind: MarkerKind) -> Self {
        let nanos = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
        let random = Uuid::new_v4().simple().to_string();
        Self {
            prefix: format!("__RPTY_{}_", kind.tag()),
            suffix: format!("{}_{}__", nanos, &random[..12]),
        }
    }

    /// Build a marker from explicit parts.
    #[cfg(test)]
    pub(crate) fn from_parts(prefix: &str, suffix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// The contiguous token as it appears in the output stream.
    pub fn token(&self) -> String {
        format!("{}{}", self.prefix, self.suffix)
    }

    /// The first fragment. Appears in the echo of the emitting statement.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Shell statement that prints the token on its own line.
    pub fn emit_statement(&self) -> String {
        format!("printf '%s%s\\n' '{}' '{}'", self.prefix, self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_are_distinct() {
        let a = Marker::new(MarkerKind::Command);
        let b = Marker::new(MarkerKind::Command);
        assert_ne!(a.token(), b.token());
    }

    #[test]
    fn test_kind_in_prefix() {
        assert!(Marker::new(MarkerKind::Bootstrap).token().starts_with("__RPTY_BOOT_"));
        assert!(Marker::new(MarkerKind::Command).token().starts_with("__RPTY_DONE_"));
    }

    #[test]
    fn test_emit_statement_never_contains_token() {
        let marker = Marker::new(MarkerKind::Bootstrap);
        let statement = marker.emit_statement();
        assert!(!statement.contains(&marker.token()));
        assert!(statement.starts_with("printf '%s%s\\n' '__RPTY_BOOT_'"));
    }

    #[test]
    fn test_token_is_shell_safe() {
        let token = Marker::new(MarkerKind::Command).token();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        );
    }
}
