//! Tool contract types.
//!
//! Input structs describe each tool's arguments for controllers that do not
//! speak MCP. Their JSON schemas are generated with `schemars`, so the
//! catalogue and the argument parser cannot drift apart.

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

/// Declarative description of one tool. Defined once, read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolSpec {
    pub(crate) fn for_input<T: JsonSchema>(name: &str, description: &str) -> Self {
        let schema: Schema = SchemaGenerator::default().into_root_schema_for::<T>();
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: schema.to_value(),
        }
    }
}

/// Arguments of `run_remote_command`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunRemoteCommandInput {
    /// Shell command to run on the remote host after the environment is
    /// activated, e.g. "cd ~/work && make synth"
    pub command: String,
}

/// Arguments of `upload_to_remote`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadInput {
    /// Local file, relative to the local work directory or absolute
    pub local_path: String,
    /// Destination, relative to the remote work directory or absolute
    pub remote_path: String,
}

/// Arguments of `download_from_remote`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadInput {
    /// Source file, relative to the remote work directory or absolute
    pub remote_path: String,
    /// Destination, relative to the local work directory or absolute
    pub local_path: String,
}

/// `sync_to_remote` takes no arguments; roots and filters are configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SyncInput {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields_in_schema() {
        let tool = ToolSpec::for_input::<UploadInput>("upload_to_remote", "Upload");
        let required = tool.input_schema["required"].as_array().unwrap();
        assert!(required.contains(&serde_json::json!("local_path")));
        assert!(required.contains(&serde_json::json!("remote_path")));
        assert_eq!(tool.input_schema["type"], serde_json::json!("object"));
    }

    #[test]
    fn test_field_docs_become_descriptions() {
        let tool = ToolSpec::for_input::<RunRemoteCommandInput>("run_remote_command", "Run");
        let description = tool.input_schema["properties"]["command"]["description"]
            .as_str()
            .unwrap();
        assert!(description.contains("Shell command"));
    }

    #[test]
    fn test_sync_input_accepts_empty_object() {
        let input: SyncInput = serde_json::from_value(serde_json::json!({})).unwrap();
        let _ = input;
        let tool = ToolSpec::for_input::<SyncInput>("sync_to_remote", "Sync");
        assert!(
            tool.input_schema
                .get("required")
                .is_none_or(|r| r.as_array().is_some_and(|a| a.is_empty()))
        );
    }

    #[test]
    fn test_missing_argument_rejected() {
        let parsed = serde_json::from_value::<DownloadInput>(serde_json::json!({
            "remote_path": "/w/a.rpt"
        }));
        assert!(parsed.is_err());
    }
}
