//! Results returned by tool invocations.

use serde::{Deserialize, Serialize};

/// One content block in a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain text output.
    Text {
        /// Text body.
        text: String,
    },
    /// Base64-encoded image output.
    Image {
        /// Encoded image bytes.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Reference to a server-side resource.
    Resource {
        /// Embedded resource payload.
        resource: serde_json::Value,
    },
}

/// Outcome of calling a tool on a ready connection.
///
/// `is_error` reports a tool-level failure (for example a SQL syntax error);
/// protocol and transport failures surface as errors instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    /// Content blocks in server order.
    pub content: Vec<ToolContent>,
    /// Whether the tool reported a failure.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolCallOutcome {
    /// Creates a successful outcome with a single text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Concatenates all text blocks, separated by newlines.
    #[must_use]
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ToolContent::Text { text } => Some(text.as_str()),
                ToolContent::Image { .. } | ToolContent::Resource { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
