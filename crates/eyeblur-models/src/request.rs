//! `/blur-eyes` request and response bodies.

use serde::{Deserialize, Serialize};

use crate::source::{SourceType, SourceTypeError};

/// Output file name used when the caller does not provide one.
pub const DEFAULT_OUTPUT_FILENAME: &str = "blurred_eyes_video.mp4";

/// Request body for `POST /blur-eyes`.
///
/// `type` is kept as a raw string so an unknown value can be reported as
/// "Invalid source type" instead of a generic deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlurEyesRequest {
    #[serde(rename = "type", default)]
    pub source_type: Option<String>,

    #[serde(rename = "path/url", default)]
    pub path_or_url: Option<String>,

    #[serde(default = "default_output_filename")]
    pub output_filename: String,

    /// Output frame rate override; the service default applies when absent.
    #[serde(default)]
    pub fps: Option<u32>,
}

fn default_output_filename() -> String {
    DEFAULT_OUTPUT_FILENAME.to_string()
}

impl BlurEyesRequest {
    /// Both `type` and `path/url` must be present and non-empty.
    pub fn has_source(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.source_type) && present(&self.path_or_url)
    }

    /// Parse the source type. Callers check [`has_source`](Self::has_source) first.
    pub fn parsed_source_type(&self) -> Result<SourceType, SourceTypeError> {
        self.source_type.as_deref().unwrap_or_default().parse()
    }
}

/// Success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlurEyesResponse {
    pub message: String,
    pub output_file: String,
}

impl BlurEyesResponse {
    pub fn processed(output_file: impl Into<String>) -> Self {
        Self {
            message: "Video processed successfully".to_string(),
            output_file: output_file.into(),
        }
    }
}

/// Error body shared by every failure response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
