//! The caller-facing result of one dispatch.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one conversion job.
///
/// Serialises to the shape the outer layer hands back to the user:
/// `{success, filename?, originalFormat?, targetFormat?, error?}`. Exactly one
/// of `filename` and `error` is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOutcome {
    pub success: bool,

    /// File name of the produced artifact inside the output directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Full path of the produced artifact. The caller owns the file.
    #[serde(skip)]
    pub output_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversionOutcome {
    /// A successful outcome pointing at `output_path`.
    pub fn success(
        output_path: PathBuf,
        original_format: impl Into<String>,
        target_format: impl Into<String>,
    ) -> Self {
        let filename = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self {
            success: true,
            filename,
            output_path: Some(output_path),
            original_format: Some(original_format.into()),
            target_format: Some(target_format.into()),
            error: None,
        }
    }

    /// A failed outcome. An empty message is replaced so `error` is never blank.
    pub fn failure(
        original_format: Option<String>,
        target_format: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Conversion failed".to_string();
        }
        Self {
            success: false,
            filename: None,
            output_path: None,
            original_format,
            target_format,
            error: Some(error),
        }
    }

    /// Convert into a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<PathBuf, String> {
        match (self.success, self.output_path, self.error) {
            (true, Some(path), _) => Ok(path),
            (_, _, Some(e)) => Err(e),
            _ => Err("Conversion failed".to_string()),
        }
    }
}
