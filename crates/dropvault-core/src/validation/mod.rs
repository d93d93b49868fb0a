//! Upload validation
//!
//! Checks that callers run before handing an upload to the lifecycle manager.
//! The manager itself trusts its inputs.

use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::models::NewFile;

/// Longest display name kept for a file.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 255;

/// Upload fields as received from a client
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UploadRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "File name must be between 1 and 255 characters"
    ))]
    pub display_name: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub content_type: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Owner id must be between 1 and 255 characters"
    ))]
    pub owner_id: String,
    #[serde(default)]
    pub one_time: bool,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

impl UploadRequest {
    /// Validate and convert into the manager's input.
    pub fn into_new_file(self) -> Result<NewFile, AppError> {
        self.validate()?;
        if self.ttl_seconds == Some(0) {
            return Err(AppError::InvalidInput(
                "ttl_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(NewFile {
            display_name: self.display_name,
            content_type: self.content_type,
            owner_id: self.owner_id,
            one_time: self.one_time,
            ttl: self.ttl_seconds.map(std::time::Duration::from_secs),
        })
    }
}

/// Reject empty uploads and uploads larger than `max_bytes`.
pub fn validate_upload_size(size: u64, max_bytes: u64) -> Result<(), AppError> {
    if size == 0 {
        return Err(AppError::InvalidInput("File is empty".to_string()));
    }
    if size > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File size {} bytes exceeds limit of {} bytes",
            size, max_bytes
        )));
    }
    Ok(())
}

/// Make a display name safe to echo back in a `Content-Disposition` header.
///
/// Keeps only the final path component and drops quotes, backslashes and
/// control characters. Falls back to `"download"` when nothing is left.
pub fn sanitize_display_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .take(MAX_DISPLAY_NAME_LENGTH)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "download".to_string()
    } else {
        cleaned.to_string()
    }
}
