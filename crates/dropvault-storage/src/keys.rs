//! Shared key derivation for storage backends.
//!
//! Key format: `{file_id}` or `{file_id}.{ext}`.

use std::path::Path;

use crate::traits::{StorageError, StorageResult};

/// Longest extension carried into a storage key.
pub const MAX_EXTENSION_LENGTH: usize = 16;

const MAX_KEY_LENGTH: usize = 128;

/// Cosmetic extension for a display name: lowercase, ASCII alphanumeric only.
/// `None` when there is nothing usable or it is longer than [`MAX_EXTENSION_LENGTH`].
pub fn extension_of(display_name: &str) -> Option<String> {
    let ext = Path::new(display_name).extension()?.to_str()?;
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if ext.is_empty() || ext.len() > MAX_EXTENSION_LENGTH {
        None
    } else {
        Some(ext)
    }
}

/// Storage key for a file id and the name it was uploaded under.
pub fn storage_key_for(file_id: &str, display_name: &str) -> String {
    match extension_of(display_name) {
        Some(ext) => format!("{}.{}", file_id, ext),
        None => file_id.to_string(),
    }
}

/// Reject keys that could escape the storage root or collide with temp files.
pub fn validate_storage_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() || storage_key.len() > MAX_KEY_LENGTH {
        return Err(StorageError::InvalidKey(
            "Storage key has invalid length".to_string(),
        ));
    }
    if storage_key.contains("..")
        || storage_key.starts_with('/')
        || storage_key.starts_with('.')
        || storage_key.contains('/')
        || storage_key.contains('\\')
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    if !storage_key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("report.pdf").as_deref(), Some("pdf"));
        assert_eq!(extension_of("Photo.JPEG").as_deref(), Some("jpeg"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("weird.p-d_f").as_deref(), Some("pdf"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(extension_of("x.../"), None);
        assert_eq!(extension_of(&format!("a.{}", "x".repeat(17))), None);
    }

    #[test]
    fn test_storage_key_for() {
        let id = "0123456789abcdef0123456789abcdef";
        assert_eq!(storage_key_for(id, "report.pdf"), format!("{}.pdf", id));
        assert_eq!(storage_key_for(id, "Makefile"), id);
        assert_eq!(storage_key_for(id, "../../x.sh"), format!("{}.sh", id));
        assert!(validate_storage_key(&storage_key_for(id, "a.b/c")).is_ok());
    }

    #[test]
    fn test_validate_storage_key() {
        assert!(validate_storage_key("abc.pdf").is_ok());
        assert!(validate_storage_key("").is_err());
        assert!(validate_storage_key("../etc/passwd").is_err());
        assert!(validate_storage_key("/etc/passwd").is_err());
        assert!(validate_storage_key("a/b").is_err());
        assert!(validate_storage_key("a\\b").is_err());
        assert!(validate_storage_key(".hidden").is_err());
        assert!(validate_storage_key("sp ace").is_err());
    }
}
