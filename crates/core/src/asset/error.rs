//! Error types for the asset module.

use thiserror::Error;

/// Errors that can occur while constructing a media asset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// The file is larger than the accepted ceiling.
    #[error("File size {size} bytes exceeds the {limit} byte limit")]
    SizeExceeded { size: u64, limit: u64 },
}

impl AssetError {
    /// User-facing notice text, as shown by the page.
    pub fn notice(&self) -> String {
        match self {
            Self::SizeExceeded { limit, .. } => format!(
                "File size exceeds {} limit",
                super::format_file_size(*limit).replace(' ', "")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_exceeded_notice() {
        let err = AssetError::SizeExceeded {
            size: 600 * 1024 * 1024,
            limit: 500 * 1024 * 1024,
        };
        assert_eq!(err.notice(), "File size exceeds 500MB limit");
        assert!(err.to_string().contains("524288000"));
    }
}
