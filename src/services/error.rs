use thiserror::Error;

/// Fatal errors for one conversion item.
///
/// Suspensions (awaiting overrides or a background image) are not errors; see
/// [`crate::pipeline::ConversionOutcome::AwaitingInput`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Input is {size} bytes, over the {limit} byte limit")]
    SizeLimitExceeded { size: u64, limit: u64 },

    #[error("Failed to decode archive: {0}")]
    ArchiveDecode(String),

    #[error("Missing required files: {}", .0.join(", "))]
    MissingAssets(Vec<String>),

    #[error("Config format error: {0}")]
    ConfigFormat(String),

    #[error("No valid chart files found")]
    NoValidCharts,

    #[error("Failed to build package: {0}")]
    Packaging(String),

    #[error("Conversion abandoned: {0}")]
    Abandoned(String),
}

impl From<zip::result::ZipError> for ConversionError {
    fn from(e: zip::result::ZipError) -> Self {
        ConversionError::ArchiveDecode(e.to_string())
    }
}

impl From<serde_yaml_ng::Error> for ConversionError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        ConversionError::Packaging(format!("YAML serialization failed: {}", e))
    }
}
