//! Error types for exdiff

use thiserror::Error;

/// Result type alias using the exdiff Error
pub type Result<T> = std::result::Result<T, Error>;

/// exdiff error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("navigation did not settle within {seconds}s")]
    NavigationTimeout { url: String, seconds: u64 },

    #[error("expected surface never appeared: {selector}")]
    ContainerNotFound { selector: String, url: String },

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("variant count mismatch for {slug}: old rendered {old}, new rendered {new}")]
    VariantCountMismatch {
        slug: String,
        old: usize,
        new: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("browser driver error: {0}")]
    Driver(String),

    #[error("driver not found. Install node and puppeteer (npm install puppeteer)")]
    DriverNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
