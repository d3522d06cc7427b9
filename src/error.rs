use thiserror::Error;

/// Library error type for photoprint operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A template declared a physical unit we do not understand.
    #[error("unsupported unit: {0:?}")]
    BadUnit(String),

    /// A template descriptor file could not be parsed at all.
    #[error("template file {path}: {reason}")]
    TemplateParse { path: String, reason: String },

    /// A custom grid / fit-as-many request that cannot produce a layout.
    #[error("custom layout rejected: {0}")]
    CustomLayout(String),

    /// Session document is malformed or references impossible values.
    #[error("session file: {0}")]
    Session(String),

    /// No usable caption font could be located or parsed.
    #[error("caption font: {0}")]
    Font(String),

    /// Configuration value out of range or malformed.
    #[error("config: {0}")]
    InvalidConfig(String),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    /// Decode/encode error from the image pipeline.
    #[error(transparent)]
    Image(#[from] image::error::ImageError),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
