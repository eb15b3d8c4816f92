use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source '{source_id}' failed: {message}")]
    Source { source_id: String, message: String },
}

pub type Result<T> = std::result::Result<T, DigestError>;
