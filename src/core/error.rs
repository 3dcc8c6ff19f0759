use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZwcError {
    #[error("Canvas overflow: {needed} rows needed, capacity is {capacity}")]
    CanvasOverflow { needed: u32, capacity: u32 },

    #[error("Empty book: a container needs at least one page")]
    EmptyBook,

    #[error("Page {page} has no encoded bytes")]
    EmptyPage { page: u32 },

    #[error("Container too large: {size} bytes do not fit 32-bit offsets")]
    ContainerTooLarge { size: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Not a book sidecar (expected .zwc): {0}")]
    NotABook(PathBuf),

    #[error("Page {page} out of range (book has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("Container too short: {len} bytes")]
    ContainerTooShort { len: u64 },

    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    #[error("Page count mismatch: sidecar says {expected}, container holds {actual}")]
    PageCountMismatch { expected: u32, actual: u32 },

    #[error("Page {page} missing from page folder")]
    PageMissing { page: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Sidecar line {line}: {reason}")]
    Sidecar { line: usize, reason: String },

    #[error("Sidecar key missing: {0}")]
    MissingKey(&'static str),

    #[error("Sidecar key {key} has invalid value {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Build cancelled")]
    Cancelled,

    #[error("Renderer failed: {0}")]
    Render(String),
}

impl From<tempfile::PersistError> for ZwcError {
    fn from(err: tempfile::PersistError) -> Self {
        ZwcError::Io(err.error)
    }
}

pub type Result<T> = std::result::Result<T, ZwcError>;
