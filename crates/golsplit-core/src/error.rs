use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Partial read at address {address:#x}: expected {expected} bytes, got {actual}")]
    PartialRead {
        address: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Null pointer dereferenced at address {address:#x}")]
    NullPointer { address: u64 },

    #[error("Address overflow while applying offset {offset:#x} to {address:#x}")]
    AddressOverflow { address: u64, offset: i64 },

    #[error("Tracker is already running")]
    AlreadyRunning,

    #[error("Unsupported platform: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Whether the error means the target process went away
    ///
    /// The poll loop treats these as a lifecycle change rather than a fault.
    pub fn is_process_gone(&self) -> bool {
        matches!(self, Error::ProcessNotFound(_))
    }
}
