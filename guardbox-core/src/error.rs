use thiserror::Error;

/// Top-level error type for guardbox operations.
///
/// Absence of a record is never an error: lookups return `Ok(None)` and
/// callers branch on presence. Errors are reserved for storage failures,
/// constraint violations, transport failures, and misconfiguration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cookie transport error: {0}")]
    Cookie(String),
}

/// Errors originating from a storage adapter.
///
/// Adapter failures propagate to the caller unmodified; the core performs no
/// retries.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OTP adapter not configured")]
    OtpAdapterMissing,
}

impl Error {
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// True for unique-constraint violations such as a duplicate
    /// (provider, key) account link.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::Storage(StorageError::Constraint(_)))
    }
}
