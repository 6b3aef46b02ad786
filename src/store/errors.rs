//! Store error types
//!
//! Error codes:
//! - ND_STORE_IO_ERROR (ERROR severity)
//! - ND_STORE_OUT_OF_SPACE (ERROR severity)
//! - ND_STORE_OUT_OF_BOUNDS (FATAL severity)
//! - ND_DATA_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

use super::Address;

/// Severity levels for store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the index stays usable
    Error,
    /// Persisted state is inconsistent; the index must be rebuilt
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Store-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Disk I/O failure while saving or loading an image
    NdStoreIoError,
    /// Allocation would exceed the configured maximum size
    NdStoreOutOfSpace,
    /// Access outside the allocated area, or through the null address
    NdStoreOutOfBounds,
    /// Checksum, block header or string encoding is invalid
    NdDataCorruption,
}

impl StoreErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StoreErrorCode::NdStoreIoError => "ND_STORE_IO_ERROR",
            StoreErrorCode::NdStoreOutOfSpace => "ND_STORE_OUT_OF_SPACE",
            StoreErrorCode::NdStoreOutOfBounds => "ND_STORE_OUT_OF_BOUNDS",
            StoreErrorCode::NdDataCorruption => "ND_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StoreErrorCode::NdStoreIoError => Severity::Error,
            StoreErrorCode::NdStoreOutOfSpace => Severity::Error,
            StoreErrorCode::NdStoreOutOfBounds => Severity::Fatal,
            StoreErrorCode::NdDataCorruption => Severity::Fatal,
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Store error type with context
#[derive(Debug)]
pub struct StoreError {
    code: StoreErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl StoreError {
    /// Create an I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StoreErrorCode::NdStoreIoError,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create an out-of-space error for a failed allocation
    pub fn out_of_space(requested: u64, max_size: u64) -> Self {
        Self {
            code: StoreErrorCode::NdStoreOutOfSpace,
            message: format!("cannot allocate {} bytes", requested),
            details: Some(format!("max_size_bytes: {}", max_size)),
            source: None,
        }
    }

    /// Create an out-of-bounds error for an access of `len` bytes
    pub fn out_of_bounds(address: Address, len: usize) -> Self {
        let message = if address.is_null() {
            "null address dereferenced".to_string()
        } else {
            format!("access of {} bytes outside the store", len)
        };
        Self {
            code: StoreErrorCode::NdStoreOutOfBounds,
            message,
            details: Some(format!("address: {}", address)),
            source: None,
        }
    }

    /// Create a data corruption error
    pub fn data_corruption(message: impl Into<String>) -> Self {
        Self {
            code: StoreErrorCode::NdDataCorruption,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a data corruption error at a known address
    pub fn corruption_at(address: Address, reason: impl Into<String>) -> Self {
        Self {
            code: StoreErrorCode::NdDataCorruption,
            message: reason.into(),
            details: Some(format!("address: {}", address)),
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StoreErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether the store contents must be considered inconsistent
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
