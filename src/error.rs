//! Error types for the circulation plugin subsystem

use serde::Serialize;
use thiserror::Error;

/// Stable error codes handed to whatever layer renders errors to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    DbFailure = 3,
    NoSuchLibrary = 4,
    NoSuchPlugin = 5,
    BadValue = 18,
    SchemaMismatch = 30,
    PluginFailure = 31,
    DiscoveryFailure = 32,
    LeaseNotAcquired = 33,
    ConfigFailure = 34,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Library not found: {0}")]
    LibraryNotFound(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Plugin {plugin} failed: {reason}")]
    PluginRuntime { plugin: String, reason: String },

    #[error("Plugin discovery failed for {entry}: {reason}")]
    Discovery { entry: String, reason: String },

    #[error("Lease not acquired: {0}")]
    Lease(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body for callers that need a structured payload
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::LibraryNotFound(_) => ErrorCode::NoSuchLibrary,
            AppError::PluginNotFound(_) => ErrorCode::NoSuchPlugin,
            AppError::SchemaMismatch(_) => ErrorCode::SchemaMismatch,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Database(_) | AppError::Storage(_) => ErrorCode::DbFailure,
            AppError::PluginRuntime { .. } => ErrorCode::PluginFailure,
            AppError::Discovery { .. } => ErrorCode::DiscoveryFailure,
            AppError::Lease(_) => ErrorCode::LeaseNotAcquired,
            AppError::Config(_) => ErrorCode::ConfigFailure,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    /// Persistence failures are worth retrying; everything else needs a different request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Storage(_))
    }

    /// Build the user-facing payload. Store and internal details are logged, never exposed.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            AppError::LibraryNotFound(_) => "Library not found".to_string(),
            AppError::PluginNotFound(name) => format!("Cannot find plugin {}", name),
            AppError::SchemaMismatch(_) => "The plugin does not expect values".to_string(),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Something went wrong, please try again".to_string()
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                "Something went wrong, please try again".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        let code = self.code();
        ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
