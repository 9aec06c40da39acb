//! Store error types

use thiserror::Error;

use crate::deploy::DeployStage;

/// Store-related errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// API error from store
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Invalid artifact
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    /// Upload failed
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A deployment step failed; carries the stage the run had reached
    #[error("Deployment failed ({stage}): {source}")]
    Deploy {
        stage: DeployStage,
        edit_id: Option<String>,
        #[source]
        source: Box<StoreError>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Stage reached before a deployment failed, if this is a deployment error
    pub fn stage(&self) -> Option<DeployStage> {
        match self {
            StoreError::Deploy { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying cause, looking through the deployment wrapper
    pub fn root(&self) -> &StoreError {
        match self {
            StoreError::Deploy { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
