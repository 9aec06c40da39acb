//! Service account credentials
//!
//! A Google Cloud service account key, as downloaded from the console, is the
//! only credential the Play Developer API accepts for unattended uploads.

use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, StoreError};

/// Environment variable holding the service account key
pub const SERVICE_ACCOUNT_ENV: &str = "GOOGLE_PLAY_SERVICE_ACCOUNT_KEY";

/// OAuth2 scope required by the Android Publisher API
pub const ANDROID_PUBLISHER_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";

/// Token endpoint used when the key does not name one
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google service account credentials
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Key type, always `service_account` for usable keys
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,

    /// Owning Google Cloud project
    #[serde(default)]
    pub project_id: Option<String>,

    /// Identifier of the private key, sent as the JWT `kid`
    #[serde(default)]
    pub private_key_id: Option<String>,

    /// PEM encoded RSA private key
    pub private_key: String,

    /// Service account identity
    pub client_email: String,

    /// Token endpoint
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parse and validate a service account key from its JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json).map_err(|e| {
            StoreError::InvalidCredentials(format!("Invalid service account key: {}", e))
        })?;
        key.validate()?;
        Ok(key)
    }

    /// Load a key from either inline JSON or a path to a JSON file
    pub fn from_source(source: &str) -> Result<Self> {
        let trimmed = source.trim_start();
        if trimmed.starts_with('{') {
            return Self::from_json(trimmed);
        }

        let path = Path::new(source.trim());
        if !path.is_file() {
            return Err(StoreError::InvalidCredentials(
                "Service account key is neither JSON nor a readable file".to_string(),
            ));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::ConfigurationError(format!(
                "Failed to read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Load a key from an environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        Self::from_setting(var, std::env::var(var).ok().as_deref())
    }

    /// Load a key from a resolved setting; a missing or blank value is
    /// reported as `name` not being set
    pub fn from_setting(name: &str, value: Option<&str>) -> Result<Self> {
        match value {
            Some(value) if !value.trim().is_empty() => Self::from_source(value),
            _ => Err(StoreError::ConfigurationError(format!("{} is not set", name))),
        }
    }

    /// Token endpoint for the JWT bearer exchange
    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn validate(&self) -> Result<()> {
        if let Some(kind) = &self.key_type {
            if kind != "service_account" {
                return Err(StoreError::InvalidCredentials(format!(
                    "Expected a service_account key, got '{}'",
                    kind
                )));
            }
        }
        if self.client_email.trim().is_empty() {
            return Err(StoreError::InvalidCredentials(
                "client_email is empty".to_string(),
            ));
        }
        if self.private_key.trim().is_empty() {
            return Err(StoreError::InvalidCredentials(
                "private_key is empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
