//! Google Play Store integration
//!
//! Implements [`PublishingApi`] against the Google Play Developer API
//! (androidpublisher v3).
//!
//! ## Authentication
//!
//! Uses a Google Cloud service account with Google Play Developer API access.
//! A signed JWT is exchanged for an OAuth2 access token which is cached until
//! shortly before it expires.
//!
//! ## Usage
//!
//! ```ignore
//! use playdeploy_store::google_play::GooglePlayStore;
//! use playdeploy_store::{deploy, GooglePlayConfig, ServiceAccountKey};
//!
//! let key = ServiceAccountKey::from_env("GOOGLE_PLAY_SERVICE_ACCOUNT_KEY")?;
//! let store = GooglePlayStore::new(key, GooglePlayConfig::default())?;
//! let report = deploy(&store, &request).await?;
//! ```

mod upload;

use crate::credentials::{ServiceAccountKey, ANDROID_PUBLISHER_SCOPE};
use crate::error::{Result, StoreError};
use crate::traits::PublishingApi;
use crate::types::*;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// OAuth token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Token cache for thread-safe access
#[derive(Debug, Default)]
struct TokenCache {
    access_token: Option<String>,
    expires_at: Option<chrono::DateTime<Utc>>,
}

/// Google Play Developer API client
pub struct GooglePlayStore {
    /// Configuration
    config: GooglePlayConfig,

    /// HTTP client
    client: Client,

    /// Token cache with interior mutability
    token_cache: Arc<RwLock<TokenCache>>,

    /// Service account credentials
    service_account: ServiceAccountKey,
}

impl GooglePlayStore {
    /// Create a new Google Play Store client
    pub fn new(service_account: ServiceAccountKey, config: GooglePlayConfig) -> Result<Self> {
        config.validate()?;

        // Resumable uploads answer 308 without meaning a redirect
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            config,
            client,
            token_cache: Arc::new(RwLock::new(TokenCache::default())),
            service_account,
        })
    }

    /// Get or refresh OAuth2 access token
    async fn get_access_token(&self) -> Result<String> {
        // Check if we have a valid cached token
        {
            let cache = self.token_cache.read().await;
            if let (Some(token), Some(expires)) = (&cache.access_token, cache.expires_at) {
                if Utc::now() < expires - Duration::minutes(5) {
                    return Ok(token.clone());
                }
            }
        }

        let jwt = self.signed_assertion()?;
        let token_uri = self.service_account.token_uri();

        debug!("Exchanging service account assertion at {}", token_uri);

        let response = self
            .client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &jwt)])
            .send()
            .await
            .map_err(|e| StoreError::AuthenticationFailed(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::AuthenticationFailed(format!(
                "{} - {}",
                status.as_u16(),
                error_text
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            StoreError::AuthenticationFailed(format!("Malformed token response: {}", e))
        })?;

        // Cache the token
        {
            let mut cache = self.token_cache.write().await;
            cache.access_token = Some(token_response.access_token.clone());
            cache.expires_at = Some(Utc::now() + Duration::seconds(token_response.expires_in));
        }

        Ok(token_response.access_token)
    }

    /// Build the RS256 JWT asserting the service account identity
    fn signed_assertion(&self) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(1);

        #[derive(Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: i64,
            exp: i64,
        }

        let claims = Claims {
            iss: &self.service_account.client_email,
            scope: ANDROID_PUBLISHER_SCOPE,
            aud: self.service_account.token_uri(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let encoding_key =
            jsonwebtoken::EncodingKey::from_rsa_pem(self.service_account.private_key.as_bytes())
                .map_err(|e| {
                    StoreError::AuthenticationFailed(format!("Invalid private key: {}", e))
                })?;

        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        header.kid = self.service_account.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &encoding_key).map_err(|e| {
            StoreError::AuthenticationFailed(format!("Failed to sign assertion: {}", e))
        })
    }

    /// Send an authenticated API request, returning the successful response
    async fn send_api_request(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let token = self.get_access_token().await?;
        let url = format!("{}{}", self.config.api_base_url, endpoint);

        let request = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", format!("Bearer {}", token));

        // POST and PUT without a body still need Content-Length: 0
        let request = match body {
            Some(body) => request.json(&body),
            None => request.body(Vec::<u8>::new()),
        };

        debug!("Making {} request to {}", method, url);

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response)
    }

    /// Make an authenticated API request and decode the JSON response
    async fn api_request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let response = self.send_api_request(method, endpoint, body).await?;
        Ok(response.json().await?)
    }

    fn edit_endpoint(package_name: &str, edit_id: &str) -> String {
        format!("/applications/{}/edits/{}", package_name, edit_id)
    }
}

#[async_trait::async_trait]
impl PublishingApi for GooglePlayStore {
    async fn authenticate(&self) -> Result<()> {
        self.get_access_token().await.map(|_| ())
    }

    async fn create_edit(&self, package_name: &str) -> Result<EditSession> {
        let endpoint = format!("/applications/{}/edits", package_name);
        self.api_request(reqwest::Method::POST, &endpoint, Some(serde_json::json!({})))
            .await
    }

    async fn upload_bundle(
        &self,
        package_name: &str,
        edit_id: &str,
        path: &Path,
    ) -> Result<UploadedBundle> {
        let url = format!(
            "{}{}/bundles",
            self.config.upload_base_url,
            Self::edit_endpoint(package_name, edit_id)
        );
        self.upload_resumable(&url, path).await
    }

    async fn update_track(
        &self,
        package_name: &str,
        edit_id: &str,
        update: &TrackUpdate,
    ) -> Result<TrackUpdate> {
        let endpoint = format!(
            "{}/tracks/{}",
            Self::edit_endpoint(package_name, edit_id),
            update.track
        );
        let body = serde_json::to_value(update)?;
        self.api_request(reqwest::Method::PUT, &endpoint, Some(body)).await
    }

    async fn commit_edit(&self, package_name: &str, edit_id: &str) -> Result<()> {
        let endpoint = format!("{}:commit", Self::edit_endpoint(package_name, edit_id));
        let _: serde_json::Value = self
            .api_request(reqwest::Method::POST, &endpoint, None)
            .await?;
        Ok(())
    }

    async fn delete_edit(&self, package_name: &str, edit_id: &str) -> Result<()> {
        let endpoint = Self::edit_endpoint(package_name, edit_id);
        self.send_api_request(reqwest::Method::DELETE, &endpoint, None)
            .await?;
        Ok(())
    }
}
