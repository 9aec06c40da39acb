//! Google Play bundle deployment for playdeploy
//!
//! This crate talks to the Google Play Developer API and runs the edit
//! workflow that publishes an Android App Bundle to a release track.
//!
//! ## Layout
//!
//! - [`credentials`]: service account key loading and validation
//! - [`google_play`]: HTTPS client, JWT token exchange and resumable upload
//! - [`deploy`]: the create / upload / track / commit workflow with cleanup
//!
//! ## Usage
//!
//! ```ignore
//! use playdeploy_store::{deploy, DeployRequest, GooglePlayConfig, ServiceAccountKey, Track};
//! use playdeploy_store::google_play::GooglePlayStore;
//!
//! let key = ServiceAccountKey::from_env("GOOGLE_PLAY_SERVICE_ACCOUNT_KEY")?;
//! let store = GooglePlayStore::new(key, GooglePlayConfig::default())?;
//!
//! let request = DeployRequest {
//!     package_name: "com.example.app".to_string(),
//!     bundle_path: "app-release.aab".into(),
//!     track: Track::Internal,
//!     release_notes: None,
//! };
//! let report = deploy(&store, &request).await?;
//! ```

pub mod credentials;
pub mod deploy;
pub mod error;
pub mod google_play;
pub mod traits;
pub mod types;

pub use credentials::ServiceAccountKey;
pub use deploy::{deploy, DeployStage};
pub use error::StoreError;
pub use traits::PublishingApi;
pub use types::*;
