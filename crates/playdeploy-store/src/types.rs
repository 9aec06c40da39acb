//! Common types for Google Play deployments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, StoreError};

/// Locales that receive the release notes, in payload order
pub const RELEASE_NOTE_LOCALES: [&str; 2] = ["ja-JP", "en-US"];

const DEFAULT_API_BASE_URL: &str = "https://androidpublisher.googleapis.com/androidpublisher/v3";
const DEFAULT_UPLOAD_BASE_URL: &str =
    "https://androidpublisher.googleapis.com/upload/androidpublisher/v3";

/// Resumable upload chunks must be a multiple of this
pub const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;

/// Default resumable upload chunk size (8 MiB)
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 32 * UPLOAD_CHUNK_GRANULARITY;

/// Google Play release track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    /// Internal testing
    #[default]
    Internal,
    /// Closed testing
    Alpha,
    /// Open testing
    Beta,
    /// Public release
    Production,
}

impl Track {
    /// All tracks, in promotion order
    pub const ALL: [Track; 4] = [Track::Internal, Track::Alpha, Track::Beta, Track::Production];

    /// Name used in API paths and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Internal => "internal",
            Track::Alpha => "alpha",
            Track::Beta => "beta",
            Track::Production => "production",
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Track {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Track::ALL
            .into_iter()
            .find(|track| track.as_str() == s)
            .ok_or_else(|| {
                StoreError::ConfigurationError(format!(
                    "Unknown track '{}' (expected internal, alpha, beta or production)",
                    s
                ))
            })
    }
}

/// Status of a release within a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReleaseStatus {
    /// Not yet rolled out
    Draft,
    /// Rolled out to all users of the track
    Completed,
}

impl ReleaseStatus {
    /// Production releases go out immediately, every other track stays a draft
    pub fn for_track(track: Track) -> Self {
        match track {
            Track::Production => ReleaseStatus::Completed,
            _ => ReleaseStatus::Draft,
        }
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseStatus::Draft => write!(f, "draft"),
            ReleaseStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Text attached to a release for one locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    /// BCP-47 language tag (e.g., "en-US")
    pub language: String,

    /// Release notes text
    pub text: String,
}

/// A release within a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRelease {
    /// Version codes included in the release
    pub version_codes: Vec<i64>,

    /// Release status
    pub status: ReleaseStatus,

    /// Localized release notes
    #[serde(default)]
    pub release_notes: Vec<LocalizedText>,
}

/// Track resource sent to `edits.tracks.update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackUpdate {
    /// Track name
    pub track: Track,

    /// Releases on the track
    pub releases: Vec<TrackRelease>,
}

impl TrackUpdate {
    /// Build the single-release payload for an uploaded version
    ///
    /// The notes, when present and non-empty, are duplicated under every
    /// locale in [`RELEASE_NOTE_LOCALES`].
    pub fn for_version(track: Track, version_code: i64, release_notes: Option<&str>) -> Self {
        let release_notes = release_notes
            .filter(|notes| !notes.is_empty())
            .map(|notes| {
                RELEASE_NOTE_LOCALES
                    .iter()
                    .map(|language| LocalizedText {
                        language: language.to_string(),
                        text: notes.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            track,
            releases: vec![TrackRelease {
                version_codes: vec![version_code],
                status: ReleaseStatus::for_track(track),
                release_notes,
            }],
        }
    }
}

/// An open edit session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSession {
    /// Edit identifier
    pub id: String,

    /// Expiry as seconds since the epoch, as reported by the server
    #[serde(default)]
    pub expiry_time_seconds: Option<String>,
}

/// Bundle resource returned by the upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedBundle {
    /// Version code assigned to the bundle
    pub version_code: i64,

    /// SHA-1 of the uploaded bytes
    #[serde(default)]
    pub sha1: Option<String>,

    /// SHA-256 of the uploaded bytes
    #[serde(default)]
    pub sha256: Option<String>,
}

/// A deployment to run
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Package name (e.g., "com.example.app")
    pub package_name: String,

    /// Path to the App Bundle
    pub bundle_path: PathBuf,

    /// Target track
    pub track: Track,

    /// Release notes, attached to every locale in [`RELEASE_NOTE_LOCALES`]
    pub release_notes: Option<String>,
}

impl DeployRequest {
    /// Check the request before anything is sent, returning the bundle size
    ///
    /// The bundle must be an existing regular file; its contents are not
    /// inspected.
    pub fn validate(&self) -> Result<u64> {
        if self.package_name.trim().is_empty() {
            return Err(StoreError::ConfigurationError(
                "Package name must not be empty".to_string(),
            ));
        }

        let metadata = std::fs::metadata(&self.bundle_path).map_err(|e| {
            StoreError::InvalidArtifact(format!("{}: {}", self.bundle_path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(StoreError::InvalidArtifact(format!(
                "{} is not a file",
                self.bundle_path.display()
            )));
        }

        Ok(metadata.len())
    }

    /// Track payload for the version code the upload returned
    pub fn track_update(&self, version_code: i64) -> TrackUpdate {
        TrackUpdate::for_version(self.track, version_code, self.release_notes.as_deref())
    }
}

/// Outcome of a committed deployment
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    /// Package name
    pub package_name: String,

    /// Committed edit
    pub edit_id: String,

    /// Version code of the uploaded bundle
    pub version_code: i64,

    /// Track the version was assigned to
    pub track: Track,

    /// Release status sent for the track
    pub status: ReleaseStatus,

    /// URL to view the track in the Play Console
    pub console_url: String,

    /// Commit timestamp
    pub committed_at: DateTime<Utc>,
}

/// Google Play client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GooglePlayConfig {
    /// Base URL of the Android Publisher REST API
    pub api_base_url: String,

    /// Base URL for media uploads
    pub upload_base_url: String,

    /// Bytes sent per resumable upload request
    pub upload_chunk_size: usize,
}

impl GooglePlayConfig {
    /// Check that the configuration can be used for uploads
    pub fn validate(&self) -> Result<()> {
        if self.upload_chunk_size == 0 || self.upload_chunk_size % UPLOAD_CHUNK_GRANULARITY != 0 {
            return Err(StoreError::ConfigurationError(format!(
                "Upload chunk size must be a positive multiple of {} bytes, got {}",
                UPLOAD_CHUNK_GRANULARITY, self.upload_chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for GooglePlayConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_names() {
        for track in Track::ALL {
            assert_eq!(track.as_str().parse::<Track>().unwrap(), track);
        }
        assert_eq!(Track::default(), Track::Internal);
        assert!("staging".parse::<Track>().is_err());
        assert!("Production".parse::<Track>().is_err());
    }

    #[test]
    fn test_release_status_for_track() {
        assert_eq!(ReleaseStatus::for_track(Track::Production), ReleaseStatus::Completed);
        for track in [Track::Internal, Track::Alpha, Track::Beta] {
            assert_eq!(ReleaseStatus::for_track(track), ReleaseStatus::Draft);
        }
    }

    #[test]
    fn test_internal_payload_without_notes() {
        let update = TrackUpdate::for_version(Track::Internal, 42, None);
        let json = serde_json::to_value(&update).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "track": "internal",
                "releases": [{
                    "versionCodes": [42],
                    "status": "draft",
                    "releaseNotes": []
                }]
            })
        );
    }

    #[test]
    fn test_production_payload_with_notes() {
        let update = TrackUpdate::for_version(Track::Production, 7, Some("Bug fixes"));
        let release = &update.releases[0];

        assert_eq!(release.status, ReleaseStatus::Completed);
        assert_eq!(
            release.release_notes,
            vec![
                LocalizedText { language: "ja-JP".to_string(), text: "Bug fixes".to_string() },
                LocalizedText { language: "en-US".to_string(), text: "Bug fixes".to_string() },
            ]
        );

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["releases"][0]["status"], "completed");
        assert_eq!(json["releases"][0]["releaseNotes"][1]["language"], "en-US");
    }

    #[test]
    fn test_empty_notes_are_omitted() {
        let update = TrackUpdate::for_version(Track::Beta, 3, Some(""));
        assert!(update.releases[0].release_notes.is_empty());
    }

    #[test]
    fn test_edit_session_deserialize() {
        let edit: EditSession =
            serde_json::from_str(r#"{"id": "edit-1", "expiryTimeSeconds": "1700000000"}"#).unwrap();
        assert_eq!(edit.id, "edit-1");
        assert_eq!(edit.expiry_time_seconds.as_deref(), Some("1700000000"));
    }

    #[test]
    fn test_uploaded_bundle_deserialize() {
        let bundle: UploadedBundle =
            serde_json::from_str(r#"{"versionCode": 42, "sha256": "ff"}"#).unwrap();
        assert_eq!(bundle.version_code, 42);
        assert!(bundle.sha1.is_none());
    }

    #[test]
    fn test_request_validate() {
        let mut bundle = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut bundle, b"PK\x03\x04bundle").unwrap();

        let mut request = DeployRequest {
            package_name: "com.example.app".to_string(),
            bundle_path: bundle.path().to_path_buf(),
            track: Track::Internal,
            release_notes: None,
        };
        assert_eq!(request.validate().unwrap(), 10);

        request.bundle_path = std::env::temp_dir();
        assert!(matches!(request.validate(), Err(StoreError::InvalidArtifact(_))));

        request.bundle_path = PathBuf::from("/nonexistent/app.aab");
        assert!(matches!(request.validate(), Err(StoreError::InvalidArtifact(_))));

        request.package_name = "  ".to_string();
        assert!(matches!(request.validate(), Err(StoreError::ConfigurationError(_))));
    }

    #[test]
    fn test_config_chunk_size_validation() {
        assert!(GooglePlayConfig::default().validate().is_ok());

        let config = GooglePlayConfig { upload_chunk_size: 1000, ..Default::default() };
        assert!(config.validate().is_err());

        let config = GooglePlayConfig { upload_chunk_size: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
