//! Bundle deployment workflow
//!
//! Runs the edit lifecycle against a [`PublishingApi`]: open an edit, upload
//! the bundle, assign it to a track and commit. A failure after the edit is
//! opened deletes the edit before the error is returned, so no session is
//! left open.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use crate::error::{Result, StoreError};
use crate::traits::PublishingApi;
use crate::types::{DeployReport, DeployRequest, ReleaseStatus};

/// How far a deployment got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    /// No access token yet
    Unauthenticated,
    /// Access token obtained, no edit yet
    Authenticated,
    /// Edit opened, nothing uploaded
    SessionOpen,
    /// Bundle uploaded into the edit
    ArtifactUploaded,
    /// Track updated with the new version
    TrackUpdated,
    /// Edit committed
    Committed,
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployStage::Unauthenticated => write!(f, "unauthenticated"),
            DeployStage::Authenticated => write!(f, "authenticated"),
            DeployStage::SessionOpen => write!(f, "session open"),
            DeployStage::ArtifactUploaded => write!(f, "artifact uploaded"),
            DeployStage::TrackUpdated => write!(f, "track updated"),
            DeployStage::Committed => write!(f, "committed"),
        }
    }
}

/// URL of the track overview for a package in the Play Console
pub fn console_url(package_name: &str) -> String {
    format!(
        "https://play.google.com/console/developers/app/{}/tracks",
        package_name
    )
}

/// Publish a bundle to a track
///
/// Every remote call is attempted exactly once. On failure the returned
/// [`StoreError::Deploy`] names the last stage reached and the edit that was
/// discarded, if one had been opened.
pub async fn deploy<A>(api: &A, request: &DeployRequest) -> Result<DeployReport>
where
    A: PublishingApi + ?Sized,
{
    if let Err(e) = api.authenticate().await {
        error!("Authentication failed: {}", e);
        return Err(StoreError::Deploy {
            stage: DeployStage::Unauthenticated,
            edit_id: None,
            source: Box::new(e),
        });
    }

    let mut stage = DeployStage::Authenticated;
    let mut edit_id = None;

    match run_edit(api, request, &mut stage, &mut edit_id).await {
        Ok(report) => Ok(report),
        Err(e) => {
            error!("Deployment of {} failed ({}): {}", request.package_name, stage, e);

            if let Some(id) = &edit_id {
                info!("Canceling edit {}", id);
                let _ = api.delete_edit(&request.package_name, id).await;
            }

            Err(StoreError::Deploy {
                stage,
                edit_id,
                source: Box::new(e),
            })
        }
    }
}

async fn run_edit<A>(
    api: &A,
    request: &DeployRequest,
    stage: &mut DeployStage,
    edit_id: &mut Option<String>,
) -> Result<DeployReport>
where
    A: PublishingApi + ?Sized,
{
    let package = request.package_name.as_str();

    info!("Creating edit session for {}", package);
    let edit = api.create_edit(package).await?;
    info!(expires = ?edit.expiry_time_seconds, "Edit session opened: {}", edit.id);
    let id = edit_id.insert(edit.id).clone();
    *stage = DeployStage::SessionOpen;

    info!("Uploading {}", request.bundle_path.display());
    let bundle = api.upload_bundle(package, &id, &request.bundle_path).await?;
    info!(
        sha256 = ?bundle.sha256,
        "Bundle uploaded with version code {}",
        bundle.version_code
    );
    *stage = DeployStage::ArtifactUploaded;

    let update = request.track_update(bundle.version_code);
    info!("Assigning version {} to track '{}'", bundle.version_code, request.track);
    api.update_track(package, &id, &update).await?;
    *stage = DeployStage::TrackUpdated;

    info!("Committing edit {}", id);
    api.commit_edit(package, &id).await?;
    *stage = DeployStage::Committed;

    info!(
        package = package,
        version_code = bundle.version_code,
        track = %request.track,
        "Deployment committed"
    );

    Ok(DeployReport {
        package_name: request.package_name.clone(),
        edit_id: id,
        version_code: bundle.version_code,
        track: request.track,
        status: ReleaseStatus::for_track(request.track),
        console_url: console_url(package),
        committed_at: Utc::now(),
    })
}
