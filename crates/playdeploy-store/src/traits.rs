//! Publishing API traits

use crate::error::Result;
use crate::types::*;
use std::path::Path;

/// Operations of the Play Developer API that a deployment needs
///
/// Every mutating call is scoped to an edit session opened with
/// [`create_edit`](PublishingApi::create_edit) and finished with either
/// [`commit_edit`](PublishingApi::commit_edit) or
/// [`delete_edit`](PublishingApi::delete_edit).
#[async_trait::async_trait]
pub trait PublishingApi: Send + Sync {
    /// Obtain credentials for the API scope
    async fn authenticate(&self) -> Result<()>;

    /// Open a new edit session
    async fn create_edit(&self, package_name: &str) -> Result<EditSession>;

    /// Upload an App Bundle into the edit
    async fn upload_bundle(
        &self,
        package_name: &str,
        edit_id: &str,
        path: &Path,
    ) -> Result<UploadedBundle>;

    /// Replace the releases of a track within the edit
    async fn update_track(
        &self,
        package_name: &str,
        edit_id: &str,
        update: &TrackUpdate,
    ) -> Result<TrackUpdate>;

    /// Commit the edit, publishing its changes
    async fn commit_edit(&self, package_name: &str, edit_id: &str) -> Result<()>;

    /// Discard the edit
    async fn delete_edit(&self, package_name: &str, edit_id: &str) -> Result<()>;
}
