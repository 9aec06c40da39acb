//! Resumable media upload
//!
//! Implements the Google resumable upload protocol: one request opens an
//! upload session, then the file is sent in fixed-size chunks, each tagged
//! with a `Content-Range`. The server answers `308` while it wants more and
//! `200`/`201` with the created resource once the last byte is in.

use std::io::SeekFrom;
use std::path::Path;

use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use super::GooglePlayStore;
use crate::error::{Result, StoreError};
use crate::types::UploadedBundle;

const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// `308 Resume Incomplete`
const RESUME_INCOMPLETE: u16 = 308;

impl GooglePlayStore {
    /// Upload `path` to a resumable upload endpoint, chunk by chunk
    pub(super) async fn upload_resumable(&self, url: &str, path: &Path) -> Result<UploadedBundle> {
        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            StoreError::InvalidArtifact(format!("Cannot open {}: {}", path.display(), e))
        })?;
        let total = file.metadata().await?.len();

        let session_uri = self.start_upload_session(url, total).await?;
        debug!("Resumable upload session opened for {} bytes", total);

        if total == 0 {
            let response = self.put_chunk(&session_uri, "bytes */0".to_string(), Vec::new()).await?;
            return match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json().await?),
                status => Err(upload_failure(status, response).await),
            };
        }

        let chunk_size = self.config.upload_chunk_size;
        let mut buffer = vec![0u8; chunk_size];
        let mut offset = 0u64;
        let mut file_position = 0u64;
        let mut restarted = false;

        while offset < total {
            if file_position != offset {
                file.seek(SeekFrom::Start(offset)).await?;
            }

            let len = chunk_len(offset, total, chunk_size);
            file.read_exact(&mut buffer[..len]).await?;
            file_position = offset + len as u64;

            let range = content_range(offset, len, total);
            debug!("Uploading {}", range);

            let response = self
                .put_chunk(&session_uri, range, buffer[..len].to_vec())
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => return Ok(response.json().await?),
                status if status.as_u16() == RESUME_INCOMPLETE => {
                    let acknowledged = response
                        .headers()
                        .get(RANGE)
                        .and_then(|value| value.to_str().ok())
                        .map(next_offset)
                        .transpose()?;

                    offset = match acknowledged {
                        // No Range: nothing persisted
                        None if !restarted => {
                            debug!("Server persisted no bytes, restarting upload at 0");
                            restarted = true;
                            0
                        }
                        None => {
                            return Err(StoreError::UploadFailed(format!(
                                "Server persisted no bytes of {} after a restart",
                                total
                            )))
                        }
                        Some(next) if next > offset && next <= total => next,
                        Some(next) => {
                            return Err(StoreError::UploadFailed(format!(
                                "Server acknowledged offset {} after sending bytes {}-{} of {}",
                                next,
                                offset,
                                file_position - 1,
                                total
                            )))
                        }
                    };
                }
                status => return Err(upload_failure(status, response).await),
            }
        }

        Err(StoreError::UploadFailed(format!(
            "All {} bytes sent but the server did not finish the upload",
            total
        )))
    }

    /// Open a resumable session, returning the session URI
    async fn start_upload_session(&self, url: &str, total: u64) -> Result<String> {
        let token = self.get_access_token().await?;

        let response = self
            .client
            .post(url)
            .query(&[("uploadType", "resumable")])
            .header("Authorization", format!("Bearer {}", token))
            .header("X-Upload-Content-Type", UPLOAD_CONTENT_TYPE)
            .header("X-Upload-Content-Length", total.to_string())
            .body(Vec::<u8>::new())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(upload_failure(status, response).await);
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::UploadFailed("Upload session response has no Location header".to_string())
            })
    }

    async fn put_chunk(
        &self,
        session_uri: &str,
        range: String,
        bytes: Vec<u8>,
    ) -> Result<reqwest::Response> {
        let token = self.get_access_token().await?;

        Ok(self
            .client
            .put(session_uri)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", UPLOAD_CONTENT_TYPE)
            .header(CONTENT_RANGE, range)
            .body(bytes)
            .send()
            .await?)
    }
}

async fn upload_failure(status: StatusCode, response: reqwest::Response) -> StoreError {
    let error_text = response.text().await.unwrap_or_default();
    StoreError::UploadFailed(format!("{} - {}", status.as_u16(), error_text))
}

/// Length of the chunk starting at `offset`
fn chunk_len(offset: u64, total: u64, chunk_size: usize) -> usize {
    let remaining = total - offset;
    remaining.min(chunk_size as u64) as usize
}

/// `Content-Range` value for `len` bytes starting at `offset`
fn content_range(offset: u64, len: usize, total: u64) -> String {
    format!("bytes {}-{}/{}", offset, offset + len as u64 - 1, total)
}

/// Offset after the last persisted byte, from a `Range: bytes=0-<last>` header
fn next_offset(range: &str) -> Result<u64> {
    range
        .trim()
        .strip_prefix("bytes=")
        .and_then(|span| span.split_once('-'))
        .and_then(|(_, last)| last.trim().parse::<u64>().ok())
        .map(|last| last + 1)
        .ok_or_else(|| StoreError::UploadFailed(format!("Malformed Range header '{}'", range)))
}

#[cfg(test)]
mod tests {
    use super::super::tests::authenticated_store;
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::io::Write;

    const CHUNK: usize = 256 * 1024;
    const BUNDLES: &str = "/applications/com.example.app/edits/edit-1/bundles";

    fn bundle_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        file.write_all(&bytes).unwrap();
        file
    }

    async fn open_session(server: &MockServer, total: usize) {
        let location = server.url("/session");
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(BUNDLES)
                    .query_param("uploadType", "resumable")
                    .header("Authorization", "Bearer test-token")
                    .header("X-Upload-Content-Type", "application/octet-stream")
                    .header("X-Upload-Content-Length", total.to_string());
                then.status(200).header("Location", location);
            })
            .await;
    }

    #[test]
    fn test_content_range() {
        assert_eq!(content_range(0, CHUNK, 600_000), "bytes 0-262143/600000");
        assert_eq!(content_range(524_288, 75_712, 600_000), "bytes 524288-599999/600000");
        assert_eq!(content_range(0, 1, 1), "bytes 0-0/1");
    }

    #[test]
    fn test_chunk_len() {
        assert_eq!(chunk_len(0, 600_000, CHUNK), CHUNK);
        assert_eq!(chunk_len(524_288, 600_000, CHUNK), 75_712);
        assert_eq!(chunk_len(0, 10, CHUNK), 10);
    }

    #[test]
    fn test_chunks_cover_file_exactly() {
        let total = 1_000_000u64;
        let mut offset = 0u64;
        let mut ranges = Vec::new();
        while offset < total {
            let len = chunk_len(offset, total, CHUNK);
            ranges.push(content_range(offset, len, total));
            offset += len as u64;
        }
        assert_eq!(offset, total);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges.last().unwrap(), "bytes 786432-999999/1000000");
    }

    #[test]
    fn test_next_offset() {
        assert_eq!(next_offset("bytes=0-262143").unwrap(), 262_144);
        assert_eq!(next_offset(" bytes=0-0 ").unwrap(), 1);
    }

    #[test]
    fn test_next_offset_malformed() {
        assert!(next_offset("0-100").is_err());
        assert!(next_offset("bytes=0-").is_err());
        assert!(next_offset("bytes=abc").is_err());
    }

    #[tokio::test]
    async fn test_upload_in_chunks() {
        let server = MockServer::start_async().await;
        open_session(&server, 300_000).await;

        let first = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/session")
                    .header("Content-Range", "bytes 0-262143/300000");
                then.status(308).header("Range", "bytes=0-262143");
            })
            .await;
        let last = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/session")
                    .header("Content-Range", "bytes 262144-299999/300000");
                then.status(200).json_body(json!({
                    "versionCode": 42,
                    "sha1": "da39a3ee",
                    "sha256": "e3b0c442"
                }));
            })
            .await;

        let file = bundle_file(300_000);
        let store = authenticated_store(&server.base_url()).await;
        let bundle = store
            .upload_resumable(&server.url(BUNDLES), file.path())
            .await
            .unwrap();

        assert_eq!(bundle.version_code, 42);
        assert_eq!(bundle.sha256.as_deref(), Some("e3b0c442"));
        first.assert_async().await;
        last.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_reseeks_to_persisted_offset() {
        let server = MockServer::start_async().await;
        open_session(&server, 300_000).await;

        server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/session")
                    .header("Content-Range", "bytes 0-262143/300000");
                then.status(308).header("Range", "bytes=0-99999");
            })
            .await;
        let resumed = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/session")
                    .header("Content-Range", "bytes 100000-299999/300000");
                then.status(201).json_body(json!({ "versionCode": 7 }));
            })
            .await;

        let file = bundle_file(300_000);
        let store = authenticated_store(&server.base_url()).await;
        let bundle = store
            .upload_resumable(&server.url(BUNDLES), file.path())
            .await
            .unwrap();

        assert_eq!(bundle.version_code, 7);
        resumed.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_restarts_once_without_range() {
        let server = MockServer::start_async().await;
        open_session(&server, 300_000).await;

        let first = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/session")
                    .header("Content-Range", "bytes 0-262143/300000");
                then.status(308).header("Range", "bytes=0-262143");
            })
            .await;
        let last = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/session")
                    .header("Content-Range", "bytes 262144-299999/300000");
                then.status(308);
            })
            .await;

        let file = bundle_file(300_000);
        let store = authenticated_store(&server.base_url()).await;
        let err = store
            .upload_resumable(&server.url(BUNDLES), file.path())
            .await
            .unwrap_err();

        // Each chunk goes out once before the restart and once after it
        assert_eq!(first.hits_async().await, 2);
        assert_eq!(last.hits_async().await, 2);
        match err {
            StoreError::UploadFailed(message) => assert!(message.contains("after a restart")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_rejects_offset_past_end() {
        let server = MockServer::start_async().await;
        open_session(&server, 300_000).await;

        server
            .mock_async(|when, then| {
                when.method(PUT).path("/session");
                then.status(308).header("Range", "bytes=0-400000");
            })
            .await;

        let file = bundle_file(300_000);
        let store = authenticated_store(&server.base_url()).await;
        let err = store
            .upload_resumable(&server.url(BUNDLES), file.path())
            .await
            .unwrap_err();

        match err {
            StoreError::UploadFailed(message) => {
                assert!(message.contains("acknowledged offset 400001"))
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_rejects_offset_that_does_not_advance() {
        let server = MockServer::start_async().await;
        open_session(&server, 300_000).await;

        server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/session")
                    .header("Content-Range", "bytes 0-262143/300000");
                then.status(308).header("Range", "bytes=0-262143");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/session")
                    .header("Content-Range", "bytes 262144-299999/300000");
                then.status(308).header("Range", "bytes=0-262143");
            })
            .await;

        let file = bundle_file(300_000);
        let store = authenticated_store(&server.base_url()).await;
        let err = store
            .upload_resumable(&server.url(BUNDLES), file.path())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::UploadFailed(_)));
    }

    #[tokio::test]
    async fn test_upload_session_without_location() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST).path(BUNDLES);
                then.status(200);
            })
            .await;

        let file = bundle_file(10);
        let store = authenticated_store(&server.base_url()).await;
        let err = store
            .upload_resumable(&server.url(BUNDLES), file.path())
            .await
            .unwrap_err();

        match err {
            StoreError::UploadFailed(message) => assert!(message.contains("Location")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_empty_file() {
        let server = MockServer::start_async().await;
        open_session(&server, 0).await;

        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/session")
                    .header("Content-Range", "bytes */0");
                then.status(200).json_body(json!({ "versionCode": 1 }));
            })
            .await;

        let file = bundle_file(0);
        let store = authenticated_store(&server.base_url()).await;
        let bundle = store
            .upload_resumable(&server.url(BUNDLES), file.path())
            .await
            .unwrap();

        assert_eq!(bundle.version_code, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chunk_rejection_is_upload_failure() {
        let server = MockServer::start_async().await;
        open_session(&server, 10).await;

        server
            .mock_async(|when, then| {
                when.method(PUT).path("/session");
                then.status(400).body("APK specifies a version code that has already been used.");
            })
            .await;

        let file = bundle_file(10);
        let store = authenticated_store(&server.base_url()).await;
        let err = store
            .upload_resumable(&server.url(BUNDLES), file.path())
            .await
            .unwrap_err();

        match err {
            StoreError::UploadFailed(message) => {
                assert!(message.starts_with("400"));
                assert!(message.contains("version code"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
