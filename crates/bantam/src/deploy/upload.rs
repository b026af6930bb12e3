use std::sync::Arc;

use derive_more::{Display, Error};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::{
    api::{ApiError, BantamApi, CreateProjectRequest, CreatedProject},
    deploy::{DeployTarget, UploadArtifact},
};

/// Project type reported for every deployment.
const PROJECT_KIND: &str = "site";

/// Receiver of fractional upload progress.
pub(crate) trait ProgressObserver: Send + Sync {
    /// Report progress as a fraction in `0.0..=1.0`.
    fn on_progress(&self, fraction: f64);
}

impl ProgressObserver for ProgressBar {
    fn on_progress(&self, fraction: f64) {
        let length = self.length().unwrap_or_default();
        self.set_position((fraction * length as f64).round() as u64);
    }
}

/// Byte counter that turns uploaded chunks into progress fractions.
///
/// Reported values never decrease, and `1.0` is reported exactly once.
#[derive(Debug)]
pub(crate) struct UploadProgress {
    /// Total number of bytes to upload.
    total: u64,

    /// Number of bytes uploaded so far.
    uploaded: u64,

    /// Whether `1.0` was already reported.
    completed: bool,
}

impl UploadProgress {
    /// Create new counter for `total` bytes.
    pub fn new(total: u64) -> Self {
        Self {
            total,
            uploaded: 0,
            completed: false,
        }
    }

    /// Account for `bytes` more uploaded bytes, returning the current fraction.
    pub fn advance(&mut self, bytes: u64) -> f64 {
        if self.completed {
            return 1.0;
        }

        if self.total == 0 {
            return 0.0;
        }

        self.uploaded = self.uploaded.saturating_add(bytes).min(self.total);

        if self.uploaded < self.total {
            return self.uploaded as f64 / self.total as f64;
        }

        self.completed = true;
        1.0
    }

    /// Finish the upload.
    ///
    /// Returns the final `1.0` fraction if it wasn't reported yet.
    pub fn finish(&mut self) -> Option<f64> {
        if self.completed {
            return None;
        }

        self.completed = true;
        Some(1.0)
    }
}

/// Step of the upload process that is about to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UploadStage {
    /// Requesting a presigned upload URL.
    Presigning,

    /// Streaming the artifact.
    Uploading,

    /// Finalizing the upload.
    Completing,

    /// Creating a project from the uploaded artifact.
    CreatingProject,
}

impl UploadStage {
    /// Message displayed while the stage is in progress.
    pub fn message(self) -> &'static str {
        match self {
            UploadStage::Presigning => "Getting upload URL...",
            UploadStage::Uploading => "Uploading...",
            UploadStage::Completing => "Finalizing upload...",
            UploadStage::CreatingProject => "Creating project...",
        }
    }
}

/// Upload process errors.
///
/// Every variant aborts the deployment.
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum UploadError {
    /// Requested subdomain was taken and a replacement couldn't be generated.
    #[display(fmt = "Failed to generate subdomain: {}", _0)]
    SubdomainGeneration(ApiError),

    /// Unable to obtain a presigned upload URL.
    #[display(fmt = "Failed to get upload URL: {}", _0)]
    Presign(ApiError),

    /// Presigned upload was rejected.
    #[display(fmt = "Upload failed: {}", _0)]
    UploadFailed(ApiError),

    /// Unable to finalize the upload.
    #[display(fmt = "Failed to finalize upload: {}", _0)]
    Complete(ApiError),

    /// Unable to create the project.
    #[display(fmt = "Failed to create project: {}", _0)]
    CreateProject(ApiError),
}

/// Outcome of the subdomain availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reservation {
    /// No subdomain was requested.
    Unrequested,

    /// Requested subdomain is available.
    Available,

    /// Requested subdomain was replaced with a generated one.
    Generated {
        /// Subdomain that was originally requested.
        requested: String,
    },
}

/// Make sure the requested subdomain, if any, can be used.
///
/// An unavailable subdomain, or one that couldn't be checked, is replaced
/// with a server-generated one.
pub(crate) async fn reserve_subdomain<A: BantamApi + ?Sized>(
    api: &A,
    target: &mut DeployTarget,
) -> Result<Reservation, UploadError> {
    let Some(subdomain) = target.subdomain.clone() else {
        return Ok(Reservation::Unrequested);
    };

    let domain_id = target.domain_id.as_deref();

    match api.check_subdomain(&subdomain, domain_id).await {
        Ok(availability) if availability.available => return Ok(Reservation::Available),
        Ok(_) => debug!(%subdomain, "subdomain is taken"),
        Err(error) => warn!(%subdomain, %error, "subdomain availability check failed"),
    }

    let generated = api
        .generate_subdomain(domain_id)
        .await
        .map_err(UploadError::SubdomainGeneration)?;

    info!(requested = %subdomain, generated = %generated.slug, "using generated subdomain");
    target.subdomain = Some(generated.slug);

    Ok(Reservation::Generated {
        requested: subdomain,
    })
}

/// Upload the artifact and create a project from it.
///
/// `on_stage` is invoked before every step. A temporary archive is removed
/// once the project is created, and kept otherwise.
pub(crate) async fn transfer<A, F>(
    api: &A,
    artifact: &UploadArtifact,
    project_name: &str,
    target: &DeployTarget,
    progress: Arc<dyn ProgressObserver>,
    mut on_stage: F,
) -> Result<CreatedProject, UploadError>
where
    A: BantamApi + ?Sized,
    F: FnMut(UploadStage),
{
    on_stage(UploadStage::Presigning);
    let grant = api.presign(artifact).await.map_err(UploadError::Presign)?;
    debug!(file_id = %grant.file_id, "presigned upload URL obtained");

    on_stage(UploadStage::Uploading);
    api.upload(artifact, &grant, progress)
        .await
        .map_err(UploadError::UploadFailed)?;

    on_stage(UploadStage::Completing);
    let completed = api
        .complete_upload(&grant.file_id)
        .await
        .map_err(UploadError::Complete)?;
    debug!(
        file_id = completed.file_id.as_deref().unwrap_or(&grant.file_id),
        "upload finalized"
    );

    on_stage(UploadStage::CreatingProject);
    let created = api
        .create_project(&CreateProjectRequest {
            file_id: &grant.file_id,
            name: project_name,
            kind: PROJECT_KIND,
            subdomain: target.subdomain.as_deref(),
            domain_id: target.domain_id.as_deref(),
            permanent: target.permanent,
            expiry_days: target.expiry_days,
        })
        .await
        .map_err(UploadError::CreateProject)?;

    info!(project_id = %created.project.id, url = %created.project.url, "project created");
    artifact.discard();

    Ok(created)
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use proptest::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    use super::{
        reserve_subdomain, transfer, Reservation, UploadError, UploadProgress,
        UploadStage,
    };
    use crate::{
        api::ApiError,
        deploy::{DeployTarget, UploadArtifact},
        testing::{FakeApi, NoProgress, RecordingProgress},
    };

    /// Archive-like artifact backed by a file in `dir`.
    fn synthesized_artifact(dir: &TempDir) -> UploadArtifact {
        let path = dir.path().join("bantam-deploy-test.zip");
        fs::write(&path, b"PK").unwrap();

        UploadArtifact {
            synthesized: true,
            ..UploadArtifact::from_file(&path).unwrap()
        }
    }

    #[test]
    fn progress_of_empty_file() {
        let mut progress = UploadProgress::new(0);
        assert_eq!(progress.finish(), Some(1.0));
        assert_eq!(progress.finish(), None);
    }

    #[test]
    fn progress_reaches_one_once() {
        let mut progress = UploadProgress::new(10);

        assert_eq!(progress.advance(4), 0.4);
        assert_eq!(progress.advance(6), 1.0);
        assert_eq!(progress.finish(), None);
    }

    #[test]
    fn progress_is_clamped() {
        let mut progress = UploadProgress::new(10);
        assert_eq!(progress.advance(25), 1.0);
    }

    proptest! {
        #[test]
        fn progress_is_monotonic(chunks in prop::collection::vec(1u64..10_000, 0..64)) {
            let total = chunks.iter().sum();
            let mut progress = UploadProgress::new(total);

            let mut values: Vec<f64> = chunks.iter().map(|chunk| progress.advance(*chunk)).collect();
            values.extend(progress.finish());

            prop_assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
            prop_assert!(values.iter().all(|value| (0.0..=1.0).contains(value)));
            prop_assert_eq!(values.last().copied(), Some(1.0));
            prop_assert_eq!(values.iter().filter(|value| **value == 1.0).count(), 1);
        }
    }

    #[tokio::test]
    async fn no_subdomain_requested() {
        let api = FakeApi::default();
        let mut target = DeployTarget::default();

        let reservation = reserve_subdomain(&api, &mut target).await.unwrap();

        assert_eq!(reservation, Reservation::Unrequested);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn available_subdomain_is_kept() {
        let api = FakeApi::default();
        let mut target = DeployTarget {
            subdomain: Some(String::from("myapp")),
            ..Default::default()
        };

        let reservation = reserve_subdomain(&api, &mut target).await.unwrap();

        assert_eq!(reservation, Reservation::Available);
        assert_eq!(target.subdomain.as_deref(), Some("myapp"));
        assert_eq!(api.calls(), ["check_subdomain"]);
    }

    #[tokio::test]
    async fn taken_subdomain_is_replaced() {
        let api = FakeApi {
            available: Ok(false),
            ..Default::default()
        };
        let mut target = DeployTarget {
            subdomain: Some(String::from("myapp")),
            ..Default::default()
        };

        let reservation = reserve_subdomain(&api, &mut target).await.unwrap();

        assert_eq!(
            reservation,
            Reservation::Generated {
                requested: String::from("myapp")
            }
        );
        assert_eq!(target.subdomain.as_deref(), Some("quiet-meadow-42"));
        assert_eq!(api.calls(), ["check_subdomain", "generate_subdomain"]);
    }

    #[tokio::test]
    async fn failed_check_falls_back_to_generation() {
        let api = FakeApi {
            available: Err(ApiError::new("timeout")),
            generated: Err(ApiError::new("quota exceeded")),
            ..Default::default()
        };
        let mut target = DeployTarget {
            subdomain: Some(String::from("myapp")),
            ..Default::default()
        };

        let error = reserve_subdomain(&api, &mut target).await.unwrap_err();

        assert_eq!(
            error,
            UploadError::SubdomainGeneration(ApiError::new("quota exceeded"))
        );
        assert_eq!(target.subdomain.as_deref(), Some("myapp"));
    }

    #[tokio::test]
    async fn successful_transfer() {
        let dir = TempDir::new().unwrap();
        let artifact = synthesized_artifact(&dir);
        let api = FakeApi::default();
        let progress = Arc::new(RecordingProgress::default());
        let target = DeployTarget {
            subdomain: Some(String::from("myapp")),
            ..Default::default()
        }
        .with_lifetime(true, None);

        let mut stages = Vec::new();
        let created = transfer(
            &api,
            &artifact,
            "my-site",
            &target,
            progress.clone(),
            |stage| stages.push(stage),
        )
        .await
        .unwrap();

        assert_eq!(created.project.url, "quiet-meadow-42.bantam.site");
        assert_eq!(
            stages,
            [
                UploadStage::Presigning,
                UploadStage::Uploading,
                UploadStage::Completing,
                UploadStage::CreatingProject,
            ]
        );
        assert_eq!(
            api.calls(),
            ["presign", "upload", "complete_upload", "create_project"]
        );
        assert_eq!(
            api.create_requests.lock().unwrap()[0],
            json!({
                "fileId": "file-1",
                "name": "my-site",
                "type": "site",
                "subdomain": "myapp",
                "permanent": true,
            })
        );
        assert_eq!(progress.values().last().copied(), Some(1.0));
        assert!(!artifact.path.exists());
    }

    #[tokio::test]
    async fn archive_is_kept_on_failure() {
        let dir = TempDir::new().unwrap();
        let artifact = synthesized_artifact(&dir);
        let api = FakeApi {
            create: Err(ApiError::new("invalid").with_message("Subdomain is reserved")),
            ..Default::default()
        };

        let error = transfer(
            &api,
            &artifact,
            "my-site",
            &DeployTarget::default(),
            Arc::new(NoProgress),
            |_| {},
        )
        .await
        .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Failed to create project: Subdomain is reserved"
        );
        assert!(artifact.path.exists());
    }

    #[tokio::test]
    async fn upload_failure_stops_the_process() {
        let dir = TempDir::new().unwrap();
        let artifact = synthesized_artifact(&dir);
        let api = FakeApi {
            upload: Err(ApiError::new("Upload failed with status 403")),
            ..Default::default()
        };

        let error = transfer(
            &api,
            &artifact,
            "my-site",
            &DeployTarget::default(),
            Arc::new(NoProgress),
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(error, UploadError::UploadFailed(_)));
        assert_eq!(api.calls(), ["presign", "upload"]);
        assert!(artifact.path.exists());
    }
}
