use std::{future::Future, time::Duration};

use tracing::{debug, warn};

use crate::api::BantamApi;

/// Maximum number of status requests.
pub(crate) const MAX_ATTEMPTS: u32 = 60;

/// Delay between status requests.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Deployment pipeline phase reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeploymentPhase {
    /// Waiting for the artifact upload.
    AwaitingUpload,

    /// Artifact is being uploaded.
    Uploading,

    /// Artifact upload finished.
    UploadComplete,

    /// Project is being created.
    CreatingProject,

    /// Project was created, processing hasn't started yet.
    ProjectCreated,

    /// Waiting for a processing worker.
    QueuedForProcessing,

    /// Uploaded files are being validated.
    Validating,

    /// Uploaded files are being processed.
    Processing,

    /// Processed files are being moved to storage.
    MovingToStorage,

    /// Files are being distributed to the CDN.
    SyncingToCdn,

    /// Site is live.
    Ready,

    /// Site is live.
    Deployed,

    /// Pipeline failed.
    Failed,

    /// Pipeline was cancelled.
    Cancelled,

    /// Phase unknown to this client.
    Unrecognized(String),
}

impl From<&str> for DeploymentPhase {
    fn from(value: &str) -> Self {
        match value {
            "awaiting_upload" => Self::AwaitingUpload,
            "uploading" => Self::Uploading,
            "upload_complete" => Self::UploadComplete,
            "creating_project" => Self::CreatingProject,
            "project_created" => Self::ProjectCreated,
            "queued_for_processing" => Self::QueuedForProcessing,
            "validating" => Self::Validating,
            "processing" => Self::Processing,
            "moving_to_storage" => Self::MovingToStorage,
            "syncing_to_cdn" => Self::SyncingToCdn,
            "ready" => Self::Ready,
            "deployed" => Self::Deployed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            other => Self::Unrecognized(other.to_owned()),
        }
    }
}

impl DeploymentPhase {
    /// Wire representation of the phase.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AwaitingUpload => "awaiting_upload",
            Self::Uploading => "uploading",
            Self::UploadComplete => "upload_complete",
            Self::CreatingProject => "creating_project",
            Self::ProjectCreated => "project_created",
            Self::QueuedForProcessing => "queued_for_processing",
            Self::Validating => "validating",
            Self::Processing => "processing",
            Self::MovingToStorage => "moving_to_storage",
            Self::SyncingToCdn => "syncing_to_cdn",
            Self::Ready => "ready",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Progress message of an in-progress phase.
    pub fn message(&self) -> String {
        let message = match self {
            Self::AwaitingUpload => "Awaiting upload",
            Self::Uploading => "Uploading files",
            Self::UploadComplete => "Upload complete",
            Self::CreatingProject => "Creating project",
            Self::ProjectCreated => "Project created, starting processing",
            Self::QueuedForProcessing => "Queued for processing",
            Self::Validating => "Validating files",
            Self::Processing => "Processing files",
            Self::MovingToStorage => "Moving to storage",
            Self::SyncingToCdn => "Syncing to CDN",
            Self::Ready | Self::Deployed => "Deployment complete",
            Self::Failed => "Deployment failed",
            Self::Cancelled => "Deployment was cancelled",
            Self::Unrecognized(raw) => return format!("Processing: {raw}..."),
        };

        format!("{message}...")
    }

    /// Check if the site is live.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ready | Self::Deployed)
    }

    /// Check if the pipeline stopped without publishing the site.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

/// Final result of the status polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeploymentOutcome {
    /// Site is live.
    Succeeded,

    /// Pipeline failed with the provided reason.
    Failed(String),

    /// Pipeline was cancelled before publishing the site.
    Cancelled,

    /// Polling budget was exhausted.
    TimedOut,

    /// Status couldn't be fetched.
    MonitoringUnavailable,

    /// Polling was stopped by the user.
    Interrupted,
}

impl DeploymentOutcome {
    /// Check if the outcome must fail the deploy command.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Cancelled)
    }
}

/// Bounded deployment status poller.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StatusPoller {
    /// Maximum number of status requests.
    pub max_attempts: u32,

    /// Delay between status requests.
    pub interval: Duration,
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            interval: POLL_INTERVAL,
        }
    }
}

impl StatusPoller {
    /// Poll the project status until the pipeline reaches a terminal phase.
    ///
    /// `on_phase` is invoked with every in-progress phase. Once `cancel`
    /// resolves no further requests are made.
    pub async fn poll<A, C, F>(
        &self,
        api: &A,
        project_id: &str,
        cancel: C,
        mut on_phase: F,
    ) -> DeploymentOutcome
    where
        A: BantamApi + ?Sized,
        C: Future<Output = ()>,
        F: FnMut(&DeploymentPhase),
    {
        tokio::pin!(cancel);

        for attempt in 1..=self.max_attempts {
            let status = match api.project_status(project_id).await {
                Ok(Some(status)) => status,
                Ok(None) => {
                    warn!(%project_id, "empty deployment status");
                    return DeploymentOutcome::MonitoringUnavailable;
                }
                Err(error) => {
                    warn!(%project_id, %error, "unable to fetch deployment status");
                    return DeploymentOutcome::MonitoringUnavailable;
                }
            };

            let phase = DeploymentPhase::from(status.r2_status.as_str());
            debug!(%project_id, attempt, phase = phase.as_str(), "deployment status");

            match phase {
                DeploymentPhase::Failed => {
                    return DeploymentOutcome::Failed(
                        status
                            .cdn_error
                            .filter(|reason| !reason.is_empty())
                            .unwrap_or_else(|| String::from("Unknown error")),
                    )
                }
                DeploymentPhase::Cancelled => return DeploymentOutcome::Cancelled,
                phase if phase.is_success() => return DeploymentOutcome::Succeeded,
                phase => on_phase(&phase),
            }

            if attempt == self.max_attempts {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut cancel => return DeploymentOutcome::Interrupted,
            }
        }

        DeploymentOutcome::TimedOut
    }
}
