use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    api::{
        ApiError, ApiResult, BantamApi, CompletedUpload, CreateProjectRequest, CreatedProject,
        CreatedProjectInfo, Domain, GeneratedSubdomain, PresignGrant, Project, ProjectStatus,
        SubdomainAvailability, TokenValidation, User,
    },
    deploy::{upload::ProgressObserver, UploadArtifact},
    prompt::Prompter,
};

/// Identifier of the project created by [`FakeApi`].
pub(crate) const PROJECT_ID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

/// Active, verified domain without wildcard support.
pub(crate) fn domain(id: &str, hostname: &str) -> Domain {
    Domain {
        id: id.to_owned(),
        domain: hostname.to_owned(),
        status: String::from("active"),
        verification_status: String::from("verified"),
        verification_method: String::from("txt"),
        wildcard_enabled: false,
        wildcard_verification_status: None,
        created_at: Some(String::from("2024-01-01T00:00:00Z")),
    }
}

/// Active, deployed permanent project.
pub(crate) fn project(id: &str, name: &str) -> Project {
    Project {
        id: id.to_owned(),
        name: name.to_owned(),
        url: format!("{name}.bantam.site"),
        kind: Some(String::from("site")),
        status: String::from("active"),
        subdomain: Some(name.to_owned()),
        domain_id: None,
        r2_status: Some(String::from("ready")),
        cdn_error: None,
        created_at: Some(String::from("2024-01-01T00:00:00Z")),
        expires_at: None,
        file_count: Some(3),
        storage_size: Some(2048),
    }
}

/// Scripted status response in the provided phase.
pub(crate) fn status(phase: &str) -> ApiResult<Option<ProjectStatus>> {
    Ok(Some(ProjectStatus {
        id: Some(PROJECT_ID.to_owned()),
        r2_status: phase.to_owned(),
        cdn_error: None,
        file_count: None,
    }))
}

/// Observer that ignores all progress updates.
pub(crate) struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _fraction: f64) {}
}

/// Progress observer that records every reported value.
#[derive(Default)]
pub(crate) struct RecordingProgress(Mutex<Vec<f64>>);

impl RecordingProgress {
    /// Values reported so far.
    pub fn values(&self) -> Vec<f64> {
        self.0.lock().unwrap().clone()
    }
}

impl ProgressObserver for RecordingProgress {
    fn on_progress(&self, fraction: f64) {
        self.0.lock().unwrap().push(fraction);
    }
}

/// Scripted [`BantamApi`] implementation recording every call.
pub(crate) struct FakeApi {
    /// Names of the called operations, in call order.
    pub calls: Mutex<Vec<&'static str>>,
    /// Result of [`BantamApi::domains`].
    pub domains: ApiResult<Vec<Domain>>,
    /// Result of [`BantamApi::projects`].
    pub projects: ApiResult<Vec<Project>>,
    /// Subdomain availability reported by [`BantamApi::check_subdomain`].
    pub available: ApiResult<bool>,
    /// Slug returned by [`BantamApi::generate_subdomain`].
    pub generated: ApiResult<String>,
    /// Result of [`BantamApi::presign`].
    pub presign: ApiResult<PresignGrant>,
    /// Result of [`BantamApi::upload`].
    pub upload: ApiResult<()>,
    /// Result of [`BantamApi::complete_upload`].
    pub complete: ApiResult<()>,
    /// Result of [`BantamApi::create_project`].
    pub create: ApiResult<CreatedProject>,
    /// Result of [`BantamApi::delete_project`].
    pub delete: ApiResult<()>,
    /// Result of [`BantamApi::validate_token`].
    pub token: ApiResult<TokenValidation>,
    /// Results of consecutive [`BantamApi::project_status`] calls.
    pub statuses: Mutex<VecDeque<ApiResult<Option<ProjectStatus>>>>,
    /// Serialized project creation requests.
    pub create_requests: Mutex<Vec<serde_json::Value>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            domains: Ok(Vec::new()),
            projects: Ok(Vec::new()),
            available: Ok(true),
            generated: Ok(String::from("quiet-meadow-42")),
            presign: Ok(PresignGrant {
                upload_url: String::from("https://storage.example/upload"),
                file_id: String::from("file-1"),
                temp_path: None,
            }),
            upload: Ok(()),
            complete: Ok(()),
            create: Ok(CreatedProject {
                project: CreatedProjectInfo {
                    id: PROJECT_ID.to_owned(),
                    url: String::from("quiet-meadow-42.bantam.site"),
                    subdomain: None,
                    expires_at: None,
                    r2_status: Some(String::from("project_created")),
                },
                job_id: None,
            }),
            delete: Ok(()),
            token: Ok(TokenValidation {
                valid: true,
                user: User {
                    id: String::from("user-1"),
                    email: Some(String::from("dev@example.com")),
                    tier: None,
                },
            }),
            statuses: Mutex::default(),
            create_requests: Mutex::default(),
        }
    }
}

impl FakeApi {
    /// Create fake answering status requests with `statuses`.
    pub fn with_statuses(
        statuses: impl IntoIterator<Item = ApiResult<Option<ProjectStatus>>>,
    ) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Names of the called operations, in call order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Record a call of the named operation.
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BantamApi for FakeApi {
    async fn presign(&self, _artifact: &UploadArtifact) -> ApiResult<PresignGrant> {
        self.record("presign");
        self.presign.clone()
    }

    async fn upload(
        &self,
        _artifact: &UploadArtifact,
        _grant: &PresignGrant,
        progress: Arc<dyn ProgressObserver>,
    ) -> ApiResult<()> {
        self.record("upload");
        progress.on_progress(0.5);
        self.upload.clone()?;
        progress.on_progress(1.0);
        Ok(())
    }

    async fn complete_upload(&self, file_id: &str) -> ApiResult<CompletedUpload> {
        self.record("complete_upload");
        self.complete.clone().map(|()| CompletedUpload {
            file_id: Some(file_id.to_owned()),
        })
    }

    async fn create_project(
        &self,
        request: &CreateProjectRequest<'_>,
    ) -> ApiResult<CreatedProject> {
        self.record("create_project");
        self.create_requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(request).unwrap());
        self.create.clone()
    }

    async fn projects(&self) -> ApiResult<Vec<Project>> {
        self.record("projects");
        self.projects.clone()
    }

    async fn delete_project(&self, _project_id: &str) -> ApiResult<()> {
        self.record("delete_project");
        self.delete.clone()
    }

    async fn domains(&self) -> ApiResult<Vec<Domain>> {
        self.record("domains");
        self.domains.clone()
    }

    async fn validate_token(&self) -> ApiResult<TokenValidation> {
        self.record("validate_token");
        self.token.clone()
    }

    async fn check_subdomain(
        &self,
        subdomain: &str,
        domain_id: Option<&str>,
    ) -> ApiResult<SubdomainAvailability> {
        self.record("check_subdomain");
        self.available
            .clone()
            .map(|available| SubdomainAvailability {
                available,
                subdomain: Some(subdomain.to_owned()),
                domain_id: domain_id.map(ToOwned::to_owned),
            })
    }

    async fn generate_subdomain(&self, _domain_id: Option<&str>) -> ApiResult<GeneratedSubdomain> {
        self.record("generate_subdomain");
        self.generated.clone().map(|slug| GeneratedSubdomain { slug })
    }

    async fn project_status(&self, _project_id: &str) -> ApiResult<Option<ProjectStatus>> {
        self.record("project_status");
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::new("no scripted status left")))
    }
}

/// Prompter answering with pre-scripted values.
#[derive(Default)]
pub(crate) struct ScriptedPrompter {
    /// Answers to yes/no questions.
    pub confirmations: Mutex<VecDeque<bool>>,
    /// Answers to text and password prompts.
    pub inputs: Mutex<VecDeque<String>>,
    /// Every prompt message, in order.
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// Create prompter with scripted answers.
    pub fn new(confirmations: &[bool], inputs: &[&str]) -> Self {
        Self {
            confirmations: Mutex::new(confirmations.iter().copied().collect()),
            inputs: Mutex::new(inputs.iter().map(|input| input.to_string()).collect()),
            asked: Mutex::default(),
        }
    }

    /// Every prompt message, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    /// Record the prompt and pop the next text answer.
    fn next_input(&self, message: &str) -> io::Result<String> {
        self.asked.lock().unwrap().push(message.to_owned());
        self.inputs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted input"))
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: &str, _default: bool) -> io::Result<bool> {
        self.asked.lock().unwrap().push(message.to_owned());
        self.confirmations
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer"))
    }

    fn input(&self, message: &str) -> io::Result<String> {
        self.next_input(message)
    }

    fn password(&self, message: &str) -> io::Result<String> {
        self.next_input(message)
    }
}
