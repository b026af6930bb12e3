use std::{fmt, io, sync::Arc};

use async_trait::async_trait;
use derive_more::Error;
use futures_util::{stream, Stream};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Body, Client, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, de::IgnoredAny, Deserialize, Serialize};
use tokio::{fs::File, io::AsyncReadExt};
use tracing::debug;

use crate::deploy::{
    upload::{ProgressObserver, UploadProgress},
    UploadArtifact,
};

/// `User-Agent` header value sent with every request.
const USER_AGENT: &str = concat!("Bantam-CLI/", env!("CARGO_PKG_VERSION"));

/// Size of a single chunk streamed to a presigned upload URL.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Result of a single remote API call.
pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Error returned by the remote API, or produced while talking to it.
///
/// Transport failures and malformed responses are normalized into the same
/// shape as application errors, so callers never need to tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Error)]
pub(crate) struct ApiError {
    /// Machine-readable error string.
    #[serde(default)]
    pub error: String,

    /// Optional human-readable message.
    #[serde(default)]
    pub message: Option<String>,

    /// HTTP status code of the failed response, if any.
    #[serde(skip)]
    pub status: Option<u16>,
}

impl ApiError {
    /// Create new error with the provided machine-readable string.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            status: None,
        }
    }

    /// Attach a human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach HTTP status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status.as_u16());
        self
    }

    /// Normalize a transport-level failure.
    fn transport(error: impl fmt::Display) -> Self {
        Self::new(error.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, self.error.is_empty()) {
            (Some(message), _) => f.write_str(message),
            (None, false) => f.write_str(&self.error),
            (None, true) => f.write_str("Unknown error"),
        }
    }
}

/// JSON request body used to obtain a presigned upload URL.
#[derive(Serialize)]
struct PresignRequest<'a> {
    /// Uploaded file name.
    filename: &'a str,

    /// Uploaded file MIME type.
    #[serde(rename = "type")]
    mime_type: &'a str,

    /// Uploaded file size, in bytes.
    size: u64,
}

/// Short-lived upload capability issued by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresignGrant {
    /// Presigned destination URL.
    pub upload_url: String,

    /// Identifier used to finalize the upload and create a project.
    pub file_id: String,

    /// Server-side temporary path of the upload.
    #[serde(default)]
    pub temp_path: Option<String>,
}

/// JSON response body of the upload completion request.
#[derive(Debug, Deserialize)]
pub(crate) struct CompletedUpload {
    /// Finalized file identifier.
    #[serde(rename = "fileId", default)]
    pub file_id: Option<String>,
}

/// JSON request body used to create a new project.
#[derive(Debug, Serialize)]
pub(crate) struct CreateProjectRequest<'a> {
    /// Uploaded file identifier.
    #[serde(rename = "fileId")]
    pub file_id: &'a str,

    /// Project display name.
    pub name: &'a str,

    /// Project type.
    #[serde(rename = "type")]
    pub kind: &'a str,

    /// Requested subdomain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<&'a str>,

    /// Custom domain identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<&'a str>,

    /// Whether the project never expires.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub permanent: bool,

    /// Number of days before the project expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_days: Option<u32>,
}

/// Project information returned after the project creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct CreatedProjectInfo {
    /// Project identifier.
    pub id: String,

    /// Public project URL, without the scheme.
    pub url: String,

    /// Assigned subdomain.
    #[serde(default)]
    pub subdomain: Option<String>,

    /// Expiration timestamp of a temporary project.
    #[serde(default)]
    pub expires_at: Option<String>,

    /// Current pipeline phase.
    #[serde(default)]
    pub r2_status: Option<String>,
}

/// JSON response body of the project creation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct CreatedProject {
    /// Created project.
    pub project: CreatedProjectInfo,

    /// Processing job identifier.
    #[serde(rename = "jobId", default)]
    pub job_id: Option<String>,
}

/// Deployed site owned by the current user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Project {
    /// Project identifier (UUID).
    pub id: String,

    /// Project display name.
    pub name: String,

    /// Public project URL, without the scheme.
    pub url: String,

    /// Project type (`site`, `spa` or `docs`).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Free-form project status.
    #[serde(default)]
    pub status: String,

    /// Assigned subdomain.
    #[serde(default)]
    pub subdomain: Option<String>,

    /// Custom domain identifier.
    #[serde(default)]
    pub domain_id: Option<String>,

    /// Current pipeline phase.
    #[serde(default)]
    pub r2_status: Option<String>,

    /// CDN error reported by a failed pipeline.
    #[serde(default)]
    pub cdn_error: Option<String>,

    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,

    /// Expiration timestamp of a temporary project.
    #[serde(default)]
    pub expires_at: Option<String>,

    /// Number of deployed files.
    #[serde(default)]
    pub file_count: Option<u64>,

    /// Storage used by the project, in bytes.
    #[serde(default)]
    pub storage_size: Option<u64>,
}

/// Verification status value used for verified domains and wildcards.
pub(crate) const VERIFIED: &str = "verified";

/// Custom domain owned by the current user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Domain {
    /// Domain identifier.
    pub id: String,

    /// Domain hostname.
    pub domain: String,

    /// Domain activity status.
    #[serde(default)]
    pub status: String,

    /// Apex domain verification status.
    #[serde(default)]
    pub verification_status: String,

    /// Apex domain verification method.
    #[serde(default)]
    pub verification_method: String,

    /// Whether deployments to arbitrary subdomains are allowed.
    #[serde(default)]
    pub wildcard_enabled: bool,

    /// Wildcard DNS verification status.
    #[serde(default)]
    pub wildcard_verification_status: Option<String>,

    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Domain {
    /// Check if the apex domain was verified.
    pub fn is_verified(&self) -> bool {
        self.verification_status == VERIFIED
    }

    /// Check if the domain is active.
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    /// Check if the wildcard DNS record was verified.
    pub fn is_wildcard_verified(&self) -> bool {
        self.wildcard_verification_status.as_deref() == Some(VERIFIED)
    }
}

/// User associated with an authentication token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct User {
    /// User identifier.
    pub id: String,

    /// User email.
    #[serde(default)]
    pub email: Option<String>,

    /// Account tier.
    #[serde(default)]
    pub tier: Option<String>,
}

/// JSON response body of the token validation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct TokenValidation {
    /// Whether the token is valid.
    #[serde(default)]
    pub valid: bool,

    /// Token owner.
    pub user: User,
}

/// JSON response body of the subdomain availability check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct SubdomainAvailability {
    /// Whether the subdomain can be used.
    pub available: bool,

    /// Checked subdomain.
    #[serde(default)]
    pub subdomain: Option<String>,

    /// Checked domain identifier.
    #[serde(default)]
    pub domain_id: Option<String>,
}

/// JSON response body of the subdomain generation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct GeneratedSubdomain {
    /// Generated subdomain.
    pub slug: String,
}

/// Current deployment pipeline state of a project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ProjectStatus {
    /// Project identifier.
    #[serde(default)]
    pub id: Option<String>,

    /// Pipeline phase.
    #[serde(default)]
    pub r2_status: String,

    /// Error detail of a failed pipeline.
    #[serde(default)]
    pub cdn_error: Option<String>,

    /// Number of processed files.
    #[serde(default)]
    pub file_count: Option<u64>,
}

/// JSON request body used to change the project status.
#[derive(Serialize)]
struct ProjectStatusUpdate<'a> {
    /// New project status.
    status: &'a str,
}

/// Remote hosting API.
///
/// Every call is a single request. Failures of any kind are reported
/// as [`ApiError`].
#[async_trait]
pub(crate) trait BantamApi: Send + Sync {
    /// Request a presigned upload URL for the provided artifact.
    async fn presign(&self, artifact: &UploadArtifact) -> ApiResult<PresignGrant>;

    /// Stream the artifact to the presigned destination.
    async fn upload(
        &self,
        artifact: &UploadArtifact,
        grant: &PresignGrant,
        progress: Arc<dyn ProgressObserver>,
    ) -> ApiResult<()>;

    /// Finalize the upload.
    async fn complete_upload(&self, file_id: &str) -> ApiResult<CompletedUpload>;

    /// Create a new project from the uploaded file.
    async fn create_project(&self, request: &CreateProjectRequest<'_>)
        -> ApiResult<CreatedProject>;

    /// List projects of the current user.
    async fn projects(&self) -> ApiResult<Vec<Project>>;

    /// Soft-delete a project.
    async fn delete_project(&self, project_id: &str) -> ApiResult<()>;

    /// List custom domains of the current user.
    async fn domains(&self) -> ApiResult<Vec<Domain>>;

    /// Validate the current authentication token.
    async fn validate_token(&self) -> ApiResult<TokenValidation>;

    /// Check if the subdomain can be used for a new project.
    async fn check_subdomain(
        &self,
        subdomain: &str,
        domain_id: Option<&str>,
    ) -> ApiResult<SubdomainAvailability>;

    /// Generate a random available subdomain.
    async fn generate_subdomain(&self, domain_id: Option<&str>) -> ApiResult<GeneratedSubdomain>;

    /// Fetch the deployment pipeline state of a project.
    ///
    /// Returns [`None`] if the server responded with no data.
    async fn project_status(&self, project_id: &str) -> ApiResult<Option<ProjectStatus>>;
}

/// HTTP implementation of [`BantamApi`].
pub(crate) struct ApiClient {
    /// Underlying HTTP client.
    http: Client,

    /// API base URL, without a trailing slash.
    base_url: String,

    /// Bearer authentication token.
    token: Option<String>,
}

impl ApiClient {
    /// Create new API client.
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .expect("unable to build HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
        }
    }

    /// Build an absolute API URL.
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attach the bearer token, if any.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send the request and normalize its response.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(ApiError::transport)?;

        handle_response(response).await
    }
}

/// Read the response body and normalize it.
async fn handle_response<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(ApiError::transport)?;

    debug!(status = status.as_u16(), "received API response");

    normalize(status, &body)
}

/// Turn a response status and body into an [`ApiResult`].
///
/// An empty successful body is treated as JSON `null`.
fn normalize<T: DeserializeOwned>(status: StatusCode, body: &str) -> ApiResult<T> {
    let body = match body.trim() {
        "" if status.is_success() => "null",
        body => body,
    };

    if status.is_success() {
        return serde_json::from_str(body).map_err(|_| {
            ApiError::new("Invalid JSON response from server").with_status(status)
        });
    }

    match serde_json::from_str::<ApiError>(body) {
        Ok(error) if !error.error.is_empty() || error.message.is_some() => {
            Err(error.with_status(status))
        }
        _ => Err(
            ApiError::new(format!("Request failed with status {}", status.as_u16()))
                .with_status(status),
        ),
    }
}

/// Stream the file in chunks, reporting progress after every chunk.
fn progress_stream(
    file: File,
    total: u64,
    observer: Arc<dyn ProgressObserver>,
) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + Sync + 'static {
    let state = (file, UploadProgress::new(total), observer);

    stream::try_unfold(state, |(mut file, mut progress, observer)| async move {
        let mut chunk = vec![0; UPLOAD_CHUNK_SIZE];
        let read = file.read(&mut chunk).await?;

        if read == 0 {
            if let Some(fraction) = progress.finish() {
                observer.on_progress(fraction);
            }

            return Ok(None);
        }

        chunk.truncate(read);
        observer.on_progress(progress.advance(read as u64));

        Ok(Some((chunk, (file, progress, observer))))
    })
}

#[async_trait]
impl BantamApi for ApiClient {
    async fn presign(&self, artifact: &UploadArtifact) -> ApiResult<PresignGrant> {
        self.send(self.http.post(self.url("/uploads/presign")).json(&PresignRequest {
            filename: &artifact.name,
            mime_type: &artifact.mime_type,
            size: artifact.size,
        }))
        .await
    }

    async fn upload(
        &self,
        artifact: &UploadArtifact,
        grant: &PresignGrant,
        progress: Arc<dyn ProgressObserver>,
    ) -> ApiResult<()> {
        let file = File::open(&artifact.path)
            .await
            .map_err(ApiError::transport)?;
        let total = file.metadata().await.map_err(ApiError::transport)?.len();

        debug!(size = total, "streaming artifact to presigned URL");

        // Presigned URLs carry their own authorization.
        let response = self
            .http
            .put(&grant.upload_url)
            .header(header::CONTENT_LENGTH, total)
            .body(Body::wrap_stream(progress_stream(file, total, progress)))
            .send()
            .await
            .map_err(ApiError::transport)?;

        let status = response.status();

        if !status.is_success() {
            return Err(
                ApiError::new(format!("Upload failed with status {}", status.as_u16()))
                    .with_status(status),
            );
        }

        Ok(())
    }

    async fn complete_upload(&self, file_id: &str) -> ApiResult<CompletedUpload> {
        self.send(
            self.http
                .post(self.url(&format!("/uploads/{file_id}/complete"))),
        )
        .await
    }

    async fn create_project(
        &self,
        request: &CreateProjectRequest<'_>,
    ) -> ApiResult<CreatedProject> {
        self.send(self.http.post(self.url("/projects")).json(request))
            .await
    }

    async fn projects(&self) -> ApiResult<Vec<Project>> {
        let response = self
            .authorize(self.http.get(self.url("/account/projects")))
            .send()
            .await
            .map_err(ApiError::transport)?;

        let status = response.status();

        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();

            if message.is_empty() {
                message = status.canonical_reason().unwrap_or_default().to_owned();
            }

            return Err(ApiError::new(format!("HTTP {}", status.as_u16()))
                .with_message(message)
                .with_status(status));
        }

        let value: serde_json::Value = handle_response(response).await?;

        if !value.is_array() {
            return Err(ApiError::new("Invalid response format")
                .with_message("Expected an array of projects"));
        }

        serde_json::from_value(value).map_err(|_| {
            ApiError::new("Invalid response format").with_message("Malformed project entry")
        })
    }

    async fn delete_project(&self, project_id: &str) -> ApiResult<()> {
        let _: IgnoredAny = self
            .send(
                self.http
                    .put(self.url(&format!("/projects/status/{project_id}")))
                    .json(&ProjectStatusUpdate { status: "deleted" }),
            )
            .await?;

        Ok(())
    }

    async fn domains(&self) -> ApiResult<Vec<Domain>> {
        self.send(self.http.get(self.url("/domains"))).await
    }

    async fn validate_token(&self) -> ApiResult<TokenValidation> {
        self.send(self.http.get(self.url("/auth/tokens/validate")))
            .await
    }

    async fn check_subdomain(
        &self,
        subdomain: &str,
        domain_id: Option<&str>,
    ) -> ApiResult<SubdomainAvailability> {
        let mut query = vec![("subdomain", subdomain)];
        query.extend(domain_id.map(|id| ("domain_id", id)));

        self.send(self.http.get(self.url("/slugs/check")).query(&query))
            .await
    }

    async fn generate_subdomain(&self, domain_id: Option<&str>) -> ApiResult<GeneratedSubdomain> {
        let query: Vec<_> = domain_id.map(|id| ("domain_id", id)).into_iter().collect();

        self.send(self.http.get(self.url("/slugs/generate")).query(&query))
            .await
    }

    async fn project_status(&self, project_id: &str) -> ApiResult<Option<ProjectStatus>> {
        self.send(
            self.http
                .get(self.url(&format!("/projects/{project_id}/status"))),
        )
        .await
    }
}
