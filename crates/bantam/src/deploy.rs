/// Deployment status polling.
pub(crate) mod poller;

/// Custom domain and subdomain resolution.
pub(crate) mod resolver;

/// Presigned upload and project creation.
pub(crate) mod upload;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::archiver::{self, ArchiverError};

/// Domain hosting projects without a custom domain.
pub(crate) const DEFAULT_SITE_DOMAIN: &str = "bantam.site";

/// Resolved deployment destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DeployTarget {
    /// Requested subdomain, either on the default site domain or on a custom domain.
    pub subdomain: Option<String>,

    /// Custom domain identifier.
    pub domain_id: Option<String>,

    /// Whether the project never expires.
    pub permanent: bool,

    /// Number of days before the project expires.
    pub expiry_days: Option<u32>,
}

impl DeployTarget {
    /// Set project lifetime options.
    pub fn with_lifetime(mut self, permanent: bool, expiry_days: Option<u32>) -> Self {
        self.permanent = permanent;
        self.expiry_days = expiry_days;
        self
    }
}

/// File transferred to the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UploadArtifact {
    /// File name reported to the server.
    pub name: String,

    /// File size, in bytes.
    pub size: u64,

    /// File MIME type.
    pub mime_type: String,

    /// Local file location.
    pub path: PathBuf,

    /// Whether the file is a temporary archive created by this process.
    pub synthesized: bool,
}

impl UploadArtifact {
    /// Describe an existing file.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let size = fs::metadata(path)?.len();

        Ok(Self {
            name: file_name(path),
            size,
            mime_type: archiver::mime_type(path).to_owned(),
            path: path.to_owned(),
            synthesized: false,
        })
    }

    /// Archive a directory into a temporary ZIP file.
    pub fn from_directory(dir: &Path) -> Result<Self, ArchiverError> {
        let path = archiver::archive(dir)?;

        let mut artifact = Self::from_file(&path).map_err(|error| {
            let _ = fs::remove_file(&path);
            error
        })?;
        artifact.synthesized = true;

        Ok(artifact)
    }

    /// Remove the file if it was created by this process.
    ///
    /// Removal is best-effort, failures are only logged.
    pub fn discard(&self) {
        if !self.synthesized {
            return;
        }

        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "temporary archive removed"),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "unable to remove temporary archive")
            }
        }
    }
}

/// Final path component as a [`String`].
fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Project display name derived from the deployed path.
///
/// Directories are named after themselves, files after their stem.
pub(crate) fn project_name(path: &Path, is_dir: bool) -> String {
    let name = if is_dir {
        path.file_name()
    } else {
        path.file_stem()
    };

    name.map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("site"))
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use tempfile::TempDir;

    use super::{project_name, UploadArtifact};

    #[test]
    fn names() {
        assert_eq!(project_name(Path::new("/home/dev/my-site"), true), "my-site");
        assert_eq!(project_name(Path::new("/home/dev/page.html"), false), "page");
        assert_eq!(project_name(Path::new("/"), true), "site");
    }

    #[test]
    fn file_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.html");
        fs::write(&path, "<p>hi</p>").unwrap();

        let artifact = UploadArtifact::from_file(&path).unwrap();
        assert_eq!(artifact.name, "page.html");
        assert_eq!(artifact.size, 9);
        assert_eq!(artifact.mime_type, "text/html");
        assert!(!artifact.synthesized);

        artifact.discard();
        assert!(path.exists());
    }

    #[test]
    fn directory_artifact() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<p>hi</p>").unwrap();

        let artifact = UploadArtifact::from_directory(dir.path()).unwrap();
        assert_eq!(artifact.mime_type, "application/zip");
        assert!(artifact.synthesized);
        assert!(artifact.path.exists());

        artifact.discard();
        assert!(!artifact.path.exists());
    }
}
