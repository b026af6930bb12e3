use std::{
    ffi::OsStr,
    fs::File,
    io::{self, Seek, Write},
    path::{Component, Path, PathBuf, StripPrefixError},
};

use derive_more::{Display, Error, From};
use glob::Pattern;
use once_cell::sync::Lazy;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// Entries that are never packaged.
///
/// Plain names are compared with the entry file name, names with a `*`
/// are matched as glob patterns against the whole file name.
const IGNORED_PATTERNS: &[&str] = &[
    ".git",
    ".DS_Store",
    "node_modules",
    ".env",
    ".env.local",
    "npm-debug.log",
    "yarn-error.log",
    ".vscode",
    ".idea",
    "*.swp",
    "*.swo",
    "*~",
    "Thumbs.db",
];

/// Compiled glob patterns from [`IGNORED_PATTERNS`].
static IGNORED_GLOBS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    IGNORED_PATTERNS
        .iter()
        .filter(|pattern| pattern.contains('*'))
        .filter_map(|pattern| Pattern::new(pattern).ok())
        .collect()
});

/// Maximum deflate compression level.
const COMPRESSION_LEVEL: i32 = 9;

/// Files that are served as a site entrypoint.
const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

/// Errors that may occur during the archive creation process.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ArchiverError {
    /// [`zip`]-crate specific error.
    #[display(fmt = "unable to finalize archive: {}", _0)]
    Zip(zip::result::ZipError),

    /// [`walkdir`]-crate specific error.
    #[display(fmt = "unable to read directory: {}", _0)]
    WalkDir(walkdir::Error),

    /// IO error.
    Io(io::Error),

    /// Unable to strip directory prefix from path.
    StripPrefix(StripPrefixError),
}

/// Check if the file name matches the deny-list.
pub(crate) fn is_ignored(name: &str) -> bool {
    IGNORED_PATTERNS.contains(&name) || IGNORED_GLOBS.iter().any(|glob| glob.matches(name))
}

/// Archive the `dir` directory into a new temporary ZIP file.
///
/// The file is kept on disk after this function returns, and it's up to the caller
/// to remove it once it's no longer needed.
pub(crate) fn archive(dir: &Path) -> Result<PathBuf, ArchiverError> {
    let file = tempfile::Builder::new()
        .prefix("bantam-deploy-")
        .suffix(".zip")
        .tempfile()?;

    let (file, path) = file.keep().map_err(|error| error.error)?;

    debug!(source = %dir.display(), archive = %path.display(), "creating archive");

    if let Err(error) = build_zip_archive(dir, file) {
        if let Err(remove_error) = std::fs::remove_file(&path) {
            warn!(%remove_error, "unable to remove incomplete archive");
        }

        return Err(error);
    }

    Ok(path)
}

/// Archive contents of `dir` into the provided `file`.
///
/// [`build_zip_archive`] makes use of a [`walk_directory`] function,
/// including its file filtering capabilities. See [`IGNORED_PATTERNS`]
/// for the list of entries skipped during the packaging process.
pub(crate) fn build_zip_archive<W: Write + Seek>(dir: &Path, file: W) -> Result<W, ArchiverError> {
    let mut writer = ZipWriter::new(file);

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut entries = walk_directory(dir);

    while let Some(entry) = entries.next().transpose()? {
        let relative = entry.path().strip_prefix(dir)?;

        let Some(name) = archive_name(relative) else {
            if !relative.as_os_str().is_empty() {
                warn!(path = %entry.path().display(), "skipping path with non-unicode symbols");
            }
            continue;
        };

        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            io::copy(&mut File::open(entry.path())?, &mut writer)?;
        }
    }

    Ok(writer.finish()?)
}

/// Convert a relative path into a `/`-separated archive entry name.
///
/// Returns [`None`] for an empty path or a path with non-unicode components.
fn archive_name(relative: &Path) -> Option<String> {
    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Recursively iterate over the directory contents while filtering them.
///
/// Returned [`Iterator`] will not yield any entries matched by [`is_ignored`],
/// and ignored directories are not descended into.
fn walk_directory(dir: &Path) -> impl Iterator<Item = Result<DirEntry, walkdir::Error>> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .map_or(false, is_ignored)
        })
}

/// Total size of all files beneath `dir`, in bytes.
pub(crate) fn directory_size(dir: &Path) -> Result<u64, ArchiverError> {
    let mut total = 0;

    for entry in WalkDir::new(dir) {
        let entry = entry?;

        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }

    Ok(total)
}

/// Find the site entrypoint inside of `dir`.
pub(crate) fn find_index_file(dir: &Path) -> Option<PathBuf> {
    INDEX_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Guess MIME type of the file from its extension.
pub(crate) fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match &*extension {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "xml" => "application/xml",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        _ => "application/octet-stream",
    }
}
