//! Media references: local filesystem paths or object-storage URIs.

use crate::error::{ToolError, ToolResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const GCS_SCHEME: &str = "gs://";

/// A `gs://bucket/object` address. `object` is empty for bucket locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GcsUri {
    pub bucket: String,
    pub object: String,
}

impl GcsUri {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    /// Parse a full object URI (`gs://bucket/path/to/object`).
    pub fn parse(s: &str) -> ToolResult<Self> {
        let rest = s
            .strip_prefix(GCS_SCHEME)
            .ok_or_else(|| ToolError::invalid(format!("not a gs:// URI: {}", s)))?;
        let (bucket, object) = rest
            .split_once('/')
            .ok_or_else(|| ToolError::invalid(format!("URI has no object path: {}", s)))?;
        if bucket.is_empty() || object.is_empty() || object.ends_with('/') {
            return Err(ToolError::invalid(format!("URI has no object path: {}", s)));
        }
        Ok(Self::new(bucket, object))
    }

    /// Parse an output location: `bucket`, `gs://bucket` or `gs://bucket/prefix/`.
    pub fn parse_location(s: &str) -> ToolResult<Self> {
        let rest = s.trim().trim_start_matches(GCS_SCHEME);
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix.trim_matches('/')),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(ToolError::invalid(format!("invalid bucket location: {:?}", s)));
        }
        Ok(Self::new(bucket, prefix))
    }

    /// Append a path segment to this location.
    pub fn join(&self, name: &str) -> Self {
        let name = name.trim_start_matches('/');
        if self.object.is_empty() {
            Self::new(&self.bucket, name)
        } else {
            Self::new(
                &self.bucket,
                format!("{}/{}", self.object.trim_end_matches('/'), name),
            )
        }
    }

    /// Final path segment of the object name.
    pub fn file_name(&self) -> Option<&str> {
        self.object.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

impl fmt::Display for GcsUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.object.is_empty() {
            write!(f, "{}{}", GCS_SCHEME, self.bucket)
        } else {
            write!(f, "{}{}/{}", GCS_SCHEME, self.bucket, self.object)
        }
    }
}

/// Input or output media designator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReference {
    LocalPath(PathBuf),
    ObjectStorage(GcsUri),
}

impl MediaReference {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::ObjectStorage(_))
    }

    /// File name used when the reference is materialized elsewhere.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::LocalPath(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            Self::ObjectStorage(uri) => uri.file_name().map(str::to_string),
        }
    }

    /// Best-effort MIME type derived from the file extension.
    pub fn mime_type(&self) -> Option<String> {
        let name = self.file_name()?;
        mime_guess::from_path(Path::new(&name))
            .first()
            .map(|mime| mime.essence_str().to_string())
    }
}

impl FromStr for MediaReference {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ToolError::invalid("media reference must not be empty"));
        }
        if trimmed.starts_with(GCS_SCHEME) {
            GcsUri::parse(trimmed).map(Self::ObjectStorage)
        } else {
            Ok(Self::LocalPath(PathBuf::from(trimmed)))
        }
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalPath(path) => write!(f, "{}", path.display()),
            Self::ObjectStorage(uri) => write!(f, "{}", uri),
        }
    }
}

/// Output file name of the form `<prefix>-<UTC timestamp>-<tag>-<n>.<ext>`.
///
/// `tag` is random so calls landing in the same second never share a name.
pub fn timestamped_name(prefix: &str, index: usize, extension: &str) -> String {
    let tag = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}-{}.{}",
        prefix,
        chrono::Utc::now().format("%Y%m%d-%H%M%S"),
        &tag[..8],
        index,
        extension.trim_start_matches('.')
    )
}
