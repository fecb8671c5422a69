//! Repository identity and the remote collaborators of a sync run.
//!
//! The sync engine only talks to two narrow interfaces:
//!
//! - [`MetadataProvider`] validates a repository and lists its files.
//! - [`AddressResolver`] turns a repo-relative path into a fetch URL.
//!
//! [`hub::HubClient`] implements both against the hub REST API.

pub mod hub;

use std::fmt;
use std::str::FromStr;

use crate::error::SyncResult;

/// Revision used when none is given.
pub const DEFAULT_REVISION: &str = "main";

/// Kind of repository on the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RepoType {
    #[default]
    Model,
    Dataset,
    Space,
}

impl RepoType {
    /// All repository kinds.
    pub const ALL: [RepoType; 3] = [RepoType::Model, RepoType::Dataset, RepoType::Space];

    /// Lowercase singular name, as used in the local layout.
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::Model => "model",
            RepoType::Dataset => "dataset",
            RepoType::Space => "space",
        }
    }

    /// Collection name used in API paths (`/api/models/...`).
    pub fn api_collection(&self) -> &'static str {
        match self {
            RepoType::Model => "models",
            RepoType::Dataset => "datasets",
            RepoType::Space => "spaces",
        }
    }

    /// Prefix used in file URLs. Models live at the root.
    pub fn url_prefix(&self) -> Option<&'static str> {
        match self {
            RepoType::Model => None,
            RepoType::Dataset => Some("datasets"),
            RepoType::Space => Some("spaces"),
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "model" => Ok(RepoType::Model),
            "dataset" => Ok(RepoType::Dataset),
            "space" => Ok(RepoType::Space),
            other => Err(format!(
                "unknown repository type '{}' (expected model, dataset or space)",
                other
            )),
        }
    }
}

/// A repository at a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    /// Repository id, usually `owner/name`.
    pub id: String,
    /// Repository kind.
    pub repo_type: RepoType,
    /// Branch, tag or commit; `None` means the default branch.
    pub revision: Option<String>,
}

impl RepoRef {
    /// Reference the default revision of a repository.
    pub fn new(id: impl Into<String>, repo_type: RepoType) -> Self {
        Self {
            id: id.into(),
            repo_type,
            revision: None,
        }
    }

    /// Pin a revision.
    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision.filter(|r| !r.is_empty());
        self
    }

    /// The revision, or `main` when unset.
    pub fn revision_or_default(&self) -> &str {
        self.revision.as_deref().unwrap_or(DEFAULT_REVISION)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}",
            self.repo_type,
            self.id,
            self.revision_or_default()
        )
    }
}

/// A file as listed by the metadata provider.
///
/// `size` is `None` when the provider could not supply it; zero is a real size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Slash-separated path inside the repository.
    pub path: String,
    /// Size in bytes, if known.
    pub size: Option<u64>,
}

impl RemoteFile {
    pub fn new(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Summary returned by repository validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoInfo {
    /// Canonical repository id as reported by the hub.
    pub id: String,
    /// Commit the revision currently points at.
    pub sha: Option<String>,
}

/// Source of repository metadata.
///
/// Implementations may combine several listing strategies internally; callers
/// only see that `RemoteFile::size` is optional.
pub trait MetadataProvider: Send + Sync {
    /// Check that the repository exists and is accessible.
    fn repo_info(&self, repo: &RepoRef) -> SyncResult<RepoInfo>;

    /// List every file of the repository at its revision.
    fn list_files(&self, repo: &RepoRef) -> SyncResult<Vec<RemoteFile>>;
}

/// Builds a stable fetch address for a repository file.
pub trait AddressResolver: Send + Sync {
    fn resolve(&self, repo: &RepoRef, path: &str) -> SyncResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_type_round_trip_names() {
        for kind in RepoType::ALL {
            assert_eq!(kind.as_str().parse::<RepoType>().unwrap(), kind);
        }
        assert_eq!("Dataset".parse::<RepoType>().unwrap(), RepoType::Dataset);
        assert!("bucket".parse::<RepoType>().is_err());
    }

    #[test]
    fn test_repo_type_paths() {
        assert_eq!(RepoType::Model.api_collection(), "models");
        assert_eq!(RepoType::Model.url_prefix(), None);
        assert_eq!(RepoType::Space.url_prefix(), Some("spaces"));
    }

    #[test]
    fn test_repo_ref_default_revision() {
        let repo = RepoRef::new("acme/widget", RepoType::Model);
        assert_eq!(repo.revision_or_default(), "main");
        assert_eq!(repo.to_string(), "model:acme/widget@main");

        let pinned = repo.with_revision(Some("v1.0".to_string()));
        assert_eq!(pinned.revision_or_default(), "v1.0");
    }

    #[test]
    fn test_empty_revision_means_default() {
        let repo = RepoRef::new("acme/widget", RepoType::Dataset).with_revision(Some(String::new()));
        assert_eq!(repo.revision, None);
    }
}
