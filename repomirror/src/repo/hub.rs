//! Hub REST client: repository validation, file listing and file URLs.
//!
//! Listing degrades through three tiers of capability:
//!
//! 1. recursive tree listing (paths and sizes, paginated via `Link` headers)
//! 2. revision info with blob metadata (`siblings[].size`)
//! 3. revision info with paths only (sizes unknown)
//!
//! Callers never learn which tier answered; they only see optional sizes.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::LINK;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use super::{AddressResolver, MetadataProvider, RemoteFile, RepoInfo, RepoRef};
use crate::error::{SyncError, SyncResult};

/// Public hub used when no endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Upper bound on followed tree pages, against a server that loops its links.
const MAX_TREE_PAGES: usize = 10_000;

/// Client for the hub metadata API, also resolving file download URLs.
pub struct HubClient {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

/// Why a single metadata request failed.
#[derive(Debug, Error)]
enum HubFailure {
    #[error("HTTP {0}")]
    Status(StatusCode),
    #[error("{0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("pagination did not terminate")]
    Pagination,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RevisionInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
    #[serde(default)]
    size: Option<u64>,
}

impl HubClient {
    /// Create a client for the given endpoint.
    ///
    /// `timeout` bounds connect, read and write of every metadata request.
    /// An empty token is treated as no token.
    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration) -> SyncResult<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| SyncError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// The hub base URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Whether a bearer credential is attached to requests.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url_with<I, S>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.endpoint.clone();
        // parse_endpoint only accepts base URLs, so the segments are always available
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn api_url(&self, repo: &RepoRef, tail: &[&str]) -> Url {
        let segments = ["api", repo.repo_type.api_collection()]
            .into_iter()
            .chain(repo.id.split('/'))
            .chain(tail.iter().copied());
        self.url_with(segments)
    }

    fn revision_url(&self, repo: &RepoRef, blobs: bool) -> Url {
        let mut url = self.api_url(repo, &["revision", repo.revision_or_default()]);
        if blobs {
            url.query_pairs_mut().append_pair("blobs", "true");
        }
        url
    }

    fn tree_url(&self, repo: &RepoRef) -> Url {
        let mut url = self.api_url(repo, &["tree", repo.revision_or_default()]);
        url.query_pairs_mut().append_pair("recursive", "true");
        url
    }

    fn file_url(&self, repo: &RepoRef, path: &str) -> Url {
        let segments = repo
            .repo_type
            .url_prefix()
            .into_iter()
            .chain(repo.id.split('/'))
            .chain(["resolve", repo.revision_or_default()])
            .chain(path.split('/').filter(|s| !s.is_empty()));
        self.url_with(segments)
    }

    fn request(&self, url: Url) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<(T, Option<Url>), HubFailure> {
        let response = self
            .request(url)
            .send()
            .map_err(|e| HubFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HubFailure::Status(status));
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link)
            .and_then(|link| Url::parse(&link).ok());

        let body = response
            .json::<T>()
            .map_err(|e| HubFailure::Decode(e.to_string()))?;
        Ok((body, next))
    }

    fn list_tree(&self, repo: &RepoRef) -> Result<Vec<RemoteFile>, HubFailure> {
        let mut files = Vec::new();
        let mut url = self.tree_url(repo);

        for _ in 0..MAX_TREE_PAGES {
            let (entries, next) = self.fetch_json::<Vec<TreeEntry>>(url)?;
            files.extend(files_from_tree(entries));
            match next {
                Some(next) => url = next,
                None => return Ok(files),
            }
        }
        Err(HubFailure::Pagination)
    }

    fn list_siblings(&self, repo: &RepoRef, blobs: bool) -> Result<Vec<RemoteFile>, HubFailure> {
        let (info, _) = self.fetch_json::<RevisionInfo>(self.revision_url(repo, blobs))?;
        Ok(files_from_siblings(info.siblings, blobs))
    }
}

impl MetadataProvider for HubClient {
    fn repo_info(&self, repo: &RepoRef) -> SyncResult<RepoInfo> {
        let url = self.revision_url(repo, false);
        match self.fetch_json::<RevisionInfo>(url.clone()) {
            Ok((info, _)) => Ok(RepoInfo {
                id: info.id.unwrap_or_else(|| repo.id.clone()),
                sha: info.sha,
            }),
            Err(HubFailure::Status(status)) if status == StatusCode::NOT_FOUND => {
                Err(SyncError::RepoNotFound {
                    repo: repo.to_string(),
                })
            }
            Err(HubFailure::Status(status))
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                Err(SyncError::AuthRejected {
                    repo: repo.to_string(),
                    status: status.as_u16(),
                })
            }
            Err(other) => Err(SyncError::Api {
                url: url.to_string(),
                reason: other.to_string(),
            }),
        }
    }

    fn list_files(&self, repo: &RepoRef) -> SyncResult<Vec<RemoteFile>> {
        match self.list_tree(repo) {
            Ok(files) => {
                info!(repo = %repo, files = files.len(), "listed files from tree");
                return Ok(files);
            }
            Err(e) => debug!(repo = %repo, error = %e, "tree listing unavailable"),
        }

        match self.list_siblings(repo, true) {
            Ok(files) if !files.is_empty() => {
                info!(repo = %repo, files = files.len(), "listed files from revision blobs");
                return Ok(files);
            }
            Ok(_) => debug!(repo = %repo, "revision blobs listed no files"),
            Err(e) => debug!(repo = %repo, error = %e, "revision blob listing unavailable"),
        }

        let files = self
            .list_siblings(repo, false)
            .map_err(|e| SyncError::ListingFailed {
                repo: repo.to_string(),
                reason: e.to_string(),
            })?;
        info!(repo = %repo, files = files.len(), "listed file paths without sizes");
        Ok(files)
    }
}

impl AddressResolver for HubClient {
    fn resolve(&self, repo: &RepoRef, path: &str) -> SyncResult<String> {
        Ok(self.file_url(repo, path).into())
    }
}

fn parse_endpoint(endpoint: &str) -> SyncResult<Url> {
    let invalid = |reason: String| SyncError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    Ok(url)
}

/// User agent sent with every request.
pub fn user_agent() -> String {
    format!("repomirror/{}", crate::VERSION)
}

/// Extract the `rel="next"` target from a `Link` header.
fn parse_next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        let mut pieces = part.split(';');
        let Some(target) = pieces.next().map(str::trim) else {
            continue;
        };
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if is_next {
            return target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string);
        }
    }
    None
}

fn files_from_tree(entries: Vec<TreeEntry>) -> Vec<RemoteFile> {
    entries
        .into_iter()
        .filter(|e| e.kind == "file")
        .map(|e| RemoteFile::new(e.path, e.size))
        .collect()
}

fn files_from_siblings(siblings: Vec<Sibling>, keep_sizes: bool) -> Vec<RemoteFile> {
    siblings
        .into_iter()
        .map(|s| RemoteFile::new(s.rfilename, s.size.filter(|_| keep_sizes)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::RepoType;

    fn client(endpoint: &str) -> HubClient {
        HubClient::new(endpoint, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        assert!(matches!(
            HubClient::new("not a url", None, Duration::from_secs(1)),
            Err(SyncError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            HubClient::new("ftp://hub.example", None, Duration::from_secs(1)),
            Err(SyncError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let hub = HubClient::new("https://hub.example", Some(String::new()), Duration::from_secs(1))
            .unwrap();
        assert!(!hub.has_token());
    }

    #[test]
    fn test_metadata_requests_carry_bearer_token() {
        let hub = HubClient::new(
            "https://hub.example",
            Some("hf_secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let url = Url::parse("https://hub.example/api/models/acme/widget").unwrap();

        let request = hub.request(url).build().unwrap();
        assert_eq!(
            request.headers()[reqwest::header::AUTHORIZATION],
            "Bearer hf_secret"
        );
    }

    #[test]
    fn test_metadata_requests_without_token_are_anonymous() {
        let url = Url::parse("https://hub.example/api/models/acme/widget").unwrap();

        let request = client("https://hub.example").request(url).build().unwrap();
        assert!(request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .is_none());
    }

    #[test]
    fn test_model_file_url() {
        let hub = client("https://hub.example");
        let repo = RepoRef::new("acme/widget", RepoType::Model);

        let url = hub.resolve(&repo, "weights/model.safetensors").unwrap();
        assert_eq!(
            url,
            "https://hub.example/acme/widget/resolve/main/weights/model.safetensors"
        );
    }

    #[test]
    fn test_dataset_file_url_encodes_revision_and_path() {
        let hub = client("https://hub.example/");
        let repo = RepoRef::new("acme/corpus", RepoType::Dataset)
            .with_revision(Some("refs/pr/1".to_string()));

        let url = hub.resolve(&repo, "data/train split.parquet").unwrap();
        assert_eq!(
            url,
            "https://hub.example/datasets/acme/corpus/resolve/refs%2Fpr%2F1/data/train%20split.parquet"
        );
    }

    #[test]
    fn test_endpoint_with_path_prefix() {
        let hub = client("https://mirror.example/hub");
        let repo = RepoRef::new("acme/app", RepoType::Space);

        assert_eq!(
            hub.resolve(&repo, "app.py").unwrap(),
            "https://mirror.example/hub/spaces/acme/app/resolve/main/app.py"
        );
    }

    #[test]
    fn test_api_urls() {
        let hub = client("https://hub.example");
        let repo = RepoRef::new("acme/widget", RepoType::Model);

        assert_eq!(
            hub.tree_url(&repo).as_str(),
            "https://hub.example/api/models/acme/widget/tree/main?recursive=true"
        );
        assert_eq!(
            hub.revision_url(&repo, true).as_str(),
            "https://hub.example/api/models/acme/widget/revision/main?blobs=true"
        );
        assert_eq!(
            hub.revision_url(&repo, false).as_str(),
            "https://hub.example/api/models/acme/widget/revision/main"
        );
    }

    #[test]
    fn test_parse_next_link() {
        let header = r#"<https://hub.example/api/models/a/b/tree/main?cursor=xyz>; rel="next""#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://hub.example/api/models/a/b/tree/main?cursor=xyz")
        );

        let header = r#"<https://hub.example/first>; rel="prev", <https://hub.example/second>; rel=next"#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://hub.example/second")
        );

        assert_eq!(parse_next_link(r#"<https://hub.example/x>; rel="prev""#), None);
    }

    #[test]
    fn test_tree_entries_keep_files_only() {
        let json = r#"[
            {"type": "directory", "oid": "1", "path": "weights"},
            {"type": "file", "oid": "2", "size": 1024, "path": "weights/model.bin"},
            {"type": "file", "oid": "3", "size": 0, "path": "empty.txt"}
        ]"#;
        let entries: Vec<TreeEntry> = serde_json::from_str(json).unwrap();

        assert_eq!(
            files_from_tree(entries),
            vec![
                RemoteFile::new("weights/model.bin", Some(1024)),
                RemoteFile::new("empty.txt", Some(0)),
            ]
        );
    }

    #[test]
    fn test_siblings_with_and_without_sizes() {
        let json = r#"{
            "id": "acme/widget",
            "sha": "abc123",
            "siblings": [
                {"rfilename": "config.json"},
                {"rfilename": "model.bin", "size": 42}
            ]
        }"#;
        let info: RevisionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.sha.as_deref(), Some("abc123"));

        let files = files_from_siblings(info.siblings, true);
        assert_eq!(files[0], RemoteFile::new("config.json", None));
        assert_eq!(files[1], RemoteFile::new("model.bin", Some(42)));

        let info: RevisionInfo = serde_json::from_str(json).unwrap();
        let files = files_from_siblings(info.siblings, false);
        assert!(files.iter().all(|f| f.size.is_none()));
    }

    #[test]
    fn test_revision_info_tolerates_missing_fields() {
        let info: RevisionInfo = serde_json::from_str("{}").unwrap();
        assert!(info.id.is_none());
        assert!(info.siblings.is_empty());
    }
}
