//! Local mirror layout.
//!
//! `<local_dir>/<repo_type>/<repo_id with '/' as '__'>/<revision or main>/<file path>`

use std::path::{Component, Path, PathBuf};

use crate::error::{SyncError, SyncResult};
use crate::repo::RepoRef;

/// Separator substituted for `/` in repository ids.
const ID_SEPARATOR: &str = "__";

/// Flatten a namespaced id such as `org/name` into one directory name.
pub fn escape_repo_id(id: &str) -> String {
    id.replace('/', ID_SEPARATOR)
}

/// Root directory of the mirror for `repo`.
pub fn destination_root(local_dir: &Path, repo: &RepoRef) -> PathBuf {
    local_dir
        .join(repo.repo_type.as_str())
        .join(escape_repo_id(&repo.id))
        .join(repo.revision_or_default())
}

/// Destination of a repo-relative `path` below `root`.
///
/// Rejects paths that are absolute, empty or climb out of `root`.
pub fn destination_for(root: &Path, path: &str) -> SyncResult<PathBuf> {
    let unsafe_path = || SyncError::UnsafePath {
        path: path.to_string(),
    };

    let mut dest = root.to_path_buf();
    let mut depth = 0;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                dest.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path())
            }
        }
    }

    if depth == 0 {
        return Err(unsafe_path());
    }
    Ok(dest)
}
