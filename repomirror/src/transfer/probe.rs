//! Remote size resolution for files listed without a size.

use tracing::{debug, warn};

use super::http::Transport;
use crate::repo::RemoteFile;

/// Size of `file`, probing `url` only when the listing did not provide one.
///
/// A failed probe is never fatal: the caller continues with an unknown size.
pub fn resolve_size(transport: &dyn Transport, url: &str, file: &RemoteFile) -> Option<u64> {
    if let Some(size) = file.size {
        return Some(size);
    }

    match transport.probe(url) {
        Ok(response) if (200..300).contains(&response.status) => {
            if response.content_length.is_none() {
                debug!(path = %file.path, "probe returned no content length");
            }
            response.content_length
        }
        Ok(response) => {
            debug!(path = %file.path, status = response.status, "size probe rejected");
            None
        }
        Err(e) => {
            warn!(path = %file.path, error = %e, "failed to get size");
            None
        }
    }
}
