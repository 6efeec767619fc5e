//! Best-effort removal of uploaded originals and derived artifacts.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

/// Remove each path, ignoring files that are already gone.
///
/// Returns how many files were actually removed.
pub async fn remove_files<I, P>(paths: I) -> usize
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut removed = 0;

    for path in paths {
        let path = path.as_ref();
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed file");
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove file: {}", e),
        }
    }

    removed
}
