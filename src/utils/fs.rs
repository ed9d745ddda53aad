use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::errors::{AppResult, CrawlerError};

/// Path of the temporary sibling used while writing `path`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `data` to `path` so readers never observe a partial file.
///
/// The bytes go to `{path}.tmp` first, any existing target is removed, and the
/// temp file is renamed into place. Parent directories are created on demand.
pub async fn save_file_atomic(path: &Path, data: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CrawlerError::filesystem(parent, e))?;
        }
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, data)
        .await
        .map_err(|e| CrawlerError::filesystem(&tmp_path, e))?;

    remove_if_exists(path).await?;

    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| CrawlerError::filesystem(path, e))?;
    Ok(())
}

/// Delete a file, treating "already gone" as success
pub async fn remove_if_exists(path: &Path) -> AppResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CrawlerError::filesystem(path, e)),
    }
}
