//! JSON file output for the question bank and the pending file.
//!
//! Files are written as UTF-8 with two-space indentation so they stay
//! readable and diff cleanly. Each write replaces the whole file.

use crate::store::StoreError;
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, info, instrument};

/// Serialize `value` as pretty JSON and replace the file at `path`.
///
/// Missing parent directories are created first.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_json_file<T>(value: &T, path: &Path) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_string_pretty(value)?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        debug!(dir = %dir.display(), "Ensuring output directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create output dir");
            return Err(StoreError::Write {
                path: path.to_path_buf(),
                source: e,
            });
        }
    }

    fs::write(path, json + "\n")
        .await
        .map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    info!("Wrote JSON file");

    Ok(())
}
