//! Filesystem helpers for publishing outputs.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file, falling back to copy-and-delete across filesystems.
///
/// Temp directories and the output directory are often on different
/// mounts, where rename fails with EXDEV. The copy lands in a temp file
/// next to the destination first so the final rename is atomic.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                "Cross-device rename, falling back to copy"
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV is error code 18 on Linux and macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(MediaError::from(e));
    }

    // Source removal is best effort; the move already succeeded.
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            src = %src.display(),
            error = %e,
            "Failed to remove source after cross-device move"
        );
    }

    Ok(())
}
