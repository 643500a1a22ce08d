//! Filesystem helpers for extractor output.
//!
//! yt-dlp picks the final extension itself (`.description`, `.webp`, `.jpg`,
//! ...), so sidecar files are located by stem and then moved into place. The
//! work directory may sit on a different filesystem than the destination, in
//! which case a plain rename fails with EXDEV.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move `src` to `dst`, falling back to copy+delete across filesystems.
///
/// Creates the destination directory when missing and overwrites any
/// existing file at `dst`.
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
                "Cross-device rename, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_then_remove(src, dst).await
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MediaError::FileNotFound(src.to_path_buf()))
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV is 18 on Linux and macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_then_remove(src: &Path, dst: &Path) -> MediaResult<()> {
    // Stage next to dst so the final rename stays on one filesystem.
    let staged = dst.with_extension("partial");

    if let Err(e) = fs::copy(src, &staged).await {
        tracing::error!("Copy failed {} -> {}: {}", src.display(), staged.display(), e);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&staged, dst).await {
        let _ = fs::remove_file(&staged).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!("Left source behind after copy {}: {}", src.display(), e);
    }

    Ok(())
}

/// Find the first regular file in `dir` whose name starts with `stem`.
///
/// Partial downloads (`.part`, `.ytdl`) are ignored. Entries are sorted so the
/// pick is stable when yt-dlp leaves more than one candidate behind.
pub async fn find_produced_file(dir: impl AsRef<Path>, stem: &str) -> MediaResult<PathBuf> {
    let dir = dir.as_ref();
    let mut entries = fs::read_dir(dir).await?;
    let mut matches = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(stem) || name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        if entry.file_type().await?.is_file() {
            matches.push(entry.path());
        }
    }

    matches.sort();
    matches
        .into_iter()
        .next()
        .ok_or_else(|| MediaError::FileNotFound(dir.join(format!("{}*", stem))))
}
