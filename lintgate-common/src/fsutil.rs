//! Small filesystem helpers shared by the on-disk stores.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use uuid::Uuid;

/// Writes content to a file atomically using a temporary file in the same
/// directory followed by a rename.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        )
    })?;
    fs::create_dir_all(parent)?;
    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    let write = || -> io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    };

    let result = write();
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// Runs `f` while holding an exclusive advisory lock on `lock_path`.
///
/// The lock is per open file description, so it excludes other threads of
/// this process as well as other processes. It is released when the guard
/// file is closed, including when the holder crashes.
pub(crate) fn with_exclusive_lock<T, E>(
    lock_path: &Path,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<Result<T, E>, io::Error> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let guard = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?;
    guard.lock_exclusive()?;

    let result = f();

    let _ = FileExt::unlock(&guard);
    Ok(result)
}
