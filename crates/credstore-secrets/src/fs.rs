//! File-system access used by the store.
//!
//! All writes go through [`FileSystem::write_temp`] followed by a rename, so a
//! destination file is either the old content or the new content, never a
//! partial write. Files are created with mode `0600` on Unix.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// File-system operations consumed by the store, master key manager and
/// recovery flows.
pub trait FileSystem: Send + Sync {
    /// Whether `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Read a whole file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write `data` to a synced temporary file next to `dest` and return its path.
    ///
    /// `dest` itself is not touched.
    fn write_temp(&self, dest: &Path, data: &[u8]) -> io::Result<PathBuf>;

    /// Rename `from` over `to`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file. Returns `false` when there was nothing to remove.
    fn remove(&self, path: &Path) -> io::Result<bool>;

    /// Copy `from` to `to`, replacing `to` atomically.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        let data = self.read(from)?;
        self.write_atomic(to, &data)
    }

    /// Create a directory and its parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Absolute form of `path` with symlinks resolved. Defaults to `path` as given.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }

    /// Atomically replace `dest` with `data`.
    fn write_atomic(&self, dest: &Path, data: &[u8]) -> io::Result<()> {
        let tmp = self.write_temp(dest, data)?;
        if let Err(e) = self.rename(&tmp, dest) {
            discard_temp(self, &tmp);
            return Err(e);
        }
        Ok(())
    }
}

/// Best-effort removal of a temp file left behind by a failed write.
pub(crate) fn discard_temp<F: FileSystem + ?Sized>(fs: &F, tmp: &Path) {
    if let Err(e) = fs.remove(tmp) {
        warn!(path = %tmp.display(), "could not remove temp file: {e}");
    }
}

/// Temp file path for `dest`: `.<name>.tmp` in the same directory.
pub fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.tmp"))
}

/// [`FileSystem`] over `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_temp(&self, dest: &Path, data: &[u8]) -> io::Result<PathBuf> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }

        let tmp = temp_path_for(dest);
        let result = (|| {
            let mut file = open_private(&tmp)?;
            file.write_all(data)?;
            file.sync_all()
        })();

        if let Err(e) = result {
            discard_temp(self, &tmp);
            return Err(e);
        }
        debug!(path = %tmp.display(), bytes = data.len(), "wrote temp file");
        Ok(tmp)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)?;
        sync_parent(to);
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        // Only directories we create get restrictive permissions.
        if path.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }
}

/// Create (truncating) a file readable only by the owner.
fn open_private(path: &Path) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path)
}

/// Flush the directory entry after a rename. Not supported everywhere, so
/// failures are ignored.
fn sync_parent(path: &Path) {
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
