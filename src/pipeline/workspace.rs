//! Per-request scratch directory.
//!
//! Every request gets its own uniquely named directory under the configured
//! work root, so concurrent requests never see each other's page files. The
//! directory is a [`TempDir`]: it is removed recursively when the
//! [`ScratchWorkspace`] is dropped, on success, on error, and on panic alike.

use crate::error::Pdf2JpgError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Prefix of every scratch directory name.
pub const WORKSPACE_PREFIX: &str = "pdf2jpg_work_";

/// Name of the subdirectory Ghostscript writes pages into.
pub const OUTPUT_SUBDIR: &str = "out";

/// An exclusively owned scratch directory with an `out/` subdirectory.
#[derive(Debug)]
pub struct ScratchWorkspace {
    out_dir: PathBuf,
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Create a fresh workspace under `root` (created if missing).
    pub fn create_in(root: &Path) -> Result<Self, Pdf2JpgError> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)?;
        let out_dir = dir.path().join(OUTPUT_SUBDIR);
        std::fs::create_dir(&out_dir)?;
        debug!("Created scratch workspace {}", dir.path().display());
        Ok(Self { out_dir, dir })
    }

    /// Workspace root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory Ghostscript renders into.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        // The TempDir field removes the tree right after this runs.
        debug!("Removing scratch workspace {}", self.dir.path().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_unique_dirs_with_out_subdir() {
        let root = tempfile::tempdir().unwrap();
        let a = ScratchWorkspace::create_in(root.path()).unwrap();
        let b = ScratchWorkspace::create_in(root.path()).unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.out_dir().is_dir());
        assert!(a.out_dir().starts_with(a.path()));
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(WORKSPACE_PREFIX), "got: {name}");
    }

    #[test]
    fn drop_removes_the_whole_tree() {
        let root = tempfile::tempdir().unwrap();
        let ws = ScratchWorkspace::create_in(root.path()).unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(ws.out_dir().join("page-001.jpg"), b"jpeg").unwrap();

        drop(ws);
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn creates_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let ws = ScratchWorkspace::create_in(&nested).unwrap();
        assert!(ws.path().starts_with(&nested));
    }
}
