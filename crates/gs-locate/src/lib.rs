//! # gs-locate
//!
//! Find the Ghostscript executable used to rasterise PDF pages.
//!
//! ## Resolution order
//!
//! 1. `GS_BIN` — an explicit path or command name. Always wins when set to a
//!    non-blank value; it is not checked for existence here (a missing file
//!    surfaces later as a spawn error).
//! 2. **Windows**: a portable Ghostscript directory (`GS_BIN_DIR`, default
//!    `<exe dir>/bin`) is searched for `gswin64c.exe`, then `gswin32c.exe`.
//!    The process must run with that directory as its working directory so
//!    the co-located `gsdll*.dll` resolves.
//! 3. **Everything else**: the command `gs`, resolved through `PATH` by the
//!    OS at spawn time. No working directory is imposed.
//!
//! ```rust,no_run
//! use gs_locate::locate_from_env;
//!
//! let gs = locate_from_env().expect("Ghostscript unavailable");
//! let mut cmd = std::process::Command::new(&gs.program);
//! if let Some(dir) = &gs.working_dir {
//!     cmd.current_dir(dir);
//! }
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable holding an explicit executable override.
pub const GS_BIN_ENV: &str = "GS_BIN";

/// Environment variable holding the portable Ghostscript directory (Windows).
pub const GS_BIN_DIR_ENV: &str = "GS_BIN_DIR";

/// Console executables searched on Windows, in preference order.
pub const WINDOWS_CANDIDATES: [&str; 2] = ["gswin64c.exe", "gswin32c.exe"];

/// Command name used on non-Windows platforms.
pub const UNIX_COMMAND: &str = "gs";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by gs-locate.
#[derive(Error, Debug)]
pub enum LocateError {
    /// None of the expected executables exist in the portable directory.
    #[error("Ghostscript not found. Expected {} in: {}", .candidates.join(" or "), .dir.display())]
    NotFound {
        dir: PathBuf,
        candidates: Vec<String>,
    },
}

// ── Types ────────────────────────────────────────────────────────────────────

/// Which lookup strategy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Search a local directory for `gswin*c.exe`.
    Windows,
    /// Rely on `PATH` for `gs`.
    Unix,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// A resolved Ghostscript executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostscriptBinary {
    /// Path or bare command name handed to the process spawner.
    pub program: PathBuf,
    /// Working directory the process must run in, if any.
    pub working_dir: Option<PathBuf>,
}

impl GhostscriptBinary {
    /// A binary with no working-directory requirement.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: None,
        }
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Default portable directory: `bin/` next to the running executable.
pub fn default_bin_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("bin")))
        .unwrap_or_else(|| PathBuf::from("bin"))
}

/// Read `GS_BIN` and return it when set to a non-blank value.
pub fn env_override() -> Option<PathBuf> {
    normalise_override(std::env::var_os(GS_BIN_ENV))
}

/// Read `GS_BIN_DIR`, falling back to [`default_bin_dir`].
pub fn env_bin_dir() -> PathBuf {
    std::env::var_os(GS_BIN_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_bin_dir)
}

/// Resolve Ghostscript using only environment configuration.
pub fn locate_from_env() -> Result<GhostscriptBinary, LocateError> {
    locate(env_override().as_deref(), &env_bin_dir())
}

/// Resolve Ghostscript for the current platform.
pub fn locate(
    override_bin: Option<&Path>,
    bin_dir: &Path,
) -> Result<GhostscriptBinary, LocateError> {
    locate_for(Platform::current(), override_bin, bin_dir)
}

/// Resolve Ghostscript for an explicit platform.
///
/// Split out from [`locate`] so both strategies are testable on any host.
pub fn locate_for(
    platform: Platform,
    override_bin: Option<&Path>,
    bin_dir: &Path,
) -> Result<GhostscriptBinary, LocateError> {
    if let Some(program) = override_bin.filter(|p| !p.as_os_str().is_empty()) {
        let working_dir = match platform {
            Platform::Windows => Some(
                program
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| bin_dir.to_path_buf()),
            ),
            Platform::Unix => None,
        };
        return Ok(GhostscriptBinary {
            program: program.to_path_buf(),
            working_dir,
        });
    }

    match platform {
        Platform::Windows => WINDOWS_CANDIDATES
            .iter()
            .map(|name| bin_dir.join(name))
            .find(|p| p.is_file())
            .map(|program| GhostscriptBinary {
                program,
                working_dir: Some(bin_dir.to_path_buf()),
            })
            .ok_or_else(|| LocateError::NotFound {
                dir: bin_dir.to_path_buf(),
                candidates: WINDOWS_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            }),
        Platform::Unix => Ok(GhostscriptBinary::new(UNIX_COMMAND)),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn normalise_override(raw: Option<OsString>) -> Option<PathBuf> {
    let raw = raw?;
    match raw.to_str() {
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(PathBuf::from(trimmed))
            }
        }
        // Non-UTF-8 values are passed through untouched.
        None if raw.is_empty() => None,
        None => Some(PathBuf::from(raw)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
