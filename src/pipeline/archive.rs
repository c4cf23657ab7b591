//! Archive stage: write page images into a ZIP as it goes.
//!
//! ## Why a streaming writer?
//!
//! A 300-page document at 150 DPI is easily a few hundred megabytes of JPEG.
//! Building the archive in memory (or in a seekable temp file) before sending
//! it would double that cost. [`write_archive`] uses the zip crate's
//! non-seeking stream mode, so each file is read, compressed and pushed into
//! the sink one chunk at a time. The sink is normally a channel feeding the
//! HTTP response body; see `server::response`.
//!
//! Validation ([`sanitize_archive_name`], [`normalize_files`]) is separate
//! from writing so the server can reject bad input while it can still send a
//! proper error response.

use crate::error::Pdf2JpgError;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name used when the requested archive name sanitises to nothing.
pub const FALLBACK_ARCHIVE_NAME: &str = "pdf-to-jpg.zip";

/// Longest archive name, `.zip` included.
pub const MAX_ARCHIVE_NAME: usize = 120;

/// Default DEFLATE level.
pub const DEFAULT_LEVEL: u32 = 9;

const ZIP_EXT: &str = ".zip";

/// Make `name` safe for a `Content-Disposition` header and any file system.
///
/// Tabs and line breaks become spaces, characters illegal on Windows and
/// ASCII control characters are dropped, and the result is trimmed. The name
/// always ends in `.zip` and never exceeds [`MAX_ARCHIVE_NAME`] characters.
pub fn sanitize_archive_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if matches!(c, '\r' | '\n' | '\t') { ' ' } else { c })
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_ascii_control())
        .collect();
    let mut safe = safe.trim().to_string();

    if safe.is_empty() {
        return FALLBACK_ARCHIVE_NAME.to_string();
    }
    if !safe.to_ascii_lowercase().ends_with(ZIP_EXT) {
        safe.push_str(ZIP_EXT);
    }
    if safe.chars().count() > MAX_ARCHIVE_NAME {
        let stem: String = safe.chars().take(MAX_ARCHIVE_NAME - ZIP_EXT.len()).collect();
        safe = format!("{stem}{ZIP_EXT}");
    }
    safe
}

/// Resolve `files` to absolute paths, keeping only existing regular files.
///
/// Entries that are empty, missing or not regular files are skipped without
/// complaint. An empty result is a hard error.
pub fn normalize_files<P: AsRef<Path>>(files: &[P]) -> Result<Vec<PathBuf>, Pdf2JpgError> {
    let valid: Vec<PathBuf> = files
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !p.as_os_str().is_empty())
        .filter_map(|p| std::path::absolute(p).ok())
        .filter(|p| std::fs::metadata(p).map(|m| m.is_file()).unwrap_or(false))
        .collect();

    if valid.is_empty() {
        return Err(Pdf2JpgError::NoValidFiles);
    }
    Ok(valid)
}

/// How an archive should be named and compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Download name; passed through [`sanitize_archive_name`].
    pub archive_name: String,
    /// Folder inside the archive; empty means the root.
    pub folder: String,
    /// Compression level 0–9; 0 stores entries uncompressed.
    pub level: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            archive_name: FALLBACK_ARCHIVE_NAME.to_string(),
            folder: String::new(),
            level: DEFAULT_LEVEL,
        }
    }
}

impl ArchiveOptions {
    pub fn named(archive_name: impl Into<String>) -> Self {
        Self {
            archive_name: archive_name.into(),
            ..Self::default()
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.min(9);
        self
    }

    /// The sanitised download name.
    pub fn file_name(&self) -> String {
        sanitize_archive_name(&self.archive_name)
    }

    /// Name of `path` inside the archive.
    pub fn entry_name(&self, path: &Path) -> String {
        let base = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let folder = self.folder.replace('\\', "/");
        let folder = folder.trim_end_matches('/');
        if folder.is_empty() {
            base
        } else {
            format!("{folder}/{base}")
        }
    }

    fn file_options(&self) -> SimpleFileOptions {
        match self.level.min(9) {
            0 => SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
            level => SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(level))),
        }
    }
}

/// Write `files` as a ZIP into `sink`, in order.
///
/// The sink only needs [`Write`]; nothing is seeked or buffered beyond the
/// current chunk. Returns the number of entries written. The caller flushes
/// the sink.
///
/// # Errors
/// [`Pdf2JpgError::NoValidFiles`] before anything is written when no input
/// survives [`normalize_files`]. Any I/O error from reading a file or writing
/// to the sink aborts the archive; what was already written is left as is.
pub fn write_archive<W: Write, P: AsRef<Path>>(
    sink: W,
    files: &[P],
    options: &ArchiveOptions,
) -> Result<usize, Pdf2JpgError> {
    let files = normalize_files(files)?;
    let file_options = options.file_options();

    let mut zip = ZipWriter::new_stream(sink);
    for path in &files {
        let name = options.entry_name(path);
        zip.start_file(name.as_str(), file_options)?;
        let mut file = File::open(path)?;
        let bytes = io::copy(&mut file, &mut zip)?;
        debug!("Archived {} ({} bytes)", name, bytes);
    }
    zip.finish()?;

    Ok(files.len())
}
