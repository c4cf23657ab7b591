//! Conversion results.
//!
//! A [`Conversion`] is what the orchestrator hands back once everything that
//! can fail cleanly has been done. Variants whose payload still lives on disk
//! own the [`ScratchWorkspace`], so the page files survive exactly as long as
//! the response that streams them.

use crate::config::ResolvedMode;
use crate::error::Pdf2JpgError;
use crate::pipeline::archive::{self, ArchiveOptions};
use crate::pipeline::workspace::ScratchWorkspace;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const ZIP_CONTENT_TYPE: &str = "application/zip";
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// The payload of a successful conversion.
#[derive(Debug)]
pub enum Conversion {
    /// Every page, to be written as a ZIP.
    Archive {
        pages: Vec<PathBuf>,
        options: ArchiveOptions,
        workspace: ScratchWorkspace,
    },
    /// One page file, sent byte-for-byte.
    Page {
        path: PathBuf,
        file_name: String,
        workspace: ScratchWorkspace,
    },
    /// A merged composite, already encoded.
    Merged { jpeg: Vec<u8>, file_name: String },
}

impl Conversion {
    pub fn content_type(&self) -> &'static str {
        match self {
            Conversion::Archive { .. } => ZIP_CONTENT_TYPE,
            Conversion::Page { .. } | Conversion::Merged { .. } => JPEG_CONTENT_TYPE,
        }
    }

    /// Download name for `Content-Disposition`.
    pub fn file_name(&self) -> String {
        match self {
            Conversion::Archive { options, .. } => options.file_name(),
            Conversion::Page { file_name, .. } | Conversion::Merged { file_name, .. } => {
                file_name.clone()
            }
        }
    }

    /// Scratch directory still backing this payload, if any.
    pub fn workspace_path(&self) -> Option<&Path> {
        match self {
            Conversion::Archive { workspace, .. } | Conversion::Page { workspace, .. } => {
                Some(workspace.path())
            }
            Conversion::Merged { .. } => None,
        }
    }

    /// Write the payload into `sink`. Blocking; run it off the async runtime.
    ///
    /// Returns the number of archive entries, or 1 for image payloads. The
    /// sink is flushed before returning.
    pub fn write_to<W: Write>(&self, mut sink: W) -> Result<usize, Pdf2JpgError> {
        let written = match self {
            Conversion::Archive { pages, options, .. } => {
                archive::write_archive(&mut sink, pages, options)?
            }
            Conversion::Page { path, .. } => {
                io::copy(&mut File::open(path)?, &mut sink)?;
                1
            }
            Conversion::Merged { jpeg, .. } => {
                sink.write_all(jpeg)?;
                1
            }
        };
        sink.flush()?;
        Ok(written)
    }
}

/// Counters and timings of one conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    /// Pages Ghostscript produced.
    pub page_count: usize,
    /// Shape of the response.
    pub mode: ResolvedMode,
    /// Time spent waiting for a job slot.
    pub queue_duration_ms: u64,
    pub raster_duration_ms: u64,
    /// Zero unless pages were merged.
    pub merge_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What [`crate::convert::Converter::convert`] returns.
#[derive(Debug)]
pub struct ConversionOutput {
    pub conversion: Conversion,
    pub stats: ConversionStats,
}
