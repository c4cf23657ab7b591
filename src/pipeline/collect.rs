//! Page collection: find the JPEGs Ghostscript wrote, in page order.
//!
//! Ghostscript numbers pages with a zero-padded counter (`page-001.jpg`), so
//! plain lexicographic order is page order. Directory listing order is not
//! guaranteed by any file system, hence the explicit sort.

use crate::error::Pdf2JpgError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of rasterised pages, matched case-insensitively.
pub const PAGE_EXTENSION: &str = "jpg";

/// One rasterised page on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Absolute path to the JPEG.
    pub path: PathBuf,
    /// 1-based position in page order.
    pub number: usize,
}

impl PageImage {
    /// File name without directories, e.g. `page-001.jpg`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Width and height read from the image header.
    ///
    /// # Errors
    /// [`Pdf2JpgError::InvalidPageMetadata`] when the header is unreadable
    /// or either dimension is zero.
    pub fn dimensions(&self) -> Result<(u32, u32), Pdf2JpgError> {
        match image::image_dimensions(&self.path) {
            Ok((w, h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(Pdf2JpgError::InvalidPageMetadata {
                page: self.file_name(),
            }),
        }
    }
}

/// List the page images in `output_dir`, sorted by file name.
///
/// The directory is read fresh on every call. An empty result is not an error
/// here; the orchestrator decides what "no pages" means.
pub fn list_pages(output_dir: &Path) -> Result<Vec<PageImage>, Pdf2JpgError> {
    let dir = std::path::absolute(output_dir)?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(PAGE_EXTENSION))
        })
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Collected {} page images from {}", files.len(), dir.display());

    Ok(files
        .into_iter()
        .enumerate()
        .map(|(i, path)| PageImage { path, number: i + 1 })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn sorts_regardless_of_creation_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "page-010.jpg",
            "page-002.jpg",
            "page-001.jpg",
            "page-100.jpg",
            "page-003.jpg",
        ] {
            touch(dir.path(), name);
        }

        let pages = list_pages(dir.path()).unwrap();
        let names: Vec<String> = pages.iter().map(PageImage::file_name).collect();
        assert_eq!(
            names,
            ["page-001.jpg", "page-002.jpg", "page-003.jpg", "page-010.jpg", "page-100.jpg"]
        );
        let numbers: Vec<usize> = pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn filters_extension_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "page-001.JPG");
        touch(dir.path(), "page-002.jpg");
        touch(dir.path(), "page-003.png");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "jpg");
        std::fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let names: Vec<String> = list_pages(dir.path())
            .unwrap()
            .iter()
            .map(PageImage::file_name)
            .collect();
        assert_eq!(names, ["page-001.JPG", "page-002.jpg"]);
    }

    #[test]
    fn returns_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "page-001.jpg");
        let pages = list_pages(dir.path()).unwrap();
        assert!(pages[0].path.is_absolute());
    }

    #[test]
    fn empty_dir_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_pages(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn listing_is_recomputed_each_call() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "page-001.jpg");
        assert_eq!(list_pages(dir.path()).unwrap().len(), 1);
        touch(dir.path(), "page-002.jpg");
        assert_eq!(list_pages(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn unreadable_header_is_invalid_metadata() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "page-001.jpg");
        let page = &list_pages(dir.path()).unwrap()[0];
        let err = page.dimensions().unwrap_err();
        assert_eq!(err.kind(), "InvalidPageMetadata");
        assert!(err.to_string().contains("page-001.jpg"));
    }
}
