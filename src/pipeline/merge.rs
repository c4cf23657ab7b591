//! Vertical merge: stack every page into one tall JPEG.
//!
//! The canvas is `max(width) × sum(height)` and starts opaque white. Pages
//! are copied in at `x = 0`, one below the other, so any page narrower than
//! the widest one ends up padded with white on the right. Heights are never
//! changed.
//!
//! The canvas size is known from the page headers alone, so an output the
//! JPEG encoder cannot represent is rejected before anything is decoded.
//! Pages are then decoded one at a time straight into the canvas.
//!
//! Decoding and encoding are CPU-bound; callers run [`merge_pages`] inside
//! `tokio::task::spawn_blocking`.

use crate::error::Pdf2JpgError;
use crate::pipeline::collect::PageImage;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, Rgb, RgbImage};
use tracing::debug;

/// Canvas background.
pub const PAD_COLOUR: Rgb<u8> = Rgb([255, 255, 255]);

/// Largest width or height a baseline JPEG can carry.
pub const MAX_JPEG_SIDE: u32 = u16::MAX as u32;

/// Decode `pages` from disk and merge them into one JPEG.
///
/// Dimensions are checked from each page's header before anything is
/// decoded, so a broken page fails fast with its name.
///
/// # Errors
/// - [`Pdf2JpgError::EmptyInput`] — `pages` is empty
/// - [`Pdf2JpgError::InvalidPageMetadata`] — a page has no usable size
/// - [`Pdf2JpgError::MergeTooLarge`] — the stacked image exceeds [`MAX_JPEG_SIDE`]
/// - [`Pdf2JpgError::Image`] — decode/encode failure, passed through as-is
pub fn merge_pages(pages: &[PageImage], quality: u32) -> Result<Vec<u8>, Pdf2JpgError> {
    if pages.is_empty() {
        return Err(Pdf2JpgError::EmptyInput);
    }

    let dims = pages
        .iter()
        .map(PageImage::dimensions)
        .collect::<Result<Vec<_>, _>>()?;
    let (width, height) = canvas_size(&dims)?;

    let mut canvas = RgbImage::from_pixel(width, height, PAD_COLOUR);
    let mut y: i64 = 0;
    for (page, (_, h)) in pages.iter().zip(&dims) {
        let img = image::open(&page.path)?;
        imageops::replace(&mut canvas, &img.to_rgb8(), 0, y);
        y += i64::from(*h);
    }
    debug!("Composed {} pages into {}x{} px", pages.len(), width, height);

    encode_jpeg(&canvas, quality)
}

/// Merge already-decoded pages and encode the result as JPEG.
pub fn merge_images(images: &[DynamicImage], quality: u32) -> Result<Vec<u8>, Pdf2JpgError> {
    let canvas = compose_vertical(images)?;
    encode_jpeg(&canvas, quality)
}

/// Stack `images` top-to-bottom on a white canvas. Pure; touches no files.
pub fn compose_vertical(images: &[DynamicImage]) -> Result<RgbImage, Pdf2JpgError> {
    let dims: Vec<(u32, u32)> = images.iter().map(|i| (i.width(), i.height())).collect();
    let (width, height) = canvas_size(&dims)?;

    let mut canvas = RgbImage::from_pixel(width, height, PAD_COLOUR);
    let mut y: i64 = 0;
    for img in images {
        imageops::replace(&mut canvas, &img.to_rgb8(), 0, y);
        y += i64::from(img.height());
    }

    debug!("Composed {} pages into {}x{} px", images.len(), width, height);
    Ok(canvas)
}

/// `max(width) × sum(height)` for the given page sizes.
fn canvas_size(dims: &[(u32, u32)]) -> Result<(u32, u32), Pdf2JpgError> {
    if dims.is_empty() {
        return Err(Pdf2JpgError::EmptyInput);
    }

    let width = dims.iter().map(|&(w, _)| w).max().unwrap_or(0);
    let height: u64 = dims.iter().map(|&(_, h)| u64::from(h)).sum();
    match u32::try_from(height) {
        Ok(h) if width <= MAX_JPEG_SIDE && h <= MAX_JPEG_SIDE => Ok((width, h)),
        _ => Err(Pdf2JpgError::MergeTooLarge {
            width,
            height,
            max: MAX_JPEG_SIDE,
        }),
    }
}

/// Encode an RGB image as JPEG at `quality` (clamped to 1–100).
pub fn encode_jpeg(img: &RgbImage, quality: u32) -> Result<Vec<u8>, Pdf2JpgError> {
    let quality = quality.clamp(1, 100) as u8;
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(img)?;
    debug!("Encoded merged image → {} bytes (q={})", buf.len(), quality);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::collect::list_pages;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(rgb)))
    }

    fn near(a: &Rgb<u8>, b: [u8; 3]) -> bool {
        a.0.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 24)
    }

    #[test]
    fn canvas_is_max_width_by_sum_of_heights() {
        let images = [solid(40, 30, [0, 0, 0]), solid(60, 20, [0, 0, 0]), solid(50, 25, [0, 0, 0])];
        let canvas = compose_vertical(&images).unwrap();
        assert_eq!(canvas.dimensions(), (60, 75));
    }

    #[test]
    fn pages_keep_order_and_narrow_pages_are_padded_white() {
        let images = [solid(20, 10, [200, 0, 0]), solid(40, 10, [0, 0, 200])];
        let canvas = compose_vertical(&images).unwrap();

        // First page on top, left-aligned.
        assert_eq!(canvas.get_pixel(5, 5), &Rgb([200, 0, 0]));
        // Right of the narrow first page is white padding.
        assert_eq!(canvas.get_pixel(30, 5), &PAD_COLOUR);
        // Second page spans the full width below.
        assert_eq!(canvas.get_pixel(5, 15), &Rgb([0, 0, 200]));
        assert_eq!(canvas.get_pixel(35, 15), &Rgb([0, 0, 200]));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(compose_vertical(&[]).unwrap_err().kind(), "EmptyInput");
        assert_eq!(merge_pages(&[], 85).unwrap_err().kind(), "EmptyInput");
    }

    #[test]
    fn encoded_output_round_trips_through_decoder() {
        let images = [solid(32, 16, [10, 200, 10]), solid(16, 16, [10, 200, 10])];
        let jpeg = merge_images(&images, 100).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (32, 32));
        assert!(near(decoded.get_pixel(4, 4), [10, 200, 10]));
        assert!(near(decoded.get_pixel(28, 28), [255, 255, 255]));
    }

    #[test]
    fn merge_pages_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        solid(30, 12, [0, 0, 0]).save(dir.path().join("page-002.jpg")).unwrap();
        solid(20, 8, [0, 0, 0]).save(dir.path().join("page-001.jpg")).unwrap();

        let pages = list_pages(dir.path()).unwrap();
        let jpeg = merge_pages(&pages, 85).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
    }

    #[test]
    fn broken_page_fails_with_its_name() {
        let dir = tempfile::tempdir().unwrap();
        solid(10, 10, [0, 0, 0]).save(dir.path().join("page-001.jpg")).unwrap();
        std::fs::write(dir.path().join("page-002.jpg"), b"not a jpeg").unwrap();

        let pages = list_pages(dir.path()).unwrap();
        match merge_pages(&pages, 85).unwrap_err() {
            Pdf2JpgError::InvalidPageMetadata { page } => assert_eq!(page, "page-002.jpg"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn oversized_merge_is_refused_before_allocating() {
        let images = [
            solid(10, 30_000, [0, 0, 0]),
            solid(10, 30_000, [0, 0, 0]),
            solid(10, 30_000, [0, 0, 0]),
        ];
        let err = compose_vertical(&images).unwrap_err();
        assert_eq!(err.kind(), "MergeTooLarge");
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("10x90000"), "{err}");
    }

    #[test]
    fn oversized_merge_from_disk_fails_from_headers() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=3 {
            solid(8, 30_000, [0, 0, 0])
                .save(dir.path().join(format!("page-{n:03}.jpg")))
                .unwrap();
        }

        let pages = list_pages(dir.path()).unwrap();
        match merge_pages(&pages, 85).unwrap_err() {
            Pdf2JpgError::MergeTooLarge { width, height, max } => {
                assert_eq!((width, height, max), (8, 90_000, MAX_JPEG_SIDE));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tallest_encodable_merge_is_accepted() {
        assert_eq!(canvas_size(&[(5, 65_000), (7, 535)]).unwrap(), (7, 65_535));
        assert!(canvas_size(&[(5, 65_000), (7, 536)]).is_err());
        assert!(canvas_size(&[(70_000, 1)]).is_err());
    }
}
