//! End-to-end tests against a real Ghostscript installation.
//!
//! They are gated behind the `E2E_ENABLED` environment variable so they do
//! not run in CI unless explicitly requested. The PDFs are generated in the
//! test itself, so no fixtures need downloading.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! Set `GS_BIN` to test a Ghostscript that is not on `PATH`.

use pdf2jpg::{
    Conversion, ConversionParameters, Converter, OutputMode, ResolvedMode, SystemLocator,
};
use std::io::{Cursor, Read};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// A minimal PDF with one US-letter page per entry, each showing its label.
fn make_pdf(labels: &[&str]) -> Vec<u8> {
    let n = labels.len();
    // Objects: 1 catalog, 2 pages, 3 font, then (page, content) per label.
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".into());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        n
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".into());
    for (i, label) in labels.iter().enumerate() {
        let content = format!("BT /F1 48 Tf 72 600 Td ({label}) Tj ET");
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = pdf.len();
    let xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    pdf.extend_from_slice(xref.as_bytes());
    for off in offsets {
        pdf.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    pdf
}

fn converter(work: &std::path::Path) -> Converter {
    Converter::new(Arc::new(SystemLocator::from_env()), work)
}

fn params(mode: OutputMode) -> ConversionParameters {
    ConversionParameters::builder()
        .dpi(72)
        .output_mode(mode)
        .build()
}

fn payload(conversion: &Conversion) -> Vec<u8> {
    let mut buf = Vec::new();
    conversion.write_to(&mut buf).expect("payload write");
    buf
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_three_pages_zip() {
    e2e_skip_unless_ready!();
    let work = tempfile::tempdir().unwrap();
    let pdf = make_pdf(&["one", "two", "three"]);

    let out = converter(work.path())
        .convert_bytes(&pdf, Some("three.pdf".into()), params(OutputMode::Zip))
        .await
        .expect("conversion");
    assert_eq!(out.stats.page_count, 3);
    assert_eq!(out.conversion.file_name(), "three.zip");

    let mut zip = zip::ZipArchive::new(Cursor::new(payload(&out.conversion))).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().unwrap().into_owned())
        .collect();
    assert_eq!(names, ["page-001.jpg", "page-002.jpg", "page-003.jpg"]);

    let mut first = Vec::new();
    zip.by_index(0).unwrap().read_to_end(&mut first).unwrap();
    let img = image::load_from_memory(&first).unwrap();
    // US letter at 72 DPI.
    assert_eq!((img.width(), img.height()), (612, 792));
}

#[tokio::test]
async fn test_single_page_auto() {
    e2e_skip_unless_ready!();
    let work = tempfile::tempdir().unwrap();
    let pdf = make_pdf(&["solo"]);

    let out = converter(work.path())
        .convert_bytes(&pdf, None, params(OutputMode::Auto))
        .await
        .expect("conversion");
    assert_eq!(out.stats.mode, ResolvedMode::SingleImage);
    assert!(image::load_from_memory(&payload(&out.conversion)).is_ok());
}

#[tokio::test]
async fn test_three_pages_merged() {
    e2e_skip_unless_ready!();
    let work = tempfile::tempdir().unwrap();
    let pdf = make_pdf(&["a", "b", "c"]);

    let out = converter(work.path())
        .convert_bytes(&pdf, None, params(OutputMode::MergedImage))
        .await
        .expect("conversion");
    let img = image::load_from_memory(&payload(&out.conversion)).unwrap();
    assert_eq!((img.width(), img.height()), (612, 3 * 792));
}

#[tokio::test]
async fn test_page_range() {
    e2e_skip_unless_ready!();
    let work = tempfile::tempdir().unwrap();
    let pdf = make_pdf(&["1", "2", "3", "4"]);
    let params = ConversionParameters::builder()
        .dpi(72)
        .first_page(2)
        .last_page(3)
        .output_mode(OutputMode::Zip)
        .build();

    let out = converter(work.path())
        .convert_bytes(&pdf, None, params)
        .await
        .expect("conversion");
    assert_eq!(out.stats.page_count, 2);
}

#[tokio::test]
async fn test_garbage_after_signature_fails_cleanly() {
    e2e_skip_unless_ready!();
    let work = tempfile::tempdir().unwrap();

    let result = converter(work.path())
        .convert_bytes(b"%PDF-1.4\nthis is not a document", None, params(OutputMode::Auto))
        .await;
    match result {
        Err(e) => assert!(
            matches!(e.kind(), "RasterFailed" | "NoPagesProduced"),
            "unexpected error: {e}"
        ),
        Ok(out) => panic!("garbage produced {} pages", out.stats.page_count),
    }
    assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
}
