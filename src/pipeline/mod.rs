//! Pipeline stages for PDF-to-JPEG conversion.
//!
//! Each submodule implements exactly one step, so each is testable on its own
//! and the orchestrator in [`crate::convert`] only wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ workspace ──▶ rasterize ──▶ collect ──▶ merge | archive
//! (upload)   (temp dir)    (gs)          (page-NNN)   (JPEG | ZIP)
//! ```
//!
//! 1. [`input`]     — own the uploaded file and sniff the `%PDF` signature
//! 2. [`workspace`] — per-request scratch directory, removed on drop
//! 3. [`rasterize`] — run Ghostscript as a child process
//! 4. [`collect`]   — list the page images Ghostscript wrote, in page order
//! 5. [`merge`]     — stack pages into one JPEG (CPU-bound, `spawn_blocking`)
//! 6. [`archive`]   — write pages into a ZIP incrementally, never in memory

pub mod archive;
pub mod collect;
pub mod input;
pub mod merge;
pub mod rasterize;
pub mod workspace;
