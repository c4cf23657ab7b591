//! Conversion orchestrator: one uploaded PDF in, one [`Conversion`] out.
//!
//! ## Lifecycle
//!
//! ```text
//! Received ─▶ Validated ─▶ Rasterizing ─▶ PagesCollected ─┬─▶ Streaming   (zip)
//!                                                          ├─▶ PassThrough (single page)
//!                                                          └─▶ Merging     (merged image)
//! ```
//!
//! Any error on the way is returned before a single response byte exists, so
//! the server can still answer with a proper status code. What is left to do
//! after [`Converter::convert`] returns is writing the payload, which can only
//! fail by the client going away.
//!
//! ## Cleanup
//!
//! Nothing here deletes files by hand. The upload is a `NamedTempFile` owned
//! by the [`ConversionRequest`], and the scratch directory is a
//! [`ScratchWorkspace`]; both go away when dropped, whichever way this
//! function exits.

use crate::config::{ConversionParameters, ResolvedMode, ServerConfig};
use crate::error::Pdf2JpgError;
use crate::output::{Conversion, ConversionOutput, ConversionStats};
use crate::pipeline::archive::{self, ArchiveOptions};
use crate::pipeline::collect::{self, PageImage};
use crate::pipeline::input::{self, PdfSource};
use crate::pipeline::merge;
use crate::pipeline::rasterize::{self, RasterizerLocator, SystemLocator};
use crate::pipeline::workspace::ScratchWorkspace;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// A validated-to-be PDF plus everything needed to convert it.
#[derive(Debug)]
pub struct ConversionRequest {
    pub source: PdfSource,
    /// Client-supplied file name; only used to name the download.
    pub original_name: Option<String>,
    pub params: ConversionParameters,
}

impl ConversionRequest {
    pub fn new(
        source: PdfSource,
        original_name: Option<String>,
        params: ConversionParameters,
    ) -> Self {
        Self {
            source,
            original_name,
            params,
        }
    }

    /// Sanitised base name for downloads, without extension.
    pub fn base_name(&self) -> String {
        input::sanitize_base_name(self.original_name.as_deref())
    }
}

/// Runs conversions against one Ghostscript installation and scratch root.
///
/// Cheap to clone; clones share the job limit.
#[derive(Clone)]
pub struct Converter {
    locator: Arc<dyn RasterizerLocator>,
    work_root: PathBuf,
    raster_timeout: Option<Duration>,
    jobs: Arc<Semaphore>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("work_root", &self.work_root)
            .field("raster_timeout", &self.raster_timeout)
            .field("available_jobs", &self.jobs.available_permits())
            .finish()
    }
}

impl Converter {
    /// A converter with no timeout and one job slot per CPU.
    pub fn new(locator: Arc<dyn RasterizerLocator>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            locator,
            work_root: work_root.into(),
            raster_timeout: None,
            jobs: Arc::new(Semaphore::new(crate::config::default_concurrency())),
        }
    }

    /// Build from server settings, locating Ghostscript via [`SystemLocator`].
    pub fn from_config(config: &ServerConfig) -> Self {
        let locator = SystemLocator::new(config.gs_bin.clone(), config.gs_bin_dir.clone());
        Self::new(Arc::new(locator), config.work_dir.clone())
            .with_max_jobs(config.max_concurrent_jobs)
            .with_raster_timeout(config.raster_timeout_secs.map(Duration::from_secs))
    }

    /// Cap simultaneous Ghostscript runs (minimum 1).
    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.jobs = Arc::new(Semaphore::new(max_jobs.max(1)));
        self
    }

    pub fn with_raster_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.raster_timeout = timeout;
        self
    }

    pub fn with_locator(mut self, locator: Arc<dyn RasterizerLocator>) -> Self {
        self.locator = locator;
        self
    }

    pub fn work_root(&self) -> &std::path::Path {
        &self.work_root
    }

    /// Job slots currently free.
    pub fn available_jobs(&self) -> usize {
        self.jobs.available_permits()
    }

    /// Convert one PDF.
    ///
    /// The upload held by `request` is deleted when this returns. On success
    /// the scratch workspace moves into the returned [`Conversion`] when the
    /// payload still lives there; otherwise it is already gone.
    ///
    /// # Errors
    /// - [`Pdf2JpgError::InvalidDocument`] — not a PDF
    /// - [`Pdf2JpgError::ToolNotFound`], [`Pdf2JpgError::SpawnError`],
    ///   [`Pdf2JpgError::RasterFailed`], [`Pdf2JpgError::RasterTimeout`]
    /// - [`Pdf2JpgError::NoPagesProduced`] — Ghostscript succeeded but wrote nothing
    /// - merge and archive precondition failures
    pub async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutput, Pdf2JpgError> {
        let total_start = Instant::now();
        let params = &request.params;

        // ── Step 1: Validate ─────────────────────────────────────────────
        input::sniff_pdf(request.source.path())?;
        debug!(
            "Parameters: {}",
            serde_json::to_string(params).unwrap_or_default()
        );

        // ── Step 2: Wait for a job slot ──────────────────────────────────
        let queue_start = Instant::now();
        let _permit = self
            .jobs
            .acquire()
            .await
            .map_err(|_| Pdf2JpgError::Internal("job queue closed".to_string()))?;
        let queue_duration_ms = queue_start.elapsed().as_millis() as u64;

        // ── Step 3: Scratch workspace ────────────────────────────────────
        let workspace = ScratchWorkspace::create_in(&self.work_root)?;

        // ── Step 4: Rasterize ────────────────────────────────────────────
        let raster_start = Instant::now();
        rasterize::invoke(
            self.locator.as_ref(),
            request.source.path(),
            workspace.out_dir(),
            params,
            self.raster_timeout,
        )
        .await?;
        let raster_duration_ms = raster_start.elapsed().as_millis() as u64;

        // ── Step 5: Collect pages ────────────────────────────────────────
        let pages = collect::list_pages(workspace.out_dir())?;
        if pages.is_empty() {
            return Err(Pdf2JpgError::NoPagesProduced);
        }

        // ── Step 6: Shape the response ───────────────────────────────────
        let mode = params.output_mode.resolve(pages.len());
        info!("Rasterized {} pages, responding as {}", pages.len(), mode);

        let base = request.base_name();
        let mut merge_duration_ms = 0;
        let page_count = pages.len();

        let conversion = match mode {
            ResolvedMode::Zip => {
                let paths: Vec<PathBuf> = pages.into_iter().map(|p| p.path).collect();
                let pages = archive::normalize_files(&paths)?;
                Conversion::Archive {
                    pages,
                    options: ArchiveOptions::named(format!("{base}.zip")),
                    workspace,
                }
            }
            ResolvedMode::SingleImage => pass_through(first(pages)?, &base, workspace),
            ResolvedMode::MergedImage if page_count == 1 => {
                pass_through(first(pages)?, &base, workspace)
            }
            ResolvedMode::MergedImage => {
                let merge_start = Instant::now();
                let quality = params.merge_quality;
                let jpeg = tokio::task::spawn_blocking(move || merge::merge_pages(&pages, quality))
                    .await
                    .map_err(|e| Pdf2JpgError::Internal(format!("merge task failed: {e}")))??;
                merge_duration_ms = merge_start.elapsed().as_millis() as u64;
                info!(
                    "Merged {} pages into {} bytes in {}ms",
                    page_count,
                    jpeg.len(),
                    merge_duration_ms
                );
                // Page files are no longer needed.
                drop(workspace);
                Conversion::Merged {
                    jpeg,
                    file_name: format!("{base}.jpg"),
                }
            }
        };

        let stats = ConversionStats {
            page_count,
            mode,
            queue_duration_ms,
            raster_duration_ms,
            merge_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Conversion ready: {} pages as {}, {}ms total",
            stats.page_count, stats.mode, stats.total_duration_ms
        );

        Ok(ConversionOutput { conversion, stats })
    }

    /// Convert PDF bytes held in memory.
    ///
    /// The bytes are written to a temp file under the work root that is
    /// removed again before this returns.
    pub async fn convert_bytes(
        &self,
        bytes: &[u8],
        original_name: Option<String>,
        params: ConversionParameters,
    ) -> Result<ConversionOutput, Pdf2JpgError> {
        let source = PdfSource::from_bytes(&self.work_root, bytes)?;
        self.convert(ConversionRequest::new(source, original_name, params))
            .await
    }
}

fn first(pages: Vec<PageImage>) -> Result<PageImage, Pdf2JpgError> {
    pages.into_iter().next().ok_or(Pdf2JpgError::NoPagesProduced)
}

fn pass_through(page: PageImage, base: &str, workspace: ScratchWorkspace) -> Conversion {
    debug!("Passing {} through unchanged", page.file_name());
    Conversion::Page {
        path: page.path,
        file_name: format!("{base}.jpg"),
        workspace,
    }
}
