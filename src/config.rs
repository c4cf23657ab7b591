//! Configuration types for PDF-to-JPEG conversion.
//!
//! Two structs live here:
//!
//! * [`ConversionParameters`] — per-request knobs (DPI, JPEG quality, page
//!   range, Ghostscript memory budget, output mode). Every numeric field is
//!   clamped into a fixed inclusive range, so a request can never push
//!   Ghostscript outside sane bounds no matter what the client sends.
//! * [`ServerConfig`] — process-wide settings (listen address, upload limit,
//!   Ghostscript location, scratch root, admission control).
//!
//! Parameters are built via [`ConversionParametersBuilder`]; its setters clamp
//! instead of failing, and [`ConversionParametersBuilder::build`] restores the
//! `last_page >= first_page` invariant.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ── Parameter bounds ─────────────────────────────────────────────────────

/// Inclusive DPI range passed to `-r`.
pub const DPI_RANGE: (u32, u32) = (72, 600);
/// Inclusive JPEG quality range (`-dJPEGQ` and the merged composite).
pub const QUALITY_RANGE: (u32, u32) = (1, 100);
/// Inclusive Ghostscript memory budget range in megabytes.
pub const MEMORY_MB_RANGE: (u32, u32) = (64, 2048);

pub const DEFAULT_DPI: u32 = 150;
pub const DEFAULT_QUALITY: u32 = 85;
pub const DEFAULT_MERGE_QUALITY: u32 = 85;
pub const DEFAULT_FIRST_PAGE: u32 = 1;
/// Upper page bound used when the client does not send one.
pub const DEFAULT_LAST_PAGE: u32 = 9999;
pub const DEFAULT_MEMORY_MB: u32 = 300;

/// Parameters for a single PDF-to-JPEG conversion.
///
/// Built via [`ConversionParameters::builder()`], parsed from request fields
/// with [`ConversionParameters::from_fields`], or taken as
/// [`ConversionParameters::default()`].
///
/// # Example
/// ```rust
/// use pdf2jpg::{ConversionParameters, OutputMode};
///
/// let params = ConversionParameters::builder()
///     .dpi(9000)
///     .first_page(3)
///     .last_page(1)
///     .output_mode(OutputMode::Zip)
///     .build();
///
/// assert_eq!(params.dpi, 600);
/// assert_eq!(params.last_page, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionParameters {
    /// Rendering resolution. Range: 72–600. Default: 150.
    pub dpi: u32,

    /// JPEG quality Ghostscript uses for each page. Range: 1–100. Default: 85.
    pub quality: u32,

    /// JPEG quality of the merged composite. Range: 1–100. Default: 85.
    pub merge_quality: u32,

    /// First page to render (1-indexed). Minimum 1. Default: 1.
    pub first_page: u32,

    /// Last page to render (1-indexed, inclusive). Never below `first_page`.
    /// Default: 9999, which Ghostscript treats as "to the end".
    pub last_page: u32,

    /// Ghostscript memory budget in megabytes. Range: 64–2048. Default: 300.
    pub memory_mb: u32,

    /// Requested response shape. Default: [`OutputMode::Auto`].
    pub output_mode: OutputMode,
}

impl Default for ConversionParameters {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            quality: DEFAULT_QUALITY,
            merge_quality: DEFAULT_MERGE_QUALITY,
            first_page: DEFAULT_FIRST_PAGE,
            last_page: DEFAULT_LAST_PAGE,
            memory_mb: DEFAULT_MEMORY_MB,
            output_mode: OutputMode::default(),
        }
    }
}

impl ConversionParameters {
    /// Create a new builder seeded with the defaults.
    pub fn builder() -> ConversionParametersBuilder {
        ConversionParametersBuilder {
            params: Self::default(),
        }
    }

    /// Parse request fields (multipart text fields or query parameters).
    ///
    /// Each field is optional. Values that are missing or not an integer fall
    /// back to the default; values outside the allowed range are clamped.
    ///
    /// | Field | Aliases |
    /// |-------|---------|
    /// | `dpi` | |
    /// | `quality` | |
    /// | `jpegQuality` | `mergeQuality` |
    /// | `firstPage` | |
    /// | `lastPage` | |
    /// | `memoryMB` | |
    /// | `output` | `mode` |
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let get = |names: &[&str]| names.iter().find_map(|n| fields.get(*n)).map(String::as_str);
        let int = |names: &[&str], default: u32| -> u32 {
            get(names)
                .and_then(parse_int)
                .map(saturate_u32)
                .unwrap_or(default)
        };

        let output_mode = get(&["output", "mode"])
            .and_then(|s| s.parse::<OutputMode>().ok())
            .unwrap_or_default();

        Self::builder()
            .dpi(int(&["dpi"], DEFAULT_DPI))
            .quality(int(&["quality"], DEFAULT_QUALITY))
            .merge_quality(int(&["jpegQuality", "mergeQuality"], DEFAULT_MERGE_QUALITY))
            .first_page(int(&["firstPage"], DEFAULT_FIRST_PAGE))
            .last_page(int(&["lastPage"], DEFAULT_LAST_PAGE))
            .memory_mb(int(&["memoryMB"], DEFAULT_MEMORY_MB))
            .output_mode(output_mode)
            .build()
    }

    /// Memory budget in bytes, as Ghostscript expects it (`MB * 1_000_000`).
    pub fn memory_bytes(&self) -> u64 {
        u64::from(self.memory_mb) * 1_000_000
    }
}

/// Builder for [`ConversionParameters`].
#[derive(Debug)]
pub struct ConversionParametersBuilder {
    params: ConversionParameters,
}

impl ConversionParametersBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.params.dpi = dpi.clamp(DPI_RANGE.0, DPI_RANGE.1);
        self
    }

    pub fn quality(mut self, q: u32) -> Self {
        self.params.quality = q.clamp(QUALITY_RANGE.0, QUALITY_RANGE.1);
        self
    }

    pub fn merge_quality(mut self, q: u32) -> Self {
        self.params.merge_quality = q.clamp(QUALITY_RANGE.0, QUALITY_RANGE.1);
        self
    }

    pub fn first_page(mut self, page: u32) -> Self {
        self.params.first_page = page.max(1);
        self
    }

    pub fn last_page(mut self, page: u32) -> Self {
        self.params.last_page = page.max(1);
        self
    }

    pub fn memory_mb(mut self, mb: u32) -> Self {
        self.params.memory_mb = mb.clamp(MEMORY_MB_RANGE.0, MEMORY_MB_RANGE.1);
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.params.output_mode = mode;
        self
    }

    /// Finish building. Raises `last_page` to `first_page` when needed.
    pub fn build(mut self) -> ConversionParameters {
        self.params.last_page = self.params.last_page.max(self.params.first_page);
        self.params
    }
}

/// Optional sign and digits at the start of a field; anything after is ignored.
static LEADING_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([+-]?)([0-9]+)").unwrap());

/// Read the leading integer of `raw`, so `"300dpi"` is 300 and `"12.5"` is 12.
/// Values beyond `i64` saturate.
fn parse_int(raw: &str) -> Option<i64> {
    let caps = LEADING_INT.captures(raw)?;
    let negative = &caps[1] == "-";
    let value = match caps[2].parse::<i64>() {
        Ok(v) if negative => -v,
        Ok(v) => v,
        Err(_) if negative => i64::MIN,
        Err(_) => i64::MAX,
    };
    Some(value)
}

fn saturate_u32(v: i64) -> u32 {
    u32::try_from(v.max(0)).unwrap_or(u32::MAX)
}

// ── Output mode ──────────────────────────────────────────────────────────

/// Requested response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// ZIP archive of every page.
    Zip,
    /// The first page only, as-is.
    SingleImage,
    /// All pages stacked top-to-bottom into one JPEG.
    MergedImage,
    /// `Zip` for multi-page output, `SingleImage` for one page. (default)
    #[default]
    Auto,
}

impl OutputMode {
    /// Pick a concrete mode once the page count is known.
    pub fn resolve(self, page_count: usize) -> ResolvedMode {
        match self {
            OutputMode::Zip => ResolvedMode::Zip,
            OutputMode::SingleImage => ResolvedMode::SingleImage,
            OutputMode::MergedImage => ResolvedMode::MergedImage,
            OutputMode::Auto if page_count > 1 => ResolvedMode::Zip,
            OutputMode::Auto => ResolvedMode::SingleImage,
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zip" => Ok(OutputMode::Zip),
            "single" | "single-image" | "first" => Ok(OutputMode::SingleImage),
            "1image" | "merge" | "merged" | "merged-image" => Ok(OutputMode::MergedImage),
            "auto" | "" => Ok(OutputMode::Auto),
            other => Err(format!("unknown output mode '{other}'")),
        }
    }
}

/// An [`OutputMode`] after `Auto` has been decided. Cannot be `Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolvedMode {
    Zip,
    SingleImage,
    MergedImage,
}

impl fmt::Display for ResolvedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolvedMode::Zip => "zip",
            ResolvedMode::SingleImage => "single-image",
            ResolvedMode::MergedImage => "merged-image",
        })
    }
}

// ── Server configuration ─────────────────────────────────────────────────

/// Process-wide settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,

    /// TCP port. Default: 3000.
    pub port: u16,

    /// Largest accepted upload in megabytes. Default: 50.
    pub max_upload_mb: u64,

    /// Explicit Ghostscript executable (`GS_BIN`).
    pub gs_bin: Option<PathBuf>,

    /// Portable Ghostscript directory searched on Windows (`GS_BIN_DIR`).
    pub gs_bin_dir: PathBuf,

    /// Root for uploads and scratch workspaces. Default: the system temp dir.
    pub work_dir: PathBuf,

    /// Maximum simultaneous Ghostscript processes. Default: available parallelism.
    pub max_concurrent_jobs: usize,

    /// Wall-clock limit for one Ghostscript run. Default: none.
    pub raster_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_upload_mb: 50,
            gs_bin: None,
            gs_bin_dir: gs_locate::default_bin_dir(),
            work_dir: std::env::temp_dir(),
            max_concurrent_jobs: default_concurrency(),
            raster_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Directory that receives streamed uploads.
    pub fn upload_dir(&self) -> PathBuf {
        self.work_dir.join("pdf2jpg_uploads")
    }
}

/// Number of CPUs, or 1 when unknown.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
