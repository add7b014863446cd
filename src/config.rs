//! Configuration types for chunked PDF-to-Markdown extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. The tuning knobs that drive the external
//! converter live here as plain fields.

use crate::error::PdfChunkError;
use crate::pipeline::invoke::Converter;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default number of pages per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Default `--batch_multiplier` handed to the converter.
pub const DEFAULT_BATCH_MULTIPLIER: u32 = 4;

/// Default converter executable.
pub const DEFAULT_CONVERTER_PROGRAM: &str = "marker_single";

/// Environment variable set for every converter invocation.
pub const DEFAULT_CONVERTER_ENV: (&str, &str) = ("PYTORCH_MPS_HIGH_WATERMARK_RATIO", "0.0");

/// Configuration for a chunked extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfchunk2md::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .chunk_size(10)
///     .batch_multiplier(2)
///     .max_pages(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_size, 10);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Pages per chunk. Default: 20.
    ///
    /// Each chunk is converted by a separate converter process, so this bounds
    /// the peak memory the converter needs for one invocation.
    pub chunk_size: usize,

    /// Throughput knob forwarded as `--batch_multiplier`. Default: 4.
    ///
    /// Higher values use more accelerator memory per batch.
    pub batch_multiplier: u32,

    /// Forwarded as `--max_pages` when set. Default: None.
    pub max_pages: Option<usize>,

    /// Reserved for parallel chunk processing. Default: 1.
    ///
    /// Chunks are always converted one at a time; the converter holds the
    /// single accelerator exclusively.
    pub worker_count: usize,

    /// Converter executable. Default: `marker_single`.
    pub converter_program: String,

    /// Arguments placed before the chunk path on the converter command line.
    pub converter_args: Vec<String>,

    /// Environment variables set for the converter process.
    pub converter_env: Vec<(String, String)>,

    /// Pre-constructed converter. Takes precedence over `converter_program`.
    pub converter: Option<Arc<dyn Converter>>,

    /// Name of the chunk staging directory inside the output directory.
    /// Default: `chunks`.
    pub chunk_dir_name: String,

    /// Keep chunk PDFs after they have been converted. Default: false.
    pub keep_chunks: bool,

    /// Separator placed between consecutive chunks in the merged output.
    pub separator: ChunkSeparator,

    /// What to do when the converter leaves no Markdown for a chunk.
    pub missing_output: MissingOutputPolicy,

    /// Optional progress callback fired once per chunk.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_multiplier: DEFAULT_BATCH_MULTIPLIER,
            max_pages: None,
            worker_count: 1,
            converter_program: DEFAULT_CONVERTER_PROGRAM.to_string(),
            converter_args: Vec::new(),
            converter_env: vec![(
                DEFAULT_CONVERTER_ENV.0.to_string(),
                DEFAULT_CONVERTER_ENV.1.to_string(),
            )],
            converter: None,
            chunk_dir_name: "chunks".to_string(),
            keep_chunks: false,
            separator: ChunkSeparator::default(),
            missing_output: MissingOutputPolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("chunk_size", &self.chunk_size)
            .field("batch_multiplier", &self.batch_multiplier)
            .field("max_pages", &self.max_pages)
            .field("worker_count", &self.worker_count)
            .field("converter_program", &self.converter_program)
            .field("converter_args", &self.converter_args)
            .field("converter_env", &self.converter_env)
            .field("converter", &self.converter.as_ref().map(|c| c.name().to_string()))
            .field("chunk_dir_name", &self.chunk_dir_name)
            .field("keep_chunks", &self.keep_chunks)
            .field("separator", &self.separator)
            .field("missing_output", &self.missing_output)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ChunkProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn chunk_size(mut self, pages: usize) -> Self {
        self.config.chunk_size = pages;
        self
    }

    pub fn batch_multiplier(mut self, n: u32) -> Self {
        self.config.batch_multiplier = n;
        self
    }

    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = Some(pages);
        self
    }

    pub fn worker_count(mut self, n: usize) -> Self {
        self.config.worker_count = n;
        self
    }

    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter_program = program.into();
        self
    }

    pub fn converter_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.converter_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add (or replace) one environment variable for the converter process.
    pub fn converter_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.config.converter_env.retain(|(k, _)| *k != key);
        self.config.converter_env.push((key, value.into()));
        self
    }

    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn chunk_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.chunk_dir_name = name.into();
        self
    }

    pub fn keep_chunks(mut self, v: bool) -> Self {
        self.config.keep_chunks = v;
        self
    }

    pub fn separator(mut self, sep: ChunkSeparator) -> Self {
        self.config.separator = sep;
        self
    }

    pub fn missing_output(mut self, policy: MissingOutputPolicy) -> Self {
        self.config.missing_output = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, PdfChunkError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(PdfChunkError::InvalidConfig(
                "Chunk size must be ≥ 1 page".into(),
            ));
        }
        if c.batch_multiplier == 0 {
            return Err(PdfChunkError::InvalidConfig(
                "Batch multiplier must be ≥ 1".into(),
            ));
        }
        if c.max_pages == Some(0) {
            return Err(PdfChunkError::InvalidConfig(
                "Max pages must be ≥ 1 when set".into(),
            ));
        }
        if c.worker_count == 0 {
            return Err(PdfChunkError::InvalidConfig(
                "Worker count must be ≥ 1".into(),
            ));
        }
        if c.converter.is_none() && c.converter_program.trim().is_empty() {
            return Err(PdfChunkError::InvalidConfig(
                "Converter program must not be empty".into(),
            ));
        }
        let dir = c.chunk_dir_name.as_str();
        if dir.is_empty() || dir == "." || dir == ".." || dir.contains(['/', '\\']) {
            return Err(PdfChunkError::InvalidConfig(format!(
                "Chunk directory name must be a single path component, got {dir:?}"
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How to separate chunks in the merged Markdown output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkSeparator {
    /// Single newline, matching plain concatenation of the converter output. (default)
    #[default]
    Newline,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment naming the page range of the following chunk.
    Comment,
    /// Custom string inserted between chunks.
    Custom(String),
}

impl ChunkSeparator {
    /// Render the separator placed before the chunk covering `start..=end`.
    pub fn render(&self, start_page: usize, end_page: usize) -> String {
        match self {
            ChunkSeparator::Newline => "\n".to_string(),
            ChunkSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            ChunkSeparator::Comment => {
                format!("\n\n<!-- pages {}-{} -->\n\n", start_page, end_page)
            }
            ChunkSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

/// Policy for chunks whose expected Markdown file is absent after a
/// successful converter run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingOutputPolicy {
    /// Log a warning, record the chunk in the output, keep merging. (default)
    #[default]
    Warn,
    /// Abort the run with [`PdfChunkError::MissingChunkOutput`].
    Fail,
}
