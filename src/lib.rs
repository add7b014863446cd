//! # pdfchunk2md
//!
//! Convert large PDF documents to Markdown by running an external converter
//! (by default [`marker_single`](https://github.com/VikParuchuri/marker)) on
//! fixed-size page chunks and stitching the results back together.
//!
//! ## Why chunk?
//!
//! Layout-aware converters load a whole document into accelerator memory.
//! A 600-page book either runs out of memory or takes one very long,
//! all-or-nothing run. Converting 20 pages at a time keeps memory flat and
//! bounds staging disk use, since each chunk file is deleted as soon as it
//! has been converted.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate path and %PDF magic
//!  ├─ 2. Split    ceil(pages / chunk_size) chunk PDFs via lopdf (spawn_blocking)
//!  ├─ 3. Convert  one converter process per chunk, strictly sequential
//!  ├─ 4. Merge    read each chunk's reported .md, sort by start page
//!  └─ 5. Output   <out>/<stem>_extracted.md + per-run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfchunk2md::{extract_to_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder().chunk_size(20).build()?;
//!     let (path, output) = extract_to_file("book.pdf", "out", &config).await?;
//!     eprintln!(
//!         "{}: {}/{} chunks merged",
//!         path.display(),
//!         output.stats.merged_chunks,
//!         output.stats.total_chunks
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Swapping the converter
//!
//! Anything implementing [`Converter`] can replace the subprocess, which is
//! how the test suite runs the whole pipeline without `marker_single`
//! installed. Pass it with [`ExtractionConfigBuilder::converter`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfchunk2md` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ChunkSeparator, ExtractionConfig, ExtractionConfigBuilder, MissingOutputPolicy};
pub use error::PdfChunkError;
pub use extract::{extract, extract_sync, extract_to_file, extracted_output_path, inspect};
pub use output::{DocumentMetadata, ExtractionOutput, ExtractionStats};
pub use pipeline::invoke::{ConvertedChunk, Converter, MarkerConverter};
pub use pipeline::merge::MergedDocument;
pub use pipeline::split::{plan_chunks, Chunk, DocumentId, PageRange};
pub use progress::{ChunkProgressCallback, NoopProgressCallback, ProgressCallback};
