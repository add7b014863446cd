//! Pipeline driver: split → convert each chunk → merge.
//!
//! Chunks are converted strictly one after another. The converter owns a
//! single accelerator for the duration of its run, and two instances would
//! compete for its memory, so there is no concurrency here even though the
//! rest of the crate runs on tokio.

use crate::config::{ExtractionConfig, MissingOutputPolicy};
use crate::error::PdfChunkError;
use crate::output::{DocumentMetadata, ExtractionOutput, ExtractionStats};
use crate::pipeline::invoke::{self, ConvertedChunk, Converter, MarkerConverter};
use crate::pipeline::split::{self, file_stem_of, Chunk};
use crate::pipeline::{input, merge};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Split `input` into chunks, convert each with the configured converter,
/// and merge the results.
///
/// Working directories are created under `output_dir`:
/// `<chunk_dir_name>/` for staged chunk PDFs and `<input_stem>/` for the
/// converter's per-chunk output.
///
/// # Errors
/// Any failure aborts the run: unreadable or invalid input, a chunk that
/// cannot be written, a converter that exits nonzero (the error carries its
/// stderr), or, under [`MissingOutputPolicy::Fail`], a chunk without
/// Markdown output.
pub async fn extract(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, PdfChunkError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();
    info!(
        "Starting extraction: {} → {}",
        input.display(),
        output_dir.display()
    );

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let pdf_path = input::resolve_input(input)?;

    // ── Step 2: Working directories ──────────────────────────────────────
    let chunk_dir = output_dir.join(&config.chunk_dir_name);
    create_dir(output_dir).await?;
    create_dir(&chunk_dir).await?;

    if config.worker_count > 1 {
        warn!(
            "worker_count = {} requested; chunks are converted one at a time",
            config.worker_count
        );
    }

    let converter = resolve_converter(config);

    // ── Step 3: Split into chunks ────────────────────────────────────────
    let split_start = Instant::now();
    let chunks = split::split_pdf(&pdf_path, &chunk_dir, config.chunk_size).await?;
    let split_duration_ms = split_start.elapsed().as_millis() as u64;
    let total_pages = chunks.last().map(|c| c.end_page).unwrap_or(0);
    info!(
        "Split {} pages into {} chunks in {}ms",
        total_pages,
        chunks.len(),
        split_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(chunks.len());
    }

    // ── Step 4: Convert chunks, one at a time ────────────────────────────
    let convert_start = Instant::now();
    let processed = process_sequential(&chunks, output_dir, converter.as_ref(), config).await?;
    let convert_duration_ms = convert_start.elapsed().as_millis() as u64;

    // ── Step 5: Merge ────────────────────────────────────────────────────
    let outcome = merge::merge_chunk_results(&processed, &config.separator).await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(processed.len(), outcome.merged.len());
    }

    if !outcome.missing.is_empty() && config.missing_output == MissingOutputPolicy::Fail {
        return Err(PdfChunkError::MissingChunkOutput {
            ranges: outcome.missing.iter().map(Chunk::range_label).collect(),
        });
    }

    // One input document per run, so the first merged document is the result.
    if outcome.documents.len() > 1 {
        warn!(
            "{} documents merged from one input; returning only the first",
            outcome.documents.len()
        );
    }
    let markdown = outcome
        .documents
        .first()
        .map(|d| d.markdown.clone())
        .unwrap_or_default();

    let stats = ExtractionStats {
        total_pages,
        total_chunks: chunks.len(),
        merged_chunks: outcome.merged.len(),
        missing_chunks: outcome.missing.len(),
        split_duration_ms,
        convert_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {}/{} chunks merged, {}ms total",
        stats.merged_chunks, stats.total_chunks, stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        markdown,
        documents: outcome.documents,
        chunks: outcome.merged,
        missing: outcome.missing,
        stats,
    })
}

/// Run [`extract`] and write the merged Markdown to
/// `<output_dir>/<input_stem>_extracted.md`.
///
/// Uses atomic write (temp file in the same directory + rename) so a crash
/// never leaves a half-written result.
pub async fn extract_to_file(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<(PathBuf, ExtractionOutput), PdfChunkError> {
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();

    let output = extract(input, output_dir, config).await?;
    let path = extracted_output_path(input, output_dir);
    write_atomic(&path, &output.markdown).await?;
    info!("Wrote {} bytes to {}", output.markdown.len(), path.display());

    Ok((path, output))
}

/// `<output_dir>/<input_stem>_extracted.md`
pub fn extracted_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    output_dir.join(format!("{}_extracted.md", file_stem_of(input)))
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, PdfChunkError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfChunkError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, output_dir, config))
}

/// Extract PDF metadata without splitting or converting.
pub async fn inspect(input: impl AsRef<Path>) -> Result<DocumentMetadata, PdfChunkError> {
    let pdf_path = input::resolve_input(input)?;
    split::extract_metadata(&pdf_path).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Use the pre-built converter if the caller supplied one, otherwise a
/// subprocess converter from the `converter_*` settings.
fn resolve_converter(config: &ExtractionConfig) -> Arc<dyn Converter> {
    if let Some(ref converter) = config.converter {
        return Arc::clone(converter);
    }
    Arc::new(MarkerConverter::from_config(config))
}

/// Convert chunks in order. On the first failure the chunks that were not
/// converted are removed from staging and the error is returned.
async fn process_sequential(
    chunks: &[Chunk],
    output_dir: &Path,
    converter: &dyn Converter,
    config: &ExtractionConfig,
) -> Result<Vec<ConvertedChunk>, PdfChunkError> {
    let total = chunks.len();
    let mut processed = Vec::with_capacity(total);

    for (index, chunk) in chunks.iter().enumerate() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_chunk_start(chunk, index, total);
        }

        match invoke::process_chunk(chunk, output_dir, converter, config.keep_chunks).await {
            Ok(converted) => {
                debug!(
                    "Chunk {} → {}",
                    chunk.range_label(),
                    converted.markdown_path.display()
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_chunk_complete(chunk, index, total);
                }
                processed.push(converted);
            }
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_chunk_error(chunk, index, total, &e.to_string());
                }
                if !config.keep_chunks {
                    discard_chunks(&chunks[index..]).await;
                }
                return Err(e);
            }
        }
    }

    Ok(processed)
}

async fn discard_chunks(chunks: &[Chunk]) {
    for chunk in chunks {
        match tokio::fs::remove_file(&chunk.chunk_file).await {
            Ok(()) => debug!("Removed staged chunk {}", chunk.chunk_file.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Could not remove staged chunk {}: {}",
                chunk.chunk_file.display(),
                e
            ),
        }
    }
}

async fn create_dir(path: &Path) -> Result<(), PdfChunkError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| PdfChunkError::OutputDirFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), PdfChunkError> {
    let path = path.to_path_buf();
    let contents = contents.to_owned();

    tokio::task::spawn_blocking(move || {
        let write_err = |source: std::io::Error| PdfChunkError::OutputWriteFailed {
            path: path.clone(),
            source,
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(contents.as_bytes()).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| PdfChunkError::Internal(format!("Write task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracted_path_uses_input_stem() {
        assert_eq!(
            extracted_output_path(Path::new("/data/annual.report.pdf"), Path::new("out")),
            PathBuf::from("out/annual.report_extracted.md")
        );
    }

    #[test]
    fn resolve_converter_defaults_to_marker() {
        let config = ExtractionConfig::default();
        assert_eq!(resolve_converter(&config).name(), "marker_single");
    }

    #[tokio::test]
    async fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_extracted.md");
        std::fs::write(&path, "old").unwrap();

        write_atomic(&path, "new content").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new content");

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn discard_ignores_already_deleted_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a_chunk_1_2.pdf");
        std::fs::write(&present, b"%PDF").unwrap();
        let chunks: Vec<Chunk> = [present.clone(), dir.path().join("a_chunk_3_4.pdf")]
            .into_iter()
            .enumerate()
            .map(|(i, chunk_file)| Chunk {
                document_id: split::DocumentId::new(),
                original_file_name: "a.pdf".into(),
                chunk_file,
                start_page: i * 2 + 1,
                end_page: i * 2 + 2,
            })
            .collect();

        discard_chunks(&chunks).await;
        assert!(!present.exists());
    }
}
