//! Error types for the pdfchunk2md library.
//!
//! Every failure in the pipeline is fatal to the run: there is no retry or
//! partial recovery. [`PdfChunkError`] is returned as `Err(..)` from the
//! top-level `extract*` functions and carries enough context (paths, the
//! offending chunk, the converter's captured stderr) for the CLI to print a
//! single useful line.
//!
//! A missing per-chunk Markdown file is *not* an error by default; the merger
//! records it and the driver decides what to do according to
//! [`crate::config::MissingOutputPolicy`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfchunk2md library.
#[derive(Debug, Error)]
pub enum PdfChunkError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The path exists but is a directory or other non-regular file.
    #[error("Input is not a regular file: '{path}'\nPass the path of a PDF document.")]
    NotAFile { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// lopdf could not parse the document.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// A chunk PDF could not be written to the staging directory.
    #[error("Failed to write chunk '{path}' (pages {start_page}-{end_page}): {detail}")]
    ChunkWriteFailed {
        path: PathBuf,
        start_page: usize,
        end_page: usize,
        detail: String,
    },

    // ── Converter errors ──────────────────────────────────────────────────
    /// The external converter exited with a nonzero status.
    #[error("Converter command failed for '{chunk}' (exit status {}): {stderr}", status_label(.status))]
    ConverterFailed {
        chunk: PathBuf,
        status: Option<i32>,
        stderr: String,
    },

    /// The converter program could not be started at all.
    #[error("Could not run converter '{program}': {source}\nIs it installed and on PATH?")]
    ConverterUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // ── Merge errors ──────────────────────────────────────────────────────
    /// A chunk's Markdown output exists but could not be read.
    #[error("Failed to read converter output '{path}': {source}")]
    OutputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The converter succeeded but left no Markdown for some chunks.
    ///
    /// Only returned under [`crate::config::MissingOutputPolicy::Fail`].
    #[error("Converter produced no Markdown for {} chunk(s): {}", .ranges.len(), .ranges.join(", "))]
    MissingChunkOutput { ranges: Vec<String> },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create one of the working directories.
    #[error("Failed to create directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the merged Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn status_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
