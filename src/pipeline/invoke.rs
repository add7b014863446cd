//! Converter invocation: run one chunk PDF through the external
//! document-to-Markdown tool.
//!
//! The tool sits behind the narrow [`Converter`] trait so the driver never
//! knows whether it is talking to a real subprocess or a test double.
//! [`MarkerConverter`] is the subprocess implementation; its command line
//! mirrors `marker_single`:
//!
//! ```text
//! PYTORCH_MPS_HIGH_WATERMARK_RATIO=0.0 \
//!   marker_single <chunk.pdf> <output_dir> --batch_multiplier <N> [--max_pages <M>]
//! ```
//!
//! Arguments are handed to the process directly rather than through a
//! shell, so paths containing quotes or spaces need no escaping.

use crate::config::ExtractionConfig;
use crate::error::PdfChunkError;
use crate::pipeline::split::{file_stem_of, Chunk};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A document-to-Markdown conversion capability.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Convert `chunk_file` into Markdown under `output_dir`.
    ///
    /// Returns the path of the Markdown output; the merger reads it from
    /// there. The file may be missing, in which case the chunk is reported
    /// as having no output.
    async fn convert(&self, chunk_file: &Path, output_dir: &Path) -> Result<PathBuf, PdfChunkError>;
}

/// Where a marker-style tool writes its output for `chunk_file`:
/// `<output_dir>/<stem>/<stem>.md`.
pub fn expected_output_path(chunk_file: &Path, output_dir: &Path) -> PathBuf {
    let stem = file_stem_of(chunk_file);
    output_dir.join(&stem).join(format!("{stem}.md"))
}

/// A chunk the converter finished with, and where it said the Markdown is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedChunk {
    pub chunk: Chunk,
    pub markdown_path: PathBuf,
}

/// Runs an external marker-compatible command once per chunk.
#[derive(Debug, Clone)]
pub struct MarkerConverter {
    program: String,
    leading_args: Vec<String>,
    env: Vec<(String, String)>,
    batch_multiplier: u32,
    max_pages: Option<usize>,
}

impl MarkerConverter {
    /// A converter for `program` with default tuning and no extra environment.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            env: Vec::new(),
            batch_multiplier: crate::config::DEFAULT_BATCH_MULTIPLIER,
            max_pages: None,
        }
    }

    /// Build the converter described by the `converter_*` fields of `config`.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            program: config.converter_program.clone(),
            leading_args: config.converter_args.clone(),
            env: config.converter_env.clone(),
            batch_multiplier: config.batch_multiplier,
            max_pages: config.max_pages,
        }
    }

    pub fn leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn batch_multiplier(mut self, n: u32) -> Self {
        self.batch_multiplier = n;
        self
    }

    pub fn max_pages(mut self, pages: Option<usize>) -> Self {
        self.max_pages = pages;
        self
    }

    /// Arguments passed after the program name.
    pub fn command_args(&self, chunk_file: &Path, output_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.leading_args.iter().map(OsString::from).collect();
        args.push(chunk_file.as_os_str().to_os_string());
        args.push(output_dir.as_os_str().to_os_string());
        args.push("--batch_multiplier".into());
        args.push(self.batch_multiplier.to_string().into());
        if let Some(max) = self.max_pages {
            args.push("--max_pages".into());
            args.push(max.to_string().into());
        }
        args
    }
}

#[async_trait]
impl Converter for MarkerConverter {
    fn name(&self) -> &str {
        &self.program
    }

    async fn convert(&self, chunk_file: &Path, output_dir: &Path) -> Result<PathBuf, PdfChunkError> {
        let args = self.command_args(chunk_file, output_dir);
        debug!("Running {} {:?} (env {:?})", self.program, args, self.env);

        let output = Command::new(&self.program)
            .args(&args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| PdfChunkError::ConverterUnavailable {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(PdfChunkError::ConverterFailed {
                chunk: chunk_file.to_path_buf(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("{} stdout: {}", self.program, stdout.trim_end());
        }

        Ok(expected_output_path(chunk_file, output_dir))
    }
}

/// Convert one chunk into `<output_dir>/<original_stem>/`, then delete the
/// chunk PDF unless `keep_chunk_file` is set.
///
/// The result carries the location the converter reported for the Markdown.
pub async fn process_chunk(
    chunk: &Chunk,
    output_dir: &Path,
    converter: &dyn Converter,
    keep_chunk_file: bool,
) -> Result<ConvertedChunk, PdfChunkError> {
    let chunk_output_dir = output_dir.join(chunk.original_stem());
    tokio::fs::create_dir_all(&chunk_output_dir)
        .await
        .map_err(|e| PdfChunkError::OutputDirFailed {
            path: chunk_output_dir.clone(),
            source: e,
        })?;

    info!(
        "Processing: {} (Pages {}-{}) with {}",
        chunk.original_file_name,
        chunk.start_page,
        chunk.end_page,
        converter.name()
    );
    let markdown_path = converter
        .convert(&chunk.chunk_file, &chunk_output_dir)
        .await?;

    if !keep_chunk_file {
        // Removing the chunk bounds staging disk use; failure only costs space.
        if let Err(e) = tokio::fs::remove_file(&chunk.chunk_file).await {
            warn!(
                "Could not delete chunk file {}: {}",
                chunk.chunk_file.display(),
                e
            );
        }
    }

    Ok(ConvertedChunk {
        chunk: chunk.clone(),
        markdown_path,
    })
}
