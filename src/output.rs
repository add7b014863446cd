//! Result types returned by the extraction driver.

use crate::pipeline::merge::MergedDocument;
use crate::pipeline::split::Chunk;
use serde::{Deserialize, Serialize};

/// Everything produced by one extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Merged Markdown of the first (normally the only) document.
    pub markdown: String,
    /// All merged documents, in first-seen order.
    pub documents: Vec<MergedDocument>,
    /// Chunks whose Markdown was merged.
    pub chunks: Vec<Chunk>,
    /// Chunks the converter left no Markdown for.
    pub missing: Vec<Chunk>,
    pub stats: ExtractionStats,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub total_chunks: usize,
    pub merged_chunks: usize,
    pub missing_chunks: usize,
    pub split_duration_ms: u64,
    pub convert_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// PDF metadata available without running the converter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
}
