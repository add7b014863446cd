//! Progress-callback trait for per-chunk extraction events.
//!
//! Inject an [`Arc<dyn ChunkProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the driver works through the chunks of a document.
//!
//! # Example
//!
//! ```rust
//! use pdfchunk2md::{Chunk, ChunkProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl ChunkProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk: &Chunk, index: usize, total: usize) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("chunk {}/{} (pages {}) done", index + 1, total, chunk.range_label());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { converted: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ChunkProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::split::Chunk;
use std::sync::Arc;

/// Called by the driver as it processes each chunk.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Chunks are processed one at a time, but the trait is
/// `Send + Sync` so implementations can be shared with other tasks.
pub trait ChunkProgressCallback: Send + Sync {
    /// Called once after splitting, before the first chunk is converted.
    fn on_run_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called just before the converter is started for a chunk.
    ///
    /// `index` is 0-based; `total` is the number of chunks in the run.
    fn on_chunk_start(&self, chunk: &Chunk, index: usize, total: usize) {
        let _ = (chunk, index, total);
    }

    /// Called when the converter exits successfully for a chunk.
    fn on_chunk_complete(&self, chunk: &Chunk, index: usize, total: usize) {
        let _ = (chunk, index, total);
    }

    /// Called when a chunk fails. The run aborts right after this call.
    fn on_chunk_error(&self, chunk: &Chunk, index: usize, total: usize, error: &str) {
        let _ = (chunk, index, total, error);
    }

    /// Called once after merging.
    ///
    /// * `total_chunks`: chunks that were converted
    /// * `merged_chunks`: chunks whose Markdown made it into the output
    fn on_run_complete(&self, total_chunks: usize, merged_chunks: usize) {
        let _ = (total_chunks, merged_chunks);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ChunkProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ChunkProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::split::DocumentId;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chunk(start: usize, end: usize) -> Chunk {
        Chunk {
            document_id: DocumentId::new(),
            original_file_name: "report.pdf".into(),
            chunk_file: PathBuf::from(format!("chunks/x_chunk_{start}_{end}.pdf")),
            start_page: start,
            end_page: end,
        }
    }

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        merged: AtomicUsize,
    }

    impl ChunkProgressCallback for TrackingCallback {
        fn on_run_start(&self, total_chunks: usize) {
            self.started_total.store(total_chunks, Ordering::SeqCst);
        }

        fn on_chunk_start(&self, _chunk: &Chunk, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_complete(&self, _chunk: &Chunk, _index: usize, _total: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_error(&self, _chunk: &Chunk, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, _total_chunks: usize, merged_chunks: usize) {
            self.merged.store(merged_chunks, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let c = chunk(1, 20);
        cb.on_run_start(3);
        cb.on_chunk_start(&c, 0, 3);
        cb.on_chunk_complete(&c, 0, 3);
        cb.on_chunk_error(&c, 1, 3, "boom");
        cb.on_run_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        let chunks = [chunk(1, 20), chunk(21, 40), chunk(41, 45)];

        tracker.on_run_start(chunks.len());
        for (i, c) in chunks.iter().enumerate().take(2) {
            tracker.on_chunk_start(c, i, chunks.len());
            tracker.on_chunk_complete(c, i, chunks.len());
        }
        tracker.on_chunk_start(&chunks[2], 2, 3);
        tracker.on_chunk_error(&chunks[2], 2, 3, "exit status 1");

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);

        tracker.on_run_complete(2, 2);
        assert_eq!(tracker.merged.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(1);
        cb.on_chunk_complete(&chunk(1, 1), 0, 1);
    }
}
