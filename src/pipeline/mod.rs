//! Pipeline stages for chunked PDF-to-Markdown extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the converter can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ invoke (× chunks, one at a time) ──▶ merge
//! (path)    (lopdf)   (external converter)                 (page order)
//! ```
//!
//! 1. [`input`]: validate the user-supplied path and PDF magic bytes
//! 2. [`split`]: write `ceil(pages / chunk_size)` chunk PDFs to the staging
//!    directory; runs in `spawn_blocking` because lopdf is synchronous
//! 3. [`invoke`]: run the converter on one chunk, then delete the chunk
//! 4. [`merge`]: read each chunk's Markdown back and join in page order

pub mod input;
pub mod invoke;
pub mod merge;
pub mod split;
