//! Result merging: read back each chunk's Markdown and reassemble whole
//! documents in page order.
//!
//! Each chunk's Markdown is read from the path its converter reported
//! (for `marker_single`, `<output_dir>/<original_stem>/<chunk_stem>/<chunk_stem>.md`).
//! Only the file's existence is checked; its contents are merged verbatim.
//!
//! Chunks are grouped by [`DocumentId`] and each group is sorted on its start
//! page before joining, so the merged text is the same whatever order the
//! chunks were converted or listed in.

use crate::config::ChunkSeparator;
use crate::error::PdfChunkError;
use crate::pipeline::invoke::ConvertedChunk;
use crate::pipeline::split::{Chunk, DocumentId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Markdown produced for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkText {
    pub start_page: usize,
    pub end_page: usize,
    pub text: String,
}

/// Chunk texts collected for one source document, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub document_id: DocumentId,
    pub original_file_name: String,
    pub parts: Vec<ChunkText>,
}

impl DocumentResult {
    /// Join the parts in ascending start-page order.
    pub fn merged(&self, separator: &ChunkSeparator) -> String {
        let mut parts: Vec<&ChunkText> = self.parts.iter().collect();
        parts.sort_by_key(|p| p.start_page);

        let mut out = String::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                out.push_str(&separator.render(part.start_page, part.end_page));
            }
            out.push_str(&part.text);
        }
        out
    }
}

/// One reassembled document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedDocument {
    pub document_id: DocumentId,
    pub original_file_name: String,
    pub chunk_count: usize,
    pub markdown: String,
}

/// Everything the merger learned from one pass over the chunks.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Documents in the order their first chunk was seen.
    pub documents: Vec<MergedDocument>,
    /// Chunks whose Markdown was found and merged.
    pub merged: Vec<Chunk>,
    /// Chunks whose expected Markdown file did not exist.
    pub missing: Vec<Chunk>,
}

/// Read every chunk's Markdown and reassemble per-document output.
///
/// A chunk whose file is absent is logged and listed in
/// [`MergeOutcome::missing`]; it never fails the merge. Any other read error
/// does.
pub async fn merge_chunk_results(
    converted: &[ConvertedChunk],
    separator: &ChunkSeparator,
) -> Result<MergeOutcome, PdfChunkError> {
    let mut results: Vec<DocumentResult> = Vec::new();
    let mut by_id: HashMap<DocumentId, usize> = HashMap::new();
    let mut merged = Vec::with_capacity(converted.len());
    let mut missing = Vec::new();

    for ConvertedChunk {
        chunk,
        markdown_path: md_path,
    } in converted
    {
        let text = match tokio::fs::read_to_string(md_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "No Markdown output for {} pages {} (expected {}); omitting it",
                    chunk.original_file_name,
                    chunk.range_label(),
                    md_path.display()
                );
                missing.push(chunk.clone());
                continue;
            }
            Err(e) => {
                return Err(PdfChunkError::OutputReadFailed {
                    path: md_path.clone(),
                    source: e,
                })
            }
        };
        debug!("Read {} bytes from {}", text.len(), md_path.display());

        let idx = *by_id.entry(chunk.document_id).or_insert_with(|| {
            results.push(DocumentResult {
                document_id: chunk.document_id,
                original_file_name: chunk.original_file_name.clone(),
                parts: Vec::new(),
            });
            results.len() - 1
        });
        results[idx].parts.push(ChunkText {
            start_page: chunk.start_page,
            end_page: chunk.end_page,
            text,
        });
        merged.push(chunk.clone());
    }

    Ok(MergeOutcome {
        documents: assemble(&results, separator),
        merged,
        missing,
    })
}

/// Flatten collected results into merged documents, preserving their order.
pub fn assemble(results: &[DocumentResult], separator: &ChunkSeparator) -> Vec<MergedDocument> {
    results
        .iter()
        .map(|r| MergedDocument {
            document_id: r.document_id,
            original_file_name: r.original_file_name.clone(),
            chunk_count: r.parts.len(),
            markdown: r.merged(separator),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::{Path, PathBuf};

    fn chunk(id: DocumentId, name: &str, start: usize, end: usize) -> Chunk {
        Chunk {
            document_id: id,
            original_file_name: name.to_string(),
            chunk_file: PathBuf::from("staging").join(format!("{id}_chunk_{start}_{end}.pdf")),
            start_page: start,
            end_page: end,
        }
    }

    /// Where a converter double reports the Markdown for `chunk`.
    fn reported(dir: &Path, chunk: &Chunk) -> ConvertedChunk {
        ConvertedChunk {
            chunk: chunk.clone(),
            markdown_path: dir.join(format!("{}.md", chunk.stem())),
        }
    }

    fn write_output(dir: &Path, chunk: &Chunk, text: &str) -> ConvertedChunk {
        let converted = reported(dir, chunk);
        std::fs::write(&converted.markdown_path, text).unwrap();
        converted
    }

    #[tokio::test]
    async fn reads_markdown_from_the_reported_path() {
        let dir = tempfile::tempdir().unwrap();
        let id = DocumentId::new();
        let c = chunk(id, "book.pdf", 1, 5);
        let elsewhere = dir.path().join("custom").join("result.markdown");
        std::fs::create_dir_all(elsewhere.parent().unwrap()).unwrap();
        std::fs::write(&elsewhere, "from a custom location").unwrap();

        let converted = [ConvertedChunk {
            chunk: c.clone(),
            markdown_path: elsewhere,
        }];
        let outcome = merge_chunk_results(&converted, &ChunkSeparator::Newline)
            .await
            .unwrap();

        assert_eq!(outcome.documents[0].markdown, "from a custom location");
        assert_eq!(outcome.merged, vec![c]);
        assert!(outcome.missing.is_empty());
    }

    #[tokio::test]
    async fn merges_in_page_order_regardless_of_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let id = DocumentId::new();
        let chunks = vec![
            chunk(id, "book.pdf", 41, 45),
            chunk(id, "book.pdf", 1, 20),
            chunk(id, "book.pdf", 21, 40),
        ];
        let converted: Vec<ConvertedChunk> = chunks
            .iter()
            .map(|c| write_output(dir.path(), c, &format!("pages {}", c.range_label())))
            .collect();

        let outcome = merge_chunk_results(&converted, &ChunkSeparator::Newline)
            .await
            .unwrap();

        assert_eq!(outcome.documents.len(), 1);
        let doc = &outcome.documents[0];
        assert_eq!(doc.original_file_name, "book.pdf");
        assert_eq!(doc.chunk_count, 3);
        assert_eq!(doc.markdown, "pages 1-20\npages 21-40\npages 41-45");
        assert!(outcome.missing.is_empty());
    }

    #[tokio::test]
    async fn missing_output_is_omitted_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let id = DocumentId::new();
        let chunks = vec![
            chunk(id, "book.pdf", 1, 20),
            chunk(id, "book.pdf", 21, 40),
            chunk(id, "book.pdf", 41, 45),
        ];
        let converted = vec![
            write_output(dir.path(), &chunks[0], "first"),
            reported(dir.path(), &chunks[1]),
            write_output(dir.path(), &chunks[2], "last"),
        ];

        let outcome = merge_chunk_results(&converted, &ChunkSeparator::Newline)
            .await
            .unwrap();

        assert_eq!(outcome.documents[0].markdown, "first\nlast");
        assert_eq!(outcome.merged.len(), 2);
        assert_eq!(outcome.missing, vec![chunks[1].clone()]);
    }

    #[tokio::test]
    async fn groups_by_document_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = DocumentId::new();
        let b = DocumentId::new();
        let chunks = vec![
            chunk(b, "second.pdf", 1, 2),
            chunk(a, "first.pdf", 3, 4),
            chunk(a, "first.pdf", 1, 2),
        ];
        let converted: Vec<ConvertedChunk> = chunks
            .iter()
            .map(|c| write_output(dir.path(), c, &format!("{}:{}", c.original_file_name, c.start_page)))
            .collect();

        let outcome = merge_chunk_results(&converted, &ChunkSeparator::Newline)
            .await
            .unwrap();

        let names: Vec<&str> = outcome
            .documents
            .iter()
            .map(|d| d.original_file_name.as_str())
            .collect();
        assert_eq!(names, ["second.pdf", "first.pdf"]);
        assert_eq!(outcome.documents[1].markdown, "first.pdf:1\nfirst.pdf:3");
    }

    #[tokio::test]
    async fn no_chunks_no_documents() {
        let outcome = merge_chunk_results(&[], &ChunkSeparator::Newline)
            .await
            .unwrap();
        assert!(outcome.documents.is_empty());
    }

    #[test]
    fn comment_separator_names_following_range() {
        let result = DocumentResult {
            document_id: DocumentId::new(),
            original_file_name: "a.pdf".into(),
            parts: vec![
                ChunkText { start_page: 21, end_page: 30, text: "B".into() },
                ChunkText { start_page: 1, end_page: 20, text: "A".into() },
            ],
        };
        assert_eq!(
            result.merged(&ChunkSeparator::Comment),
            "A\n\n<!-- pages 21-30 -->\n\nB"
        );
    }

    proptest! {
        #[test]
        fn merged_text_ignores_arrival_order(
            order in Just((0usize..12).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let parts: Vec<ChunkText> = order
                .iter()
                .map(|&i| ChunkText {
                    start_page: i * 10 + 1,
                    end_page: i * 10 + 10,
                    text: format!("part {i}"),
                })
                .collect();
            let result = DocumentResult {
                document_id: DocumentId::new(),
                original_file_name: "p.pdf".into(),
                parts,
            };

            let expected: Vec<String> = (0..12).map(|i| format!("part {i}")).collect();
            prop_assert_eq!(result.merged(&ChunkSeparator::Newline), expected.join("\n"));
        }
    }
}
