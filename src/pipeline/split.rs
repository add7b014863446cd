//! PDF chunking: partition a document's pages into fixed-size groups and
//! write each group to its own PDF via lopdf.
//!
//! lopdf parsing and serialisation are synchronous and CPU-bound, so the
//! async entry points move the work onto tokio's blocking pool.
//!
//! Each chunk is a fresh document holding a flat page tree over the range's
//! page objects plus everything those pages reference. Attributes a page
//! inherits from its ancestors are copied onto the page itself, and links to
//! page-tree nodes outside the range are cut, so the work per chunk is bounded
//! by what the chunk's pages use rather than by the size of the source.

use crate::error::PdfChunkError;
use crate::output::DocumentMetadata;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Opaque identifier shared by every chunk of one source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A 1-based, inclusive page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Number of pages in the range.
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, page: usize) -> bool {
        page >= self.start && page <= self.end
    }
}

/// One contiguous page slice of a source PDF, materialised as its own file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Shared by all chunks split from the same document.
    pub document_id: DocumentId,
    /// File name (with extension) of the source PDF.
    pub original_file_name: String,
    /// Path of the chunk PDF in the staging directory.
    pub chunk_file: PathBuf,
    /// First page, 1-based.
    pub start_page: usize,
    /// Last page, 1-based, inclusive.
    pub end_page: usize,
}

impl Chunk {
    /// File name used for the chunk PDF: `<id>_chunk_<start>_<end>.pdf`.
    pub fn file_name_for(document_id: &DocumentId, range: PageRange) -> String {
        format!("{}_chunk_{}_{}.pdf", document_id, range.start, range.end)
    }

    /// Chunk file name without its extension. The converter names its
    /// output directory and Markdown file after this.
    pub fn stem(&self) -> String {
        file_stem_of(&self.chunk_file)
    }

    /// Source file name without its extension.
    pub fn original_stem(&self) -> String {
        file_stem_of(Path::new(&self.original_file_name))
    }

    pub fn range(&self) -> PageRange {
        PageRange {
            start: self.start_page,
            end: self.end_page,
        }
    }

    pub fn page_count(&self) -> usize {
        self.range().len()
    }

    /// `"21-40"`
    pub fn range_label(&self) -> String {
        format!("{}-{}", self.start_page, self.end_page)
    }
}

pub(crate) fn file_stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Partition `total_pages` into contiguous ranges of at most `chunk_size`.
///
/// Yields `ceil(total_pages / chunk_size)` ranges covering `1..=total_pages`
/// in ascending order. A `chunk_size` of 0 is treated as 1.
pub fn plan_chunks(total_pages: usize, chunk_size: usize) -> Vec<PageRange> {
    let size = chunk_size.max(1);
    (0..total_pages)
        .step_by(size)
        .map(|offset| PageRange {
            start: offset + 1,
            end: (offset + size).min(total_pages),
        })
        .collect()
}

/// Split the PDF at `input` into chunk files under `chunk_dir`.
///
/// All chunks share one freshly generated [`DocumentId`]. Runs inside
/// `spawn_blocking`.
pub async fn split_pdf(
    input: &Path,
    chunk_dir: &Path,
    chunk_size: usize,
) -> Result<Vec<Chunk>, PdfChunkError> {
    let input = input.to_path_buf();
    let chunk_dir = chunk_dir.to_path_buf();

    tokio::task::spawn_blocking(move || split_pdf_blocking(&input, &chunk_dir, chunk_size))
        .await
        .map_err(|e| PdfChunkError::Internal(format!("Split task panicked: {}", e)))?
}

/// Blocking implementation of [`split_pdf`].
pub fn split_pdf_blocking(
    input: &Path,
    chunk_dir: &Path,
    chunk_size: usize,
) -> Result<Vec<Chunk>, PdfChunkError> {
    let document = load_document(input)?;
    let pages = document.get_pages();
    let total_pages = pages.len();

    let original_file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let document_id = DocumentId::new();

    let ranges = plan_chunks(total_pages, chunk_size);
    info!(
        "PDF loaded: {} pages → {} chunks of ≤{} pages (id {})",
        total_pages,
        ranges.len(),
        chunk_size,
        document_id
    );

    let mut chunks = Vec::with_capacity(ranges.len());
    for range in ranges {
        let chunk_file = chunk_dir.join(Chunk::file_name_for(&document_id, range));
        write_chunk(&document, &pages, range, &chunk_file)?;
        debug!(
            "Wrote chunk {} (pages {}-{})",
            chunk_file.display(),
            range.start,
            range.end
        );

        chunks.push(Chunk {
            document_id,
            original_file_name: original_file_name.clone(),
            chunk_file,
            start_page: range.start,
            end_page: range.end,
        });
    }

    Ok(chunks)
}

fn load_document(path: &Path) -> Result<Document, PdfChunkError> {
    Document::load(path).map_err(|e| PdfChunkError::CorruptPdf {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Page attributes a page may inherit from its `Pages` ancestors.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Ancestor walks stop here, which also breaks `Parent` cycles.
const MAX_TREE_DEPTH: usize = 64;

/// Write the pages of `range` from `source` to `path`.
fn write_chunk(
    source: &Document,
    pages: &BTreeMap<u32, ObjectId>,
    range: PageRange,
    path: &Path,
) -> Result<(), PdfChunkError> {
    let page_ids: Vec<ObjectId> = (range.start..=range.end)
        .filter_map(|page| pages.get(&(page as u32)).copied())
        .collect();

    let write_err = |detail: String| PdfChunkError::ChunkWriteFailed {
        path: path.to_path_buf(),
        start_page: range.start,
        end_page: range.end,
        detail,
    };

    let mut chunk = build_chunk_document(source, &page_ids).map_err(|e| write_err(e.to_string()))?;
    chunk
        .save(path)
        .map(|_| ())
        .map_err(|e| write_err(e.to_string()))
}

/// A new document whose only pages are `page_ids`, in that order.
///
/// Object ids are kept from `source`; the new `Pages` and `Catalog` nodes are
/// numbered above `source.max_id`.
fn build_chunk_document(source: &Document, page_ids: &[ObjectId]) -> lopdf::Result<Document> {
    let mut chunk = Document::with_version(source.version.clone());
    chunk.max_id = source.max_id;
    let pages_id = chunk.new_object_id();

    let keep: HashSet<ObjectId> = page_ids.iter().copied().collect();
    let mut copied: HashSet<ObjectId> = keep.clone();
    let mut pending: Vec<ObjectId> = Vec::new();

    for &page_id in page_ids {
        let mut page = Object::Dictionary(flatten_page(source, page_id)?);
        relink(source, &keep, &mut page, &mut pending);
        if let Object::Dictionary(ref mut dict) = page {
            dict.set("Parent", pages_id);
        }
        chunk.objects.insert(page_id, page);
    }

    while let Some(id) = pending.pop() {
        if !copied.insert(id) {
            continue;
        }
        let Ok(object) = source.get_object(id) else {
            continue;
        };
        let mut object = object.clone();
        relink(source, &keep, &mut object, &mut pending);
        chunk.objects.insert(id, object);
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    chunk.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = chunk.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    chunk.trailer.set("Root", catalog_id);

    Ok(chunk)
}

/// The page dictionary with inherited attributes filled in and no `Parent`.
fn flatten_page(source: &Document, page_id: ObjectId) -> lopdf::Result<Dictionary> {
    let mut page = source.get_dictionary(page_id)?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    page.remove(b"Parent");

    let mut depth = 0;
    while let Some(node_id) = parent {
        let Ok(node) = source.get_dictionary(node_id) else {
            break;
        };
        for key in INHERITABLE_PAGE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        depth += 1;
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(page)
}

/// Queue every object `object` refers to, except page-tree nodes outside the
/// chunk: references to those become `null`.
fn relink(
    source: &Document,
    keep: &HashSet<ObjectId>,
    object: &mut Object,
    pending: &mut Vec<ObjectId>,
) {
    if let Ok(id) = object.as_reference() {
        if keep.contains(&id) {
            return;
        }
        if is_page_tree_node(source, id) {
            *object = Object::Null;
        } else {
            pending.push(id);
        }
        return;
    }

    match object {
        Object::Array(items) => {
            for item in items.iter_mut() {
                relink(source, keep, item, pending);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                relink(source, keep, value, pending);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                relink(source, keep, value, pending);
            }
        }
        _ => {}
    }
}

fn is_page_tree_node(source: &Document, id: ObjectId) -> bool {
    source
        .get_dictionary(id)
        .and_then(|dict| dict.get(b"Type"))
        .and_then(Object::as_name)
        .is_ok_and(|name| name == b"Page" || name == b"Pages")
}

/// Extract document metadata without splitting.
pub async fn extract_metadata(pdf_path: &Path) -> Result<DocumentMetadata, PdfChunkError> {
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path))
        .await
        .map_err(|e| PdfChunkError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(pdf_path: &Path) -> Result<DocumentMetadata, PdfChunkError> {
    let document = load_document(pdf_path)?;

    let info = match document.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => document.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    let get_meta = |key: &[u8]| -> Option<String> {
        match info?.get(key).ok()? {
            Object::String(bytes, _) => {
                let v = decode_text_string(bytes);
                if v.trim().is_empty() {
                    None
                } else {
                    Some(v)
                }
            }
            _ => None,
        }
    };

    Ok(DocumentMetadata {
        title: get_meta(b"Title"),
        author: get_meta(b"Author"),
        creator: get_meta(b"Creator"),
        producer: get_meta(b"Producer"),
        page_count: document.get_pages().len(),
        pdf_version: document.version.clone(),
        is_encrypted: document.trailer.get(b"Encrypt").is_ok(),
    })
}

/// Decode a PDF text string: UTF-16BE when it carries a BOM, otherwise
/// PDFDocEncoding (treated as Latin-1).
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
