//! PDF capability for the library and reader.
//!
//! The rest of the workspace treats PDF decoding as a capability: given a
//! page index and a scale factor, produce a raster surface of known pixel
//! dimensions plus a positioned text layer. [`PdfEngine`] is that seam;
//! [`LopdfEngine`] is the default backend, which parses documents with
//! `lopdf`, reports real page geometry, extracts positioned text spans from
//! content streams, and paints a placeholder raster (it does not run a full
//! PDF interpreter).

use image::{ImageBuffer, Rgba};
use lopdf::{Document, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

mod text;

pub use marginalia_scheduler::CancellationToken;
pub use text::TextSpan;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Opaque handle to an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Page dimensions in PDF points. At zoom 1.0 this is also the page's size
/// in page units, which makes it the reference size annotations project
/// against at export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// A single page render: which page (0-based) at which zoom factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("malformed document: {0}")]
    Malformed(String),
}

/// The capability the reader and the import pipeline consume.
///
/// `render_page` is cooperative: workers pass the token of the render slot
/// they run under, and the backend checks it between stages. A cancelled
/// render yields `Ok(None)`: no output, not an error.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, EngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, EngineError>;
    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, EngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<RgbaImage>, EngineError>;
    /// Positioned text runs for the page, in page units (top-left origin,
    /// values at scale 1.0). The reader multiplies by the current scale to
    /// place the selectable text layer.
    fn text_spans(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextSpan>, EngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), EngineError>;
}

struct DocumentRecord {
    doc: Document,
    page_ids: Vec<ObjectId>,
    page_sizes: Vec<PageSize>,
}

#[derive(Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(bytes: &[u8]) -> Result<DocumentRecord, EngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(EngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut page_ids = Vec::with_capacity(pages.len());
        let mut page_sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
                })
                // US Letter when the page carries no MediaBox of its own.
                .unwrap_or(PageSize { width_pt: 612.0, height_pt: 792.0 });

            page_ids.push(object_id);
            page_sizes.push(size);
        }

        if page_ids.is_empty() {
            return Err(EngineError::Malformed("document has no pages".to_owned()));
        }

        Ok(DocumentRecord { doc, page_ids, page_sizes })
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, EngineError> {
        self.docs.get(&handle).ok_or(EngineError::InvalidHandle(handle.raw()))
    }

    fn page_id(&self, handle: DocumentHandle, page_index: u32) -> Result<ObjectId, EngineError> {
        let record = self.record(handle)?;
        record.page_ids.get(page_index as usize).copied().ok_or(EngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_ids.len() as u32,
        })
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, EngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let record = Self::parse(&bytes)?;
        tracing::debug!(pages = record.page_ids.len(), "opened document");

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, record);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, EngineError> {
        Ok(self.record(handle)?.page_ids.len() as u32)
    }

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, EngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(EngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<RgbaImage>, EngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        if cancel.is_cancelled() {
            return Ok(None);
        }

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        if cancel.is_cancelled() {
            return Ok(None);
        }

        // Ink placeholders: each text run becomes a light grey block at its
        // laid-out position, so highlights composited over "text" land where
        // the text actually is.
        for span in self.text_spans(handle, request.page_index)? {
            let x0 = (span.x * scale).round().max(0.0) as u32;
            let y0 = (span.y * scale).round().max(0.0) as u32;
            let x1 = ((span.x + span.width) * scale).round().max(0.0) as u32;
            let y1 = ((span.y + span.height) * scale).round().max(0.0) as u32;

            for y in y0..y1.min(height) {
                for x in x0..x1.min(width) {
                    image.put_pixel(x, y, Rgba([120, 120, 120, 255]));
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(None);
        }

        Ok(Some(image))
    }

    fn text_spans(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextSpan>, EngineError> {
        let page_id = self.page_id(handle, page_index)?;
        let record = self.record(handle)?;
        let page_height = record.page_sizes[page_index as usize].height_pt;

        let content = record.doc.get_page_content(page_id)?;
        Ok(text::spans_from_content(&content, page_height))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), EngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(EngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(any(test, feature = "test-fixtures"))]
pub mod test_pdf {
    //! Programmatic PDF fixtures shared by engine tests and downstream
    //! crates' tests (behind the `test-fixtures` feature). Built with lopdf
    //! so no binary fixtures are checked in.

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// A document with `page_count` pages of the given size, each carrying
    /// one line of Helvetica text near the top.
    pub fn pdf_with_pages(page_count: usize, width: i64, height: i64) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), (height - 72).into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("Fixture page {}", index + 1))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let encoded = content.encode().expect("fixture content encodes");
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "Resources" => resources_id,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture document saves");
        bytes
    }

    /// One US-Letter-ish page, the common case.
    pub fn single_page_pdf() -> Vec<u8> {
        pdf_with_pages(1, 612, 792)
    }
}
