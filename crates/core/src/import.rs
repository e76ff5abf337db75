//! Book import pipeline.
//!
//! Importing a file means: read the bytes, open them through the PDF
//! capability, measure the reference page size, render a few opening pages
//! for the metadata request, ask the AI collaborator for a catalogue
//! record, and synthesize a cover. The document handle is closed before the
//! pipeline returns; the [`Book`] keeps its own copy of the source bytes.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use marginalia_ai::{AiCollaborator, AiError, BookMetadata};
use marginalia_engine::{
    CancellationToken, DocumentHandle, EngineError, OpenSource, PdfEngine, RenderRequest,
};
use tracing::{debug, info, warn};

use crate::book::Book;
use crate::cover::synthesize_cover;
use crate::geometry::ReferenceSize;

/// How many opening pages are rendered and sent with the metadata request.
const PREVIEW_PAGE_LIMIT: u32 = 3;
/// Preview render zoom. Higher than 1.0 so small type stays legible to the
/// vision model.
const PREVIEW_SCALE: f32 = 1.5;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("preview page could not be encoded: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Ai(#[from] AiError),
}

/// Import a single file from disk. The file stem becomes the title if the
/// collaborator is not configured.
pub fn import_file(
    engine: &mut dyn PdfEngine,
    ai: &dyn AiCollaborator,
    path: &Path,
) -> Result<Book, ImportError> {
    let bytes = fs::read(path)
        .map_err(|source| ImportError::Read { path: path.to_path_buf(), source })?;
    let name_hint =
        path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("Untitled").to_owned();
    import_bytes(engine, ai, &name_hint, bytes)
}

/// Import a document already in memory.
pub fn import_bytes(
    engine: &mut dyn PdfEngine,
    ai: &dyn AiCollaborator,
    name_hint: &str,
    bytes: Vec<u8>,
) -> Result<Book, ImportError> {
    let source: Arc<[u8]> = bytes.into();
    let handle = engine.open(OpenSource::Bytes(source.to_vec()))?;
    let book = assemble_book(&*engine, ai, name_hint, Arc::clone(&source), handle);
    if let Err(error) = engine.close(handle) {
        debug!(%error, "document handle was already gone at close");
    }
    book
}

/// Import a batch of files, skipping any that fail. One bad file must not
/// abort the rest of the queue.
pub fn import_queue(
    engine: &mut dyn PdfEngine,
    ai: &dyn AiCollaborator,
    paths: &[PathBuf],
) -> Vec<Book> {
    let mut books = Vec::with_capacity(paths.len());
    for path in paths {
        match import_file(engine, ai, path) {
            Ok(book) => books.push(book),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping file that failed to import");
            }
        }
    }
    books
}

fn assemble_book(
    engine: &dyn PdfEngine,
    ai: &dyn AiCollaborator,
    name_hint: &str,
    source: Arc<[u8]>,
    handle: DocumentHandle,
) -> Result<Book, ImportError> {
    let page_count = engine.page_count(handle)?;
    let reference_size = ReferenceSize::from(engine.page_size(handle, 0)?);

    let previews = preview_images(engine, handle, page_count)?;
    let metadata = match ai.extract_metadata(&previews) {
        Ok(metadata) => metadata,
        Err(AiError::NotConfigured) => {
            debug!("no AI collaborator configured, using placeholder metadata");
            BookMetadata::unknown(name_hint)
        }
        Err(error) => return Err(error.into()),
    };

    let cover = synthesize_cover(&metadata.name);
    info!(name = %metadata.name, pages = page_count, "imported book");
    Ok(Book::new(metadata, source, page_count, reference_size).with_cover(cover))
}

/// PNG-encode up to the first [`PREVIEW_PAGE_LIMIT`] pages. Imports run
/// under no render slot, so the token is never cancelled.
fn preview_images(
    engine: &dyn PdfEngine,
    handle: DocumentHandle,
    page_count: u32,
) -> Result<Vec<Vec<u8>>, ImportError> {
    let cancel = CancellationToken::new();
    let mut pages = Vec::new();
    for page_index in 0..page_count.min(PREVIEW_PAGE_LIMIT) {
        let request = RenderRequest { page_index, scale: PREVIEW_SCALE };
        let Some(image) = engine.render_page(handle, request, &cancel)? else { continue };

        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image).write_to(&mut png, ImageFormat::Png)?;
        pages.push(png.into_inner());
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marginalia_ai::{Research, StaticOracle, Unconfigured};
    use marginalia_engine::{test_pdf, LopdfEngine};

    struct FailingOracle;

    impl AiCollaborator for FailingOracle {
        fn extract_metadata(&self, _pages: &[Vec<u8>]) -> Result<BookMetadata, AiError> {
            Err(AiError::Service { status: 500, message: "boom".to_owned() })
        }

        fn research(&self, _query: &str) -> Result<Research, AiError> {
            Err(AiError::NotConfigured)
        }

        fn edit_cover(&self, _cover_png: &[u8], _prompt: &str) -> Result<Option<Vec<u8>>, AiError> {
            Ok(None)
        }
    }

    fn oracle() -> StaticOracle {
        StaticOracle::new(BookMetadata {
            name: "The Dune Primer".to_owned(),
            authors: vec!["F. Herbert".to_owned()],
            theme: "Ecology".to_owned(),
            summary: "Sand, and what grows in spite of it.".to_owned(),
        })
    }

    #[test]
    fn test_import_builds_a_book_from_bytes() {
        let mut engine = LopdfEngine::new();
        let book =
            import_bytes(&mut engine, &oracle(), "dune", test_pdf::pdf_with_pages(4, 300, 400))
                .expect("import succeeds");

        assert_eq!(book.metadata.name, "The Dune Primer");
        assert_eq!(book.page_count, 4);
        assert_eq!(book.current_page, 1);
        assert_eq!(book.reference_size.width, 300.0);
        assert_eq!(book.reference_size.height, 400.0);
        assert!(book.cover.is_some());
        assert!(book.file_size > 0);
        assert!(book.annotations().is_empty());
    }

    #[test]
    fn test_unconfigured_collaborator_falls_back_to_placeholder_metadata() {
        let mut engine = LopdfEngine::new();
        let book =
            import_bytes(&mut engine, &Unconfigured, "my-notes", test_pdf::single_page_pdf())
                .expect("import does not require the AI service");

        assert_eq!(book.metadata.name, "my-notes");
        assert_eq!(book.metadata.authors, vec!["Unknown".to_owned()]);
    }

    #[test]
    fn test_service_failure_is_reported_not_swallowed() {
        let mut engine = LopdfEngine::new();
        let err = import_bytes(&mut engine, &FailingOracle, "x", test_pdf::single_page_pdf())
            .expect_err("a live collaborator that errors should fail the import");

        assert!(matches!(err, ImportError::Ai(AiError::Service { status: 500, .. })));
    }

    #[test]
    fn test_import_queue_skips_files_that_fail() {
        let dir = tempfile::tempdir().expect("temp dir");
        let good = dir.path().join("good.pdf");
        let bad = dir.path().join("bad.pdf");
        std::fs::write(&good, test_pdf::single_page_pdf()).expect("write fixture");
        std::fs::write(&bad, b"not a pdf").expect("write fixture");

        let mut engine = LopdfEngine::new();
        let books = import_queue(
            &mut engine,
            &Unconfigured,
            &[bad, good, dir.path().join("missing.pdf")],
        );

        assert_eq!(books.len(), 1);
        assert_eq!(books[0].metadata.name, "good");
    }

    #[test]
    fn test_import_file_reports_the_unreadable_path() {
        let mut engine = LopdfEngine::new();
        let err = import_file(&mut engine, &Unconfigured, Path::new("/definitely/missing.pdf"))
            .expect_err("missing file cannot import");

        match err {
            ImportError::Read { path, .. } => {
                assert_eq!(path, Path::new("/definitely/missing.pdf"))
            }
            other => panic!("expected a read error, got {other:?}"),
        }
    }
}
