//! Library Core
//!
//! Catalogue and annotation model for the ebook library: books and their
//! metadata, the immutable annotation store, the page-unit coordinate
//! system, and the import and export pipelines that sit on either side of
//! the reading session.

pub mod annotation;
pub mod book;
pub mod cover;
pub mod export;
pub mod geometry;
pub mod import;
pub mod library;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationSet, DRAW_COLOR, HIGHLIGHT_COLOR,
    NOTE_COLOR,
};
pub use book::{format_file_size, Book, BookId, BookSummary};
pub use cover::synthesize_cover;
pub use export::{export_annotated, ExportError, SUMMARY_TITLE};
pub use geometry::{
    PagePoint, PageRect, PdfPoint, PdfProjection, PdfRect, ReferenceSize, ScreenPoint, ScreenRect,
};
pub use import::{import_bytes, import_file, import_queue, ImportError};
pub use library::{Library, SortKey};
