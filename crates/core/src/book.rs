//! The book entity: source bytes, catalogue metadata, reading position, and
//! the owned annotation set.
//!
//! A book value is cheap to clone (the source bytes and annotation backing
//! are shared), and annotation mutations go through copy-on-write methods
//! that return a new book value.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use marginalia_ai::BookMetadata;
use marginalia_engine::RgbaImage;
use serde::Serialize;

use crate::annotation::{Annotation, AnnotationId, AnnotationSet};
use crate::geometry::ReferenceSize;

pub type BookId = uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Book {
    pub id: BookId,
    pub metadata: BookMetadata,
    /// Original, unannotated document bytes; the export projector reads
    /// these, never a rendered surface.
    pub source: Arc<[u8]>,
    pub cover: Option<RgbaImage>,
    pub page_count: u32,
    /// 1-based reading position.
    pub current_page: u32,
    /// Page size in page units at zoom 1.0, captured at import.
    pub reference_size: ReferenceSize,
    pub file_size: u64,
    pub added_at: DateTime<Utc>,
    annotations: AnnotationSet,
}

impl Book {
    pub fn new(
        metadata: BookMetadata,
        source: Arc<[u8]>,
        page_count: u32,
        reference_size: ReferenceSize,
    ) -> Self {
        let file_size = source.len() as u64;
        Self {
            id: BookId::new_v4(),
            metadata,
            source,
            cover: None,
            page_count,
            current_page: 1,
            reference_size,
            file_size,
            added_at: Utc::now(),
            annotations: AnnotationSet::new(),
        }
    }

    pub fn with_cover(mut self, cover: RgbaImage) -> Self {
        self.cover = Some(cover);
        self
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    /// Replace the whole annotation set (e.g. loaded from a sidecar file).
    pub fn with_annotations(mut self, annotations: AnnotationSet) -> Self {
        self.annotations = annotations;
        self
    }

    /// New book value with the annotation appended.
    pub fn with_annotation(&self, annotation: Annotation) -> Self {
        let mut book = self.clone();
        book.annotations = self.annotations.append(annotation);
        book
    }

    /// New book value without the matching annotation; unknown ids are a
    /// no-op.
    pub fn without_annotation(&self, id: AnnotationId) -> Self {
        let mut book = self.clone();
        book.annotations = self.annotations.remove(id);
        book
    }

    /// New book value at the given page, clamped to the valid range.
    pub fn at_page(&self, page: u32) -> Self {
        let mut book = self.clone();
        book.current_page = page.clamp(1, self.page_count.max(1));
        book
    }

    /// Reading progress in [0, 1].
    pub fn progress(&self) -> f32 {
        self.current_page as f32 / self.page_count.max(1) as f32
    }

    /// Progress as a rounded percentage for display.
    pub fn progress_percent(&self) -> u32 {
        (self.progress() * 100.0).round() as u32
    }

    /// File name for the annotated export. Path separators in the title are
    /// replaced so the name cannot escape the output directory.
    pub fn export_file_name(&self) -> String {
        let name = self.metadata.name.replace(['/', '\\'], "-");
        format!("{name}_Annotated.pdf")
    }

    pub fn summary(&self) -> BookSummary {
        BookSummary {
            id: self.id,
            name: self.metadata.name.clone(),
            authors: self.metadata.authors.clone(),
            theme: self.metadata.theme.clone(),
            summary: self.metadata.summary.clone(),
            pages: self.page_count,
            size: format_file_size(self.file_size),
            progress_percent: self.progress_percent(),
            added_at: self.added_at,
        }
    }
}

/// Machine-readable book record without the source bytes.
#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
    pub id: BookId,
    pub name: String,
    pub authors: Vec<String>,
    pub theme: String,
    pub summary: String,
    pub pages: u32,
    pub size: String,
    pub progress_percent: u32,
    pub added_at: DateTime<Utc>,
}

/// Human-readable size with binary units, two decimals, trailing zeros
/// trimmed ("1 MB", "1.5 KB").
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_owned();
    }
    let exponent = (((bytes as f64).log2() / 10.0).floor() as usize).min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let mut text = format!("{value:.2}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    format!("{text} {}", UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PageRect;

    fn sample_book(pages: u32) -> Book {
        let bytes: Arc<[u8]> = vec![0u8; 64].into();
        Book::new(
            BookMetadata::unknown("Sample"),
            bytes,
            pages,
            ReferenceSize::new(612.0, 792.0),
        )
    }

    #[test]
    fn test_with_annotation_returns_a_new_snapshot() {
        let book = sample_book(3);
        let annotated = book.with_annotation(Annotation::highlight(
            1,
            PageRect::new(0.0, 0.0, 10.0, 10.0),
            "text",
        ));

        assert_eq!(book.annotations().len(), 0);
        assert_eq!(annotated.annotations().len(), 1);
        assert_eq!(annotated.id, book.id);
    }

    #[test]
    fn test_without_annotation_is_idempotent() {
        let annotation = Annotation::note(1, "note");
        let book = sample_book(3).with_annotation(annotation.clone());

        let removed = book.without_annotation(annotation.id);
        let removed_again = removed.without_annotation(annotation.id);

        assert_eq!(removed.annotations().len(), 0);
        assert_eq!(removed_again.annotations().len(), 0);
    }

    #[test]
    fn test_at_page_clamps_to_the_valid_range() {
        let book = sample_book(5);

        assert_eq!(book.at_page(0).current_page, 1);
        assert_eq!(book.at_page(3).current_page, 3);
        assert_eq!(book.at_page(99).current_page, 5);
    }

    #[test]
    fn test_progress_percent_rounds() {
        let book = sample_book(3);

        assert_eq!(book.at_page(1).progress_percent(), 33);
        assert_eq!(book.at_page(2).progress_percent(), 67);
        assert_eq!(book.at_page(3).progress_percent(), 100);
    }

    #[test]
    fn test_export_file_name_appends_suffix() {
        let mut book = sample_book(1);
        book.metadata.name = "Dune".to_owned();
        assert_eq!(book.export_file_name(), "Dune_Annotated.pdf");

        book.metadata.name = "a/b".to_owned();
        assert_eq!(book.export_file_name(), "a-b_Annotated.pdf");
    }

    #[test]
    fn test_format_file_size_uses_binary_units() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1_048_576), "1 MB");
        assert_eq!(format_file_size(1_073_741_824), "1 GB");
    }
}
