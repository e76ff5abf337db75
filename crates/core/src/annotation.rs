//! Annotation records and the copy-on-write annotation store.
//!
//! An annotation is immutable once created; the store never mutates in
//! place. Every append or removal produces a fresh [`AnnotationSet`] value,
//! so a render pass holding a snapshot always observes a consistent list.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{PagePoint, PageRect};

/// Stable unique identifier, generated as UUID v4.
pub type AnnotationId = uuid::Uuid;

/// Default display color per tool, as a CSS-style hex string.
pub const HIGHLIGHT_COLOR: &str = "#fef08a";
pub const DRAW_COLOR: &str = "#ef4444";
pub const NOTE_COLOR: &str = "#dcfce7";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Note,
    Draw,
}

/// One mark on one page.
///
/// Geometry invariant: a highlight carries a rect, a draw carries a path of
/// at least two points, and a note carries at most a rect (free-form notes
/// have no on-page geometry). All geometry is in page units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub kind: AnnotationKind,
    /// 1-based page number this annotation targets.
    pub page: u32,
    pub color: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<PageRect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PagePoint>>,
}

impl Annotation {
    /// Highlight over a text selection; carries the selected text.
    pub fn highlight(page: u32, rect: PageRect, text: impl Into<String>) -> Self {
        Self {
            id: AnnotationId::new_v4(),
            kind: AnnotationKind::Highlight,
            page,
            color: HIGHLIGHT_COLOR.to_owned(),
            created_at: Utc::now(),
            text: Some(text.into()),
            rect: Some(rect),
            path: None,
        }
    }

    /// Free-form note; lives in the sidebar only, no on-page geometry.
    pub fn note(page: u32, text: impl Into<String>) -> Self {
        Self {
            id: AnnotationId::new_v4(),
            kind: AnnotationKind::Note,
            page,
            color: NOTE_COLOR.to_owned(),
            created_at: Utc::now(),
            text: Some(text.into()),
            rect: None,
            path: None,
        }
    }

    /// Note anchored to a text selection; keeps the selection rectangle so
    /// the reader can mark the passage it refers to.
    pub fn anchored_note(page: u32, rect: PageRect, text: impl Into<String>) -> Self {
        Self {
            rect: Some(rect),
            ..Self::note(page, text)
        }
    }

    /// Freehand stroke; the path is kept in capture order.
    pub fn draw(page: u32, path: Vec<PagePoint>) -> Self {
        Self {
            id: AnnotationId::new_v4(),
            kind: AnnotationKind::Draw,
            page,
            color: DRAW_COLOR.to_owned(),
            created_at: Utc::now(),
            text: None,
            rect: None,
            path: Some(path),
        }
    }

    /// Check the geometry invariant. Records loaded from sidecar files go
    /// through this before entering a store.
    pub fn geometry_is_valid(&self) -> bool {
        match self.kind {
            AnnotationKind::Highlight => self.rect.is_some() && self.path.is_none(),
            AnnotationKind::Note => self.path.is_none(),
            AnnotationKind::Draw => {
                self.rect.is_none() && self.path.as_ref().is_some_and(|path| path.len() >= 2)
            }
        }
    }
}

/// Ordered annotation collection with copy-on-write snapshots.
///
/// Cloning a set shares the backing storage; `append` and `remove` build a
/// new backing list and leave every existing clone untouched.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    entries: Arc<[Annotation]>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Annotation>) -> Self {
        Self { entries: records.into() }
    }

    /// New snapshot with `annotation` appended at the end.
    pub fn append(&self, annotation: Annotation) -> Self {
        let mut entries = self.entries.to_vec();
        entries.push(annotation);
        Self { entries: entries.into() }
    }

    /// New snapshot without the matching annotation. Removing an unknown id
    /// is a no-op that returns an equivalent snapshot.
    pub fn remove(&self, id: AnnotationId) -> Self {
        if !self.entries.iter().any(|entry| entry.id == id) {
            return self.clone();
        }
        let entries: Vec<Annotation> = self
            .entries
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        Self { entries: entries.into() }
    }

    /// Annotations targeting `page`, in insertion order. Restartable: each
    /// call walks the same snapshot from the beginning.
    pub fn by_page(&self, page: u32) -> impl Iterator<Item = &Annotation> + '_ {
        self.entries.iter().filter(move |entry| entry.page == page)
    }

    /// Insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.entries.iter()
    }

    /// Sidebar order: most recently added first.
    pub fn newest_first(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.entries.iter().rev()
    }

    pub fn records(&self) -> &[Annotation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
