//! Gallery state: the book list plus search and sort, and which book the
//! reader currently has open.

use tracing::debug;

use crate::book::{Book, BookId};

/// Sort order for the gallery shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Newest import first.
    #[default]
    DateAdded,
    /// Furthest read first.
    Progress,
    /// Largest file first.
    FileSize,
    /// Alphabetical, case-insensitive.
    Name,
}

#[derive(Debug, Default)]
pub struct Library {
    books: Vec<Book>,
    query: String,
    sort: SortKey,
    open_book: Option<BookId>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_book(&mut self, book: Book) {
        debug!(book = %book.metadata.name, "adding book to library");
        self.books.push(book);
    }

    /// Removing the open book also closes the reader.
    pub fn remove_book(&mut self, id: BookId) {
        self.books.retain(|book| book.id != id);
        if self.open_book == Some(id) {
            self.open_book = None;
        }
    }

    /// Replace the stored book with the same id; how annotation and
    /// navigation changes flow back from the reader.
    pub fn update_book(&mut self, book: Book) {
        if let Some(slot) = self.books.iter_mut().find(|candidate| candidate.id == book.id) {
            *slot = book;
        }
    }

    pub fn book(&self, id: BookId) -> Option<&Book> {
        self.books.iter().find(|book| book.id == id)
    }

    pub fn open(&mut self, id: BookId) -> bool {
        if self.books.iter().any(|book| book.id == id) {
            self.open_book = Some(id);
            true
        } else {
            false
        }
    }

    pub fn close(&mut self) {
        self.open_book = None;
    }

    pub fn open_book(&self) -> Option<&Book> {
        self.open_book.and_then(|id| self.book(id))
    }

    /// Record a navigation in the stored book, clamped to its page range.
    pub fn navigate(&mut self, id: BookId, page: u32) {
        if let Some(book) = self.book(id) {
            let moved = book.at_page(page);
            self.update_book(moved);
        }
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    /// Shelf contents: books matching the query, in the current sort order.
    pub fn visible_books(&self) -> Vec<&Book> {
        let needle = self.query.to_lowercase();
        let mut books: Vec<&Book> = self
            .books
            .iter()
            .filter(|book| needle.is_empty() || matches_query(book, &needle))
            .collect();
        match self.sort {
            SortKey::DateAdded => books.sort_by(|a, b| b.added_at.cmp(&a.added_at)),
            SortKey::Progress => {
                books.sort_by(|a, b| b.progress().total_cmp(&a.progress()))
            }
            SortKey::FileSize => books.sort_by(|a, b| b.file_size.cmp(&a.file_size)),
            SortKey::Name => books.sort_by(|a, b| {
                a.metadata.name.to_lowercase().cmp(&b.metadata.name.to_lowercase())
            }),
        }
        books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// Case-insensitive substring match on name, any author, or theme. The
/// needle is already lowercased.
fn matches_query(book: &Book, needle: &str) -> bool {
    book.metadata.name.to_lowercase().contains(needle)
        || book
            .metadata
            .authors
            .iter()
            .any(|author| author.to_lowercase().contains(needle))
        || book.metadata.theme.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ReferenceSize;
    use chrono::{Duration, Utc};
    use marginalia_ai::BookMetadata;
    use std::sync::Arc;

    fn book_named(name: &str, author: &str, theme: &str) -> Book {
        let bytes: Arc<[u8]> = vec![0u8; 16].into();
        let metadata = BookMetadata {
            name: name.to_owned(),
            authors: vec![author.to_owned()],
            theme: theme.to_owned(),
            summary: String::new(),
        };
        Book::new(metadata, bytes, 10, ReferenceSize::new(612.0, 792.0))
    }

    #[test]
    fn test_search_matches_name_author_and_theme() {
        let mut library = Library::new();
        library.add_book(book_named("The Dispossessed", "Le Guin", "Science Fiction"));
        library.add_book(book_named("Walden", "Thoreau", "Nature"));

        library.set_query("LE GUIN");
        assert_eq!(library.visible_books().len(), 1);

        library.set_query("fiction");
        assert_eq!(library.visible_books().len(), 1);

        library.set_query("walden");
        assert_eq!(library.visible_books().len(), 1);

        library.set_query("zzz");
        assert!(library.visible_books().is_empty());

        library.set_query("");
        assert_eq!(library.visible_books().len(), 2);
    }

    #[test]
    fn test_default_sort_puts_newest_first() {
        let mut library = Library::new();
        let mut older = book_named("Older", "A", "t");
        older.added_at = Utc::now() - Duration::hours(2);
        let newer = book_named("Newer", "B", "t");
        library.add_book(older);
        library.add_book(newer);

        let shelf = library.visible_books();
        assert_eq!(shelf[0].metadata.name, "Newer");
        assert_eq!(shelf[1].metadata.name, "Older");
    }

    #[test]
    fn test_sort_by_name_is_case_insensitive_ascending() {
        let mut library = Library::new();
        library.add_book(book_named("beta", "A", "t"));
        library.add_book(book_named("Alpha", "B", "t"));

        library.set_sort(SortKey::Name);
        let shelf = library.visible_books();
        assert_eq!(shelf[0].metadata.name, "Alpha");
        assert_eq!(shelf[1].metadata.name, "beta");
    }

    #[test]
    fn test_sort_by_progress_is_descending() {
        let mut library = Library::new();
        let behind = book_named("Behind", "A", "t").at_page(2);
        let ahead = book_named("Ahead", "B", "t").at_page(9);
        library.add_book(behind);
        library.add_book(ahead);

        library.set_sort(SortKey::Progress);
        let shelf = library.visible_books();
        assert_eq!(shelf[0].metadata.name, "Ahead");
    }

    #[test]
    fn test_sort_by_file_size_is_descending() {
        let mut library = Library::new();
        let mut small = book_named("Small", "A", "t");
        small.file_size = 100;
        let mut large = book_named("Large", "B", "t");
        large.file_size = 10_000;
        library.add_book(small);
        library.add_book(large);

        library.set_sort(SortKey::FileSize);
        assert_eq!(library.visible_books()[0].metadata.name, "Large");
    }

    #[test]
    fn test_removing_the_open_book_closes_the_reader() {
        let mut library = Library::new();
        let book = book_named("Open Me", "A", "t");
        let id = book.id;
        library.add_book(book);

        assert!(library.open(id));
        assert!(library.open_book().is_some());

        library.remove_book(id);
        assert!(library.open_book().is_none());
        assert!(library.is_empty());
    }

    #[test]
    fn test_navigate_updates_and_clamps_the_stored_page() {
        let mut library = Library::new();
        let book = book_named("Pages", "A", "t");
        let id = book.id;
        library.add_book(book);

        library.navigate(id, 7);
        assert_eq!(library.book(id).map(|b| b.current_page), Some(7));

        library.navigate(id, 99);
        assert_eq!(library.book(id).map(|b| b.current_page), Some(10));
    }

    #[test]
    fn test_opening_an_unknown_book_fails() {
        let mut library = Library::new();
        assert!(!library.open(BookId::new_v4()));
        assert!(library.open_book().is_none());
    }
}
