use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::catalog::{Book, BookCopy, Library};
use crate::domain::value_objects::{BookId, CopyCondition, CopyId, LibraryId, LibraryStatus};
use crate::ports::catalog_store::{CatalogError, CatalogStore, Result};

use super::Store;

/// CatalogStoreのインメモリ実装
#[async_trait]
impl CatalogStore for Store {
    async fn insert_library(&self, library: Library) -> Result<()> {
        self.libraries
            .lock()
            .unwrap()
            .insert(library.library_id, library);
        Ok(())
    }

    async fn get_library(&self, library_id: LibraryId) -> Result<Option<Library>> {
        Ok(self.libraries.lock().unwrap().get(&library_id).cloned())
    }

    async fn update_library_status(
        &self,
        library_id: LibraryId,
        status: LibraryStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut libraries = self.libraries.lock().unwrap();
        let library = libraries
            .get_mut(&library_id)
            .ok_or(CatalogError::LibraryNotFound)?;

        library.status = status;
        library.updated_at = at;

        Ok(())
    }

    async fn delete_library(&self, library_id: LibraryId) -> Result<()> {
        let removed = self.libraries.lock().unwrap().remove(&library_id);
        if removed.is_none() {
            return Err(CatalogError::LibraryNotFound);
        }

        // 配下の書誌と資料も削除する（参照ガードはアプリケーション層で確認済み）
        let mut books = self.books.lock().unwrap();
        let removed_books: Vec<BookId> = books
            .values()
            .filter(|b| b.library_id == library_id)
            .map(|b| b.book_id)
            .collect();
        for book_id in &removed_books {
            books.remove(book_id);
        }
        drop(books);

        self.copies
            .lock()
            .unwrap()
            .retain(|_, copy| !removed_books.contains(&copy.book_id));

        Ok(())
    }

    async fn insert_book(&self, book: Book) -> Result<()> {
        if !self.libraries.lock().unwrap().contains_key(&book.library_id) {
            return Err(CatalogError::LibraryNotFound);
        }

        self.books.lock().unwrap().insert(book.book_id, book);
        Ok(())
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.books.lock().unwrap().get(&book_id).cloned())
    }

    async fn insert_copy(&self, copy: BookCopy) -> Result<()> {
        if !self.books.lock().unwrap().contains_key(&copy.book_id) {
            return Err(CatalogError::BookNotFound);
        }

        let mut copies = self.copies.lock().unwrap();

        // 不変条件：通し番号は書誌内で一意
        let duplicate = copies
            .values()
            .any(|c| c.book_id == copy.book_id && c.copy_number == copy.copy_number);
        if duplicate {
            return Err(CatalogError::Conflict(format!(
                "copy number {} already exists for this book",
                copy.copy_number
            )));
        }

        copies.insert(copy.copy_id, copy);
        Ok(())
    }

    async fn get_copy(&self, copy_id: CopyId) -> Result<Option<BookCopy>> {
        Ok(self.copies.lock().unwrap().get(&copy_id).cloned())
    }

    async fn list_copies_of_book(&self, book_id: BookId) -> Result<Vec<BookCopy>> {
        let copies = self.copies.lock().unwrap();
        let mut result: Vec<BookCopy> = copies
            .values()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect();
        result.sort_by_key(|c| c.copy_number);
        Ok(result)
    }

    async fn update_copy_details(
        &self,
        copy_id: CopyId,
        condition: CopyCondition,
        location: String,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut copies = self.copies.lock().unwrap();
        let copy = copies.get_mut(&copy_id).ok_or(CatalogError::CopyNotFound)?;

        copy.condition = condition;
        copy.location = location;
        copy.updated_at = at;

        Ok(())
    }

    async fn library_of_copy(&self, copy_id: CopyId) -> Result<Option<Library>> {
        let Some(library_id) = self.library_id_of_copy(copy_id) else {
            return Ok(None);
        };
        Ok(self.libraries.lock().unwrap().get(&library_id).cloned())
    }
}
