use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::domain::catalog::{Book, BookCopy, Library};
use crate::domain::policy::LendingPolicy;
use crate::domain::value_objects::{BookId, CopyCondition, CopyId, LibraryId, LibraryStatus};
use crate::ports::catalog_store::{CatalogError, CatalogStore as CatalogStoreTrait, Result};

use super::availability_ledger;

fn storage_error(e: sqlx::Error) -> CatalogError {
    CatalogError::Storage(Box::new(e))
}

fn invalid_data(msg: impl Into<String>) -> CatalogError {
    CatalogError::Storage(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        msg.into(),
    )))
}

/// PostgreSQLの行データをLibraryに変換する
fn map_row_to_library(row: &PgRow) -> Result<Library> {
    let policy = LendingPolicy::new(
        row.get::<i32, _>("max_borrow_limit") as u32,
        row.get("borrow_duration_days"),
        row.get("fine_per_day"),
        row.get("reservation_hold_days"),
    )
    .map_err(|e| invalid_data(format!("invalid persisted policy: {}", e)))?;

    let status: &str = row.get("status");

    Ok(Library {
        library_id: LibraryId::from_uuid(row.get("library_id")),
        name: row.get("name"),
        policy,
        status: status.parse().map_err(invalid_data)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// PostgreSQLの行データをBookCopyに変換する
fn map_row_to_copy(row: &PgRow) -> Result<BookCopy> {
    let condition: &str = row.get("condition");
    let status: &str = row.get("status");

    let (status, holder) = {
        let parsed_status = status.parse().map_err(invalid_data)?;
        let holder = availability_ledger::holder_from_columns(
            row.get::<Option<String>, _>("holder_kind").as_deref(),
            row.get("holder_id"),
            row.get("holder_user_id"),
        )
        .map_err(invalid_data)?;
        (parsed_status, holder)
    };

    Ok(BookCopy {
        copy_id: CopyId::from_uuid(row.get("copy_id")),
        book_id: BookId::from_uuid(row.get("book_id")),
        copy_number: row.get::<i32, _>("copy_number") as u32,
        condition: condition.parse().map_err(invalid_data)?,
        location: row.get("location"),
        status,
        holder,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// CatalogStoreのPostgreSQL実装
pub struct CatalogStore {
    pool: PgPool,
}

impl CatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStoreTrait for CatalogStore {
    async fn insert_library(&self, library: Library) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO libraries (
                library_id,
                name,
                max_borrow_limit,
                borrow_duration_days,
                fine_per_day,
                reservation_hold_days,
                status,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(library.library_id.value())
        .bind(&library.name)
        .bind(library.policy.max_borrow_limit() as i32)
        .bind(library.policy.borrow_duration_days())
        .bind(library.policy.fine_per_day())
        .bind(library.policy.reservation_hold_days())
        .bind(library.status.as_str())
        .bind(library.created_at)
        .bind(library.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn get_library(&self, library_id: LibraryId) -> Result<Option<Library>> {
        let row = sqlx::query(
            r#"
            SELECT library_id, name, max_borrow_limit, borrow_duration_days,
                   fine_per_day, reservation_hold_days, status, created_at, updated_at
            FROM libraries
            WHERE library_id = $1
            "#,
        )
        .bind(library_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.as_ref().map(map_row_to_library).transpose()
    }

    async fn update_library_status(
        &self,
        library_id: LibraryId,
        status: LibraryStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE libraries
            SET status = $2, updated_at = $3
            WHERE library_id = $1
            "#,
        )
        .bind(library_id.value())
        .bind(status.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::LibraryNotFound);
        }

        Ok(())
    }

    async fn delete_library(&self, library_id: LibraryId) -> Result<()> {
        // 書誌と資料はON DELETE CASCADEで一緒に消える
        let result = sqlx::query("DELETE FROM libraries WHERE library_id = $1")
            .bind(library_id.value())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::LibraryNotFound);
        }

        Ok(())
    }

    async fn insert_book(&self, book: Book) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO books (
                book_id, library_id, title, author, isbn, category, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(book.book_id.value())
        .bind(book.library_id.value())
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.category)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_foreign_key_violation() {
                        return Err(CatalogError::LibraryNotFound);
                    }
                }
                Err(storage_error(e))
            }
        }
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT book_id, library_id, title, author, isbn, category, created_at, updated_at
            FROM books
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(|row| Book {
            book_id: BookId::from_uuid(row.get("book_id")),
            library_id: LibraryId::from_uuid(row.get("library_id")),
            title: row.get("title"),
            author: row.get("author"),
            isbn: row.get("isbn"),
            category: row.get("category"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn insert_copy(&self, copy: BookCopy) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO book_copies (
                copy_id, book_id, copy_number, condition, location,
                status, holder_kind, holder_id, holder_user_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NULL, NULL, NULL, $7, $8)
            "#,
        )
        .bind(copy.copy_id.value())
        .bind(copy.book_id.value())
        .bind(copy.copy_number as i32)
        .bind(copy.condition.as_str())
        .bind(&copy.location)
        .bind(copy.status.as_str())
        .bind(copy.created_at)
        .bind(copy.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Some(db_err) = e.as_database_error() {
                    // 不変条件：通し番号は書誌内で一意（uq_book_copy_number）
                    if db_err.is_unique_violation() {
                        return Err(CatalogError::Conflict(format!(
                            "copy number {} already exists for this book",
                            copy.copy_number
                        )));
                    }
                    if db_err.is_foreign_key_violation() {
                        return Err(CatalogError::BookNotFound);
                    }
                }
                Err(storage_error(e))
            }
        }
    }

    async fn get_copy(&self, copy_id: CopyId) -> Result<Option<BookCopy>> {
        let row = sqlx::query(
            r#"
            SELECT copy_id, book_id, copy_number, condition, location,
                   status, holder_kind, holder_id, holder_user_id, created_at, updated_at
            FROM book_copies
            WHERE copy_id = $1
            "#,
        )
        .bind(copy_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.as_ref().map(map_row_to_copy).transpose()
    }

    async fn list_copies_of_book(&self, book_id: BookId) -> Result<Vec<BookCopy>> {
        let rows = sqlx::query(
            r#"
            SELECT copy_id, book_id, copy_number, condition, location,
                   status, holder_kind, holder_id, holder_user_id, created_at, updated_at
            FROM book_copies
            WHERE book_id = $1
            ORDER BY copy_number ASC
            "#,
        )
        .bind(book_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter().map(map_row_to_copy).collect()
    }

    async fn update_copy_details(
        &self,
        copy_id: CopyId,
        condition: CopyCondition,
        location: String,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE book_copies
            SET condition = $2, location = $3, updated_at = $4
            WHERE copy_id = $1
            "#,
        )
        .bind(copy_id.value())
        .bind(condition.as_str())
        .bind(&location)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::CopyNotFound);
        }

        Ok(())
    }

    async fn library_of_copy(&self, copy_id: CopyId) -> Result<Option<Library>> {
        let row = sqlx::query(
            r#"
            SELECT l.library_id, l.name, l.max_borrow_limit, l.borrow_duration_days,
                   l.fine_per_day, l.reservation_hold_days, l.status, l.created_at, l.updated_at
            FROM book_copies c
            JOIN books b ON b.book_id = c.book_id
            JOIN libraries l ON l.library_id = b.library_id
            WHERE c.copy_id = $1
            "#,
        )
        .bind(copy_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.as_ref().map(map_row_to_library).transpose()
    }
}
