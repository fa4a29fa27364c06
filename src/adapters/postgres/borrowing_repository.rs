use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use crate::domain::borrowing::Borrowing;
use crate::domain::value_objects::{
    BorrowerId, BorrowerType, BorrowingId, BorrowingStatus, CopyId, LibraryId,
};
use crate::ports::borrowing_repository::{BorrowingRepository as BorrowingRepositoryTrait, Result};

/// PostgreSQLの行データをBorrowingに変換する
fn map_row_to_borrowing(row: &PgRow) -> Result<Borrowing> {
    let status_str: &str = row.get("status");
    let status = BorrowingStatus::from_str(status_str).map_err(|e| {
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            as Box<dyn std::error::Error + Send + Sync>
    })?;

    let borrower_type_str: &str = row.get("borrower_type");
    let borrower_type = BorrowerType::from_str(borrower_type_str).map_err(|e| {
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            as Box<dyn std::error::Error + Send + Sync>
    })?;

    Ok(Borrowing {
        borrowing_id: BorrowingId::from_uuid(row.get("borrowing_id")),
        copy_id: CopyId::from_uuid(row.get("copy_id")),
        borrower_id: BorrowerId::from_uuid(row.get("borrower_id")),
        borrower_type,
        borrowed_at: row.get("borrowed_at"),
        due_date: row.get("due_date"),
        returned_at: row.get("returned_at"),
        status,
        fine_amount: row.get("fine_amount"),
        fine_paid: row.get("fine_paid"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// BorrowingRepositoryのPostgreSQL実装
pub struct BorrowingRepository {
    pool: PgPool,
}

impl BorrowingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowingRepositoryTrait for BorrowingRepository {
    /// 貸出を保存する（upsert）
    ///
    /// INSERT ... ON CONFLICT UPDATEで冪等性を保証する。
    async fn save(&self, borrowing: Borrowing) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO borrowings (
                borrowing_id,
                copy_id,
                borrower_id,
                borrower_type,
                borrowed_at,
                due_date,
                returned_at,
                status,
                fine_amount,
                fine_paid,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (borrowing_id)
            DO UPDATE SET
                returned_at = EXCLUDED.returned_at,
                status = EXCLUDED.status,
                fine_amount = EXCLUDED.fine_amount,
                fine_paid = EXCLUDED.fine_paid,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(borrowing.borrowing_id.value())
        .bind(borrowing.copy_id.value())
        .bind(borrowing.borrower_id.value())
        .bind(borrowing.borrower_type.as_str())
        .bind(borrowing.borrowed_at)
        .bind(borrowing.due_date)
        .bind(borrowing.returned_at)
        .bind(borrowing.status.as_str())
        .bind(borrowing.fine_amount)
        .bind(borrowing.fine_paid)
        .bind(borrowing.created_at)
        .bind(borrowing.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, borrowing_id: BorrowingId) -> Result<Option<Borrowing>> {
        let row = sqlx::query(
            r#"
            SELECT borrowing_id, copy_id, borrower_id, borrower_type, borrowed_at,
                   due_date, returned_at, status, fine_amount, fine_paid, created_at, updated_at
            FROM borrowings
            WHERE borrowing_id = $1
            "#,
        )
        .bind(borrowing_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_borrowing).transpose()
    }

    async fn find_open_by_copy(&self, copy_id: CopyId) -> Result<Option<Borrowing>> {
        let row = sqlx::query(
            r#"
            SELECT borrowing_id, copy_id, borrower_id, borrower_type, borrowed_at,
                   due_date, returned_at, status, fine_amount, fine_paid, created_at, updated_at
            FROM borrowings
            WHERE copy_id = $1 AND status IN ('borrowed', 'overdue')
            LIMIT 1
            "#,
        )
        .bind(copy_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_borrowing).transpose()
    }

    /// 利用者が指定図書館で借りている冊数（貸出上限の確認用）
    async fn count_open_for_borrower(
        &self,
        borrower_id: BorrowerId,
        library_id: LibraryId,
    ) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM borrowings b
            JOIN book_copies c ON c.copy_id = b.copy_id
            JOIN books bk ON bk.book_id = c.book_id
            WHERE b.borrower_id = $1
              AND bk.library_id = $2
              AND b.status IN ('borrowed', 'overdue')
            "#,
        )
        .bind(borrower_id.value())
        .bind(library_id.value())
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u32)
    }

    async fn find_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Borrowing>> {
        let rows = sqlx::query(
            r#"
            SELECT borrowing_id, copy_id, borrower_id, borrower_type, borrowed_at,
                   due_date, returned_at, status, fine_amount, fine_paid, created_at, updated_at
            FROM borrowings
            WHERE borrower_id = $1
            ORDER BY borrowed_at DESC
            "#,
        )
        .bind(borrower_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_borrowing).collect()
    }

    async fn exists_open_for_library(&self, library_id: LibraryId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM borrowings b
                JOIN book_copies c ON c.copy_id = b.copy_id
                JOIN books bk ON bk.book_id = c.book_id
                WHERE bk.library_id = $1 AND b.status IN ('borrowed', 'overdue')
            )
            "#,
        )
        .bind(library_id.value())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// 延滞候補をストリーム配信する（延滞検知バッチ用）
    fn stream_overdue_candidates(
        &self,
        cutoff: DateTime<Utc>,
    ) -> BoxStream<'_, Result<Borrowing>> {
        let stream = sqlx::query(
            r#"
            SELECT borrowing_id, copy_id, borrower_id, borrower_type, borrowed_at,
                   due_date, returned_at, status, fine_amount, fine_paid, created_at, updated_at
            FROM borrowings
            WHERE status IN ('borrowed', 'overdue') AND due_date < $1
            ORDER BY due_date ASC
            "#,
        )
        .bind(cutoff)
        .fetch(&self.pool)
        .map(|row_result| {
            let row = row_result?;
            map_row_to_borrowing(&row)
        });

        Box::pin(stream)
    }
}
