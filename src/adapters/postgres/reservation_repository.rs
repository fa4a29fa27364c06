use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use crate::domain::reservation::Reservation;
use crate::domain::value_objects::{
    BorrowerId, BorrowerType, CopyId, LibraryId, ReservationId, ReservationStatus,
};
use crate::ports::reservation_repository::{
    ReservationRepository as ReservationRepositoryTrait, Result,
};

/// PostgreSQLの行データをReservationに変換する
fn map_row_to_reservation(row: &PgRow) -> Result<Reservation> {
    let status_str: &str = row.get("status");
    let status = ReservationStatus::from_str(status_str).map_err(|e| {
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            as Box<dyn std::error::Error + Send + Sync>
    })?;

    let user_type_str: &str = row.get("user_type");
    let user_type = BorrowerType::from_str(user_type_str).map_err(|e| {
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            as Box<dyn std::error::Error + Send + Sync>
    })?;

    Ok(Reservation {
        reservation_id: ReservationId::from_uuid(row.get("reservation_id")),
        copy_id: CopyId::from_uuid(row.get("copy_id")),
        user_id: BorrowerId::from_uuid(row.get("user_id")),
        user_type,
        reservation_date: row.get("reservation_date"),
        expiry_date: row.get("expiry_date"),
        status,
        fulfilled_at: row.get("fulfilled_at"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// ReservationRepositoryのPostgreSQL実装
///
/// FIFO待ち行列の順序はクエリで保証する：
/// ORDER BY reservation_date, reservation_id（同時刻の決定的な順序付け）。
pub struct ReservationRepository {
    pool: PgPool,
}

impl ReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationRepositoryTrait for ReservationRepository {
    /// 予約を保存する（upsert）
    async fn save(&self, reservation: Reservation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reservations (
                reservation_id,
                copy_id,
                user_id,
                user_type,
                reservation_date,
                expiry_date,
                status,
                fulfilled_at,
                notes,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (reservation_id)
            DO UPDATE SET
                expiry_date = EXCLUDED.expiry_date,
                status = EXCLUDED.status,
                fulfilled_at = EXCLUDED.fulfilled_at,
                notes = EXCLUDED.notes,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(reservation.reservation_id.value())
        .bind(reservation.copy_id.value())
        .bind(reservation.user_id.value())
        .bind(reservation.user_type.as_str())
        .bind(reservation.reservation_date)
        .bind(reservation.expiry_date)
        .bind(reservation.status.as_str())
        .bind(reservation.fulfilled_at)
        .bind(&reservation.notes)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query(
            r#"
            SELECT reservation_id, copy_id, user_id, user_type, reservation_date,
                   expiry_date, status, fulfilled_at, notes, created_at, updated_at
            FROM reservations
            WHERE reservation_id = $1
            "#,
        )
        .bind(reservation_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_reservation).transpose()
    }

    async fn head_pending_for_copy(&self, copy_id: CopyId) -> Result<Option<Reservation>> {
        let row = sqlx::query(
            r#"
            SELECT reservation_id, copy_id, user_id, user_type, reservation_date,
                   expiry_date, status, fulfilled_at, notes, created_at, updated_at
            FROM reservations
            WHERE copy_id = $1 AND status = 'pending'
            ORDER BY reservation_date ASC, reservation_id ASC
            LIMIT 1
            "#,
        )
        .bind(copy_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_reservation).transpose()
    }

    async fn pending_for_copy(&self, copy_id: CopyId) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(
            r#"
            SELECT reservation_id, copy_id, user_id, user_type, reservation_date,
                   expiry_date, status, fulfilled_at, notes, created_at, updated_at
            FROM reservations
            WHERE copy_id = $1 AND status = 'pending'
            ORDER BY reservation_date ASC, reservation_id ASC
            "#,
        )
        .bind(copy_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_reservation).collect()
    }

    async fn find_expired_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(
            r#"
            SELECT reservation_id, copy_id, user_id, user_type, reservation_date,
                   expiry_date, status, fulfilled_at, notes, created_at, updated_at
            FROM reservations
            WHERE status = 'pending' AND expiry_date < $1
            ORDER BY expiry_date ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_reservation).collect()
    }

    async fn exists_pending_for_library(&self, library_id: LibraryId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM reservations r
                JOIN book_copies c ON c.copy_id = r.copy_id
                JOIN books bk ON bk.book_id = c.book_id
                WHERE bk.library_id = $1 AND r.status = 'pending'
            )
            "#,
        )
        .bind(library_id.value())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
