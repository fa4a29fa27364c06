use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::domain::value_objects::{
    BorrowerId, CopyId, CopyStatus, HolderRef, ReservationId,
};
use crate::ports::availability_ledger::{
    AvailabilityLedger as AvailabilityLedgerTrait, Lease, LedgerError, Result, SetAsideStatus,
};

/// AvailabilityLedgerのPostgreSQL実装
///
/// 資料単位の排他は「期待する現在状態を条件にしたUPDATE」で実現する。
/// 更新件数0 = 条件を満たさない = 他の占有者が先行した、として現在の
/// 状態を取り直してエラーに含める。ロックの保持時間はUPDATE1文のみ。
pub struct AvailabilityLedger {
    pool: PgPool,
}

impl AvailabilityLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 現在の状態と占有者を取り直す（条件付きUPDATE失敗時の診断用）
    async fn current_state(&self, copy_id: CopyId) -> Result<(CopyStatus, Option<HolderRef>)> {
        let row = sqlx::query(
            r#"
            SELECT status, holder_kind, holder_id, holder_user_id
            FROM book_copies
            WHERE copy_id = $1
            "#,
        )
        .bind(copy_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        let row = row.ok_or(LedgerError::CopyNotFound)?;
        parse_state(&row)
    }
}

/// holder_* 列からHolderRefを復元する（台帳とカタログで共用）
pub(super) fn holder_from_columns(
    kind: Option<&str>,
    id: Option<Uuid>,
    user_id: Option<Uuid>,
) -> std::result::Result<Option<HolderRef>, String> {
    match (kind, id) {
        (None, _) => Ok(None),
        (Some("borrower"), Some(id)) => Ok(Some(HolderRef::Borrower {
            borrower_id: BorrowerId::from_uuid(id),
        })),
        (Some("hold"), Some(id)) => {
            let user_id = user_id.ok_or_else(|| "hold without holder_user_id".to_string())?;
            Ok(Some(HolderRef::Hold {
                reservation_id: ReservationId::from_uuid(id),
                user_id: BorrowerId::from_uuid(user_id),
            }))
        }
        (Some(_), None) => Err("holder_kind set without holder_id".to_string()),
        (Some(other), _) => Err(format!("invalid holder_kind: {}", other)),
    }
}

/// HolderRefを holder_* 列の値へ分解する
fn holder_columns(holder: &HolderRef) -> (&'static str, Uuid, Option<Uuid>) {
    match holder {
        HolderRef::Borrower { borrower_id } => ("borrower", borrower_id.value(), None),
        HolderRef::Hold {
            reservation_id,
            user_id,
        } => ("hold", reservation_id.value(), Some(user_id.value())),
    }
}

fn parse_state(row: &PgRow) -> Result<(CopyStatus, Option<HolderRef>)> {
    let status_str: &str = row.get("status");
    let status = status_str
        .parse::<CopyStatus>()
        .map_err(invalid_data)?;

    let kind: Option<String> = row.get("holder_kind");
    let holder = holder_from_columns(
        kind.as_deref(),
        row.get("holder_id"),
        row.get("holder_user_id"),
    )
    .map_err(invalid_data)?;

    Ok((status, holder))
}

fn storage_error(e: sqlx::Error) -> LedgerError {
    LedgerError::Storage(Box::new(e))
}

fn invalid_data(msg: impl Into<String>) -> LedgerError {
    LedgerError::Storage(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        msg.into(),
    )))
}

#[async_trait]
impl AvailabilityLedgerTrait for AvailabilityLedger {
    async fn acquire(
        &self,
        copy_id: CopyId,
        holder: HolderRef,
        at: DateTime<Utc>,
    ) -> Result<Lease> {
        let status = match holder {
            HolderRef::Borrower { .. } => CopyStatus::Borrowed,
            HolderRef::Hold { .. } => CopyStatus::Reserved,
        };
        let (kind, holder_id, holder_user_id) = holder_columns(&holder);

        // 期待状態を条件にした単一書き込み：Availableのときだけ勝てる
        let result = sqlx::query(
            r#"
            UPDATE book_copies
            SET status = $2,
                holder_kind = $3,
                holder_id = $4,
                holder_user_id = $5,
                updated_at = $6
            WHERE copy_id = $1 AND status = 'available'
            "#,
        )
        .bind(copy_id.value())
        .bind(status.as_str())
        .bind(kind)
        .bind(holder_id)
        .bind(holder_user_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            let (current_status, current_holder) = self.current_state(copy_id).await?;
            return Err(LedgerError::Unavailable {
                status: current_status,
                holder: current_holder,
            });
        }

        Ok(Lease {
            copy_id,
            holder,
            status,
        })
    }

    async fn release(&self, copy_id: CopyId, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE book_copies
            SET status = 'available',
                holder_kind = NULL,
                holder_id = NULL,
                holder_user_id = NULL,
                updated_at = $2
            WHERE copy_id = $1 AND status <> 'available'
            "#,
        )
        .bind(copy_id.value())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            // 既にAvailableか、資料が存在しないかを区別する
            self.current_state(copy_id).await?;
            return Ok(false);
        }

        Ok(true)
    }

    async fn promote_hold(
        &self,
        copy_id: CopyId,
        reservation_id: ReservationId,
        borrower_id: BorrowerId,
        at: DateTime<Utc>,
    ) -> Result<Lease> {
        let result = sqlx::query(
            r#"
            UPDATE book_copies
            SET status = 'borrowed',
                holder_kind = 'borrower',
                holder_id = $3,
                holder_user_id = NULL,
                updated_at = $4
            WHERE copy_id = $1
              AND status = 'reserved'
              AND holder_kind = 'hold'
              AND holder_id = $2
            "#,
        )
        .bind(copy_id.value())
        .bind(reservation_id.value())
        .bind(borrower_id.value())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            let (status, holder) = self.current_state(copy_id).await?;
            return Err(LedgerError::HolderMismatch { status, holder });
        }

        Ok(Lease {
            copy_id,
            holder: HolderRef::Borrower { borrower_id },
            status: CopyStatus::Borrowed,
        })
    }

    async fn set_aside(
        &self,
        copy_id: CopyId,
        status: SetAsideStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let status = match status {
            SetAsideStatus::Maintenance => CopyStatus::Maintenance,
            SetAsideStatus::Lost => CopyStatus::Lost,
        };

        let result = sqlx::query(
            r#"
            UPDATE book_copies
            SET status = $2,
                holder_kind = NULL,
                holder_id = NULL,
                holder_user_id = NULL,
                updated_at = $3
            WHERE copy_id = $1
            "#,
        )
        .bind(copy_id.value())
        .bind(status.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::CopyNotFound);
        }

        Ok(())
    }

    async fn status_of(&self, copy_id: CopyId) -> Result<(CopyStatus, Option<HolderRef>)> {
        self.current_state(copy_id).await
    }
}
