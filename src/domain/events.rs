use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BookId, BorrowerId, BorrowingId, CopyId, ReservationId};

/// イベント：資料が貸し出された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyBorrowed {
    pub borrowing_id: BorrowingId,
    pub copy_id: CopyId,
    pub borrower_id: BorrowerId,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// イベント：資料が返却された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyReturned {
    pub borrowing_id: BorrowingId,
    pub copy_id: CopyId,
    pub borrower_id: BorrowerId,
    pub returned_at: DateTime<Utc>,
    pub was_overdue: bool,
    pub fine_amount: Decimal,
}

/// イベント：貸出中の資料が紛失として処理された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowingMarkedLost {
    pub borrowing_id: BorrowingId,
    pub copy_id: CopyId,
    pub borrower_id: BorrowerId,
    pub marked_at: DateTime<Utc>,
    pub fine_amount: Decimal,
}

/// イベント：貸出が延滞した（バッチ検知）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowingBecameOverdue {
    pub borrowing_id: BorrowingId,
    pub copy_id: CopyId,
    pub borrower_id: BorrowerId,
    pub due_date: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
}

/// イベント：予約が作成された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationPlaced {
    pub reservation_id: ReservationId,
    pub copy_id: CopyId,
    pub book_id: BookId,
    pub user_id: BorrowerId,
    pub reserved_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
}

/// イベント：資料が利用可能になり、予約が受取待ちに昇格した
///
/// 取置期限は資料が実際に利用可能になった時点から起算し直される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationHoldStarted {
    pub reservation_id: ReservationId,
    pub copy_id: CopyId,
    pub user_id: BorrowerId,
    pub available_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
}

/// イベント：予約が履行され、貸出が作成された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationFulfilled {
    pub reservation_id: ReservationId,
    pub copy_id: CopyId,
    pub user_id: BorrowerId,
    pub fulfilled_at: DateTime<Utc>,
}

/// イベント：予約が取り消された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCancelled {
    pub reservation_id: ReservationId,
    pub copy_id: CopyId,
    pub user_id: BorrowerId,
    pub cancelled_at: DateTime<Utc>,
}

/// イベント：予約が取置期限切れで失効した
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationExpired {
    pub reservation_id: ReservationId,
    pub copy_id: CopyId,
    pub user_id: BorrowerId,
    pub expired_at: DateTime<Utc>,
}

/// ドメインイベント統合型
///
/// 通知ディスパッチに渡される。永続化はされない（現在状態が真実の情報源）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    CopyBorrowed(CopyBorrowed),
    CopyReturned(CopyReturned),
    BorrowingMarkedLost(BorrowingMarkedLost),
    BorrowingBecameOverdue(BorrowingBecameOverdue),
    ReservationPlaced(ReservationPlaced),
    ReservationHoldStarted(ReservationHoldStarted),
    ReservationFulfilled(ReservationFulfilled),
    ReservationCancelled(ReservationCancelled),
    ReservationExpired(ReservationExpired),
}
