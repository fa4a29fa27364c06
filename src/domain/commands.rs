use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BorrowerId, BorrowerType, BorrowingId, CopyId, ReservationId};

/// コマンド：資料を貸し出す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowCopy {
    pub copy_id: CopyId,
    pub borrower_id: BorrowerId,
    pub borrower_type: BorrowerType,
    pub borrowed_at: DateTime<Utc>,
}

/// コマンド：資料を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnCopy {
    pub borrowing_id: BorrowingId,
    pub returned_at: DateTime<Utc>,
}

/// コマンド：貸出中の資料を紛失として処理する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkCopyLost {
    pub borrowing_id: BorrowingId,
    pub marked_at: DateTime<Utc>,
}

/// コマンド：延滞料金を支払済みにする
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkFinePaid {
    pub borrowing_id: BorrowingId,
    pub paid_at: DateTime<Utc>,
}

/// コマンド：資料を予約する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceReservation {
    pub copy_id: CopyId,
    pub user_id: BorrowerId,
    pub user_type: BorrowerType,
    pub requested_at: DateTime<Utc>,
    pub notes: String,
}

/// コマンド：予約を履行する（職員による受け渡し確認）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillReservation {
    pub reservation_id: ReservationId,
    pub fulfilled_at: DateTime<Utc>,
}

/// コマンド：予約を取り消す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReservation {
    pub reservation_id: ReservationId,
    pub cancelled_at: DateTime<Utc>,
}
