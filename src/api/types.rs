use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::circulation::BorrowingView;
use crate::domain::catalog::{BookCopy, Library};
use crate::domain::reservation::Reservation;
use crate::domain::value_objects::{BorrowerType, BorrowingStatus, CopyCondition};
use crate::ports::UserProfile;

// ============================================================================
// Requests
// ============================================================================

/// 図書館登録リクエスト（POST /libraries）
#[derive(Debug, Deserialize)]
pub struct CreateLibraryRequest {
    pub name: String,
    pub max_borrow_limit: u32,
    pub borrow_duration_days: i64,
    pub fine_per_day: Decimal,
    pub reservation_hold_days: i64,
}

/// 書誌登録リクエスト（POST /libraries/:id/books）
#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
}

/// 資料登録リクエスト（POST /books/:id/copies）
#[derive(Debug, Deserialize)]
pub struct AddCopyRequest {
    pub copy_number: u32,
    pub condition: CopyCondition,
    pub location: String,
}

/// 貸出リクエスト（POST /copies/:id/borrow）
#[derive(Debug, Deserialize)]
pub struct BorrowRequest {
    pub borrower_id: Uuid,
    pub borrower_type: BorrowerType,
}

/// 返却リクエスト（POST /borrowings/:id/return）
///
/// returned_at省略時はサーバー時刻を用いる。
#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    pub returned_at: Option<DateTime<Utc>>,
}

/// 予約リクエスト（POST /copies/:id/reservations）
#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub user_id: Uuid,
    pub user_type: BorrowerType,
    pub notes: Option<String>,
}

/// 貸出一覧取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ListBorrowingsQuery {
    /// 利用者IDでフィルタリング（必須）
    pub borrower_id: Option<Uuid>,
    /// 実効ステータスでフィルタリング（borrowed, overdue, returned, lost）
    pub status: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// 図書館レスポンス（ポリシー項目はそのまま設定値として使われる）
#[derive(Debug, Serialize)]
pub struct LibraryResponse {
    pub library_id: Uuid,
    pub name: String,
    pub max_borrow_limit: u32,
    pub borrow_duration_days: i64,
    pub fine_per_day: Decimal,
    pub reservation_hold_days: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Library> for LibraryResponse {
    fn from(library: Library) -> Self {
        Self {
            library_id: library.library_id.value(),
            name: library.name,
            max_borrow_limit: library.policy.max_borrow_limit(),
            borrow_duration_days: library.policy.borrow_duration_days(),
            fine_per_day: library.policy.fine_per_day(),
            reservation_hold_days: library.policy.reservation_hold_days(),
            status: library.status.as_str().to_string(),
            created_at: library.created_at,
            updated_at: library.updated_at,
        }
    }
}

/// 書誌作成レスポンス
#[derive(Debug, Serialize)]
pub struct BookCreatedResponse {
    pub book_id: Uuid,
    pub library_id: Uuid,
    pub title: String,
}

/// 資料レスポンス
#[derive(Debug, Serialize)]
pub struct CopyResponse {
    pub copy_id: Uuid,
    pub book_id: Uuid,
    pub copy_number: u32,
    pub condition: String,
    pub location: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BookCopy> for CopyResponse {
    fn from(copy: BookCopy) -> Self {
        Self {
            copy_id: copy.copy_id.value(),
            book_id: copy.book_id.value(),
            copy_number: copy.copy_number,
            condition: copy.condition.as_str().to_string(),
            location: copy.location,
            status: copy.status.as_str().to_string(),
            created_at: copy.created_at,
            updated_at: copy.updated_at,
        }
    }
}

/// 利用者プロフィール（表示補完用）
#[derive(Debug, Serialize)]
pub struct BorrowerProfileResponse {
    pub full_name: String,
    pub email: String,
    pub department_name: String,
    pub registration_number: String,
}

impl From<UserProfile> for BorrowerProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            full_name: profile.full_name,
            email: profile.email,
            department_name: profile.department_name,
            registration_number: profile.registration_number,
        }
    }
}

/// 貸出レスポンス
///
/// statusとfine_amountは読み取り時点の導出値。
#[derive(Debug, Serialize)]
pub struct BorrowingResponse {
    pub borrowing_id: Uuid,
    pub copy_id: Uuid,
    pub borrower_id: Uuid,
    pub borrower_type: String,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: String,
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrower: Option<BorrowerProfileResponse>,
}

impl From<BorrowingView> for BorrowingResponse {
    fn from(view: BorrowingView) -> Self {
        Self {
            borrowing_id: view.borrowing_id.value(),
            copy_id: view.copy_id.value(),
            borrower_id: view.borrower_id.value(),
            borrower_type: view.borrower_type.as_str().to_string(),
            borrowed_at: view.borrowed_at,
            due_date: view.due_date,
            returned_at: view.returned_at,
            status: view.status.as_str().to_string(),
            fine_amount: view.fine_amount,
            fine_paid: view.fine_paid,
            borrower: None,
        }
    }
}

/// 予約レスポンス
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub reservation_id: Uuid,
    pub copy_id: Uuid,
    pub user_id: Uuid,
    pub user_type: String,
    pub reservation_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub status: String,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub notes: String,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            reservation_id: reservation.reservation_id.value(),
            copy_id: reservation.copy_id.value(),
            user_id: reservation.user_id.value(),
            user_type: reservation.user_type.as_str().to_string(),
            reservation_date: reservation.reservation_date,
            expiry_date: reservation.expiry_date,
            status: reservation.status.as_str().to_string(),
            fulfilled_at: reservation.fulfilled_at,
            notes: reservation.notes,
        }
    }
}

/// 予約作成レスポンス（待ち行列内の位置付き）
#[derive(Debug, Serialize)]
pub struct ReservationCreatedResponse {
    pub reservation_id: Uuid,
    pub copy_id: Uuid,
    pub expiry_date: DateTime<Utc>,
    pub queue_position: usize,
}

/// 予約履行レスポンス（生成された貸出とのリンク）
#[derive(Debug, Serialize)]
pub struct ReservationFulfilledResponse {
    pub reservation_id: Uuid,
    pub borrowing_id: Uuid,
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// ステータスクエリパラメータのパースとバリデーション
pub fn parse_status_filter(status: &str) -> Result<BorrowingStatus, String> {
    status.parse::<BorrowingStatus>()
}
