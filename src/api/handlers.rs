use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::circulation::{
    self, borrow_copy as execute_borrow, cancel_reservation as execute_cancel,
    fulfill_reservation as execute_fulfill, mark_fine_paid as execute_mark_fine_paid,
    mark_lost as execute_mark_lost, place_reservation as execute_reserve,
    return_copy as execute_return,
};
use crate::application::{catalog, CirculationError, ServiceDependencies};
use crate::domain::commands::{
    BorrowCopy, CancelReservation, FulfillReservation, MarkCopyLost, MarkFinePaid,
    PlaceReservation, ReturnCopy,
};
use crate::domain::value_objects::{
    BookId, BorrowerId, BorrowingId, CopyId, LibraryId, ReservationId,
};

use super::{
    error::ApiError,
    types::{
        AddCopyRequest, BookCreatedResponse, BorrowRequest, BorrowingResponse,
        CopyResponse, CreateBookRequest, CreateLibraryRequest, ErrorResponse, LibraryResponse,
        ListBorrowingsQuery, ReservationCreatedResponse, ReservationFulfilledResponse,
        ReservationResponse, ReserveRequest, ReturnRequest,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

// ============================================================================
// Catalog handlers
// ============================================================================

/// POST /libraries - 図書館を登録
pub async fn create_library(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLibraryRequest>,
) -> Result<(StatusCode, Json<LibraryResponse>), ApiError> {
    let cmd = catalog::CreateLibrary {
        name: req.name,
        max_borrow_limit: req.max_borrow_limit,
        borrow_duration_days: req.borrow_duration_days,
        fine_per_day: req.fine_per_day,
        reservation_hold_days: req.reservation_hold_days,
        created_at: Utc::now(),
    };

    let library_id = catalog::create_library(&state.service_deps, cmd).await?;
    let library = catalog::get_library(&state.service_deps, library_id).await?;

    Ok((StatusCode::CREATED, Json(LibraryResponse::from(library))))
}

/// GET /libraries/:id - 図書館を取得
///
/// ポリシー項目（上限・貸出期間・延滞料金・取置日数）はそのまま
/// 設定値として利用される。
pub async fn get_library(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
) -> Result<Json<LibraryResponse>, ApiError> {
    let library =
        catalog::get_library(&state.service_deps, LibraryId::from_uuid(library_id)).await?;

    Ok(Json(LibraryResponse::from(library)))
}

/// DELETE /libraries/:id - 図書館を削除
///
/// 配下に未返却の貸出またはPending予約がある間は409で拒否される。
pub async fn delete_library(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    catalog::delete_library(&state.service_deps, LibraryId::from_uuid(library_id)).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /libraries/:id/books - 書誌を登録
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<BookCreatedResponse>), ApiError> {
    let cmd = catalog::CreateBook {
        library_id: LibraryId::from_uuid(library_id),
        title: req.title.clone(),
        author: req.author,
        isbn: req.isbn,
        category: req.category,
        created_at: Utc::now(),
    };

    let book_id = catalog::create_book(&state.service_deps, cmd).await?;

    let response = BookCreatedResponse {
        book_id: book_id.value(),
        library_id,
        title: req.title,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /books/:id/copies - 資料を登録
///
/// 通し番号が書誌内で重複する場合は409を返す。
pub async fn add_copy(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<AddCopyRequest>,
) -> Result<(StatusCode, Json<CopyResponse>), ApiError> {
    let cmd = catalog::AddCopy {
        book_id: BookId::from_uuid(book_id),
        copy_number: req.copy_number,
        condition: req.condition,
        location: req.location,
        created_at: Utc::now(),
    };

    let copy_id = catalog::add_copy(&state.service_deps, cmd).await?;
    let copy = catalog::get_copy(&state.service_deps, copy_id).await?;

    Ok((StatusCode::CREATED, Json(CopyResponse::from(copy))))
}

/// GET /books/:id/copies - 書誌の資料一覧
///
/// 予約UIが代替候補（貸出可能な別資料）を提示するのに使用される。
pub async fn list_copies(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<Vec<CopyResponse>>, ApiError> {
    let copies = catalog::list_copies(&state.service_deps, BookId::from_uuid(book_id)).await?;

    Ok(Json(copies.into_iter().map(CopyResponse::from).collect()))
}

// ============================================================================
// Circulation handlers
// ============================================================================

/// POST /copies/:id/borrow - 資料を貸し出す
///
/// 強制されるビジネスルール:
/// - 図書館が稼働中であること
/// - 利用者の貸出冊数が図書館ごとの上限未満であること
/// - 他の利用者の予約が優先されること
/// - 資料が台帳上Availableであること
pub async fn borrow_copy(
    State(state): State<Arc<AppState>>,
    Path(copy_id): Path<Uuid>,
    Json(req): Json<BorrowRequest>,
) -> Result<(StatusCode, Json<BorrowingResponse>), ApiError> {
    let now = Utc::now();
    let cmd = BorrowCopy {
        copy_id: CopyId::from_uuid(copy_id),
        borrower_id: BorrowerId::from_uuid(req.borrower_id),
        borrower_type: req.borrower_type,
        borrowed_at: now,
    };

    let borrowing_id = execute_borrow(&state.service_deps, cmd).await?;

    // 作成された貸出を取得して完全な情報を返す
    let details = circulation::get_borrowing(&state.service_deps, borrowing_id, now).await?;
    let mut response = BorrowingResponse::from(details.view);
    response.borrower = details.borrower.map(Into::into);

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /borrowings/:id/return - 資料を返却
///
/// 延滞していても受け付け、確定した延滞料金を返す。
pub async fn return_borrowing(
    State(state): State<Arc<AppState>>,
    Path(borrowing_id): Path<Uuid>,
    Json(req): Json<ReturnRequest>,
) -> Result<Json<BorrowingResponse>, ApiError> {
    let returned_at = req.returned_at.unwrap_or_else(Utc::now);
    let borrowing_id = BorrowingId::from_uuid(borrowing_id);

    let cmd = ReturnCopy {
        borrowing_id,
        returned_at,
    };

    execute_return(&state.service_deps, cmd).await?;

    let details =
        circulation::get_borrowing(&state.service_deps, borrowing_id, returned_at).await?;

    Ok(Json(BorrowingResponse::from(details.view)))
}

/// POST /borrowings/:id/lost - 貸出中の資料を紛失として処理
pub async fn mark_borrowing_lost(
    State(state): State<Arc<AppState>>,
    Path(borrowing_id): Path<Uuid>,
) -> Result<Json<BorrowingResponse>, ApiError> {
    let now = Utc::now();
    let borrowing_id = BorrowingId::from_uuid(borrowing_id);

    let cmd = MarkCopyLost {
        borrowing_id,
        marked_at: now,
    };

    execute_mark_lost(&state.service_deps, cmd).await?;

    let details = circulation::get_borrowing(&state.service_deps, borrowing_id, now).await?;

    Ok(Json(BorrowingResponse::from(details.view)))
}

/// POST /borrowings/:id/fine/pay - 延滞料金を支払済みにする
pub async fn pay_fine(
    State(state): State<Arc<AppState>>,
    Path(borrowing_id): Path<Uuid>,
) -> Result<Json<BorrowingResponse>, ApiError> {
    let now = Utc::now();
    let borrowing_id = BorrowingId::from_uuid(borrowing_id);

    let cmd = MarkFinePaid {
        borrowing_id,
        paid_at: now,
    };

    execute_mark_fine_paid(&state.service_deps, cmd).await?;

    let details = circulation::get_borrowing(&state.service_deps, borrowing_id, now).await?;

    Ok(Json(BorrowingResponse::from(details.view)))
}

/// POST /copies/:id/maintenance - 資料を整備中へ退避（職員操作）
pub async fn set_copy_maintenance(
    State(state): State<Arc<AppState>>,
    Path(copy_id): Path<Uuid>,
) -> Result<Json<CopyResponse>, ApiError> {
    let copy_id = CopyId::from_uuid(copy_id);

    circulation::set_copy_maintenance(&state.service_deps, copy_id, Utc::now()).await?;

    let copy = catalog::get_copy(&state.service_deps, copy_id).await?;

    Ok(Json(CopyResponse::from(copy)))
}

/// POST /copies/:id/reinstate - 資料を整備から復帰（職員操作）
///
/// 待ち行列があれば予約カスケードが走る。
pub async fn reinstate_copy(
    State(state): State<Arc<AppState>>,
    Path(copy_id): Path<Uuid>,
) -> Result<Json<CopyResponse>, ApiError> {
    let copy_id = CopyId::from_uuid(copy_id);

    circulation::reinstate_copy(&state.service_deps, copy_id, Utc::now()).await?;

    let copy = catalog::get_copy(&state.service_deps, copy_id).await?;

    Ok(Json(CopyResponse::from(copy)))
}

// ============================================================================
// Reservation handlers
// ============================================================================

/// POST /copies/:id/reservations - 資料を予約
///
/// 貸出可能な資料への予約は422で拒否される（直接借りるべき）。
pub async fn reserve_copy(
    State(state): State<Arc<AppState>>,
    Path(copy_id): Path<Uuid>,
    Json(req): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<ReservationCreatedResponse>), ApiError> {
    let now = Utc::now();
    let copy_id = CopyId::from_uuid(copy_id);
    let user_id = BorrowerId::from_uuid(req.user_id);

    let cmd = PlaceReservation {
        copy_id,
        user_id,
        user_type: req.user_type,
        requested_at: now,
        notes: req.notes.unwrap_or_default(),
    };

    let reservation_id = execute_reserve(&state.service_deps, cmd).await?;

    let reservation =
        circulation::get_reservation(&state.service_deps, reservation_id, now).await?;
    let queue = circulation::list_queue_for_copy(&state.service_deps, copy_id, now).await?;
    let queue_position = queue
        .iter()
        .position(|r| r.reservation_id == reservation_id)
        .map(|index| index + 1)
        .unwrap_or(queue.len());

    let response = ReservationCreatedResponse {
        reservation_id: reservation_id.value(),
        copy_id: copy_id.value(),
        expiry_date: reservation.expiry_date,
        queue_position,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /reservations/:id/fulfill - 予約を履行（職員による受け渡し確認）
///
/// 成功すると予約に紐づく貸出が作成される。
pub async fn fulfill_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReservationFulfilledResponse>, ApiError> {
    let reservation_id = ReservationId::from_uuid(reservation_id);

    let cmd = FulfillReservation {
        reservation_id,
        fulfilled_at: Utc::now(),
    };

    let borrowing_id = execute_fulfill(&state.service_deps, cmd).await?;

    let response = ReservationFulfilledResponse {
        reservation_id: reservation_id.value(),
        borrowing_id: borrowing_id.value(),
    };

    Ok(Json(response))
}

/// POST /reservations/:id/cancel - 予約を取消
///
/// 取り消された予約が資料を占有していた場合、次の予約へカスケードする。
pub async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let now = Utc::now();
    let reservation_id = ReservationId::from_uuid(reservation_id);

    let cmd = CancelReservation {
        reservation_id,
        cancelled_at: now,
    };

    execute_cancel(&state.service_deps, cmd).await?;

    let reservation =
        circulation::get_reservation(&state.service_deps, reservation_id, now).await?;

    Ok(Json(ReservationResponse::from(reservation)))
}

/// GET /reservations/:id - 予約を取得
///
/// 取置期限を過ぎたPending予約はこの読み取りで失効し、
/// 次の予約へのカスケードが走る（遅延評価）。
pub async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation = circulation::get_reservation(
        &state.service_deps,
        ReservationId::from_uuid(reservation_id),
        Utc::now(),
    )
    .await?;

    Ok(Json(ReservationResponse::from(reservation)))
}

/// GET /copies/:id/reservations - 資料の待ち行列（FIFO順）
pub async fn list_copy_queue(
    State(state): State<Arc<AppState>>,
    Path(copy_id): Path<Uuid>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    let queue = circulation::list_queue_for_copy(
        &state.service_deps,
        CopyId::from_uuid(copy_id),
        Utc::now(),
    )
    .await?;

    Ok(Json(
        queue.into_iter().map(ReservationResponse::from).collect(),
    ))
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /borrowings/:id - 貸出詳細をIDで取得
///
/// ステータスと延滞料金は読み取り時点で再計算される。
pub async fn get_borrowing(
    State(state): State<Arc<AppState>>,
    Path(borrowing_id): Path<Uuid>,
) -> Result<Json<BorrowingResponse>, ApiError> {
    let details = circulation::get_borrowing(
        &state.service_deps,
        BorrowingId::from_uuid(borrowing_id),
        Utc::now(),
    )
    .await?;

    let mut response = BorrowingResponse::from(details.view);
    response.borrower = details.borrower.map(Into::into);

    Ok(Json(response))
}

/// GET /borrowings - オプションフィルタ付き貸出一覧取得
///
/// クエリパラメータ:
/// - borrower_id: 利用者IDでフィルタリング（必須）
/// - status: 実効ステータスでフィルタリング（オプション）
pub async fn list_borrowings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBorrowingsQuery>,
) -> Result<Json<Vec<BorrowingResponse>>, QueryError> {
    // borrower_idを必須とする
    let borrower_id = query.borrower_id.ok_or_else(|| {
        QueryError::BadRequest("borrower_id query parameter is required".to_string())
    })?;

    let status_filter = match &query.status {
        Some(status_str) => {
            Some(super::types::parse_status_filter(status_str).map_err(QueryError::BadRequest)?)
        }
        None => None,
    };

    let views = circulation::list_borrowings(
        &state.service_deps,
        BorrowerId::from_uuid(borrower_id),
        status_filter,
        Utc::now(),
    )
    .await
    .map_err(|e| match e {
        CirculationError::LibraryNotFound => QueryError::NotFound("library not found".to_string()),
        other => QueryError::InternalError(other.to_string()),
    })?;

    Ok(Json(
        views.into_iter().map(BorrowingResponse::from).collect(),
    ))
}

// ============================================================================
// Error types
// ============================================================================

/// クエリハンドラー用のエラー型
#[derive(Debug)]
pub enum QueryError {
    NotFound(String),
    BadRequest(String),
    InternalError(String),
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            QueryError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            QueryError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            QueryError::InternalError(msg) => {
                // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
                tracing::error!("Internal error in query handler: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
