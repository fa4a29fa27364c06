use crate::application::CirculationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを
/// 提供する。内部エラーの詳細はログに記録し、クライアントには一般的な
/// メッセージのみを返す。
#[derive(Debug)]
pub struct ApiError(CirculationError);

impl From<CirculationError> for ApiError {
    fn from(err: CirculationError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self.0 {
            // 404 Not Found - リクエストされたリソースが存在しない
            CirculationError::LibraryNotFound => {
                (StatusCode::NOT_FOUND, "LIBRARY_NOT_FOUND", self.0.to_string())
            }
            CirculationError::BookNotFound => {
                (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND", self.0.to_string())
            }
            CirculationError::CopyNotFound => {
                (StatusCode::NOT_FOUND, "COPY_NOT_FOUND", self.0.to_string())
            }
            CirculationError::BorrowingNotFound => (
                StatusCode::NOT_FOUND,
                "BORROWING_NOT_FOUND",
                self.0.to_string(),
            ),
            CirculationError::ReservationNotFound => (
                StatusCode::NOT_FOUND,
                "RESERVATION_NOT_FOUND",
                self.0.to_string(),
            ),

            // 409 Conflict - 一意性違反・台帳の競合
            CirculationError::Conflict(_) => {
                (StatusCode::CONFLICT, "CONFLICT", self.0.to_string())
            }
            // 再試行やUI表示の判断ができるよう、現在の状態と占有者を返す
            CirculationError::CopyUnavailable { status, holder } => {
                let message = match holder {
                    Some(h) => format!(
                        "Copy is not available (status: {}, held by user {})",
                        status.as_str(),
                        h.user_id().value()
                    ),
                    None => format!("Copy is not available (status: {})", status.as_str()),
                };
                (StatusCode::CONFLICT, "COPY_UNAVAILABLE", message)
            }

            // 422 Unprocessable Entity - ビジネスルール違反
            CirculationError::LimitExceeded { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "LIMIT_EXCEEDED",
                self.0.to_string(),
            ),
            CirculationError::ReservedByOther => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "RESERVED_BY_OTHER",
                self.0.to_string(),
            ),
            CirculationError::UseNormalBorrowInstead => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "USE_NORMAL_BORROW_INSTEAD",
                self.0.to_string(),
            ),
            CirculationError::InvalidState(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_STATE",
                self.0.to_string(),
            ),
            CirculationError::LibraryNotActive { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "LIBRARY_NOT_ACTIVE",
                self.0.to_string(),
            ),

            // 500 Internal Server Error - システム障害
            CirculationError::CatalogStoreError(ref e) => {
                tracing::error!("Catalog store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CATALOG_STORE_ERROR",
                    "An unexpected error occurred".to_string(),
                )
            }
            CirculationError::LedgerError(ref e) => {
                tracing::error!("Ledger error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LEDGER_ERROR",
                    "An unexpected error occurred".to_string(),
                )
            }
            CirculationError::BorrowingRepositoryError(ref e) => {
                tracing::error!("Borrowing repository error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "BORROWING_REPOSITORY_ERROR",
                    "An unexpected error occurred".to_string(),
                )
            }
            CirculationError::ReservationRepositoryError(ref e) => {
                tracing::error!("Reservation repository error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "RESERVATION_REPOSITORY_ERROR",
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
