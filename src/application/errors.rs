use crate::domain::value_objects::{CopyStatus, HolderRef, LibraryStatus};
use crate::ports::{CatalogError, LedgerError};
use thiserror::Error;

/// 貸出・予約・カタログ管理アプリケーション層のエラー
///
/// すべての失敗は型付きで呼び出し側へ伝搬する。エンジン内部で握り潰すのは
/// 通知配信の失敗のみ（ログに記録）。失敗した操作は保存状態を変更しない。
#[derive(Debug, Error)]
pub enum CirculationError {
    /// 図書館が存在しない
    #[error("Library not found")]
    LibraryNotFound,

    /// 書誌が存在しない
    #[error("Book not found")]
    BookNotFound,

    /// 資料が存在しない
    #[error("Copy not found")]
    CopyNotFound,

    /// 貸出が見つからない
    #[error("Borrowing not found")]
    BorrowingNotFound,

    /// 予約が見つからない
    #[error("Reservation not found")]
    ReservationNotFound,

    /// 一意性・参照整合性違反
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 台帳の競合：資料が貸出可能でない
    ///
    /// 再試行やUI表示の判断材料として現在の状態と占有者を含む。
    #[error("Copy is not available (status: {status:?})")]
    CopyUnavailable {
        status: CopyStatus,
        holder: Option<HolderRef>,
    },

    /// 貸出上限（図書館ごとの設定）を超えている
    #[error("Borrow limit exceeded (max {limit} copies)")]
    LimitExceeded { limit: u32 },

    /// 他の利用者の予約が資料への優先権を持っている
    #[error("Copy is reserved by another user")]
    ReservedByOther,

    /// 貸出可能な資料への予約は不可（直接借りるべき）
    #[error("Copy is available; borrow it directly instead of reserving")]
    UseNormalBorrowInstead,

    /// 現在のライフサイクル状態では許可されない操作
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 図書館が稼働中でないため新規の貸出・予約を受け付けない
    #[error("Library is not active (status: {status:?})")]
    LibraryNotActive { status: LibraryStatus },

    /// カタログストアのエラー
    #[error("Catalog store error")]
    CatalogStoreError(#[source] CatalogError),

    /// 台帳のエラー
    #[error("Ledger error")]
    LedgerError(#[source] LedgerError),

    /// 貸出リポジトリのエラー
    #[error("Borrowing repository error")]
    BorrowingRepositoryError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 予約リポジトリのエラー
    #[error("Reservation repository error")]
    ReservationRepositoryError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<CatalogError> for CirculationError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::LibraryNotFound => CirculationError::LibraryNotFound,
            CatalogError::BookNotFound => CirculationError::BookNotFound,
            CatalogError::CopyNotFound => CirculationError::CopyNotFound,
            CatalogError::Conflict(msg) => CirculationError::Conflict(msg),
            e @ CatalogError::Storage(_) => CirculationError::CatalogStoreError(e),
        }
    }
}

impl From<LedgerError> for CirculationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::CopyNotFound => CirculationError::CopyNotFound,
            LedgerError::Unavailable { status, holder } => {
                CirculationError::CopyUnavailable { status, holder }
            }
            LedgerError::HolderMismatch { status, .. } => CirculationError::InvalidState(format!(
                "copy is not held by this reservation (status: {})",
                status.as_str()
            )),
            e @ LedgerError::Storage(_) => CirculationError::LedgerError(e),
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, CirculationError>;
