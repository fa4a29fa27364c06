use crate::domain::catalog::{Book, BookCopy, Library};
use crate::domain::value_objects::{BookId, CopyCondition, CopyId, LibraryId, LibraryStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// カタログ永続化のエラー
#[derive(Debug, Error)]
pub enum CatalogError {
    /// 図書館が存在しない
    #[error("Library not found")]
    LibraryNotFound,

    /// 書誌が存在しない
    #[error("Book not found")]
    BookNotFound,

    /// 資料が存在しない
    #[error("Copy not found")]
    CopyNotFound,

    /// 一意性・参照整合性違反（例：書誌内で重複する通し番号）
    #[error("Conflict: {0}")]
    Conflict(String),

    /// ストレージのエラー
    #[error("Catalog storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// カタログストアポート
///
/// Library / Book / BookCopy のCRUDを抽象化する。
/// 資料の status / holder はこのポートからは変更できない（台帳API専用）。
/// 参照ガード（開いた貸出・Pending予約を持つ図書館の削除禁止）は
/// アプリケーション層が貸出・予約リポジトリと併せて判定する。
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// 図書館を登録する
    async fn insert_library(&self, library: Library) -> Result<()>;

    /// 図書館を取得する
    async fn get_library(&self, library_id: LibraryId) -> Result<Option<Library>>;

    /// 図書館の運用状態を更新する
    ///
    /// Active以外に切り替わると新規の貸出・予約が止まる。
    async fn update_library_status(
        &self,
        library_id: LibraryId,
        status: LibraryStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// 図書館を配下の書誌・資料ごと削除する
    ///
    /// 呼び出し前に参照ガードの判定が済んでいること。
    async fn delete_library(&self, library_id: LibraryId) -> Result<()>;

    /// 書誌を登録する
    ///
    /// 所属先の図書館が存在しない場合は`LibraryNotFound`。
    async fn insert_book(&self, book: Book) -> Result<()>;

    /// 書誌を取得する
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>>;

    /// 資料を登録する
    ///
    /// 通し番号が書誌内で重複する場合は`Conflict`。
    async fn insert_copy(&self, copy: BookCopy) -> Result<()>;

    /// 資料を取得する
    async fn get_copy(&self, copy_id: CopyId) -> Result<Option<BookCopy>>;

    /// 書誌に属する資料の一覧（通し番号順）
    ///
    /// 予約UIで「同じ書誌の貸出可能な別資料」を提示するのに使用される。
    async fn list_copies_of_book(&self, book_id: BookId) -> Result<Vec<BookCopy>>;

    /// 資料の保存状態・配架場所を更新する
    ///
    /// status / holder は対象外。
    async fn update_copy_details(
        &self,
        copy_id: CopyId,
        condition: CopyCondition,
        location: String,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// 資料の所属先の図書館を解決する（copy → book → library）
    ///
    /// 貸出・予約時のポリシー解決に使用される。
    async fn library_of_copy(&self, copy_id: CopyId) -> Result<Option<Library>>;
}
