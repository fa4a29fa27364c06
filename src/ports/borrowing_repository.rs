use crate::domain::borrowing::Borrowing;
use crate::domain::value_objects::{BorrowerId, BorrowingId, CopyId, LibraryId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出リポジトリポート
///
/// 貸出レコードは作成後、そのIDを所有する単一フローからのみ更新される。
/// 監査証跡のため削除APIは提供しない。
#[async_trait]
pub trait BorrowingRepository: Send + Sync {
    /// 貸出を保存する（新規はINSERT、既存はUPDATEのupsert）
    async fn save(&self, borrowing: Borrowing) -> Result<()>;

    /// IDで貸出を取得する
    async fn get(&self, borrowing_id: BorrowingId) -> Result<Option<Borrowing>>;

    /// 資料の未返却の貸出を取得する
    ///
    /// 不変条件により高々1件。
    async fn find_open_by_copy(&self, copy_id: CopyId) -> Result<Option<Borrowing>>;

    /// 利用者が指定図書館で現在借りている冊数
    ///
    /// 貸出上限（図書館ごとの設定）の確認に使用される。
    async fn count_open_for_borrower(
        &self,
        borrower_id: BorrowerId,
        library_id: LibraryId,
    ) -> Result<u32>;

    /// 利用者の全貸出（新しい順）
    async fn find_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Borrowing>>;

    /// 図書館配下に未返却の貸出が存在するか
    ///
    /// 図書館削除の参照ガードに使用される。
    async fn exists_open_for_library(&self, library_id: LibraryId) -> Result<bool>;

    /// 延滞候補（未返却かつ期限超過）をストリーム配信する
    ///
    /// 延滞検知バッチに使用される。返却期限の古い順。
    fn stream_overdue_candidates(
        &self,
        cutoff: DateTime<Utc>,
    ) -> BoxStream<'_, Result<Borrowing>>;
}
