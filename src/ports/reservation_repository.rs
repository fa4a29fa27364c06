use crate::domain::reservation::Reservation;
use crate::domain::value_objects::{CopyId, LibraryId, ReservationId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 予約リポジトリポート
///
/// 同一資料のPending予約は reservation_date 順のFIFO待ち行列として
/// 解釈される。行列の順序はクエリで保証する（先着優先）。
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// 予約を保存する（upsert）
    async fn save(&self, reservation: Reservation) -> Result<()>;

    /// IDで予約を取得する
    async fn get(&self, reservation_id: ReservationId) -> Result<Option<Reservation>>;

    /// 資料の待ち行列の先頭（最古のPending予約）
    async fn head_pending_for_copy(&self, copy_id: CopyId) -> Result<Option<Reservation>>;

    /// 資料のPending予約一覧（reservation_date昇順 = 行列順）
    async fn pending_for_copy(&self, copy_id: CopyId) -> Result<Vec<Reservation>>;

    /// 取置期限切れ候補（Pendingかつ期限超過）を取得する
    ///
    /// 失効バッチに使用される。実際の失効判定は資料ごとに再確認される。
    async fn find_expired_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reservation>>;

    /// 図書館配下にPending予約が存在するか
    ///
    /// 図書館削除の参照ガードに使用される。
    async fn exists_pending_for_library(&self, library_id: LibraryId) -> Result<bool>;
}
