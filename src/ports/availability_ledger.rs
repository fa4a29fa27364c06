use crate::domain::value_objects::{BorrowerId, CopyId, CopyStatus, HolderRef, ReservationId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// 台帳のエラー
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 資料が存在しない
    #[error("Copy not found")]
    CopyNotFound,

    /// 資料が貸出可能でない（現在の状態と占有者を返す）
    #[error("Copy is not available (status: {status:?})")]
    Unavailable {
        status: CopyStatus,
        holder: Option<HolderRef>,
    },

    /// 資料が指定された予約に占有されていない
    #[error("Copy is not held by the given reservation (status: {status:?})")]
    HolderMismatch {
        status: CopyStatus,
        holder: Option<HolderRef>,
    },

    /// ストレージのエラー
    #[error("Ledger storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// 占有の証明
///
/// acquire成功の戻り値。資料と占有者、遷移後の状態を持つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub copy_id: CopyId,
    pub holder: HolderRef,
    pub status: CopyStatus,
}

/// 管理上の退避先状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetAsideStatus {
    Maintenance,
    Lost,
}

/// 可用性台帳ポート
///
/// 「いま誰がこの資料に第一請求権を持つか」の唯一の権威。
/// 資料のstatus遷移はすべてこのポートを経由する。
///
/// 並行性契約：同一資料に対するacquire/releaseは相互排他で実行される
/// （資料単位のロック、または期待状態を条件にした単一書き込み
/// トランザクション）。二重貸出の防止はこのポートの責務。
#[async_trait]
pub trait AvailabilityLedger: Send + Sync {
    /// 資料の占有を取得する
    ///
    /// 資料がAvailableの場合のみ成功し、占有者の種別に応じて
    /// Borrowed（貸出）または Reserved（受取待ち）へ原子的に遷移する。
    /// それ以外は`Unavailable`（現在の状態と占有者を含む）。
    async fn acquire(
        &self,
        copy_id: CopyId,
        holder: HolderRef,
        at: DateTime<Utc>,
    ) -> Result<Lease>;

    /// 資料の占有を解放しAvailableへ戻す
    ///
    /// 冪等：既にAvailableなら何もせず`false`を返す。`true`は状態が実際に
    /// Availableへ遷移したことを示し、予約カスケードの唯一のトリガーと
    /// なる。Maintenance/Lostからの復帰にも使用される。
    async fn release(&self, copy_id: CopyId, at: DateTime<Utc>) -> Result<bool>;

    /// 受取待ちの予約の占有を貸出占有へ昇格する（Reserved → Borrowed）
    ///
    /// 資料が指定された予約に占有されている場合のみ成功する。
    /// 予約履行時に使用され、解放を挟まないため他者の割り込みが起きない。
    async fn promote_hold(
        &self,
        copy_id: CopyId,
        reservation_id: ReservationId,
        borrower_id: BorrowerId,
        at: DateTime<Utc>,
    ) -> Result<Lease>;

    /// 職員による退避遷移（→ Maintenance / Lost）
    ///
    /// 通常のacquire/releaseを迂回する管理操作。占有者は解放されるが
    /// カスケードは発生しない（資料が利用可能になるわけではない）。
    async fn set_aside(
        &self,
        copy_id: CopyId,
        status: SetAsideStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// 資料の現在の状態と占有者
    async fn status_of(&self, copy_id: CopyId) -> Result<(CopyStatus, Option<HolderRef>)>;
}
