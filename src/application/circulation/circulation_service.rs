use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::application::errors::{CirculationError, Result};
use crate::application::ServiceDependencies;
use crate::domain::borrowing::{self, Borrowing};
use crate::domain::commands::{BorrowCopy, MarkCopyLost, MarkFinePaid, ReturnCopy};
use crate::domain::policy::LendingPolicy;
use crate::domain::value_objects::{
    BorrowerId, BorrowerType, BorrowingId, BorrowingStatus, CopyId, HolderRef,
};
use crate::domain::{DomainEvent, FinePaymentError, MarkLostError, ReturnCopyError};
use crate::ports::{SetAsideStatus, UserProfile};

use super::{policy_resolver, reservation_service};

/// 貸出ビュー
///
/// ステータスと延滞料金は保存値ではなく読み取り時点の導出値。
/// バッチの実行有無が読み取り結果に影響しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowingView {
    pub borrowing_id: BorrowingId,
    pub copy_id: CopyId,
    pub borrower_id: BorrowerId,
    pub borrower_type: BorrowerType,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: BorrowingStatus,
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 貸出詳細（表示用の利用者プロフィール付き）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowingDetails {
    pub view: BorrowingView,
    pub borrower: Option<UserProfile>,
}

/// 貸出集約からビューを構築するヘルパー関数
///
/// 未返却の貸出は現在時刻から実効ステータスと延滞料金を再計算する。
pub(super) fn build_borrowing_view(
    b: &Borrowing,
    policy: &LendingPolicy,
    now: DateTime<Utc>,
) -> BorrowingView {
    BorrowingView {
        borrowing_id: b.borrowing_id,
        copy_id: b.copy_id,
        borrower_id: b.borrower_id,
        borrower_type: b.borrower_type,
        borrowed_at: b.borrowed_at,
        due_date: b.due_date,
        returned_at: b.returned_at,
        status: borrowing::effective_status(b, now),
        fine_amount: borrowing::accrued_fine(b, policy, now),
        fine_paid: b.fine_paid,
        created_at: b.created_at,
        updated_at: b.updated_at,
    }
}

/// 資料を貸し出す
///
/// ビジネスルール：
/// - 図書館が稼働中であること
/// - 利用者の貸出冊数が図書館の上限未満であること
/// - 他の利用者のPending予約がないこと（予約優先は絶対）
/// - 台帳で資料がAvailableであること
///
/// 予約保持者本人の貸出は履行フロー（fulfill）を通すこと。
/// 失敗した貸出は保存状態を一切変更しない。
pub async fn borrow_copy(deps: &ServiceDependencies, cmd: BorrowCopy) -> Result<BorrowingId> {
    // 1. 資料と所属図書館のポリシーを解決
    let copy = deps
        .catalog
        .get_copy(cmd.copy_id)
        .await?
        .ok_or(CirculationError::CopyNotFound)?;

    let library = deps
        .catalog
        .library_of_copy(cmd.copy_id)
        .await?
        .ok_or(CirculationError::LibraryNotFound)?;

    let policy = policy_resolver::active_policy(&library)?;

    // 2. 期限切れのPending予約を遅延評価で片付けてから優先権を判定する
    reservation_service::settle_expired_for_copy(deps, cmd.copy_id, cmd.borrowed_at).await?;

    // 3. 貸出上限確認（図書館ごとの設定）
    let open_count = deps
        .borrowings
        .count_open_for_borrower(cmd.borrower_id, library.library_id)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?;

    if open_count >= policy.max_borrow_limit() {
        return Err(CirculationError::LimitExceeded {
            limit: policy.max_borrow_limit(),
        });
    }

    // 4. 予約優先の確認：待ち行列があれば飛び込みの貸出は不可
    if let Some(head) = deps
        .reservations
        .head_pending_for_copy(cmd.copy_id)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?
    {
        if head.user_id != cmd.borrower_id {
            return Err(CirculationError::ReservedByOther);
        }
        return Err(CirculationError::InvalidState(
            "copy is held for this borrower's reservation; fulfill the reservation instead"
                .to_string(),
        ));
    }

    // 5. 台帳の占有を取得（Available → Borrowed、原子的）
    deps.ledger
        .acquire(
            cmd.copy_id,
            HolderRef::Borrower {
                borrower_id: cmd.borrower_id,
            },
            cmd.borrowed_at,
        )
        .await?;

    // 6. ドメイン層の純粋関数で貸出を生成
    let (new_borrowing, event) = borrowing::borrow_copy(
        copy.copy_id,
        cmd.borrower_id,
        cmd.borrower_type,
        cmd.borrowed_at,
        &policy,
    );
    let borrowing_id = new_borrowing.borrowing_id;

    // 7. 保存。失敗時は取得済みの占有を解放して失敗を伝搬する
    if let Err(e) = deps.borrowings.save(new_borrowing).await {
        if let Err(release_err) = deps.ledger.release(cmd.copy_id, cmd.borrowed_at).await {
            tracing::error!(
                copy_id = %cmd.copy_id.value(),
                error = %release_err,
                "failed to release copy after borrow persistence failure"
            );
        }
        return Err(CirculationError::BorrowingRepositoryError(e));
    }

    super::dispatch_notification(deps, cmd.borrower_id, DomainEvent::CopyBorrowed(event)).await;

    Ok(borrowing_id)
}

/// 資料を返却する
///
/// ビジネスルール：
/// - 延滞していても返却は受け付ける（延滞料金を確定）
/// - 図書館が稼働停止中でも返却は受け付ける
/// - 返却後、台帳の解放をトリガーに予約カスケードを実行する
pub async fn return_copy(deps: &ServiceDependencies, cmd: ReturnCopy) -> Result<()> {
    // 1. 貸出を取得
    let current = deps
        .borrowings
        .get(cmd.borrowing_id)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?
        .ok_or(CirculationError::BorrowingNotFound)?;

    // 2. 稼働状態に関わらずポリシーを解決（延滞料金の計算に必要）
    let policy = policy_resolver::policy_of_copy_any(deps, current.copy_id).await?;

    // 3. ドメイン層の純粋関数で返却を処理
    let (returned, event) =
        borrowing::return_copy(&current, cmd.returned_at, &policy).map_err(|e| match e {
            ReturnCopyError::AlreadyReturned => {
                CirculationError::InvalidState("borrowing is already returned".to_string())
            }
            ReturnCopyError::MarkedLost => {
                CirculationError::InvalidState("borrowing is marked lost".to_string())
            }
            ReturnCopyError::ReturnedBeforeBorrowed => CirculationError::InvalidState(
                "return date precedes the borrow date".to_string(),
            ),
        })?;

    deps.borrowings
        .save(returned)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?;

    // 4. 台帳を解放し、実際に解放された場合のみ予約カスケードを起動
    let released = deps.ledger.release(current.copy_id, cmd.returned_at).await?;

    if released {
        reservation_service::on_copy_released(deps, current.copy_id, cmd.returned_at).await?;
    }

    super::dispatch_notification(deps, current.borrower_id, DomainEvent::CopyReturned(event))
        .await;

    Ok(())
}

/// 貸出中の資料を紛失として処理する
///
/// 終端状態。台帳上の資料はLostへ退避され、解放カスケードは発生しない。
pub async fn mark_lost(deps: &ServiceDependencies, cmd: MarkCopyLost) -> Result<()> {
    let current = deps
        .borrowings
        .get(cmd.borrowing_id)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?
        .ok_or(CirculationError::BorrowingNotFound)?;

    let policy = policy_resolver::policy_of_copy_any(deps, current.copy_id).await?;

    let (lost, event) =
        borrowing::mark_lost(&current, cmd.marked_at, &policy).map_err(|e| match e {
            MarkLostError::AlreadyReturned => {
                CirculationError::InvalidState("borrowing is already returned".to_string())
            }
            MarkLostError::AlreadyLost => {
                CirculationError::InvalidState("borrowing is already marked lost".to_string())
            }
        })?;

    deps.borrowings
        .save(lost)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?;

    deps.ledger
        .set_aside(current.copy_id, SetAsideStatus::Lost, cmd.marked_at)
        .await?;

    super::dispatch_notification(
        deps,
        current.borrower_id,
        DomainEvent::BorrowingMarkedLost(event),
    )
    .await;

    Ok(())
}

/// 延滞料金を支払済みにする
///
/// 回収そのものは範囲外。確定した料金のフラグ操作のみ。
pub async fn mark_fine_paid(deps: &ServiceDependencies, cmd: MarkFinePaid) -> Result<()> {
    let current = deps
        .borrowings
        .get(cmd.borrowing_id)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?
        .ok_or(CirculationError::BorrowingNotFound)?;

    let paid = borrowing::mark_fine_paid(&current, cmd.paid_at).map_err(|e| match e {
        FinePaymentError::StillOpen => CirculationError::InvalidState(
            "fine is not final while the borrowing is open".to_string(),
        ),
        FinePaymentError::AlreadyPaid => {
            CirculationError::InvalidState("fine is already paid".to_string())
        }
    })?;

    deps.borrowings
        .save(paid)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?;

    Ok(())
}

/// 貸出詳細を取得する（実効ステータス・投影料金・利用者プロフィール付き）
pub async fn get_borrowing(
    deps: &ServiceDependencies,
    borrowing_id: BorrowingId,
    now: DateTime<Utc>,
) -> Result<BorrowingDetails> {
    let current = deps
        .borrowings
        .get(borrowing_id)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?
        .ok_or(CirculationError::BorrowingNotFound)?;

    let policy = policy_resolver::policy_of_copy_any(deps, current.copy_id).await?;
    let view = build_borrowing_view(&current, &policy, now);

    // 表示の補完のみ。ディレクトリ障害で貸出の読み取りは失敗させない。
    let borrower = match deps.user_directory.get_user(current.borrower_id).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(
                borrower_id = %current.borrower_id.value(),
                error = %e,
                "user directory lookup failed; returning borrowing without profile"
            );
            None
        }
    };

    Ok(BorrowingDetails { view, borrower })
}

/// 利用者の貸出一覧（オプションで実効ステータス絞り込み）
pub async fn list_borrowings(
    deps: &ServiceDependencies,
    borrower_id: BorrowerId,
    status_filter: Option<BorrowingStatus>,
    now: DateTime<Utc>,
) -> Result<Vec<BorrowingView>> {
    let borrowings = deps
        .borrowings
        .find_by_borrower(borrower_id)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?;

    let mut views = Vec::with_capacity(borrowings.len());
    for b in &borrowings {
        let policy = policy_resolver::policy_of_copy_any(deps, b.copy_id).await?;
        let view = build_borrowing_view(b, &policy, now);
        if status_filter.is_none() || status_filter == Some(view.status) {
            views.push(view);
        }
    }

    Ok(views)
}

/// 資料を整備中へ退避する（職員操作）
///
/// 通常のacquire/releaseを迂回する管理上の遷移。占有者は解放されるが、
/// 資料が利用可能になるわけではないのでカスケードしない。
pub async fn set_copy_maintenance(
    deps: &ServiceDependencies,
    copy_id: CopyId,
    at: DateTime<Utc>,
) -> Result<()> {
    deps.ledger
        .set_aside(copy_id, SetAsideStatus::Maintenance, at)
        .await?;
    Ok(())
}

/// 資料を整備から復帰させる（職員操作）
///
/// 台帳の解放として扱い、待ち行列があれば予約カスケードを起動する。
pub async fn reinstate_copy(
    deps: &ServiceDependencies,
    copy_id: CopyId,
    at: DateTime<Utc>,
) -> Result<()> {
    let released = deps.ledger.release(copy_id, at).await?;

    if released {
        reservation_service::on_copy_released(deps, copy_id, at).await?;
    }

    Ok(())
}
