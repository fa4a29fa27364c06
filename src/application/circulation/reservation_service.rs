use chrono::{DateTime, Utc};

use crate::application::errors::{CirculationError, Result};
use crate::application::ServiceDependencies;
use crate::domain::commands::{CancelReservation, FulfillReservation, PlaceReservation};
use crate::domain::reservation::{self, Reservation};
use crate::domain::value_objects::{
    BorrowingId, CopyId, CopyStatus, HolderRef, ReservationId, ReservationStatus,
};
use crate::domain::{borrowing, DomainEvent, ReservationTransitionError};
use crate::ports::LedgerError;

use super::policy_resolver;

fn map_transition_error(e: ReservationTransitionError) -> CirculationError {
    match e {
        ReservationTransitionError::NotPending { current } => CirculationError::InvalidState(
            format!("reservation is not pending (status: {})", current.as_str()),
        ),
        ReservationTransitionError::NotYetExpired => {
            CirculationError::InvalidState("reservation hold has not expired yet".to_string())
        }
    }
}

/// 資料を予約する
///
/// ビジネスルール：
/// - 貸出可能な資料への予約は不可（予約による在庫の抱え込み防止。
///   直接借りるべきなので`UseNormalBorrowInstead`で拒否する）
/// - 整備中・紛失の資料は流通しておらず予約不可
/// - 図書館が稼働中であること
/// - 既存の待ち行列の後ろにreservation_date順で並ぶ。台帳の占有者は
///   既に先頭を反映しているため、ここでは台帳を変更しない
pub async fn place_reservation(
    deps: &ServiceDependencies,
    cmd: PlaceReservation,
) -> Result<ReservationId> {
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

    // 2. 期限切れの待ち行列を片付けてから状態を判定する
    settle_expired_for_copy(deps, cmd.copy_id, cmd.requested_at).await?;

    // 3. 資料が現在貸出可能なら予約ではなく通常の貸出を案内する
    let (status, _holder) = deps.ledger.status_of(cmd.copy_id).await?;
    match status {
        CopyStatus::Available => return Err(CirculationError::UseNormalBorrowInstead),
        CopyStatus::Maintenance | CopyStatus::Lost => {
            return Err(CirculationError::InvalidState(format!(
                "copy is not in circulation (status: {})",
                status.as_str()
            )));
        }
        CopyStatus::Borrowed | CopyStatus::Reserved => {}
    }

    // 4. ドメイン層の純粋関数で予約を生成し、待ち行列に追加
    let (new_reservation, event) = reservation::place_reservation(
        cmd.copy_id,
        copy.book_id,
        cmd.user_id,
        cmd.user_type,
        cmd.requested_at,
        cmd.notes,
        &policy,
    );
    let reservation_id = new_reservation.reservation_id;

    deps.reservations
        .save(new_reservation)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?;

    super::dispatch_notification(deps, cmd.user_id, DomainEvent::ReservationPlaced(event)).await;

    Ok(reservation_id)
}

/// 資料が利用可能になったときのカスケード
///
/// 台帳の解放（返却・予約取消・整備からの復帰）が唯一のトリガー。
/// 待ち行列の先頭から順に：
/// - 期限切れのPending予約はその場で失効させて次へ
/// - 最初の有効な予約を受取待ちへ昇格し、台帳を占有（Reserved）、
///   取置期限を「利用可能になった時点 + 取置日数」で起算し直す
/// - 行列が空なら資料はAvailableのまま
///
/// 冪等：既に他の占有者が付いた後に呼ばれた場合は何もしない。
pub async fn on_copy_released(
    deps: &ServiceDependencies,
    copy_id: CopyId,
    now: DateTime<Utc>,
) -> Result<()> {
    loop {
        let head = deps
            .reservations
            .head_pending_for_copy(copy_id)
            .await
            .map_err(CirculationError::ReservationRepositoryError)?;

        let Some(head) = head else {
            return Ok(());
        };

        // 期限切れの先頭は失効させて次の予約へ
        if reservation::is_expired(&head, now) {
            let (expired, event) =
                reservation::expire_reservation(&head, now).map_err(map_transition_error)?;
            deps.reservations
                .save(expired)
                .await
                .map_err(CirculationError::ReservationRepositoryError)?;
            super::dispatch_notification(deps, head.user_id, DomainEvent::ReservationExpired(event))
                .await;
            continue;
        }

        // 稼働停止中の図書館でもカスケードは継続する（取置期限の起算に必要）
        let policy = policy_resolver::policy_of_copy_any(deps, copy_id).await?;

        let (promoted, event) =
            reservation::promote_reservation(&head, now, &policy).map_err(map_transition_error)?;

        match deps
            .ledger
            .acquire(
                copy_id,
                HolderRef::Hold {
                    reservation_id: promoted.reservation_id,
                    user_id: promoted.user_id,
                },
                now,
            )
            .await
        {
            Ok(_) => {
                deps.reservations
                    .save(promoted)
                    .await
                    .map_err(CirculationError::ReservationRepositoryError)?;
                super::dispatch_notification(
                    deps,
                    head.user_id,
                    DomainEvent::ReservationHoldStarted(event),
                )
                .await;
                return Ok(());
            }
            // 並行する操作が先に占有した。予約は行列に残り、次の解放で昇格する
            Err(LedgerError::Unavailable { .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

/// 予約を履行する（職員による現物受け渡しの確認）
///
/// ビジネスルール：
/// - 予約がPendingで、資料がこの予約に占有（受取待ち）であること
/// - 履行は貸出の作成なので、貸出上限と図書館の稼働状態を確認する
/// - 台帳はReserved→Borrowedへ解放を挟まず昇格し、割り込みを防ぐ
///
/// 履行された予約は必ず対応するBorrowingを持つ（両者は連動する）。
pub async fn fulfill_reservation(
    deps: &ServiceDependencies,
    cmd: FulfillReservation,
) -> Result<BorrowingId> {
    let current = deps
        .reservations
        .get(cmd.reservation_id)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?
        .ok_or(CirculationError::ReservationNotFound)?;

    // 遅延評価：取置期限を過ぎた予約は履行ではなく失効させる
    if reservation::is_expired(&current, cmd.fulfilled_at) {
        expire_and_cascade(deps, &current, cmd.fulfilled_at).await?;
        return Err(CirculationError::InvalidState(
            "reservation hold has expired".to_string(),
        ));
    }

    if current.status != ReservationStatus::Pending {
        return Err(CirculationError::InvalidState(format!(
            "reservation is not pending (status: {})",
            current.status.as_str()
        )));
    }

    let library = deps
        .catalog
        .library_of_copy(current.copy_id)
        .await?
        .ok_or(CirculationError::LibraryNotFound)?;

    let policy = policy_resolver::active_policy(&library)?;

    // 履行も貸出の一種：上限確認
    let open_count = deps
        .borrowings
        .count_open_for_borrower(current.user_id, library.library_id)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?;

    if open_count >= policy.max_borrow_limit() {
        return Err(CirculationError::LimitExceeded {
            limit: policy.max_borrow_limit(),
        });
    }

    // 台帳の昇格（この予約が占有していなければHolderMismatch → InvalidState）
    deps.ledger
        .promote_hold(
            current.copy_id,
            current.reservation_id,
            current.user_id,
            cmd.fulfilled_at,
        )
        .await?;

    let (fulfilled, event) = reservation::fulfill_reservation(&current, cmd.fulfilled_at)
        .map_err(map_transition_error)?;

    deps.reservations
        .save(fulfilled)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?;

    // 履行された予約は必ず貸出レコードを生む
    let (new_borrowing, borrow_event) = borrowing::borrow_copy(
        current.copy_id,
        current.user_id,
        current.user_type,
        cmd.fulfilled_at,
        &policy,
    );
    let borrowing_id = new_borrowing.borrowing_id;

    deps.borrowings
        .save(new_borrowing)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?;

    super::dispatch_notification(
        deps,
        current.user_id,
        DomainEvent::ReservationFulfilled(event),
    )
    .await;
    super::dispatch_notification(
        deps,
        current.user_id,
        DomainEvent::CopyBorrowed(borrow_event),
    )
    .await;

    Ok(borrowing_id)
}

/// 予約を取り消す
///
/// Pendingの間のみ可能。この予約が資料を占有していた場合は台帳を解放し、
/// 次の待ち行列へカスケードする。
pub async fn cancel_reservation(deps: &ServiceDependencies, cmd: CancelReservation) -> Result<()> {
    let current = deps
        .reservations
        .get(cmd.reservation_id)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?
        .ok_or(CirculationError::ReservationNotFound)?;

    let (cancelled, event) = reservation::cancel_reservation(&current, cmd.cancelled_at)
        .map_err(map_transition_error)?;

    deps.reservations
        .save(cancelled)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?;

    super::dispatch_notification(
        deps,
        current.user_id,
        DomainEvent::ReservationCancelled(event),
    )
    .await;

    release_if_held_by(deps, &current, cmd.cancelled_at).await
}

/// 予約を取得する（遅延評価付き）
///
/// 取置期限を過ぎたPending予約は読み取りの時点で失効し、
/// 取消と同じカスケードで次の予約を昇格させる。
pub async fn get_reservation(
    deps: &ServiceDependencies,
    reservation_id: ReservationId,
    now: DateTime<Utc>,
) -> Result<Reservation> {
    let current = deps
        .reservations
        .get(reservation_id)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?
        .ok_or(CirculationError::ReservationNotFound)?;

    if reservation::is_expired(&current, now) {
        let expired = expire_and_cascade(deps, &current, now).await?;
        return Ok(expired);
    }

    Ok(current)
}

/// 資料の待ち行列ビュー（reservation_date順、遅延評価済み）
pub async fn list_queue_for_copy(
    deps: &ServiceDependencies,
    copy_id: CopyId,
    now: DateTime<Utc>,
) -> Result<Vec<Reservation>> {
    // 資料の存在確認
    deps.catalog
        .get_copy(copy_id)
        .await?
        .ok_or(CirculationError::CopyNotFound)?;

    settle_expired_for_copy(deps, copy_id, now).await?;

    deps.reservations
        .pending_for_copy(copy_id)
        .await
        .map_err(CirculationError::ReservationRepositoryError)
}

/// 取置期限切れの一括処理（定期バッチ）
///
/// 冪等：候補はロック下で状態を再確認してから失効させるため、
/// 利用者起点の遷移と並行して安全に実行できる。
///
/// # 戻り値
/// 失効させた予約の件数
pub async fn sweep_expired_reservations(
    deps: &ServiceDependencies,
    now: DateTime<Utc>,
) -> Result<usize> {
    let candidates = deps
        .reservations
        .find_expired_candidates(now)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?;

    let mut expired_count = 0;

    for candidate in candidates {
        // 候補抽出後に状態が変わっていることがあるため取り直す
        let current = deps
            .reservations
            .get(candidate.reservation_id)
            .await
            .map_err(CirculationError::ReservationRepositoryError)?;

        let Some(current) = current else { continue };

        if !reservation::is_expired(&current, now) {
            continue;
        }

        expire_and_cascade(deps, &current, now).await?;
        expired_count += 1;
    }

    Ok(expired_count)
}

/// 資料の待ち行列から期限切れの先頭を片付けるヘルパー関数
///
/// 貸出・予約の前段で呼ばれる遅延評価。先頭が占有していた場合は
/// 解放カスケードまで実行する。
pub(super) async fn settle_expired_for_copy(
    deps: &ServiceDependencies,
    copy_id: CopyId,
    now: DateTime<Utc>,
) -> Result<()> {
    loop {
        let head = deps
            .reservations
            .head_pending_for_copy(copy_id)
            .await
            .map_err(CirculationError::ReservationRepositoryError)?;

        let Some(head) = head else { return Ok(()) };

        if !reservation::is_expired(&head, now) {
            return Ok(());
        }

        expire_and_cascade(deps, &head, now).await?;
    }
}

/// 予約を失効させ、必要なら解放カスケードを実行するヘルパー関数
async fn expire_and_cascade(
    deps: &ServiceDependencies,
    current: &Reservation,
    now: DateTime<Utc>,
) -> Result<Reservation> {
    let (expired, event) =
        reservation::expire_reservation(current, now).map_err(map_transition_error)?;

    deps.reservations
        .save(expired.clone())
        .await
        .map_err(CirculationError::ReservationRepositoryError)?;

    super::dispatch_notification(deps, current.user_id, DomainEvent::ReservationExpired(event))
        .await;

    release_if_held_by(deps, current, now).await?;

    Ok(expired)
}

/// この予約が台帳上の占有者だった場合のみ解放してカスケードする
///
/// 行列の後方にいた予約（占有なし）の終了では台帳に触れない。
async fn release_if_held_by(
    deps: &ServiceDependencies,
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<()> {
    let (_status, holder) = deps.ledger.status_of(reservation.copy_id).await?;

    let held_by_this = matches!(
        holder,
        Some(HolderRef::Hold { reservation_id, .. }) if reservation_id == reservation.reservation_id
    );

    if !held_by_this {
        return Ok(());
    }

    let released = deps.ledger.release(reservation.copy_id, now).await?;

    if released {
        on_copy_released(deps, reservation.copy_id, now).await?;
    }

    Ok(())
}
