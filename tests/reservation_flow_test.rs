use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use library_circulation::application::circulation::{
    borrow_copy, cancel_reservation, fulfill_reservation, get_borrowing, get_reservation,
    list_queue_for_copy, place_reservation, reinstate_copy, return_copy, set_copy_maintenance,
    sweep_expired_reservations,
};
use library_circulation::application::CirculationError;
use library_circulation::domain::commands::{
    BorrowCopy, CancelReservation, FulfillReservation, PlaceReservation, ReturnCopy,
};
use library_circulation::domain::value_objects::{
    BorrowerId, BorrowerType, BorrowingStatus, CopyId, CopyStatus, HolderRef, ReservationStatus,
};
use library_circulation::domain::DomainEvent;
use library_circulation::ports::AvailabilityLedger;

mod common;

async fn borrow(
    ctx: &common::TestContext,
    copy_id: CopyId,
    borrower_id: BorrowerId,
    at: chrono::DateTime<Utc>,
) -> library_circulation::domain::value_objects::BorrowingId {
    borrow_copy(
        &ctx.deps,
        BorrowCopy {
            copy_id,
            borrower_id,
            borrower_type: BorrowerType::Student,
            borrowed_at: at,
        },
    )
    .await
    .unwrap()
}

async fn reserve(
    ctx: &common::TestContext,
    copy_id: CopyId,
    user_id: BorrowerId,
    at: chrono::DateTime<Utc>,
) -> library_circulation::domain::value_objects::ReservationId {
    place_reservation(
        &ctx.deps,
        PlaceReservation {
            copy_id,
            user_id,
            user_type: BorrowerType::Student,
            requested_at: at,
            notes: String::new(),
        },
    )
    .await
    .unwrap()
}

// ============================================================================
// 予約の作成
// ============================================================================

#[tokio::test]
async fn test_reserve_available_copy_is_rejected() {
    // 貸出可能な資料は予約ではなく直接借りるべき
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    let result = place_reservation(
        &ctx.deps,
        PlaceReservation {
            copy_id,
            user_id: BorrowerId::new(),
            user_type: BorrowerType::Student,
            requested_at: now,
            notes: String::new(),
        },
    )
    .await;

    assert!(matches!(
        result.unwrap_err(),
        CirculationError::UseNormalBorrowInstead
    ));
}

#[tokio::test]
async fn test_reserve_borrowed_copy_queues_pending() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    borrow(&ctx, copy_id, BorrowerId::new(), now).await;

    let user_id = BorrowerId::new();
    let reservation_id = reserve(&ctx, copy_id, user_id, now + Duration::hours(1)).await;

    let reservation = get_reservation(&ctx.deps, reservation_id, now + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(
        reservation.expiry_date,
        now + Duration::hours(1) + Duration::days(3)
    );

    // 待ち行列は1件、台帳の占有者は貸出中の利用者のまま
    let queue = list_queue_for_copy(&ctx.deps, copy_id, now + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(queue.len(), 1);

    let (status, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(status, CopyStatus::Borrowed);
    assert!(matches!(holder, Some(HolderRef::Borrower { .. })));
}

// ============================================================================
// シナリオC：予約 → 返却で昇格 → 履行で貸出作成
// ============================================================================

#[tokio::test]
async fn test_scenario_c_reserve_promote_fulfill() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    // U1が借りる、U2が予約する
    let u1 = BorrowerId::new();
    let u2 = BorrowerId::new();
    let borrowing_u1 = borrow(&ctx, copy_id, u1, now).await;
    let reservation_id = reserve(&ctx, copy_id, u2, now + Duration::hours(1)).await;

    // U1が返却 → 予約が受取待ちに昇格し、取置期限が返却時点から起算し直される
    // （待ち行列上の予約自身の期限が切れる前に返ってくるケース）
    let returned_at = now + Duration::days(2);
    return_copy(
        &ctx.deps,
        ReturnCopy {
            borrowing_id: borrowing_u1,
            returned_at,
        },
    )
    .await
    .unwrap();

    let reservation = get_reservation(&ctx.deps, reservation_id, returned_at)
        .await
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(reservation.expiry_date, returned_at + Duration::days(3));

    // 台帳はU2の予約が占有（Reserved）
    let (status, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(status, CopyStatus::Reserved);
    assert_eq!(
        holder,
        Some(HolderRef::Hold {
            reservation_id,
            user_id: u2
        })
    );

    // 「予約の資料が用意できた」通知が送られている
    assert!(ctx.notifications.sent().iter().any(|(user, event)| {
        *user == u2 && matches!(event, DomainEvent::ReservationHoldStarted(_))
    }));

    // 職員が履行 → 予約はFulfilled、U2の貸出が作成される
    let fulfilled_at = returned_at + Duration::days(1);
    let borrowing_u2 = fulfill_reservation(
        &ctx.deps,
        FulfillReservation {
            reservation_id,
            fulfilled_at,
        },
    )
    .await
    .unwrap();

    let reservation = get_reservation(&ctx.deps, reservation_id, fulfilled_at)
        .await
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Fulfilled);
    assert_eq!(reservation.fulfilled_at, Some(fulfilled_at));

    let details = get_borrowing(&ctx.deps, borrowing_u2, fulfilled_at)
        .await
        .unwrap();
    assert_eq!(details.view.borrower_id, u2);
    assert_eq!(details.view.status, BorrowingStatus::Borrowed);
    assert_eq!(details.view.due_date, fulfilled_at + Duration::days(14));

    let (status, _) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(status, CopyStatus::Borrowed);
}

// ============================================================================
// 予約優先
// ============================================================================

#[tokio::test]
async fn test_walk_up_borrow_blocked_by_other_users_reservation() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    let u1 = BorrowerId::new();
    let u2 = BorrowerId::new();
    let borrowing_u1 = borrow(&ctx, copy_id, u1, now).await;
    reserve(&ctx, copy_id, u2, now + Duration::hours(1)).await;

    return_copy(
        &ctx.deps,
        ReturnCopy {
            borrowing_id: borrowing_u1,
            returned_at: now + Duration::days(1),
        },
    )
    .await
    .unwrap();

    // 第三者の飛び込み貸出は予約優先で拒否される
    let result = borrow_copy(
        &ctx.deps,
        BorrowCopy {
            copy_id,
            borrower_id: BorrowerId::new(),
            borrower_type: BorrowerType::Student,
            borrowed_at: now + Duration::days(2),
        },
    )
    .await;
    assert!(matches!(
        result.unwrap_err(),
        CirculationError::ReservedByOther
    ));

    // 予約保持者本人の飛び込みは履行フローへ誘導される
    let result = borrow_copy(
        &ctx.deps,
        BorrowCopy {
            copy_id,
            borrower_id: u2,
            borrower_type: BorrowerType::Student,
            borrowed_at: now + Duration::days(2),
        },
    )
    .await;
    assert!(matches!(
        result.unwrap_err(),
        CirculationError::InvalidState(_)
    ));
}

#[tokio::test]
async fn test_fulfill_requires_ledger_hold() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    let u1 = BorrowerId::new();
    let u2 = BorrowerId::new();
    borrow(&ctx, copy_id, u1, now).await;
    let reservation_id = reserve(&ctx, copy_id, u2, now + Duration::hours(1)).await;

    // まだ返却されておらず、予約は資料を占有していない
    let result = fulfill_reservation(
        &ctx.deps,
        FulfillReservation {
            reservation_id,
            fulfilled_at: now + Duration::days(1),
        },
    )
    .await;

    assert!(matches!(
        result.unwrap_err(),
        CirculationError::InvalidState(_)
    ));
}

// ============================================================================
// FIFO順の昇格
// ============================================================================

#[tokio::test]
async fn test_reservations_served_in_fifo_order() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    let u1 = BorrowerId::new();
    let u2 = BorrowerId::new();
    let u3 = BorrowerId::new();

    let borrowing_u1 = borrow(&ctx, copy_id, u1, now).await;
    let res_u2 = reserve(&ctx, copy_id, u2, now + Duration::hours(1)).await;
    let res_u3 = reserve(&ctx, copy_id, u3, now + Duration::hours(2)).await;

    let queue = list_queue_for_copy(&ctx.deps, copy_id, now + Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].reservation_id, res_u2);
    assert_eq!(queue[1].reservation_id, res_u3);

    // 返却 → 最古の予約（U2）が昇格
    let returned_at = now + Duration::days(1);
    return_copy(
        &ctx.deps,
        ReturnCopy {
            borrowing_id: borrowing_u1,
            returned_at,
        },
    )
    .await
    .unwrap();

    let (_, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(
        holder,
        Some(HolderRef::Hold {
            reservation_id: res_u2,
            user_id: u2
        })
    );

    // U2が履行して借り、さらに返却 → 次はU3
    let borrowing_u2 = fulfill_reservation(
        &ctx.deps,
        FulfillReservation {
            reservation_id: res_u2,
            fulfilled_at: returned_at + Duration::hours(1),
        },
    )
    .await
    .unwrap();

    return_copy(
        &ctx.deps,
        ReturnCopy {
            borrowing_id: borrowing_u2,
            returned_at: returned_at + Duration::days(1),
        },
    )
    .await
    .unwrap();

    let (_, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(
        holder,
        Some(HolderRef::Hold {
            reservation_id: res_u3,
            user_id: u3
        })
    );
}

#[tokio::test]
async fn test_cancel_holding_reservation_cascades_to_next() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    let u1 = BorrowerId::new();
    let u2 = BorrowerId::new();
    let u3 = BorrowerId::new();

    let borrowing_u1 = borrow(&ctx, copy_id, u1, now).await;
    let res_u2 = reserve(&ctx, copy_id, u2, now + Duration::hours(1)).await;
    let res_u3 = reserve(&ctx, copy_id, u3, now + Duration::hours(2)).await;

    return_copy(
        &ctx.deps,
        ReturnCopy {
            borrowing_id: borrowing_u1,
            returned_at: now + Duration::days(1),
        },
    )
    .await
    .unwrap();

    // 占有中のU2が取消 → U3へカスケード
    cancel_reservation(
        &ctx.deps,
        CancelReservation {
            reservation_id: res_u2,
            cancelled_at: now + Duration::days(1) + Duration::hours(1),
        },
    )
    .await
    .unwrap();

    let reservation = get_reservation(&ctx.deps, res_u2, now + Duration::days(2))
        .await
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Cancelled);

    let (status, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(status, CopyStatus::Reserved);
    assert_eq!(
        holder,
        Some(HolderRef::Hold {
            reservation_id: res_u3,
            user_id: u3
        })
    );
}

#[tokio::test]
async fn test_cancel_queued_reservation_leaves_ledger_untouched() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    let u1 = BorrowerId::new();
    let u2 = BorrowerId::new();
    let u3 = BorrowerId::new();

    let borrowing_u1 = borrow(&ctx, copy_id, u1, now).await;
    let res_u2 = reserve(&ctx, copy_id, u2, now + Duration::hours(1)).await;
    let res_u3 = reserve(&ctx, copy_id, u3, now + Duration::hours(2)).await;

    return_copy(
        &ctx.deps,
        ReturnCopy {
            borrowing_id: borrowing_u1,
            returned_at: now + Duration::days(1),
        },
    )
    .await
    .unwrap();

    // 行列の後方にいるU3が取消しても、U2の占有は変わらない
    cancel_reservation(
        &ctx.deps,
        CancelReservation {
            reservation_id: res_u3,
            cancelled_at: now + Duration::days(1) + Duration::hours(1),
        },
    )
    .await
    .unwrap();

    let (status, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(status, CopyStatus::Reserved);
    assert_eq!(
        holder,
        Some(HolderRef::Hold {
            reservation_id: res_u2,
            user_id: u2
        })
    );
}

// ============================================================================
// 冪等な解放
// ============================================================================

#[tokio::test]
async fn test_release_twice_is_noop_without_spurious_cascade() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    let borrowing_id = borrow(&ctx, copy_id, BorrowerId::new(), now).await;
    return_copy(
        &ctx.deps,
        ReturnCopy {
            borrowing_id,
            returned_at: now + Duration::days(1),
        },
    )
    .await
    .unwrap();

    // 既にAvailable：二度目の解放は何も起こさない
    let released = ctx
        .store
        .release(copy_id, now + Duration::days(1))
        .await
        .unwrap();
    assert!(!released);

    let (status, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(status, CopyStatus::Available);
    assert!(holder.is_none());
}

// ============================================================================
// シナリオD：取置期限切れの遅延評価とカスケード
// ============================================================================

#[tokio::test]
async fn test_scenario_d_lazy_expiry_promotes_next_in_queue() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    let u1 = BorrowerId::new();
    let u2 = BorrowerId::new();
    let u3 = BorrowerId::new();

    let borrowing_u1 = borrow(&ctx, copy_id, u1, now).await;
    let res_u2 = reserve(&ctx, copy_id, u2, now + Duration::hours(1)).await;

    let returned_at = now + Duration::days(1);
    return_copy(
        &ctx.deps,
        ReturnCopy {
            borrowing_id: borrowing_u1,
            returned_at,
        },
    )
    .await
    .unwrap();

    // U2が受取待ちの間（Reserved）にU3が行列へ並ぶ
    let res_u3 = reserve(&ctx, copy_id, u3, returned_at + Duration::days(2)).await;

    // U2の取置期限（returned_at + 3日）が過ぎてから読む。
    // U3自身の期限（returned_at + 2日 + 3日）はまだ先。
    let later = returned_at + Duration::days(3) + Duration::hours(12);
    let reservation = get_reservation(&ctx.deps, res_u2, later).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Expired);

    // 次のU3が昇格し、取置期限は失効処理の時点から起算
    let next = get_reservation(&ctx.deps, res_u3, later).await.unwrap();
    assert_eq!(next.status, ReservationStatus::Pending);
    assert_eq!(next.expiry_date, later + Duration::days(3));

    let (status, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(status, CopyStatus::Reserved);
    assert_eq!(
        holder,
        Some(HolderRef::Hold {
            reservation_id: res_u3,
            user_id: u3
        })
    );

    // 失効した予約は履行できない
    let result = fulfill_reservation(
        &ctx.deps,
        FulfillReservation {
            reservation_id: res_u2,
            fulfilled_at: later,
        },
    )
    .await;
    assert!(matches!(
        result.unwrap_err(),
        CirculationError::InvalidState(_)
    ));
}

#[tokio::test]
async fn test_expiry_sweep_is_idempotent() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    let u1 = BorrowerId::new();
    let u2 = BorrowerId::new();

    let borrowing_u1 = borrow(&ctx, copy_id, u1, now).await;
    let res_u2 = reserve(&ctx, copy_id, u2, now + Duration::hours(1)).await;

    let returned_at = now + Duration::days(1);
    return_copy(
        &ctx.deps,
        ReturnCopy {
            borrowing_id: borrowing_u1,
            returned_at,
        },
    )
    .await
    .unwrap();

    let later = returned_at + Duration::days(4);
    let expired = sweep_expired_reservations(&ctx.deps, later).await.unwrap();
    assert_eq!(expired, 1);

    // 行列が空なので資料はAvailableへ戻る
    let (status, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(status, CopyStatus::Available);
    assert!(holder.is_none());

    // 二度目の実行は何もしない
    let expired = sweep_expired_reservations(&ctx.deps, later).await.unwrap();
    assert_eq!(expired, 0);

    let reservation = get_reservation(&ctx.deps, res_u2, later).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Expired);
}

// ============================================================================
// 整備退避と復帰
// ============================================================================

#[tokio::test]
async fn test_maintenance_clears_hold_and_reinstate_cascades() {
    let ctx = common::build_context();
    let now = Utc::now();
    let (_, _, copy_id) =
        common::seed_library_with_copy(&ctx.deps, 5, 14, dec!(2.00), 3, now).await;

    let u1 = BorrowerId::new();
    let u2 = BorrowerId::new();

    let borrowing_u1 = borrow(&ctx, copy_id, u1, now).await;
    let res_u2 = reserve(&ctx, copy_id, u2, now + Duration::hours(1)).await;

    return_copy(
        &ctx.deps,
        ReturnCopy {
            borrowing_id: borrowing_u1,
            returned_at: now + Duration::days(1),
        },
    )
    .await
    .unwrap();

    // 受取待ちの占有があっても職員は整備へ退避できる（占有は解放される）
    set_copy_maintenance(&ctx.deps, copy_id, now + Duration::days(1) + Duration::hours(1))
        .await
        .unwrap();

    let (status, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(status, CopyStatus::Maintenance);
    assert!(holder.is_none());

    // 予約は行列に残っている
    let reservation = get_reservation(
        &ctx.deps,
        res_u2,
        now + Duration::days(1) + Duration::hours(2),
    )
    .await
    .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);

    // 復帰すると解放として扱われ、待ち行列へカスケードする
    let reinstated_at = now + Duration::days(2);
    reinstate_copy(&ctx.deps, copy_id, reinstated_at).await.unwrap();

    let (status, holder) = ctx.store.status_of(copy_id).await.unwrap();
    assert_eq!(status, CopyStatus::Reserved);
    assert_eq!(
        holder,
        Some(HolderRef::Hold {
            reservation_id: res_u2,
            user_id: u2
        })
    );

    // 取置期限は復帰時点から起算し直される
    let reservation = get_reservation(&ctx.deps, res_u2, reinstated_at).await.unwrap();
    assert_eq!(reservation.expiry_date, reinstated_at + Duration::days(3));
}
