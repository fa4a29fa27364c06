use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    BookId, BorrowerId, BorrowerType, CopyId, ReservationCancelled, ReservationExpired,
    ReservationFulfilled, ReservationHoldStarted, ReservationId, ReservationPlaced,
    ReservationStatus, ReservationTransitionError, policy::LendingPolicy,
};

/// 予約集約 - 特定の資料1冊に対する予約
///
/// 予約は資料（コピー）単位であり書誌単位ではない。同じ書誌の貸出可能な
/// 別資料は代替候補として別途提示される。
///
/// 同一資料への複数のPending予約は reservation_date 順のFIFO待ち行列を
/// 成し、先頭のみが台帳上の占有者になり得る。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    // 識別子
    pub reservation_id: ReservationId,

    // 他の集約への参照（IDのみ）
    pub copy_id: CopyId,
    pub user_id: BorrowerId,
    pub user_type: BorrowerType,

    // 予約管理の責務
    pub reservation_date: DateTime<Utc>,
    /// 取置期限。受取待ちへの昇格時に「利用可能になった時点 + 取置日数」で
    /// 起算し直される。
    pub expiry_date: DateTime<Utc>,
    pub status: ReservationStatus,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub notes: String,

    // 監査情報
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 純粋関数：予約を作成する
///
/// ビジネスルール：
/// - 取置期限 = 予約日 + 図書館ごとの取置日数
/// - 状態はPendingから開始
///
/// 副作用なし。資料が貸出可能かどうかの判断はアプリケーション層の責務
/// （貸出可能な資料への予約は受け付けない）。
pub fn place_reservation(
    copy_id: CopyId,
    book_id: BookId,
    user_id: BorrowerId,
    user_type: BorrowerType,
    reserved_at: DateTime<Utc>,
    notes: String,
    policy: &LendingPolicy,
) -> (Reservation, ReservationPlaced) {
    let reservation_id = ReservationId::new();
    let expiry_date = reserved_at + Duration::days(policy.reservation_hold_days());

    let reservation = Reservation {
        reservation_id,
        copy_id,
        user_id,
        user_type,
        reservation_date: reserved_at,
        expiry_date,
        status: ReservationStatus::Pending,
        fulfilled_at: None,
        notes,
        created_at: reserved_at,
        updated_at: reserved_at,
    };

    let event = ReservationPlaced {
        reservation_id,
        copy_id,
        book_id,
        user_id,
        reserved_at,
        expiry_date,
    };

    (reservation, event)
}

/// 純粋関数：予約を受取待ちに昇格する
///
/// ビジネスルール：
/// - Pending状態のみ昇格可能
/// - 取置期限は資料が実際に利用可能になった時点から起算し直す
///   （予約時点からではない）
/// - 状態はPendingのまま（Pending = 受取待ちを含む）。Fulfilledになるのは
///   職員が現物の受け渡しを確認したとき。
pub fn promote_reservation(
    reservation: &Reservation,
    available_at: DateTime<Utc>,
    policy: &LendingPolicy,
) -> Result<(Reservation, ReservationHoldStarted), ReservationTransitionError> {
    ensure_pending(reservation)?;

    let expiry_date = available_at + Duration::days(policy.reservation_hold_days());

    let new_reservation = Reservation {
        expiry_date,
        updated_at: available_at,
        ..reservation.clone()
    };

    let event = ReservationHoldStarted {
        reservation_id: reservation.reservation_id,
        copy_id: reservation.copy_id,
        user_id: reservation.user_id,
        available_at,
        expiry_date,
    };

    Ok((new_reservation, event))
}

/// 純粋関数：予約を履行する
///
/// 職員による現物受け渡しの確認。終端状態Fulfilledへ遷移する。
/// 貸出（Borrowing）の作成はアプリケーション層が台帳の昇格と併せて行う。
pub fn fulfill_reservation(
    reservation: &Reservation,
    fulfilled_at: DateTime<Utc>,
) -> Result<(Reservation, ReservationFulfilled), ReservationTransitionError> {
    ensure_pending(reservation)?;

    let new_reservation = Reservation {
        status: ReservationStatus::Fulfilled,
        fulfilled_at: Some(fulfilled_at),
        updated_at: fulfilled_at,
        ..reservation.clone()
    };

    let event = ReservationFulfilled {
        reservation_id: reservation.reservation_id,
        copy_id: reservation.copy_id,
        user_id: reservation.user_id,
        fulfilled_at,
    };

    Ok((new_reservation, event))
}

/// 純粋関数：予約を取り消す
pub fn cancel_reservation(
    reservation: &Reservation,
    cancelled_at: DateTime<Utc>,
) -> Result<(Reservation, ReservationCancelled), ReservationTransitionError> {
    ensure_pending(reservation)?;

    let new_reservation = Reservation {
        status: ReservationStatus::Cancelled,
        updated_at: cancelled_at,
        ..reservation.clone()
    };

    let event = ReservationCancelled {
        reservation_id: reservation.reservation_id,
        copy_id: reservation.copy_id,
        user_id: reservation.user_id,
        cancelled_at,
    };

    Ok((new_reservation, event))
}

/// 純粋関数：予約を失効させる
///
/// 取置期限を過ぎたPending予約のみ。遅延評価（読み取り時）と定期バッチの
/// 両方から呼ばれるため、期限の再確認を遷移自体に含める。
pub fn expire_reservation(
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<(Reservation, ReservationExpired), ReservationTransitionError> {
    ensure_pending(reservation)?;

    if !is_expired(reservation, now) {
        return Err(ReservationTransitionError::NotYetExpired);
    }

    let new_reservation = Reservation {
        status: ReservationStatus::Expired,
        updated_at: now,
        ..reservation.clone()
    };

    let event = ReservationExpired {
        reservation_id: reservation.reservation_id,
        copy_id: reservation.copy_id,
        user_id: reservation.user_id,
        expired_at: now,
    };

    Ok((new_reservation, event))
}

/// 純粋関数：取置期限切れ判定
pub fn is_expired(reservation: &Reservation, now: DateTime<Utc>) -> bool {
    reservation.status == ReservationStatus::Pending && now > reservation.expiry_date
}

fn ensure_pending(reservation: &Reservation) -> Result<(), ReservationTransitionError> {
    if reservation.status != ReservationStatus::Pending {
        return Err(ReservationTransitionError::NotPending {
            current: reservation.status,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_policy() -> LendingPolicy {
        // reservationHoldDays=3
        LendingPolicy::new(5, 14, dec!(2.00), 3).unwrap()
    }

    fn place_now() -> (Reservation, DateTime<Utc>) {
        let reserved_at = Utc::now();
        let (reservation, _) = place_reservation(
            CopyId::new(),
            BookId::new(),
            BorrowerId::new(),
            BorrowerType::Student,
            reserved_at,
            String::new(),
            &test_policy(),
        );
        (reservation, reserved_at)
    }

    // TDD: place_reservation() のテスト
    #[test]
    fn test_place_reservation_starts_pending_with_expiry() {
        let (reservation, reserved_at) = place_now();

        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.expiry_date, reserved_at + Duration::days(3));
        assert!(reservation.fulfilled_at.is_none());
    }

    // TDD: promote_reservation() のテスト
    #[test]
    fn test_promote_resets_expiry_from_availability() {
        let (reservation, reserved_at) = place_now();
        // 10日後にようやく資料が返ってきた
        let available_at = reserved_at + Duration::days(10);

        let (promoted, event) =
            promote_reservation(&reservation, available_at, &test_policy()).unwrap();

        // 取置期限は予約時点ではなく利用可能時点から起算
        assert_eq!(promoted.expiry_date, available_at + Duration::days(3));
        assert_eq!(promoted.status, ReservationStatus::Pending);
        assert_eq!(event.available_at, available_at);
        assert_eq!(event.expiry_date, promoted.expiry_date);
    }

    #[test]
    fn test_promote_fails_on_terminal_state() {
        let (reservation, reserved_at) = place_now();
        let (cancelled, _) =
            cancel_reservation(&reservation, reserved_at + Duration::hours(1)).unwrap();

        let result = promote_reservation(&cancelled, reserved_at + Duration::days(1), &test_policy());
        assert_eq!(
            result.unwrap_err(),
            ReservationTransitionError::NotPending {
                current: ReservationStatus::Cancelled
            }
        );
    }

    // TDD: fulfill_reservation() のテスト
    #[test]
    fn test_fulfill_sets_terminal_state_and_timestamp() {
        let (reservation, reserved_at) = place_now();
        let fulfilled_at = reserved_at + Duration::days(1);

        let (fulfilled, event) = fulfill_reservation(&reservation, fulfilled_at).unwrap();

        assert_eq!(fulfilled.status, ReservationStatus::Fulfilled);
        assert_eq!(fulfilled.fulfilled_at, Some(fulfilled_at));
        assert_eq!(event.reservation_id, reservation.reservation_id);
    }

    #[test]
    fn test_fulfill_fails_when_already_fulfilled() {
        let (reservation, reserved_at) = place_now();
        let (fulfilled, _) =
            fulfill_reservation(&reservation, reserved_at + Duration::days(1)).unwrap();

        let result = fulfill_reservation(&fulfilled, reserved_at + Duration::days(2));
        assert_eq!(
            result.unwrap_err(),
            ReservationTransitionError::NotPending {
                current: ReservationStatus::Fulfilled
            }
        );
    }

    // TDD: cancel_reservation() のテスト
    #[test]
    fn test_cancel_from_pending() {
        let (reservation, reserved_at) = place_now();

        let (cancelled, _) =
            cancel_reservation(&reservation, reserved_at + Duration::hours(2)).unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    }

    // TDD: expire_reservation() のテスト
    #[test]
    fn test_expire_after_deadline() {
        let (reservation, reserved_at) = place_now();
        let now = reserved_at + Duration::days(4);

        assert!(is_expired(&reservation, now));
        let (expired, event) = expire_reservation(&reservation, now).unwrap();
        assert_eq!(expired.status, ReservationStatus::Expired);
        assert_eq!(event.expired_at, now);
    }

    #[test]
    fn test_expire_fails_before_deadline() {
        let (reservation, reserved_at) = place_now();
        let now = reserved_at + Duration::days(2);

        assert!(!is_expired(&reservation, now));
        let result = expire_reservation(&reservation, now);
        assert_eq!(result.unwrap_err(), ReservationTransitionError::NotYetExpired);
    }

    #[test]
    fn test_terminal_states_do_not_expire() {
        let (reservation, reserved_at) = place_now();
        let (fulfilled, _) =
            fulfill_reservation(&reservation, reserved_at + Duration::days(1)).unwrap();

        // 終端状態は期限が過ぎても失効しない
        assert!(!is_expired(&fulfilled, reserved_at + Duration::days(30)));
        assert!(expire_reservation(&fulfilled, reserved_at + Duration::days(30)).is_err());
    }
}
