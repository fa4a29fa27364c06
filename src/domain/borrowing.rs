use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    BorrowerId, BorrowerType, BorrowingId, BorrowingMarkedLost, BorrowingStatus, CopyBorrowed,
    CopyId, CopyReturned, FinePaymentError, MarkLostError, ReturnCopyError,
    policy::LendingPolicy,
};

/// 貸出集約 - 1冊の資料の1回の貸出
///
/// 作成後に書き換わるのは returned_at / status / fine_amount / fine_paid /
/// updated_at のみ。監査証跡のため削除されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrowing {
    // 識別子
    pub borrowing_id: BorrowingId,

    // 他の集約への参照（IDのみ）
    pub copy_id: CopyId,
    pub borrower_id: BorrowerId,
    pub borrower_type: BorrowerType,

    // 貸出管理の責務
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: BorrowingStatus,

    // 延滞料金（確定値）。未返却の間は投影値 accrued_fine() が優先される。
    pub fine_amount: Decimal,
    pub fine_paid: bool,

    // 監査情報
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 純粋関数：延滞日数（丸一日単位、負にならない）
pub fn days_late(due_date: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    (at - due_date).num_days().max(0)
}

/// 純粋関数：延滞料金の計算
///
/// fine = max(0, daysLate) × finePerDay
///
/// 保存値を信用せず、読み取りのたびに日付から再計算するための関数。
pub fn compute_fine(
    due_date: DateTime<Utc>,
    at: DateTime<Utc>,
    fine_per_day: Decimal,
) -> Decimal {
    Decimal::from(days_late(due_date, at)) * fine_per_day
}

/// 純粋関数：資料を貸し出す
///
/// ビジネスルール：
/// - 返却期限 = 貸出日 + 図書館ごとの貸出期間
/// - 状態はBorrowed、料金は0から開始
///
/// 副作用なし。新しいBorrowingとイベントを返す。
/// 貸出可否（台帳・上限・予約優先）の判断はアプリケーション層の責務。
pub fn borrow_copy(
    copy_id: CopyId,
    borrower_id: BorrowerId,
    borrower_type: BorrowerType,
    borrowed_at: DateTime<Utc>,
    policy: &LendingPolicy,
) -> (Borrowing, CopyBorrowed) {
    let borrowing_id = BorrowingId::new();
    let due_date = borrowed_at + Duration::days(policy.borrow_duration_days());

    let borrowing = Borrowing {
        borrowing_id,
        copy_id,
        borrower_id,
        borrower_type,
        borrowed_at,
        due_date,
        returned_at: None,
        status: BorrowingStatus::Borrowed,
        fine_amount: Decimal::ZERO,
        fine_paid: false,
        created_at: borrowed_at,
        updated_at: borrowed_at,
    };

    let event = CopyBorrowed {
        borrowing_id,
        copy_id,
        borrower_id,
        borrowed_at,
        due_date,
    };

    (borrowing, event)
}

/// 純粋関数：資料を返却する
///
/// ビジネスルール：
/// - 延滞していても返却は受け付ける
/// - 返却時に延滞料金を確定する（daysLate × finePerDay）
/// - 返却日は貸出日以降であること
///
/// 副作用なし。新しいBorrowingとイベントを返す。
pub fn return_copy(
    borrowing: &Borrowing,
    returned_at: DateTime<Utc>,
    policy: &LendingPolicy,
) -> Result<(Borrowing, CopyReturned), ReturnCopyError> {
    match borrowing.status {
        BorrowingStatus::Returned => return Err(ReturnCopyError::AlreadyReturned),
        BorrowingStatus::Lost => return Err(ReturnCopyError::MarkedLost),
        BorrowingStatus::Borrowed | BorrowingStatus::Overdue => {}
    }

    if returned_at < borrowing.borrowed_at {
        return Err(ReturnCopyError::ReturnedBeforeBorrowed);
    }

    let was_overdue = returned_at > borrowing.due_date;
    let fine_amount = compute_fine(borrowing.due_date, returned_at, policy.fine_per_day());

    let new_borrowing = Borrowing {
        returned_at: Some(returned_at),
        status: BorrowingStatus::Returned,
        fine_amount,
        updated_at: returned_at,
        ..borrowing.clone()
    };

    let event = CopyReturned {
        borrowing_id: borrowing.borrowing_id,
        copy_id: borrowing.copy_id,
        borrower_id: borrowing.borrower_id,
        returned_at,
        was_overdue,
        fine_amount,
    };

    Ok((new_borrowing, event))
}

/// 純粋関数：貸出中の資料を紛失として処理する
///
/// 終端状態。処理時点までに発生した延滞料金を確定する。
/// 弁償費用の扱いは支払回収の領域であり本エンジンの範囲外。
pub fn mark_lost(
    borrowing: &Borrowing,
    marked_at: DateTime<Utc>,
    policy: &LendingPolicy,
) -> Result<(Borrowing, BorrowingMarkedLost), MarkLostError> {
    match borrowing.status {
        BorrowingStatus::Returned => return Err(MarkLostError::AlreadyReturned),
        BorrowingStatus::Lost => return Err(MarkLostError::AlreadyLost),
        BorrowingStatus::Borrowed | BorrowingStatus::Overdue => {}
    }

    let fine_amount = compute_fine(borrowing.due_date, marked_at, policy.fine_per_day());

    let new_borrowing = Borrowing {
        status: BorrowingStatus::Lost,
        fine_amount,
        updated_at: marked_at,
        ..borrowing.clone()
    };

    let event = BorrowingMarkedLost {
        borrowing_id: borrowing.borrowing_id,
        copy_id: borrowing.copy_id,
        borrower_id: borrowing.borrower_id,
        marked_at,
        fine_amount,
    };

    Ok((new_borrowing, event))
}

/// 純粋関数：延滞料金を支払済みにする
///
/// 貸出が終端状態（Returned/Lost）で料金が確定してからのみ許可される。
pub fn mark_fine_paid(
    borrowing: &Borrowing,
    at: DateTime<Utc>,
) -> Result<Borrowing, FinePaymentError> {
    if borrowing.status.is_open() {
        return Err(FinePaymentError::StillOpen);
    }
    if borrowing.fine_paid {
        return Err(FinePaymentError::AlreadyPaid);
    }

    Ok(Borrowing {
        fine_paid: true,
        updated_at: at,
        ..borrowing.clone()
    })
}

/// 純粋関数：延滞判定
pub fn is_overdue(borrowing: &Borrowing, now: DateTime<Utc>) -> bool {
    borrowing.status.is_open() && borrowing.returned_at.is_none() && now > borrowing.due_date
}

/// 純粋関数：読み取り時の実効ステータス
///
/// 保存されたステータスがBorrowedでも、期限超過なら常にOverdueとして
/// 導出する。バッチの有無が読み取り結果に影響しない。
pub fn effective_status(borrowing: &Borrowing, now: DateTime<Utc>) -> BorrowingStatus {
    if is_overdue(borrowing, now) {
        BorrowingStatus::Overdue
    } else {
        borrowing.status
    }
}

/// 純粋関数：読み取り時の実効延滞料金
///
/// 未返却の間は現在時刻から再計算した投影値、終端状態では確定値。
pub fn accrued_fine(borrowing: &Borrowing, policy: &LendingPolicy, now: DateTime<Utc>) -> Decimal {
    if borrowing.status.is_open() {
        compute_fine(borrowing.due_date, now, policy.fine_per_day())
    } else {
        borrowing.fine_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_policy() -> LendingPolicy {
        // borrowDurationDays=14, finePerDay=2 （シナリオA）
        LendingPolicy::new(2, 14, dec!(2.00), 3).unwrap()
    }

    fn borrow_now() -> (Borrowing, DateTime<Utc>) {
        let borrowed_at = Utc::now();
        let (borrowing, _) = borrow_copy(
            CopyId::new(),
            BorrowerId::new(),
            BorrowerType::Student,
            borrowed_at,
            &test_policy(),
        );
        (borrowing, borrowed_at)
    }

    // TDD: borrow_copy() のテスト
    #[test]
    fn test_borrow_copy_sets_due_date_from_policy() {
        let (borrowing, borrowed_at) = borrow_now();

        assert_eq!(borrowing.due_date, borrowed_at + Duration::days(14));
        assert_eq!(borrowing.status, BorrowingStatus::Borrowed);
        assert_eq!(borrowing.fine_amount, Decimal::ZERO);
        assert!(!borrowing.fine_paid);
        assert!(borrowing.returned_at.is_none());
    }

    #[test]
    fn test_borrow_copy_emits_event_with_due_date() {
        let borrowed_at = Utc::now();
        let copy_id = CopyId::new();
        let borrower_id = BorrowerId::new();

        let (borrowing, event) = borrow_copy(
            copy_id,
            borrower_id,
            BorrowerType::Teacher,
            borrowed_at,
            &test_policy(),
        );

        assert_eq!(event.borrowing_id, borrowing.borrowing_id);
        assert_eq!(event.copy_id, copy_id);
        assert_eq!(event.borrower_id, borrower_id);
        assert_eq!(event.due_date, borrowing.due_date);
    }

    // TDD: return_copy() のテスト
    #[test]
    fn test_return_on_time_has_no_fine() {
        let (borrowing, borrowed_at) = borrow_now();
        let returned_at = borrowed_at + Duration::days(7);

        let (returned, event) = return_copy(&borrowing, returned_at, &test_policy()).unwrap();

        assert_eq!(returned.status, BorrowingStatus::Returned);
        assert_eq!(returned.returned_at, Some(returned_at));
        assert_eq!(returned.fine_amount, Decimal::ZERO);
        assert!(!event.was_overdue);
    }

    #[test]
    fn test_return_on_day_twenty_accrues_twelve() {
        // シナリオA：14日貸出・料金2/日、20日目返却 → 6日×2 = 12
        let (borrowing, borrowed_at) = borrow_now();
        let returned_at = borrowed_at + Duration::days(20);

        let (returned, event) = return_copy(&borrowing, returned_at, &test_policy()).unwrap();

        assert_eq!(returned.fine_amount, dec!(12.00));
        assert!(event.was_overdue);
        assert_eq!(event.fine_amount, dec!(12.00));
    }

    #[test]
    fn test_return_fails_when_already_returned() {
        let (borrowing, borrowed_at) = borrow_now();
        let returned_at = borrowed_at + Duration::days(7);
        let (returned, _) = return_copy(&borrowing, returned_at, &test_policy()).unwrap();

        let result = return_copy(&returned, returned_at + Duration::days(1), &test_policy());
        assert_eq!(result.unwrap_err(), ReturnCopyError::AlreadyReturned);
    }

    #[test]
    fn test_return_fails_when_marked_lost() {
        let (borrowing, borrowed_at) = borrow_now();
        let (lost, _) =
            mark_lost(&borrowing, borrowed_at + Duration::days(3), &test_policy()).unwrap();

        let result = return_copy(&lost, borrowed_at + Duration::days(4), &test_policy());
        assert_eq!(result.unwrap_err(), ReturnCopyError::MarkedLost);
    }

    #[test]
    fn test_return_fails_before_borrow_date() {
        let (borrowing, borrowed_at) = borrow_now();

        let result = return_copy(&borrowing, borrowed_at - Duration::days(1), &test_policy());
        assert_eq!(result.unwrap_err(), ReturnCopyError::ReturnedBeforeBorrowed);
    }

    // TDD: 延滞料金の性質
    #[test]
    fn test_fine_is_zero_at_or_before_due_date() {
        let due = Utc::now();
        assert_eq!(compute_fine(due, due, dec!(2.00)), Decimal::ZERO);
        assert_eq!(
            compute_fine(due, due - Duration::days(3), dec!(2.00)),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_fine_is_monotonic_after_due_date() {
        let due = Utc::now();
        let mut previous = Decimal::ZERO;

        for day in 0..30 {
            let fine = compute_fine(due, due + Duration::days(day), dec!(2.00));
            assert!(fine >= previous, "fine decreased on day {}", day);
            previous = fine;
        }
    }

    #[test]
    fn test_fine_counts_whole_days_only() {
        let due = Utc::now();
        // 23時間遅れはまだ丸一日に満たない
        let fine = compute_fine(due, due + Duration::hours(23), dec!(2.00));
        assert_eq!(fine, Decimal::ZERO);

        let fine = compute_fine(due, due + Duration::hours(25), dec!(2.00));
        assert_eq!(fine, dec!(2.00));
    }

    // TDD: mark_lost() のテスト
    #[test]
    fn test_mark_lost_freezes_accrued_fine() {
        let (borrowing, borrowed_at) = borrow_now();
        let marked_at = borrowed_at + Duration::days(19); // 5日延滞

        let (lost, event) = mark_lost(&borrowing, marked_at, &test_policy()).unwrap();

        assert_eq!(lost.status, BorrowingStatus::Lost);
        assert_eq!(lost.fine_amount, dec!(10.00));
        assert_eq!(event.fine_amount, dec!(10.00));
    }

    #[test]
    fn test_mark_lost_fails_when_terminal() {
        let (borrowing, borrowed_at) = borrow_now();
        let (returned, _) =
            return_copy(&borrowing, borrowed_at + Duration::days(1), &test_policy()).unwrap();

        let result = mark_lost(&returned, borrowed_at + Duration::days(2), &test_policy());
        assert_eq!(result.unwrap_err(), MarkLostError::AlreadyReturned);

        let (borrowing, borrowed_at) = borrow_now();
        let (lost, _) =
            mark_lost(&borrowing, borrowed_at + Duration::days(1), &test_policy()).unwrap();
        let result = mark_lost(&lost, borrowed_at + Duration::days(2), &test_policy());
        assert_eq!(result.unwrap_err(), MarkLostError::AlreadyLost);
    }

    // TDD: mark_fine_paid() のテスト
    #[test]
    fn test_mark_fine_paid_requires_terminal_state() {
        let (borrowing, borrowed_at) = borrow_now();

        let result = mark_fine_paid(&borrowing, borrowed_at + Duration::days(1));
        assert_eq!(result.unwrap_err(), FinePaymentError::StillOpen);

        let (returned, _) =
            return_copy(&borrowing, borrowed_at + Duration::days(20), &test_policy()).unwrap();
        let paid = mark_fine_paid(&returned, borrowed_at + Duration::days(21)).unwrap();
        assert!(paid.fine_paid);

        let result = mark_fine_paid(&paid, borrowed_at + Duration::days(22));
        assert_eq!(result.unwrap_err(), FinePaymentError::AlreadyPaid);
    }

    // TDD: 導出ステータスと投影料金のテスト
    #[test]
    fn test_effective_status_derives_overdue() {
        let (borrowing, borrowed_at) = borrow_now();

        assert_eq!(
            effective_status(&borrowing, borrowed_at + Duration::days(7)),
            BorrowingStatus::Borrowed
        );
        assert_eq!(
            effective_status(&borrowing, borrowed_at + Duration::days(20)),
            BorrowingStatus::Overdue
        );
    }

    #[test]
    fn test_effective_status_terminal_states_unchanged() {
        let (borrowing, borrowed_at) = borrow_now();
        let (returned, _) =
            return_copy(&borrowing, borrowed_at + Duration::days(20), &test_policy()).unwrap();

        // 期限超過で返却済みでもReturnedのまま
        assert_eq!(
            effective_status(&returned, borrowed_at + Duration::days(30)),
            BorrowingStatus::Returned
        );
    }

    #[test]
    fn test_accrued_fine_projects_for_open_borrowing() {
        let (borrowing, borrowed_at) = borrow_now();
        let policy = test_policy();

        // 未返却：現在時刻から再計算
        assert_eq!(
            accrued_fine(&borrowing, &policy, borrowed_at + Duration::days(7)),
            Decimal::ZERO
        );
        assert_eq!(
            accrued_fine(&borrowing, &policy, borrowed_at + Duration::days(17)),
            dec!(6.00)
        );

        // 返却後：確定値に固定
        let (returned, _) =
            return_copy(&borrowing, borrowed_at + Duration::days(16), &policy).unwrap();
        assert_eq!(
            accrued_fine(&returned, &policy, borrowed_at + Duration::days(100)),
            dec!(4.00)
        );
    }
}
