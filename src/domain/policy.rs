use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 貸出ルールのバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// 貸出期間は1日以上
    NonPositiveBorrowDuration,
    /// 取置期間は1日以上
    NonPositiveHoldDuration,
    /// 延滞料金は0以上
    NegativeFinePerDay,
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyError::NonPositiveBorrowDuration => {
                write!(f, "borrow duration must be at least one day")
            }
            PolicyError::NonPositiveHoldDuration => {
                write!(f, "reservation hold duration must be at least one day")
            }
            PolicyError::NegativeFinePerDay => write!(f, "fine per day must not be negative"),
        }
    }
}

impl std::error::Error for PolicyError {}

/// 図書館ごとの貸出ルール
///
/// 不変条件：
/// - borrow_duration_days > 0
/// - reservation_hold_days > 0
/// - fine_per_day >= 0
///
/// コンストラクタで検証するため、不正なルールは生成できない。
/// 値はすべて図書館の設定であり、エンジンは決定しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingPolicy {
    max_borrow_limit: u32,
    borrow_duration_days: i64,
    fine_per_day: Decimal,
    reservation_hold_days: i64,
}

impl LendingPolicy {
    /// 検証付きコンストラクタ
    pub fn new(
        max_borrow_limit: u32,
        borrow_duration_days: i64,
        fine_per_day: Decimal,
        reservation_hold_days: i64,
    ) -> Result<Self, PolicyError> {
        if borrow_duration_days <= 0 {
            return Err(PolicyError::NonPositiveBorrowDuration);
        }
        if reservation_hold_days <= 0 {
            return Err(PolicyError::NonPositiveHoldDuration);
        }
        if fine_per_day < Decimal::ZERO {
            return Err(PolicyError::NegativeFinePerDay);
        }

        Ok(Self {
            max_borrow_limit,
            borrow_duration_days,
            fine_per_day,
            reservation_hold_days,
        })
    }

    /// 利用者1人あたりの同時貸出上限（冊数）
    pub fn max_borrow_limit(&self) -> u32 {
        self.max_borrow_limit
    }

    /// 貸出期間（日数）
    pub fn borrow_duration_days(&self) -> i64 {
        self.borrow_duration_days
    }

    /// 延滞1日あたりの料金
    pub fn fine_per_day(&self) -> Decimal {
        self.fine_per_day
    }

    /// 予約の取置期間（日数）
    pub fn reservation_hold_days(&self) -> i64 {
        self.reservation_hold_days
    }
}
