use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 図書館ID - 貸出ルールと蔵書を所有する図書館への参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryId(Uuid);

impl LibraryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for LibraryId {
    fn default() -> Self {
        Self::new()
    }
}

/// 書誌ID - 書誌（タイトル単位）への参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

/// 資料ID - 物理的な1冊（コピー）への参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CopyId(Uuid);

impl CopyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for CopyId {
    fn default() -> Self {
        Self::new()
    }
}

/// 貸出ID - 貸出管理コンテキストの集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorrowingId(Uuid);

impl BorrowingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BorrowingId {
    fn default() -> Self {
        Self::new()
    }
}

/// 予約ID - 予約管理コンテキストの集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

/// 利用者ID - 利用者管理コンテキストへの参照
///
/// 本エンジンはIDのみを保持し、氏名などの詳細はUserDirectoryポート経由で
/// 表示用に取得する。認可判断には使用しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorrowerId(Uuid);

impl BorrowerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BorrowerId {
    fn default() -> Self {
        Self::new()
    }
}

/// 利用者区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorrowerType {
    Student,
    Teacher,
    Staff,
}

impl BorrowerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowerType::Student => "student",
            BorrowerType::Teacher => "teacher",
            BorrowerType::Staff => "staff",
        }
    }
}

impl std::str::FromStr for BorrowerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(BorrowerType::Student),
            "teacher" => Ok(BorrowerType::Teacher),
            "staff" => Ok(BorrowerType::Staff),
            _ => Err(format!("Invalid borrower type: {}", s)),
        }
    }
}

/// 図書館の運用状態
///
/// Active以外の図書館は新規の貸出・予約を受け付けない。
/// 返却と予約取消は状態に関わらず受け付ける。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryStatus {
    Active,
    Inactive,
    Maintenance,
}

impl LibraryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryStatus::Active => "active",
            LibraryStatus::Inactive => "inactive",
            LibraryStatus::Maintenance => "maintenance",
        }
    }
}

impl std::str::FromStr for LibraryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LibraryStatus::Active),
            "inactive" => Ok(LibraryStatus::Inactive),
            "maintenance" => Ok(LibraryStatus::Maintenance),
            _ => Err(format!("Invalid library status: {}", s)),
        }
    }
}

/// 資料の状態
///
/// 不変条件：この値は台帳（AvailabilityLedger）の占有者記録と常に一致する。
/// 台帳API以外からの書き換えは禁止。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Available,
    Reserved,
    Borrowed,
    Maintenance,
    Lost,
}

impl CopyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStatus::Available => "available",
            CopyStatus::Reserved => "reserved",
            CopyStatus::Borrowed => "borrowed",
            CopyStatus::Maintenance => "maintenance",
            CopyStatus::Lost => "lost",
        }
    }
}

impl std::str::FromStr for CopyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(CopyStatus::Available),
            "reserved" => Ok(CopyStatus::Reserved),
            "borrowed" => Ok(CopyStatus::Borrowed),
            "maintenance" => Ok(CopyStatus::Maintenance),
            "lost" => Ok(CopyStatus::Lost),
            _ => Err(format!("Invalid copy status: {}", s)),
        }
    }
}

/// 資料の保存状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyCondition {
    Excellent,
    Good,
    Fair,
    Poor,
    Damaged,
}

impl CopyCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyCondition::Excellent => "excellent",
            CopyCondition::Good => "good",
            CopyCondition::Fair => "fair",
            CopyCondition::Poor => "poor",
            CopyCondition::Damaged => "damaged",
        }
    }
}

impl std::str::FromStr for CopyCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excellent" => Ok(CopyCondition::Excellent),
            "good" => Ok(CopyCondition::Good),
            "fair" => Ok(CopyCondition::Fair),
            "poor" => Ok(CopyCondition::Poor),
            "damaged" => Ok(CopyCondition::Damaged),
            _ => Err(format!("Invalid copy condition: {}", s)),
        }
    }
}

/// 貸出ステータス
///
/// Overdueは読み取り時に日付から導出される投影値。永続化されたOverdueは
/// レポート用のスナップショットであり、読み取り経路は常に再計算する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorrowingStatus {
    Borrowed,
    Overdue,
    Returned,
    Lost,
}

impl BorrowingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowingStatus::Borrowed => "borrowed",
            BorrowingStatus::Overdue => "overdue",
            BorrowingStatus::Returned => "returned",
            BorrowingStatus::Lost => "lost",
        }
    }

    /// 資料が未返却（Borrowed/Overdue）か
    pub fn is_open(&self) -> bool {
        matches!(self, BorrowingStatus::Borrowed | BorrowingStatus::Overdue)
    }
}

impl std::str::FromStr for BorrowingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borrowed" => Ok(BorrowingStatus::Borrowed),
            "overdue" => Ok(BorrowingStatus::Overdue),
            "returned" => Ok(BorrowingStatus::Returned),
            "lost" => Ok(BorrowingStatus::Lost),
            _ => Err(format!("Invalid borrowing status: {}", s)),
        }
    }
}

/// 予約ステータス
///
/// Pendingのみが遷移可能。Fulfilled/Expired/Cancelledは終端状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Fulfilled,
    Expired,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Fulfilled => "fulfilled",
            ReservationStatus::Expired => "expired",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "fulfilled" => Ok(ReservationStatus::Fulfilled),
            "expired" => Ok(ReservationStatus::Expired),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            _ => Err(format!("Invalid reservation status: {}", s)),
        }
    }
}

/// 資料の現在の占有者
///
/// 台帳が記録する「いま第一請求権を持つ者」。貸出中の利用者、または
/// 受取待ちに昇格した予約のどちらか一方のみ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HolderRef {
    /// 貸出中の利用者が占有
    Borrower { borrower_id: BorrowerId },
    /// 受取待ちの予約が占有
    Hold {
        reservation_id: ReservationId,
        user_id: BorrowerId,
    },
}

impl HolderRef {
    /// 占有の当事者である利用者ID
    pub fn user_id(&self) -> BorrowerId {
        match self {
            HolderRef::Borrower { borrower_id } => *borrower_id,
            HolderRef::Hold { user_id, .. } => *user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // ID value objects のテスト
    #[test]
    fn test_copy_id_creation() {
        let id1 = CopyId::new();
        let id2 = CopyId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_copy_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = CopyId::from_uuid(uuid);
        assert_eq!(id.value(), uuid);
    }

    #[test]
    fn test_borrowing_id_creation() {
        let id1 = BorrowingId::new();
        let id2 = BorrowingId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_reservation_id_creation() {
        let id1 = ReservationId::new();
        let id2 = ReservationId::new();
        assert_ne!(id1, id2);
    }

    // ステータスの文字列変換テスト
    #[test]
    fn test_copy_status_round_trip() {
        for status in [
            CopyStatus::Available,
            CopyStatus::Reserved,
            CopyStatus::Borrowed,
            CopyStatus::Maintenance,
            CopyStatus::Lost,
        ] {
            assert_eq!(CopyStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_copy_status_from_str_invalid() {
        assert!(CopyStatus::from_str("checked_out").is_err());
    }

    #[test]
    fn test_borrowing_status_is_open() {
        assert!(BorrowingStatus::Borrowed.is_open());
        assert!(BorrowingStatus::Overdue.is_open());
        assert!(!BorrowingStatus::Returned.is_open());
        assert!(!BorrowingStatus::Lost.is_open());
    }

    #[test]
    fn test_reservation_status_terminal() {
        assert!(!ReservationStatus::Pending.is_terminal());
        assert!(ReservationStatus::Fulfilled.is_terminal());
        assert!(ReservationStatus::Expired.is_terminal());
        assert!(ReservationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_holder_ref_user_id() {
        let borrower_id = BorrowerId::new();
        let holder = HolderRef::Borrower { borrower_id };
        assert_eq!(holder.user_id(), borrower_id);

        let reservation_id = ReservationId::new();
        let holder = HolderRef::Hold {
            reservation_id,
            user_id: borrower_id,
        };
        assert_eq!(holder.user_id(), borrower_id);
    }
}
