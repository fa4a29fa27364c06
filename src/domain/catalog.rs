use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    BookId, CopyCondition, CopyId, CopyStatus, HolderRef, LibraryId, LibraryStatus, policy::LendingPolicy,
};

/// 図書館 - 貸出ルールの所有者
///
/// 所有関係は非循環：Library が Book を、Book が BookCopy を所有する。
/// 貸出・予約は CopyId を参照するだけで所有しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub library_id: LibraryId,
    pub name: String,
    pub policy: LendingPolicy,
    pub status: LibraryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Library {
    pub fn new(name: String, policy: LendingPolicy, now: DateTime<Utc>) -> Self {
        Self {
            library_id: LibraryId::new(),
            name,
            policy,
            status: LibraryStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 書誌 - タイトル単位の記録
///
/// 物理的な冊数とは独立に存在する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub library_id: LibraryId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 資料 - 書誌に属する物理的な1冊
///
/// status と holder は台帳（AvailabilityLedger）が排他的に所有する。
/// カタログ経由で編集できるのは condition と location のみ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCopy {
    pub copy_id: CopyId,
    pub book_id: BookId,
    /// 書誌内で一意の通し番号
    pub copy_number: u32,
    pub condition: CopyCondition,
    pub location: String,
    pub status: CopyStatus,
    pub holder: Option<HolderRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookCopy {
    /// 新規資料は必ず貸出可能の状態で登録される
    pub fn new(
        book_id: BookId,
        copy_number: u32,
        condition: CopyCondition,
        location: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            copy_id: CopyId::new(),
            book_id,
            copy_number,
            condition,
            location,
            status: CopyStatus::Available,
            holder: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_policy() -> LendingPolicy {
        LendingPolicy::new(5, 14, dec!(2.00), 3).unwrap()
    }

    #[test]
    fn test_new_library_starts_active() {
        let now = Utc::now();
        let library = Library::new("Central".to_string(), test_policy(), now);

        assert_eq!(library.status, LibraryStatus::Active);
        assert_eq!(library.created_at, now);
        assert_eq!(library.policy.borrow_duration_days(), 14);
    }

    #[test]
    fn test_new_copy_starts_available_without_holder() {
        let now = Utc::now();
        let copy = BookCopy::new(
            BookId::new(),
            1,
            CopyCondition::Good,
            "A-3".to_string(),
            now,
        );

        assert_eq!(copy.status, CopyStatus::Available);
        assert!(copy.holder.is_none());
        assert_eq!(copy.copy_number, 1);
    }
}
