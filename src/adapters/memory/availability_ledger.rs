use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::value_objects::{BorrowerId, CopyId, CopyStatus, HolderRef, ReservationId};
use crate::ports::availability_ledger::{
    AvailabilityLedger, Lease, LedgerError, Result, SetAsideStatus,
};

use super::Store;

/// AvailabilityLedgerのインメモリ実装
///
/// すべての操作はcopiesテーブルのロック下でread-modify-writeを行う。
/// 同一資料への並行するacquire/releaseはこのロックで直列化され、
/// 勝者はひとりだけになる。
#[async_trait]
impl AvailabilityLedger for Store {
    async fn acquire(
        &self,
        copy_id: CopyId,
        holder: HolderRef,
        at: DateTime<Utc>,
    ) -> Result<Lease> {
        let mut copies = self.copies.lock().unwrap();
        let copy = copies.get_mut(&copy_id).ok_or(LedgerError::CopyNotFound)?;

        if copy.status != CopyStatus::Available {
            return Err(LedgerError::Unavailable {
                status: copy.status,
                holder: copy.holder,
            });
        }

        let status = match holder {
            HolderRef::Borrower { .. } => CopyStatus::Borrowed,
            HolderRef::Hold { .. } => CopyStatus::Reserved,
        };

        copy.status = status;
        copy.holder = Some(holder);
        copy.updated_at = at;

        Ok(Lease {
            copy_id,
            holder,
            status,
        })
    }

    async fn release(&self, copy_id: CopyId, at: DateTime<Utc>) -> Result<bool> {
        let mut copies = self.copies.lock().unwrap();
        let copy = copies.get_mut(&copy_id).ok_or(LedgerError::CopyNotFound)?;

        // 冪等：既にAvailableなら何もしない（二度目の解放はカスケードしない）
        if copy.status == CopyStatus::Available {
            return Ok(false);
        }

        copy.status = CopyStatus::Available;
        copy.holder = None;
        copy.updated_at = at;

        Ok(true)
    }

    async fn promote_hold(
        &self,
        copy_id: CopyId,
        reservation_id: ReservationId,
        borrower_id: BorrowerId,
        at: DateTime<Utc>,
    ) -> Result<Lease> {
        let mut copies = self.copies.lock().unwrap();
        let copy = copies.get_mut(&copy_id).ok_or(LedgerError::CopyNotFound)?;

        let held_by_reservation = copy.status == CopyStatus::Reserved
            && matches!(
                copy.holder,
                Some(HolderRef::Hold { reservation_id: held, .. }) if held == reservation_id
            );

        if !held_by_reservation {
            return Err(LedgerError::HolderMismatch {
                status: copy.status,
                holder: copy.holder,
            });
        }

        let holder = HolderRef::Borrower { borrower_id };
        copy.status = CopyStatus::Borrowed;
        copy.holder = Some(holder);
        copy.updated_at = at;

        Ok(Lease {
            copy_id,
            holder,
            status: CopyStatus::Borrowed,
        })
    }

    async fn set_aside(
        &self,
        copy_id: CopyId,
        status: SetAsideStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut copies = self.copies.lock().unwrap();
        let copy = copies.get_mut(&copy_id).ok_or(LedgerError::CopyNotFound)?;

        copy.status = match status {
            SetAsideStatus::Maintenance => CopyStatus::Maintenance,
            SetAsideStatus::Lost => CopyStatus::Lost,
        };
        copy.holder = None;
        copy.updated_at = at;

        Ok(())
    }

    async fn status_of(&self, copy_id: CopyId) -> Result<(CopyStatus, Option<HolderRef>)> {
        let copies = self.copies.lock().unwrap();
        let copy = copies.get(&copy_id).ok_or(LedgerError::CopyNotFound)?;

        Ok((copy.status, copy.holder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Book, BookCopy, Library};
    use crate::domain::policy::LendingPolicy;
    use crate::domain::value_objects::{BookId, CopyCondition};
    use crate::ports::CatalogStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn store_with_copy() -> (Arc<Store>, CopyId) {
        let store = Arc::new(Store::new());
        let now = Utc::now();

        let library = Library::new(
            "Central".to_string(),
            LendingPolicy::new(5, 14, dec!(2.00), 3).unwrap(),
            now,
        );
        let library_id = library.library_id;
        store.insert_library(library).await.unwrap();

        let book = Book {
            book_id: BookId::new(),
            library_id,
            title: "Domain Modeling".to_string(),
            author: "S. Wlaschin".to_string(),
            isbn: "978-1".to_string(),
            category: "engineering".to_string(),
            created_at: now,
            updated_at: now,
        };
        let book_id = book.book_id;
        store.insert_book(book).await.unwrap();

        let copy = BookCopy::new(book_id, 1, CopyCondition::Good, "A-1".to_string(), now);
        let copy_id = copy.copy_id;
        store.insert_copy(copy).await.unwrap();

        (store, copy_id)
    }

    #[tokio::test]
    async fn test_acquire_transitions_to_borrowed() {
        let (store, copy_id) = store_with_copy().await;
        let borrower_id = BorrowerId::new();

        let lease = store
            .acquire(copy_id, HolderRef::Borrower { borrower_id }, Utc::now())
            .await
            .unwrap();

        assert_eq!(lease.status, CopyStatus::Borrowed);
        let (status, holder) = store.status_of(copy_id).await.unwrap();
        assert_eq!(status, CopyStatus::Borrowed);
        assert_eq!(holder, Some(HolderRef::Borrower { borrower_id }));
    }

    #[tokio::test]
    async fn test_acquire_fails_when_already_held() {
        let (store, copy_id) = store_with_copy().await;
        let first = BorrowerId::new();

        store
            .acquire(copy_id, HolderRef::Borrower { borrower_id: first }, Utc::now())
            .await
            .unwrap();

        let result = store
            .acquire(
                copy_id,
                HolderRef::Borrower {
                    borrower_id: BorrowerId::new(),
                },
                Utc::now(),
            )
            .await;

        match result.unwrap_err() {
            LedgerError::Unavailable { status, holder } => {
                assert_eq!(status, CopyStatus::Borrowed);
                assert_eq!(holder, Some(HolderRef::Borrower { borrower_id: first }));
            }
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (store, copy_id) = store_with_copy().await;

        store
            .acquire(
                copy_id,
                HolderRef::Borrower {
                    borrower_id: BorrowerId::new(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert!(store.release(copy_id, Utc::now()).await.unwrap());
        // 二度目の解放は何もしない
        assert!(!store.release(copy_id, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_promote_hold_requires_matching_reservation() {
        let (store, copy_id) = store_with_copy().await;
        let user_id = BorrowerId::new();
        let reservation_id = ReservationId::new();

        store
            .acquire(
                copy_id,
                HolderRef::Hold {
                    reservation_id,
                    user_id,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        // 別の予約IDでの昇格は拒否
        let result = store
            .promote_hold(copy_id, ReservationId::new(), user_id, Utc::now())
            .await;
        assert!(matches!(
            result.unwrap_err(),
            LedgerError::HolderMismatch { .. }
        ));

        // 正しい予約IDなら Reserved → Borrowed
        let lease = store
            .promote_hold(copy_id, reservation_id, user_id, Utc::now())
            .await
            .unwrap();
        assert_eq!(lease.status, CopyStatus::Borrowed);
    }

    #[tokio::test]
    async fn test_set_aside_clears_holder_without_release() {
        let (store, copy_id) = store_with_copy().await;

        store
            .acquire(
                copy_id,
                HolderRef::Borrower {
                    borrower_id: BorrowerId::new(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        store
            .set_aside(copy_id, SetAsideStatus::Maintenance, Utc::now())
            .await
            .unwrap();

        let (status, holder) = store.status_of(copy_id).await.unwrap();
        assert_eq!(status, CopyStatus::Maintenance);
        assert!(holder.is_none());
    }

    /// 二重貸出の防止：同一資料への並行acquireは高々1件しか成功しない
    #[tokio::test]
    async fn test_concurrent_acquire_single_winner() {
        let (store, copy_id) = store_with_copy().await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .acquire(
                        copy_id,
                        HolderRef::Borrower {
                            borrower_id: BorrowerId::new(),
                        },
                        Utc::now(),
                    )
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
    }
}
