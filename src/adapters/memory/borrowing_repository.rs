use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream};

use crate::domain::borrowing::Borrowing;
use crate::domain::value_objects::{BorrowerId, BorrowingId, CopyId, LibraryId};
use crate::ports::borrowing_repository::{BorrowingRepository, Result};

use super::Store;

/// BorrowingRepositoryのインメモリ実装
#[async_trait]
impl BorrowingRepository for Store {
    async fn save(&self, borrowing: Borrowing) -> Result<()> {
        self.borrowings
            .lock()
            .unwrap()
            .insert(borrowing.borrowing_id, borrowing);
        Ok(())
    }

    async fn get(&self, borrowing_id: BorrowingId) -> Result<Option<Borrowing>> {
        Ok(self.borrowings.lock().unwrap().get(&borrowing_id).cloned())
    }

    async fn find_open_by_copy(&self, copy_id: CopyId) -> Result<Option<Borrowing>> {
        let borrowings = self.borrowings.lock().unwrap();
        Ok(borrowings
            .values()
            .find(|b| b.copy_id == copy_id && b.status.is_open())
            .cloned())
    }

    async fn count_open_for_borrower(
        &self,
        borrower_id: BorrowerId,
        library_id: LibraryId,
    ) -> Result<u32> {
        let open_copy_ids: Vec<CopyId> = {
            let borrowings = self.borrowings.lock().unwrap();
            borrowings
                .values()
                .filter(|b| b.borrower_id == borrower_id && b.status.is_open())
                .map(|b| b.copy_id)
                .collect()
        };

        let count = open_copy_ids
            .into_iter()
            .filter(|copy_id| self.library_id_of_copy(*copy_id) == Some(library_id))
            .count();

        Ok(count as u32)
    }

    async fn find_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Borrowing>> {
        let borrowings = self.borrowings.lock().unwrap();
        let mut result: Vec<Borrowing> = borrowings
            .values()
            .filter(|b| b.borrower_id == borrower_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at));
        Ok(result)
    }

    async fn exists_open_for_library(&self, library_id: LibraryId) -> Result<bool> {
        let open_copy_ids: Vec<CopyId> = {
            let borrowings = self.borrowings.lock().unwrap();
            borrowings
                .values()
                .filter(|b| b.status.is_open())
                .map(|b| b.copy_id)
                .collect()
        };

        Ok(open_copy_ids
            .into_iter()
            .any(|copy_id| self.library_id_of_copy(copy_id) == Some(library_id)))
    }

    fn stream_overdue_candidates(
        &self,
        cutoff: DateTime<Utc>,
    ) -> BoxStream<'_, Result<Borrowing>> {
        let mut candidates: Vec<Borrowing> = {
            let borrowings = self.borrowings.lock().unwrap();
            borrowings
                .values()
                .filter(|b| b.status.is_open() && b.due_date < cutoff)
                .cloned()
                .collect()
        };
        candidates.sort_by_key(|b| b.due_date);

        Box::pin(stream::iter(candidates.into_iter().map(Ok)))
    }
}
