use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::reservation::Reservation;
use crate::domain::value_objects::{CopyId, LibraryId, ReservationId, ReservationStatus};
use crate::ports::reservation_repository::{ReservationRepository, Result};

use super::Store;

/// FIFOの並び：予約日時、同時刻はIDで決定的に順序付ける
fn queue_key(r: &Reservation) -> (DateTime<Utc>, uuid::Uuid) {
    (r.reservation_date, r.reservation_id.value())
}

/// ReservationRepositoryのインメモリ実装
#[async_trait]
impl ReservationRepository for Store {
    async fn save(&self, reservation: Reservation) -> Result<()> {
        self.reservations
            .lock()
            .unwrap()
            .insert(reservation.reservation_id, reservation);
        Ok(())
    }

    async fn get(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self
            .reservations
            .lock()
            .unwrap()
            .get(&reservation_id)
            .cloned())
    }

    async fn head_pending_for_copy(&self, copy_id: CopyId) -> Result<Option<Reservation>> {
        let reservations = self.reservations.lock().unwrap();
        Ok(reservations
            .values()
            .filter(|r| r.copy_id == copy_id && r.status == ReservationStatus::Pending)
            .min_by_key(|r| queue_key(r))
            .cloned())
    }

    async fn pending_for_copy(&self, copy_id: CopyId) -> Result<Vec<Reservation>> {
        let reservations = self.reservations.lock().unwrap();
        let mut queue: Vec<Reservation> = reservations
            .values()
            .filter(|r| r.copy_id == copy_id && r.status == ReservationStatus::Pending)
            .cloned()
            .collect();
        queue.sort_by_key(queue_key);
        Ok(queue)
    }

    async fn find_expired_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let reservations = self.reservations.lock().unwrap();
        let mut candidates: Vec<Reservation> = reservations
            .values()
            .filter(|r| r.status == ReservationStatus::Pending && r.expiry_date < cutoff)
            .cloned()
            .collect();
        candidates.sort_by_key(|r| r.expiry_date);
        Ok(candidates)
    }

    async fn exists_pending_for_library(&self, library_id: LibraryId) -> Result<bool> {
        let pending_copy_ids: Vec<CopyId> = {
            let reservations = self.reservations.lock().unwrap();
            reservations
                .values()
                .filter(|r| r.status == ReservationStatus::Pending)
                .map(|r| r.copy_id)
                .collect()
        };

        Ok(pending_copy_ids
            .into_iter()
            .any(|copy_id| self.library_id_of_copy(copy_id) == Some(library_id)))
    }
}
