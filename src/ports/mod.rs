pub mod availability_ledger;
pub mod borrowing_repository;
pub mod catalog_store;
pub mod notification_service;
pub mod reservation_repository;
pub mod user_directory;

pub use availability_ledger::{AvailabilityLedger, Lease, LedgerError, SetAsideStatus};
pub use borrowing_repository::BorrowingRepository;
pub use catalog_store::{CatalogError, CatalogStore};
pub use notification_service::NotificationService;
pub use reservation_repository::ReservationRepository;
pub use user_directory::{UserDirectory, UserProfile};
