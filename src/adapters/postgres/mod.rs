pub mod availability_ledger;
pub mod borrowing_repository;
pub mod catalog_store;
pub mod reservation_repository;

// パブリックに型を再エクスポート
pub use availability_ledger::AvailabilityLedger as PostgresAvailabilityLedger;
pub use borrowing_repository::BorrowingRepository as PostgresBorrowingRepository;
pub use catalog_store::CatalogStore as PostgresCatalogStore;
pub use reservation_repository::ReservationRepository as PostgresReservationRepository;
