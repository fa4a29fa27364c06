pub mod catalog;
pub mod circulation;
pub mod errors;

pub use errors::{CirculationError, Result};

use crate::ports::{
    AvailabilityLedger, BorrowingRepository, CatalogStore, NotificationService,
    ReservationRepository, UserDirectory,
};
use std::sync::Arc;

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、純粋な関数に依存関係を渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub catalog: Arc<dyn CatalogStore>,
    pub ledger: Arc<dyn AvailabilityLedger>,
    pub borrowings: Arc<dyn BorrowingRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub notifications: Arc<dyn NotificationService>,
}
