mod circulation_service;
mod overdue_detection;
mod policy_resolver;
mod reservation_service;

pub use circulation_service::{
    borrow_copy, get_borrowing, list_borrowings, mark_fine_paid, mark_lost, reinstate_copy,
    return_copy, set_copy_maintenance, BorrowingDetails, BorrowingView,
};
pub use overdue_detection::detect_overdue_borrowings;
pub use policy_resolver::resolve_active;
pub use reservation_service::{
    cancel_reservation, fulfill_reservation, get_reservation, list_queue_for_copy,
    on_copy_released, place_reservation, sweep_expired_reservations,
};

use crate::application::ServiceDependencies;
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::BorrowerId;

/// 通知を送る（fire-and-forget）
///
/// 配信の失敗は貸出・予約のトランザクションを巻き戻さない。
/// ログに記録するのみで、呼び出し元へは伝搬しない。
pub(crate) async fn dispatch_notification(
    deps: &ServiceDependencies,
    user_id: BorrowerId,
    event: DomainEvent,
) {
    if let Err(e) = deps.notifications.notify(user_id, &event).await {
        tracing::warn!(
            user_id = %user_id.value(),
            error = %e,
            "notification dispatch failed; not propagating"
        );
    }
}
