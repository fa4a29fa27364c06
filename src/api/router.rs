use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, add_copy, borrow_copy, cancel_reservation, create_book, create_library,
    delete_library, fulfill_reservation, get_borrowing, get_library, get_reservation, list_copies,
    list_borrowings, list_copy_queue, mark_borrowing_lost, pay_fine, reinstate_copy, reserve_copy,
    return_borrowing, set_copy_maintenance,
};

/// Creates the API router with all circulation endpoints
///
/// Catalog (administrative):
/// - POST   /libraries - Register a library with its lending policy
/// - GET    /libraries/:id - Read the library and its policy fields
/// - DELETE /libraries/:id - Delete a library (guarded)
/// - POST   /libraries/:id/books - Register a book
/// - POST   /books/:id/copies - Register a physical copy
/// - GET    /books/:id/copies - List copies of a book
///
/// Circulation:
/// - POST /copies/:id/borrow - Borrow a copy
/// - POST /borrowings/:id/return - Return a copy
/// - POST /borrowings/:id/lost - Mark a borrowing lost
/// - POST /borrowings/:id/fine/pay - Flag the fine as paid
/// - GET  /borrowings/:id, GET /borrowings - Derived views
///
/// Reservations:
/// - POST /copies/:id/reservations - Reserve an unavailable copy
/// - GET  /copies/:id/reservations - FIFO queue for a copy
/// - POST /reservations/:id/fulfill - Staff hand-over, creates the borrowing
/// - POST /reservations/:id/cancel - Cancel and cascade
/// - GET  /reservations/:id - Read with lazy expiry
///
/// Staff-only side transitions:
/// - POST /copies/:id/maintenance, POST /copies/:id/reinstate
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Catalog endpoints
        .route("/libraries", post(create_library))
        .route("/libraries/:id", get(get_library))
        .route("/libraries/:id", delete(delete_library))
        .route("/libraries/:id/books", post(create_book))
        .route("/books/:id/copies", post(add_copy))
        .route("/books/:id/copies", get(list_copies))
        // Circulation endpoints
        .route("/copies/:id/borrow", post(borrow_copy))
        .route("/borrowings/:id/return", post(return_borrowing))
        .route("/borrowings/:id/lost", post(mark_borrowing_lost))
        .route("/borrowings/:id/fine/pay", post(pay_fine))
        .route("/borrowings/:id", get(get_borrowing))
        .route("/borrowings", get(list_borrowings))
        // Reservation endpoints
        .route("/copies/:id/reservations", post(reserve_copy))
        .route("/copies/:id/reservations", get(list_copy_queue))
        .route("/reservations/:id/fulfill", post(fulfill_reservation))
        .route("/reservations/:id/cancel", post(cancel_reservation))
        .route("/reservations/:id", get(get_reservation))
        // Staff-only copy transitions
        .route("/copies/:id/maintenance", post(set_copy_maintenance))
        .route("/copies/:id/reinstate", post(reinstate_copy))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
