#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use library_circulation::adapters::memory::Store;
use library_circulation::adapters::mock::{NotificationService, UserDirectory};
use library_circulation::application::{ServiceDependencies, catalog};
use library_circulation::domain::value_objects::{BookId, CopyId, LibraryId};

/// テスト用の依存関係一式
///
/// 永続化ポートはインメモリStoreの単一インスタンスが兼ねるため、
/// カタログと台帳が食い違うことはない。
pub struct TestContext {
    pub deps: ServiceDependencies,
    pub store: Arc<Store>,
    pub notifications: Arc<NotificationService>,
    pub user_directory: Arc<UserDirectory>,
}

pub fn build_context() -> TestContext {
    let store = Arc::new(Store::new());
    let notifications = Arc::new(NotificationService::new());
    let user_directory = Arc::new(UserDirectory::new());

    let deps = ServiceDependencies {
        catalog: store.clone(),
        ledger: store.clone(),
        borrowings: store.clone(),
        reservations: store.clone(),
        user_directory: user_directory.clone(),
        notifications: notifications.clone(),
    };

    TestContext {
        deps,
        store,
        notifications,
        user_directory,
    }
}

/// 図書館・書誌・資料1冊をまとめて登録する
pub async fn seed_library_with_copy(
    deps: &ServiceDependencies,
    max_borrow_limit: u32,
    borrow_duration_days: i64,
    fine_per_day: Decimal,
    reservation_hold_days: i64,
    now: DateTime<Utc>,
) -> (LibraryId, BookId, CopyId) {
    let library_id = catalog::create_library(
        deps,
        catalog::CreateLibrary {
            name: "Central Library".to_string(),
            max_borrow_limit,
            borrow_duration_days,
            fine_per_day,
            reservation_hold_days,
            created_at: now,
        },
    )
    .await
    .unwrap();

    let book_id = seed_book(deps, library_id, now).await;
    let copy_id = seed_copy(deps, book_id, 1, now).await;

    (library_id, book_id, copy_id)
}

pub async fn seed_book(
    deps: &ServiceDependencies,
    library_id: LibraryId,
    now: DateTime<Utc>,
) -> BookId {
    catalog::create_book(
        deps,
        catalog::CreateBook {
            library_id,
            title: "The Pragmatic Programmer".to_string(),
            author: "Hunt & Thomas".to_string(),
            isbn: "978-0135957059".to_string(),
            category: "engineering".to_string(),
            created_at: now,
        },
    )
    .await
    .unwrap()
}

pub async fn seed_copy(
    deps: &ServiceDependencies,
    book_id: BookId,
    copy_number: u32,
    now: DateTime<Utc>,
) -> CopyId {
    catalog::add_copy(
        deps,
        catalog::AddCopy {
            book_id,
            copy_number,
            condition: library_circulation::domain::value_objects::CopyCondition::Good,
            location: format!("A-{}", copy_number),
            created_at: now,
        },
    )
    .await
    .unwrap()
}
