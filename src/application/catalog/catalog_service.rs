use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::application::errors::{CirculationError, Result};
use crate::application::ServiceDependencies;
use crate::domain::catalog::{Book, BookCopy, Library};
use crate::domain::policy::LendingPolicy;
use crate::domain::value_objects::{BookId, CopyCondition, CopyId, LibraryId, LibraryStatus};

/// コマンド：図書館を登録する
#[derive(Debug, Clone)]
pub struct CreateLibrary {
    pub name: String,
    pub max_borrow_limit: u32,
    pub borrow_duration_days: i64,
    pub fine_per_day: Decimal,
    pub reservation_hold_days: i64,
    pub created_at: DateTime<Utc>,
}

/// コマンド：書誌を登録する
#[derive(Debug, Clone)]
pub struct CreateBook {
    pub library_id: LibraryId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// コマンド：資料を登録する
#[derive(Debug, Clone)]
pub struct AddCopy {
    pub book_id: BookId,
    pub copy_number: u32,
    pub condition: CopyCondition,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

/// 図書館を登録する
///
/// 貸出ルールはこの時点で検証され、不正な値（期間0日・負の料金）は
/// `InvalidState`で拒否される。
pub async fn create_library(deps: &ServiceDependencies, cmd: CreateLibrary) -> Result<LibraryId> {
    let policy = LendingPolicy::new(
        cmd.max_borrow_limit,
        cmd.borrow_duration_days,
        cmd.fine_per_day,
        cmd.reservation_hold_days,
    )
    .map_err(|e| CirculationError::InvalidState(e.to_string()))?;

    let library = Library::new(cmd.name, policy, cmd.created_at);
    let library_id = library.library_id;

    deps.catalog.insert_library(library).await?;

    Ok(library_id)
}

/// 図書館を取得する
pub async fn get_library(deps: &ServiceDependencies, library_id: LibraryId) -> Result<Library> {
    deps.catalog
        .get_library(library_id)
        .await?
        .ok_or(CirculationError::LibraryNotFound)
}

/// 図書館の運用状態を切り替える（職員操作）
///
/// Active以外に切り替わると新規の貸出・予約が止まる。返却と予約取消は
/// 状態に関わらず受け付けられる。
pub async fn set_library_status(
    deps: &ServiceDependencies,
    library_id: LibraryId,
    status: LibraryStatus,
    at: DateTime<Utc>,
) -> Result<()> {
    deps.catalog
        .update_library_status(library_id, status, at)
        .await?;

    Ok(())
}

/// 図書館を削除する
///
/// 参照ガード：配下の資料に未返却の貸出またはPending予約が存在する間は
/// `Conflict`で拒否する。返却済みの貸出履歴は削除を妨げない。
pub async fn delete_library(deps: &ServiceDependencies, library_id: LibraryId) -> Result<()> {
    // 存在確認
    deps.catalog
        .get_library(library_id)
        .await?
        .ok_or(CirculationError::LibraryNotFound)?;

    let has_open_borrowings = deps
        .borrowings
        .exists_open_for_library(library_id)
        .await
        .map_err(CirculationError::BorrowingRepositoryError)?;

    if has_open_borrowings {
        return Err(CirculationError::Conflict(
            "library has copies with open borrowings".to_string(),
        ));
    }

    let has_pending_reservations = deps
        .reservations
        .exists_pending_for_library(library_id)
        .await
        .map_err(CirculationError::ReservationRepositoryError)?;

    if has_pending_reservations {
        return Err(CirculationError::Conflict(
            "library has copies with pending reservations".to_string(),
        ));
    }

    deps.catalog.delete_library(library_id).await?;

    Ok(())
}

/// 書誌を登録する
pub async fn create_book(deps: &ServiceDependencies, cmd: CreateBook) -> Result<BookId> {
    // 所属先の存在確認
    deps.catalog
        .get_library(cmd.library_id)
        .await?
        .ok_or(CirculationError::LibraryNotFound)?;

    let book = Book {
        book_id: BookId::new(),
        library_id: cmd.library_id,
        title: cmd.title,
        author: cmd.author,
        isbn: cmd.isbn,
        category: cmd.category,
        created_at: cmd.created_at,
        updated_at: cmd.created_at,
    };
    let book_id = book.book_id;

    deps.catalog.insert_book(book).await?;

    Ok(book_id)
}

/// 資料を登録する
///
/// 通し番号が書誌内で重複する場合は`Conflict`。
pub async fn add_copy(deps: &ServiceDependencies, cmd: AddCopy) -> Result<CopyId> {
    deps.catalog
        .get_book(cmd.book_id)
        .await?
        .ok_or(CirculationError::BookNotFound)?;

    let copy = BookCopy::new(
        cmd.book_id,
        cmd.copy_number,
        cmd.condition,
        cmd.location,
        cmd.created_at,
    );
    let copy_id = copy.copy_id;

    deps.catalog.insert_copy(copy).await?;

    Ok(copy_id)
}

/// 書誌に属する資料の一覧（通し番号順）
///
/// 予約UIが「貸出可能な別資料」を代替候補として提示するのに使用される。
pub async fn list_copies(deps: &ServiceDependencies, book_id: BookId) -> Result<Vec<BookCopy>> {
    deps.catalog
        .get_book(book_id)
        .await?
        .ok_or(CirculationError::BookNotFound)?;

    Ok(deps.catalog.list_copies_of_book(book_id).await?)
}

/// 資料の保存状態・配架場所を更新する
///
/// status / holder は台帳APIの専権であり、ここからは変更できない。
pub async fn update_copy_details(
    deps: &ServiceDependencies,
    copy_id: CopyId,
    condition: CopyCondition,
    location: String,
    at: DateTime<Utc>,
) -> Result<()> {
    deps.catalog
        .update_copy_details(copy_id, condition, location, at)
        .await?;

    Ok(())
}

/// 資料を取得する
pub async fn get_copy(deps: &ServiceDependencies, copy_id: CopyId) -> Result<BookCopy> {
    deps.catalog
        .get_copy(copy_id)
        .await?
        .ok_or(CirculationError::CopyNotFound)
}
