pub mod availability_ledger;
pub mod borrowing_repository;
pub mod catalog_store;
pub mod reservation_repository;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::borrowing::Borrowing;
use crate::domain::catalog::{Book, BookCopy, Library};
use crate::domain::reservation::Reservation;
use crate::domain::value_objects::{BookId, BorrowingId, CopyId, LibraryId, ReservationId};

/// インメモリ永続化（開発・テスト用）
///
/// 4つの永続化ポートをひとつの構造体で実装する。資料のstatusと占有者は
/// copiesテーブルに一元化され、カタログと台帳が食い違うことがない。
///
/// ロックはテーブル単位のstd::sync::Mutexで、awaitを跨いで保持しない。
/// 台帳操作はcopiesロック下のread-modify-writeとして原子的に実行され、
/// これが資料単位の排他単位となる（二重貸出の防止）。
pub struct Store {
    libraries: Mutex<HashMap<LibraryId, Library>>,
    books: Mutex<HashMap<BookId, Book>>,
    copies: Mutex<HashMap<CopyId, BookCopy>>,
    borrowings: Mutex<HashMap<BorrowingId, Borrowing>>,
    reservations: Mutex<HashMap<ReservationId, Reservation>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            libraries: Mutex::new(HashMap::new()),
            books: Mutex::new(HashMap::new()),
            copies: Mutex::new(HashMap::new()),
            borrowings: Mutex::new(HashMap::new()),
            reservations: Mutex::new(HashMap::new()),
        }
    }

    /// copy → book → library の参照解決（ロックは順に取得して即解放）
    fn library_id_of_copy(&self, copy_id: CopyId) -> Option<LibraryId> {
        let book_id = self.copies.lock().unwrap().get(&copy_id)?.book_id;
        let library_id = self.books.lock().unwrap().get(&book_id)?.library_id;
        Some(library_id)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
