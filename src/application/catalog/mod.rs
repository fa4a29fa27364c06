mod catalog_service;

pub use catalog_service::{
    add_copy, create_book, create_library, delete_library, get_copy, get_library, list_copies,
    set_library_status, update_copy_details, AddCopy, CreateBook, CreateLibrary,
};
