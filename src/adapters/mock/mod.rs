pub mod notification_service;
pub mod user_directory;

pub use notification_service::NotificationService;
pub use user_directory::UserDirectory;
