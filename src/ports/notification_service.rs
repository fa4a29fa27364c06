use crate::domain::events::DomainEvent;
use crate::domain::value_objects::BorrowerId;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 通知サービスポート
///
/// 「予約の資料が用意できた」「返却期限を過ぎている」等の通知配信を
/// 抽象化する。実装はメール、SMS、プッシュ通知などが考えられる。
///
/// fire-and-forget契約：配信の失敗が貸出・予約のトランザクションを
/// 巻き戻すことはない。呼び出し側はエラーをログに記録して飲み込む。
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// 利用者へイベントを通知する
    async fn notify(&self, user_id: BorrowerId, event: &DomainEvent) -> Result<()>;
}
