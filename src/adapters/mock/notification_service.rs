use crate::domain::events::DomainEvent;
use crate::domain::value_objects::BorrowerId;
use crate::ports::notification_service::{NotificationService as NotificationServiceTrait, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// NotificationServiceのモック実装
///
/// 実際の配信は行わず、構造化ペイロードをログに出して記録する。
/// テストから送信済みイベントを検査できる。
pub struct NotificationService {
    sent: Mutex<Vec<(BorrowerId, DomainEvent)>>,
}

impl NotificationService {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    /// 送信済み通知のスナップショット（テスト検査用）
    pub fn sent(&self) -> Vec<(BorrowerId, DomainEvent)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationServiceTrait for NotificationService {
    async fn notify(&self, user_id: BorrowerId, event: &DomainEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(
            user_id = %user_id.value(),
            payload = %payload,
            "notification dispatched"
        );

        self.sent.lock().unwrap().push((user_id, event.clone()));
        Ok(())
    }
}
