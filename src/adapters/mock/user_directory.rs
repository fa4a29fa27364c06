use crate::domain::value_objects::BorrowerId;
use crate::ports::user_directory::{Result, UserDirectory as UserDirectoryTrait, UserProfile};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// UserDirectoryのモック実装
///
/// 登録された利用者のプロフィールを返す。状態を持ったテストをサポート。
pub struct UserDirectory {
    users: Mutex<HashMap<BorrowerId, UserProfile>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    /// テスト用に利用者を登録
    pub fn add_user(&self, user_id: BorrowerId, profile: UserProfile) {
        self.users.lock().unwrap().insert(user_id, profile);
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectoryTrait for UserDirectory {
    /// 登録された利用者のプロフィールを返す（未登録はNone）
    async fn get_user(&self, user_id: BorrowerId) -> Result<Option<UserProfile>> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }
}
