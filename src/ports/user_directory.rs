use crate::domain::value_objects::BorrowerId;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 利用者の表示用プロフィール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub full_name: String,
    pub email: String,
    pub department_name: String,
    pub registration_number: String,
}

/// 利用者ディレクトリポート
///
/// 貸出コンテキストと利用者管理コンテキストの境界を維持する。
/// 取得した情報は表示の補完のみに使用し、認可判断には使用しない。
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// 利用者のプロフィールを取得する
    async fn get_user(&self, user_id: BorrowerId) -> Result<Option<UserProfile>>;
}
