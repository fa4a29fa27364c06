use crate::application::errors::{CirculationError, Result};
use crate::application::ServiceDependencies;
use crate::domain::catalog::Library;
use crate::domain::policy::LendingPolicy;
use crate::domain::value_objects::{CopyId, LibraryId, LibraryStatus};

/// 純粋関数：稼働中の図書館のポリシーを取り出す
///
/// ビジネスルール：Active以外の図書館は新規の貸出・予約を受け付けない。
pub fn active_policy(library: &Library) -> Result<LendingPolicy> {
    if library.status != LibraryStatus::Active {
        return Err(CirculationError::LibraryNotActive {
            status: library.status,
        });
    }
    Ok(library.policy)
}

/// 図書館IDからポリシーを解決する（新規貸出・予約の経路）
///
/// 図書館が存在しない場合は`LibraryNotFound`、稼働中でない場合は
/// `LibraryNotActive`。
pub async fn resolve_active(
    deps: &ServiceDependencies,
    library_id: LibraryId,
) -> Result<LendingPolicy> {
    let library = deps
        .catalog
        .get_library(library_id)
        .await?
        .ok_or(CirculationError::LibraryNotFound)?;

    active_policy(&library)
}

/// 資料の所属図書館のポリシーを状態に関わらず解決する
///
/// 稼働停止中の図書館でも返却・延滞料金の計算・予約の取消と失効は
/// 継続する必要があるため、図書館の状態を確認しない。
pub async fn policy_of_copy_any(
    deps: &ServiceDependencies,
    copy_id: CopyId,
) -> Result<LendingPolicy> {
    let library = deps
        .catalog
        .library_of_copy(copy_id)
        .await?
        .ok_or(CirculationError::LibraryNotFound)?;

    Ok(library.policy)
}
