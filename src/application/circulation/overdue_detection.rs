use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::application::errors::{CirculationError, Result};
use crate::application::ServiceDependencies;
use crate::domain::borrowing::{self, Borrowing};
use crate::domain::value_objects::BorrowingStatus;
use crate::domain::{BorrowingBecameOverdue, DomainEvent};

/// 延滞検知バッチ
///
/// 定期的に実行され、返却期限を過ぎたBorrowed状態の貸出にOverdueを
/// 永続化し、延滞通知を送る。
///
/// このバッチはレポート用のスナップショットを作るだけで、正しさには
/// 寄与しない：実効ステータスと延滞料金は読み取りのたびに日付から
/// 再計算されるため、バッチが一度も動かなくても結果は変わらない。
///
/// 処理フロー：
/// 1. リポジトリから延滞候補をストリームで取得
/// 2. 各候補について延滞を再判定（既にOverdue/終端のものは飛ばす）
/// 3. Overdueを永続化し、通知を送る
///
/// # 戻り値
/// 延滞として検出した貸出の件数
pub async fn detect_overdue_borrowings(
    deps: &ServiceDependencies,
    now: DateTime<Utc>,
) -> Result<usize> {
    let mut detected_count = 0;

    let mut candidates = deps.borrowings.stream_overdue_candidates(now);

    while let Some(candidate) = candidates.next().await {
        let candidate = candidate.map_err(CirculationError::BorrowingRepositoryError)?;

        // 候補はBorrowedかつ期限超過のはずだが、ストリーム取得後に状態が
        // 変わっていることがあるため再判定する
        if candidate.status != BorrowingStatus::Borrowed || !borrowing::is_overdue(&candidate, now)
        {
            continue;
        }

        let updated = Borrowing {
            status: BorrowingStatus::Overdue,
            updated_at: now,
            ..candidate.clone()
        };

        deps.borrowings
            .save(updated)
            .await
            .map_err(CirculationError::BorrowingRepositoryError)?;

        let event = BorrowingBecameOverdue {
            borrowing_id: candidate.borrowing_id,
            copy_id: candidate.copy_id,
            borrower_id: candidate.borrower_id,
            due_date: candidate.due_date,
            detected_at: now,
        };

        super::dispatch_notification(
            deps,
            candidate.borrower_id,
            DomainEvent::BorrowingBecameOverdue(event),
        )
        .await;

        detected_count += 1;
    }

    Ok(detected_count)
}
