use super::ReservationStatus;

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnCopyError {
    /// 既に返却済み
    AlreadyReturned,
    /// 紛失処理済みの貸出は返却できない
    MarkedLost,
    /// 返却日は貸出日以降であること
    ReturnedBeforeBorrowed,
}

/// 紛失処理のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkLostError {
    /// 既に返却済み
    AlreadyReturned,
    /// 既に紛失処理済み
    AlreadyLost,
}

/// 延滞料金の支払フラグ操作のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinePaymentError {
    /// 未返却の貸出は料金が確定していない
    StillOpen,
    /// 既に支払済み
    AlreadyPaid,
}

/// 予約の状態遷移エラー
///
/// すべての遷移（昇格・履行・取消・失効）はPending状態のみ受け付ける。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationTransitionError {
    /// Pending以外からの遷移は不可
    NotPending { current: ReservationStatus },
    /// 取置期限がまだ到来していない
    NotYetExpired,
}
