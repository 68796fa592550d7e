//! 奖励状态机
//!
//! ```text
//! pending ──confirm──> confirmed ──mark_paid──> paid
//!    │                     │                      │
//!    └───────reverse───────┴────────reverse───────┴──> reversed
//! ```

use crate::error::{LedgerError, Result};
use crate::models::RewardStatus;

/// 可对流水执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    Confirm,
    MarkPaid,
    Reverse,
}

impl LedgerAction {
    /// 动作的目标状态
    pub fn target(&self) -> RewardStatus {
        match self {
            Self::Confirm => RewardStatus::Confirmed,
            Self::MarkPaid => RewardStatus::Paid,
            Self::Reverse => RewardStatus::Reversed,
        }
    }

    /// 由目标状态推导动作，pending 没有对应动作
    pub fn for_target(target: RewardStatus) -> Option<Self> {
        match target {
            RewardStatus::Confirmed => Some(Self::Confirm),
            RewardStatus::Paid => Some(Self::MarkPaid),
            RewardStatus::Reversed => Some(Self::Reverse),
            RewardStatus::Pending => None,
        }
    }
}

/// 计算状态转换结果，非法转换返回错误
pub fn next_status(entry_id: &str, current: RewardStatus, action: LedgerAction) -> Result<RewardStatus> {
    use RewardStatus::*;

    match (current, action) {
        (Pending, LedgerAction::Confirm) => Ok(Confirmed),
        (Confirmed, LedgerAction::MarkPaid) => Ok(Paid),
        (Reversed, LedgerAction::Reverse) => Err(LedgerError::AlreadyReversed(entry_id.to_string())),
        (Pending | Confirmed | Paid, LedgerAction::Reverse) => Ok(Reversed),
        (from, action) => Err(LedgerError::InvalidTransition {
            entry_id: entry_id.to_string(),
            from,
            to: action.target(),
        }),
    }
}
