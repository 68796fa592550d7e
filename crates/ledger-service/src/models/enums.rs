//! 账本枚举类型
//!
//! 同时支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};
use std::fmt;

/// 流水类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum EntryType {
    /// 入账 - 奖励发放
    Credit,
    /// 出账
    Debit,
    /// 冲正 - 抵消一笔原始流水，创建即为终态
    Reversal,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::Reversal => "reversal",
        }
    }

    /// 计入余额时的方向
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::Credit)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 奖励状态
///
/// pending -> confirmed -> paid，任意非终态均可冲正为 reversed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum RewardStatus {
    /// 待确认
    #[default]
    Pending,
    /// 已确认，等待支付
    Confirmed,
    /// 已支付
    Paid,
    /// 已冲正（终态）
    Reversed,
}

impl RewardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Paid => "paid",
            Self::Reversed => "reversed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reversed)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "paid" => Some(Self::Paid),
            "reversed" => Some(Self::Reversed),
            _ => None,
        }
    }
}

impl fmt::Display for RewardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
