use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::enums::{EntryType, RewardStatus};

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_REWARD_DESCRIPTION: &str = "Referral reward";
pub const DEFAULT_REVERSAL_REASON: &str = "No reason provided";
pub const REVERSAL_REFERENCE_PREFIX: &str = "reversal-";

/// 账本流水
///
/// 记录不可变：状态变更时生成新的快照并以同一 ID 覆盖保存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: RewardStatus,
    /// 幂等键，全局唯一
    pub reference_id: String,
    pub description: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn generate_id() -> String {
        format!("entry-{}", Uuid::new_v4())
    }

    /// 新建待确认的奖励入账
    pub fn new_credit(
        user_id: impl Into<String>,
        amount: BigDecimal,
        currency: impl Into<String>,
        reference_id: impl Into<String>,
        description: Option<String>,
        metadata: Option<Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::generate_id(),
            user_id: user_id.into(),
            entry_type: EntryType::Credit,
            amount,
            currency: currency.into(),
            status: RewardStatus::Pending,
            reference_id: reference_id.into(),
            description: Some(description.unwrap_or_else(|| DEFAULT_REWARD_DESCRIPTION.to_string())),
            metadata: metadata.unwrap_or_else(|| json!({})),
            created_at: now,
            updated_at: now,
        }
    }

    /// 为原始流水生成冲正流水
    pub fn reversal_of(original: &LedgerEntry, reason: Option<&str>, now: DateTime<Utc>) -> Self {
        let reason = reason
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REVERSAL_REASON);

        Self {
            id: Self::generate_id(),
            user_id: original.user_id.clone(),
            entry_type: EntryType::Reversal,
            amount: original.amount.clone(),
            currency: original.currency.clone(),
            status: RewardStatus::Reversed,
            reference_id: Self::reversal_reference(&original.id),
            description: Some(format!(
                "Reversal: {}",
                original.description.as_deref().unwrap_or_default()
            )),
            metadata: json!({
                "originalEntryId": original.id,
                "reason": reason,
            }),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn reversal_reference(original_id: &str) -> String {
        format!("{REVERSAL_REFERENCE_PREFIX}{original_id}")
    }

    /// 状态变更后的新快照
    pub fn with_status(&self, status: RewardStatus, updated_at: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at,
            ..self.clone()
        }
    }

    /// 计入余额的带符号金额：入账为正，出账和冲正为负
    pub fn signed_amount(&self) -> BigDecimal {
        if self.entry_type.is_credit() {
            self.amount.clone()
        } else {
            -self.amount.clone()
        }
    }

    /// 已冲正的流水不计入余额
    pub fn counts_toward_balance(&self) -> bool {
        self.status != RewardStatus::Reversed
    }
}
