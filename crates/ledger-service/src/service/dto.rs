//! 服务层数据传输对象
//!
//! 请求结构与传输层 JSON 同形（camelCase），响应结构对应
//! `{success, entry, isDuplicate}` 约定

use bigdecimal::{BigDecimal, Zero};
use rule_engine::{ActionResult, RuleMatch};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::{LedgerError, Result};
use crate::models::{DEFAULT_CURRENCY, LedgerEntry, REVERSAL_REFERENCE_PREFIX};

/// 创建奖励请求
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRewardRequest {
    #[validate(length(min = 1, message = "userId 不能为空"))]
    pub user_id: String,
    pub amount: BigDecimal,
    /// 幂等键
    #[validate(length(min = 1, message = "referenceId 不能为空"))]
    pub reference_id: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl CreateRewardRequest {
    pub fn new(
        user_id: impl Into<String>,
        amount: BigDecimal,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            reference_id: reference_id.into(),
            currency: None,
            description: None,
            metadata: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// 派生校验之外的字段检查
    pub(crate) fn check(&self) -> Result<()> {
        self.validate()?;

        if self.amount < BigDecimal::zero() {
            return Err(LedgerError::Validation(format!(
                "amount 不能为负数: {}",
                self.amount
            )));
        }
        // 冲正流水的幂等键由原流水 ID 派生，调用方不得占用
        if self.reference_id.starts_with(REVERSAL_REFERENCE_PREFIX) {
            return Err(LedgerError::Validation(format!(
                "referenceId 不能以 {REVERSAL_REFERENCE_PREFIX} 开头: {}",
                self.reference_id
            )));
        }
        if matches!(&self.currency, Some(c) if c.trim().is_empty()) {
            return Err(LedgerError::Validation("currency 不能为空".to_string()));
        }
        if matches!(&self.metadata, Some(m) if !m.is_object() && !m.is_null()) {
            return Err(LedgerError::Validation("metadata 必须是 JSON 对象".to_string()));
        }
        Ok(())
    }

    pub(crate) fn currency_or_default(&self) -> String {
        self.currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
    }
}

/// 账本写操作响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    pub success: bool,
    pub entry: LedgerEntry,
    /// 幂等键命中已有流水
    pub is_duplicate: bool,
}

impl LedgerResponse {
    pub fn created(entry: LedgerEntry) -> Self {
        Self {
            success: true,
            entry,
            is_duplicate: false,
        }
    }

    pub fn duplicate(entry: LedgerEntry) -> Self {
        Self {
            success: true,
            entry,
            is_duplicate: true,
        }
    }
}

/// 冲正结果：原流水的新快照和新建的冲正流水
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversalOutcome {
    pub original: LedgerEntry,
    pub reversal: LedgerEntry,
}

/// 一次事件触发的发奖结果
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantReport {
    /// 命中的规则及其动作结果
    pub matches: Vec<RuleMatch>,
    /// 奖励动作写入账本的结果（含幂等命中）
    pub rewards: Vec<LedgerResponse>,
    /// 非奖励动作，由调用方继续处理
    pub other_actions: Vec<ActionResult>,
}

impl GrantReport {
    /// 本次新建的流水数
    pub fn created_count(&self) -> usize {
        self.rewards.iter().filter(|r| !r.is_duplicate).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_request_deserialization() {
        let req: CreateRewardRequest = serde_json::from_value(json!({
            "userId": "u1",
            "amount": "50",
            "referenceId": "r1"
        }))
        .unwrap();

        assert_eq!(req.user_id, "u1");
        assert_eq!(req.amount, BigDecimal::from(50));
        assert!(req.currency.is_none());
        assert_eq!(req.currency_or_default(), "USD");
        assert!(req.check().is_ok());
    }

    #[test]
    fn test_check_rejects_bad_input() {
        let base = CreateRewardRequest::new("u1", BigDecimal::from(1), "r1");

        let mut empty_user = base.clone();
        empty_user.user_id.clear();
        assert!(matches!(empty_user.check(), Err(LedgerError::Validation(_))));

        let mut empty_ref = base.clone();
        empty_ref.reference_id.clear();
        assert!(matches!(empty_ref.check(), Err(LedgerError::Validation(_))));

        let negative = CreateRewardRequest::new("u1", BigDecimal::from_str("-0.01").unwrap(), "r1");
        assert!(matches!(negative.check(), Err(LedgerError::Validation(_))));

        let blank_currency = base.clone().with_currency(" ");
        assert!(matches!(blank_currency.check(), Err(LedgerError::Validation(_))));

        let array_metadata = base.clone().with_metadata(json!([1, 2]));
        assert!(matches!(array_metadata.check(), Err(LedgerError::Validation(_))));

        let reserved = CreateRewardRequest::new("u1", BigDecimal::from(1), "reversal-entry-1");
        assert!(matches!(reserved.check(), Err(LedgerError::Validation(_))));

        let zero = CreateRewardRequest::new("u1", BigDecimal::from(0), "r1");
        assert!(zero.check().is_ok());
    }

    #[test]
    fn test_response_shape() {
        let entry = LedgerEntry::new_credit(
            "u1",
            BigDecimal::from(5),
            "USD",
            "r1",
            None,
            None,
            chrono::Utc::now(),
        );
        let value = serde_json::to_value(LedgerResponse::duplicate(entry)).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["isDuplicate"], true);
        assert_eq!(value["entry"]["referenceId"], "r1");
    }
}
