//! 规则命中到账本入账的桥接
//!
//! 规则引擎只产出动作描述；这里把其中的奖励动作显式写成账本流水。
//! 幂等键由事件引用、用户、规则 ID 与动作序号确定：同一事件重复处理不会重复发奖，
//! 同一事件下的不同用户（推荐人与被推荐人）各自入账。

use std::sync::Arc;

use rule_engine::{ActionResult, EvaluationContext, RuleRepository, RuleService};
use serde_json::json;
use tracing::{info, instrument};

use crate::error::{LedgerError, Result};
use crate::repository::LedgerRepository;
use crate::service::dto::{CreateRewardRequest, GrantReport};
use crate::service::ledger_service::LedgerService;

/// 奖励发放器
pub struct RewardGranter<L: ?Sized = dyn LedgerRepository, R: ?Sized = dyn RuleRepository> {
    ledger: Arc<LedgerService<L>>,
    rules: Arc<RuleService<R>>,
}

impl<L, R> RewardGranter<L, R>
where
    L: LedgerRepository + ?Sized,
    R: RuleRepository + ?Sized,
{
    pub fn new(ledger: Arc<LedgerService<L>>, rules: Arc<RuleService<R>>) -> Self {
        Self { ledger, rules }
    }

    /// 奖励动作的幂等键
    pub fn reward_reference(
        event_ref: &str,
        user_id: &str,
        rule_id: &str,
        action_index: usize,
    ) -> String {
        format!("{event_ref}:{user_id}:{rule_id}:{action_index}")
    }

    /// 评估事件上下文并为命中的奖励动作入账
    ///
    /// 任一入账失败立即返回错误；已写入的流水保留，重试同一事件时按幂等键跳过
    #[instrument(skip(self, context))]
    pub async fn grant(
        &self,
        user_id: &str,
        event_ref: &str,
        context: &EvaluationContext,
    ) -> Result<GrantReport> {
        if event_ref.is_empty() {
            return Err(LedgerError::Validation("eventRef 不能为空".to_string()));
        }

        let matches = self.rules.evaluate(context);
        let mut report = GrantReport::default();

        for rule_match in &matches {
            for (index, action) in rule_match.actions.iter().enumerate() {
                let ActionResult::Reward {
                    amount,
                    currency,
                    description,
                } = action
                else {
                    report.other_actions.push(action.clone());
                    continue;
                };

                let request = CreateRewardRequest::new(
                    user_id,
                    amount.clone(),
                    Self::reward_reference(event_ref, user_id, &rule_match.rule_id, index),
                )
                .with_currency(currency.clone())
                .with_description(description.clone())
                .with_metadata(json!({
                    "ruleId": rule_match.rule_id,
                    "ruleName": rule_match.rule_name,
                    "eventRef": event_ref,
                }));

                report.rewards.push(self.ledger.create_reward(request).await?);
            }
        }

        info!(
            matched_rules = matches.len(),
            rewards = report.rewards.len(),
            created = report.created_count(),
            "事件发奖完成"
        );

        report.matches = matches;
        Ok(report)
    }
}
