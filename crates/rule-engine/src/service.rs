//! 规则服务
//!
//! 负责规则的创作、持久化与加载，并维护内存中的规则引擎。
//! 所有写操作先落库，再同步到引擎。

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use referral_shared::observability::metrics::record_rule_evaluation;

use crate::action::Action;
use crate::engine::{RuleEngine, RuleMatch};
use crate::error::{Result, RuleError};
use crate::models::{Condition, ConditionNode, EvaluationContext};
use crate::operators::Operator;
use crate::repository::RuleRepository;
use crate::rule::Rule;

/// 创建规则请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1, message = "规则名称不能为空"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "至少需要一个条件"))]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    #[validate(length(min = 1, message = "至少需要一个动作"))]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl CreateRuleRequest {
    /// 校验条件树：叶子需要字段名和可识别的操作符
    fn validate_conditions(&self) -> Result<()> {
        let mut problem = None;
        for condition in &self.conditions {
            condition.walk(&mut |node| {
                if problem.is_some() {
                    return;
                }
                if let ConditionNode::Predicate(predicate) = &node.node {
                    if predicate.field.is_empty() {
                        problem = Some("条件字段不能为空".to_string());
                    } else if predicate.operator == Operator::Unknown {
                        problem = Some(format!("条件 {} 的操作符无法识别", predicate.field));
                    }
                }
            });
        }

        match problem {
            Some(msg) => Err(RuleError::Validation(msg)),
            None => Ok(()),
        }
    }

    /// 转换为规则，为缺少 ID 的节点分配 ID
    fn into_rule(self) -> Rule {
        let now = Utc::now();
        let mut conditions = self.conditions;
        for condition in &mut conditions {
            condition.walk_mut(&mut |node| {
                if node.id.is_empty() {
                    node.id = format!("cond-{}", Uuid::new_v4());
                }
            });
        }

        let actions = self
            .actions
            .into_iter()
            .map(|mut action| {
                if action.id.is_empty() {
                    action.id = format!("action-{}", Uuid::new_v4());
                }
                action
            })
            .collect();

        Rule {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("rule-{}", Uuid::new_v4())),
            name: self.name,
            conditions,
            actions,
            enabled: self.enabled.unwrap_or(true),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 规则服务
pub struct RuleService<R: ?Sized = dyn RuleRepository> {
    repository: Arc<R>,
    engine: RwLock<RuleEngine>,
}

impl<R> RuleService<R>
where
    R: RuleRepository + ?Sized,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            engine: RwLock::new(RuleEngine::new()),
        }
    }

    /// 创建服务并从仓储加载全部规则
    pub async fn load(repository: Arc<R>) -> Result<Self> {
        let service = Self::new(repository);
        service.reload().await?;
        Ok(service)
    }

    /// 创建规则
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_rule(&self, request: CreateRuleRequest) -> Result<Rule> {
        request.validate()?;
        request.validate_conditions()?;

        let rule = request.into_rule();
        self.repository.insert_rule(&rule).await?;
        self.engine.write().add_rule(rule.clone());

        info!(rule_id = %rule.id, "规则已创建");
        Ok(rule)
    }

    pub async fn get_rule(&self, rule_id: &str) -> Result<Option<Rule>> {
        self.repository.get_rule_by_id(rule_id).await
    }

    /// 列出全部规则（按创建时间倒序）
    pub async fn list_rules(&self) -> Result<Vec<Rule>> {
        self.repository.list_rules().await
    }

    /// 删除规则，不存在时返回 false
    #[instrument(skip(self))]
    pub async fn delete_rule(&self, rule_id: &str) -> Result<bool> {
        let deleted = self.repository.delete_rule(rule_id).await?;
        self.engine.write().remove_rule(rule_id);

        if deleted {
            info!(rule_id, "规则已删除");
        } else {
            warn!(rule_id, "删除的规则不存在");
        }
        Ok(deleted)
    }

    /// 用仓储中的规则整体替换引擎内容
    ///
    /// 引擎按创建时间正序评估，与 `create_rule` 逐条追加的顺序一致
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<usize> {
        let mut rules = self.repository.list_rules().await?;
        // 仓储返回倒序；先反转保持同一时间戳规则的插入顺序，再稳定排序
        rules.reverse();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let count = rules.len();
        self.engine.write().replace_all(rules);

        info!(count, "规则已加载");
        Ok(count)
    }

    /// 评估上下文，返回命中的规则及其动作结果
    pub fn evaluate(&self, context: &EvaluationContext) -> Vec<RuleMatch> {
        let start = Instant::now();
        let matches = self.engine.read().evaluate(context);

        record_rule_evaluation(matches.len(), start.elapsed().as_secs_f64());
        debug!(matched = matches.len(), "规则评估完成");
        matches
    }

    /// 引擎中的规则快照
    pub fn engine_rules(&self) -> Vec<Rule> {
        self.engine.read().rules()
    }
}
