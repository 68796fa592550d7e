use async_trait::async_trait;
use parking_lot::RwLock;

use super::RuleRepository;
use crate::error::{Result, RuleError};
use crate::rule::Rule;

/// 内存规则仓储
///
/// 用于 CLI 的 memory 后端和测试
#[derive(Debug, Default)]
pub struct MemoryRuleRepository {
    rules: RwLock<Vec<Rule>>,
}

impl MemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleRepository for MemoryRuleRepository {
    async fn insert_rule(&self, rule: &Rule) -> Result<()> {
        let mut rules = self.rules.write();
        if rules.iter().any(|r| r.id == rule.id) {
            return Err(RuleError::AlreadyExists(rule.id.clone()));
        }
        rules.push(rule.clone());
        Ok(())
    }

    async fn get_rule_by_id(&self, rule_id: &str) -> Result<Option<Rule>> {
        Ok(self.rules.read().iter().find(|r| r.id == rule_id).cloned())
    }

    async fn list_rules(&self) -> Result<Vec<Rule>> {
        let mut rules = self.rules.read().clone();
        // 稳定排序：创建时间相同时后插入的在前
        rules.reverse();
        rules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rules)
    }

    async fn delete_rule(&self, rule_id: &str) -> Result<bool> {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| r.id != rule_id);
        Ok(rules.len() != before)
    }
}
