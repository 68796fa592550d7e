//! 规则引擎
//!
//! 按存储顺序评估全部规则，只返回产生动作的规则。

use crate::action::ActionResult;
use crate::models::EvaluationContext;
use crate::rule::Rule;
use serde::{Deserialize, Serialize};

/// 单条规则的命中结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMatch {
    pub rule_id: String,
    pub rule_name: String,
    pub actions: Vec<ActionResult>,
}

/// 规则引擎
///
/// 规则按插入（或加载）顺序保存，评估时不重新排序
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        let mut engine = Self::new();
        engine.replace_all(rules);
        engine
    }

    /// 添加规则，同 ID 的规则原位替换
    pub fn add_rule(&mut self, rule: Rule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    /// 移除规则，不存在时忽略；返回是否移除了规则
    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != rule_id);
        self.rules.len() != before
    }

    pub fn get_rule(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }

    /// 规则快照
    pub fn rules(&self) -> Vec<Rule> {
        self.rules.clone()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 整体替换规则集合
    pub fn replace_all(&mut self, rules: Vec<Rule>) {
        self.rules.clear();
        for rule in rules {
            self.add_rule(rule);
        }
    }

    pub fn evaluate(&self, context: &EvaluationContext) -> Vec<RuleMatch> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let actions = rule.execute(context);
                if actions.is_empty() {
                    return None;
                }
                Some(RuleMatch {
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    actions,
                })
            })
            .collect()
    }
}
