//! 规则：顶层条件隐式 AND，命中后按顺序执行动作

use crate::action::{Action, ActionResult};
use crate::evaluator::ConditionEvaluator;
use crate::models::{Condition, EvaluationContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

/// 奖励规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// 评估规则
    ///
    /// 停用规则直接返回 false，不评估任何条件；无条件的规则恒为真
    pub fn evaluate(&self, context: &EvaluationContext) -> bool {
        if !self.enabled {
            return false;
        }

        self.conditions
            .iter()
            .all(|condition| ConditionEvaluator::evaluate(condition, context))
    }

    /// 评估一次，命中则按列表顺序执行全部动作
    pub fn execute(&self, context: &EvaluationContext) -> Vec<ActionResult> {
        if !self.evaluate(context) {
            return Vec::new();
        }

        self.actions
            .iter()
            .map(|action| action.execute(context))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionType;
    use crate::operators::Operator;
    use serde_json::json;

    fn high_value_rule() -> Rule {
        Rule::new("rule-1", "High value referral")
            .with_condition(Condition::predicate("amount", Operator::GreaterThan, "200"))
            .with_condition(Condition::predicate("event", Operator::Equals, "purchase"))
            .with_action(Action::reward(10))
            .with_action(Action::new(
                ActionType::Notification,
                json!({"message": "Reward granted"}),
            ))
    }

    #[test]
    fn test_top_level_conditions_are_anded() {
        let rule = high_value_rule();

        assert!(rule.evaluate(&EvaluationContext::new(
            json!({"amount": 500, "event": "purchase"})
        )));
        assert!(!rule.evaluate(&EvaluationContext::new(
            json!({"amount": 500, "event": "signup"})
        )));
    }

    #[test]
    fn test_disabled_rule_never_fires() {
        let rule = high_value_rule().disabled();
        let ctx = EvaluationContext::new(json!({"amount": 500, "event": "purchase"}));

        assert!(!rule.evaluate(&ctx));
        assert!(rule.execute(&ctx).is_empty());
    }

    #[test]
    fn test_rule_without_conditions_always_fires() {
        let rule = Rule::new("rule-2", "Always").with_action(Action::reward(1));
        let results = rule.execute(&EvaluationContext::default());

        assert_eq!(results.len(), 1);
        assert!(results[0].is_reward());
    }

    #[test]
    fn test_execute_preserves_action_order() {
        let rule = high_value_rule();
        let results = rule.execute(&EvaluationContext::new(
            json!({"amount": 500, "event": "purchase"}),
        ));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].action_type(), ActionType::Reward);
        assert_eq!(results[1].action_type(), ActionType::Notification);
    }

    #[test]
    fn test_rule_deserialization_defaults() {
        let rule: Rule = serde_json::from_str(
            r#"{
                "id": "rule-3",
                "name": "Signup",
                "conditions": [
                    {"id": "cond-1", "type": "event_type", "field": "event", "operator": "equals", "value": "signup"}
                ],
                "actions": [{"id": "action-1", "type": "reward", "params": {"amount": 5}}]
            }"#,
        )
        .unwrap();

        assert!(rule.enabled);
        assert_eq!(rule.conditions.len(), 1);
        assert_eq!(rule.actions.len(), 1);

        let value = serde_json::to_value(&rule).unwrap();
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["enabled"], true);
    }
}
