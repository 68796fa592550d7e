//! 规则引擎集成测试
//!
//! 覆盖从 JSON 创建规则、持久化、加载到评估的完整流程。

use std::sync::Arc;

use rule_engine::{
    ActionResult, CreateRuleRequest, EvaluationContext, MemoryRuleRepository, RuleRepository,
    RuleService,
};
use serde_json::json;

/// 模拟一次推荐购买事件
fn purchase_context(amount: i64, tier: &str) -> EvaluationContext {
    EvaluationContext::new(json!({
        "event": "purchase",
        "amount": amount,
        "tier": tier,
        "referrer": "user-42",
        "email": "friend@example.com"
    }))
}

fn request_from(value: serde_json::Value) -> CreateRuleRequest {
    serde_json::from_value(value).expect("valid rule request")
}

// ==================== 完整工作流测试 ====================

#[tokio::test]
async fn test_rule_lifecycle_from_json() {
    let repo = Arc::new(MemoryRuleRepository::new());
    let service = RuleService::new(repo.clone());

    let rule = service
        .create_rule(request_from(json!({
            "name": "Big referral purchase",
            "conditions": [
                {"type": "event_type", "field": "event", "operator": "equals", "value": "purchase"},
                {
                    "type": "custom",
                    "operator": "or",
                    "children": [
                        {"type": "amount", "field": "amount", "operator": "greater_than", "value": 200},
                        {"type": "user_property", "field": "tier", "operator": "equals", "value": "gold"}
                    ]
                }
            ],
            "actions": [
                {"type": "reward", "params": {"amount": 25, "description": "Referral bonus"}},
                {"type": "notification", "params": {}}
            ]
        })))
        .await
        .unwrap();

    // 金额满足
    let matches = service.evaluate(&purchase_context(500, "silver"));
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].rule_id, rule.id);
    assert_eq!(matches[0].actions.len(), 2);
    match &matches[0].actions[0] {
        ActionResult::Reward {
            amount,
            currency,
            description,
        } => {
            assert_eq!(amount.to_string(), "25");
            assert_eq!(currency, "USD");
            assert_eq!(description, "Referral bonus");
        }
        other => panic!("expected reward, got {other:?}"),
    }
    assert_eq!(
        matches[0].actions[1],
        ActionResult::Notification {
            message: "Notification sent".to_string()
        }
    );

    // 等级满足
    assert_eq!(service.evaluate(&purchase_context(50, "gold")).len(), 1);
    // 都不满足
    assert!(service.evaluate(&purchase_context(50, "silver")).is_empty());

    // 重新加载后行为一致
    let reloaded = RuleService::load(repo.clone()).await.unwrap();
    assert_eq!(reloaded.evaluate(&purchase_context(500, "silver")).len(), 1);

    assert!(service.delete_rule(&rule.id).await.unwrap());
    assert!(repo.list_rules().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disabled_rule_is_stored_but_never_fires() {
    let service = RuleService::new(Arc::new(MemoryRuleRepository::new()));

    let rule = service
        .create_rule(request_from(json!({
            "name": "Paused campaign",
            "enabled": false,
            "conditions": [{"type": "amount", "field": "amount", "operator": "greater_than", "value": "0"}],
            "actions": [{"type": "reward", "params": {"amount": 1}}]
        })))
        .await
        .unwrap();

    assert!(!rule.enabled);
    assert!(service.get_rule(&rule.id).await.unwrap().is_some());
    assert!(service.evaluate(&purchase_context(500, "gold")).is_empty());
}

#[tokio::test]
async fn test_multiple_rules_keep_stored_order() {
    let service = RuleService::new(Arc::new(MemoryRuleRepository::new()));

    for (name, threshold) in [("Tier 1", "100"), ("Tier 2", "300"), ("Tier 3", "1000")] {
        service
            .create_rule(request_from(json!({
                "name": name,
                "conditions": [{"type": "amount", "field": "amount", "operator": "greater_than", "value": threshold}],
                "actions": [{"type": "webhook", "params": {"url": "https://hooks.example.com"}}]
            })))
            .await
            .unwrap();
    }

    let names: Vec<_> = service
        .evaluate(&purchase_context(500, "silver"))
        .into_iter()
        .map(|m| m.rule_name)
        .collect();
    assert_eq!(names, vec!["Tier 1", "Tier 2"]);
}

#[tokio::test]
async fn test_loose_coercion_in_rules() {
    let service = RuleService::new(Arc::new(MemoryRuleRepository::new()));

    service
        .create_rule(request_from(json!({
            "name": "Exact amount",
            "conditions": [
                {"type": "amount", "field": "amount", "operator": "equals", "value": "500"},
                {"type": "custom", "field": "email", "operator": "contains", "value": "@example.com"}
            ],
            "actions": [{"type": "custom", "params": {"code": "X"}}]
        })))
        .await
        .unwrap();

    // 数值 500 与字符串 "500" 相等
    assert_eq!(service.evaluate(&purchase_context(500, "silver")).len(), 1);
    assert!(service.evaluate(&purchase_context(501, "silver")).is_empty());
    // 缺失字段不满足任何条件
    assert!(service
        .evaluate(&EvaluationContext::new(json!({"amount": 500})))
        .is_empty());
}
