//! PostgreSQL 规则仓储
//!
//! 条件树按邻接表存储在 rule_conditions，加载时按 parent_id 重新组装

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::RuleRepository;
use crate::action::{Action, ActionType};
use crate::error::{Result, RuleError};
use crate::models::{Condition, ConditionDef, ConditionType};
use crate::rule::Rule;

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: String,
    name: String,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ConditionRow {
    id: String,
    rule_id: String,
    condition_type: String,
    field: String,
    operator: String,
    value: Option<String>,
    parent_id: Option<String>,
    condition_order: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct ActionRow {
    id: String,
    rule_id: String,
    action_type: String,
    params: Value,
}

/// PostgreSQL 规则仓储
pub struct PgRuleRepository {
    pool: PgPool,
}

impl PgRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_conditions(tx: &mut PgConnection, rows: &[ConditionRow]) -> Result<()> {
        // 先序遍历产生的行保证父节点先于子节点插入
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO rule_conditions (id, rule_id, condition_type, field, operator, value, parent_id, condition_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&row.id)
            .bind(&row.rule_id)
            .bind(&row.condition_type)
            .bind(&row.field)
            .bind(&row.operator)
            .bind(&row.value)
            .bind(&row.parent_id)
            .bind(row.condition_order)
            .execute(&mut *tx)
            .await?;
        }
        Ok(())
    }

    async fn insert_actions(tx: &mut PgConnection, rule: &Rule) -> Result<()> {
        for (order, action) in rule.actions.iter().enumerate() {
            let id = if action.id.is_empty() {
                format!("action-{}", Uuid::new_v4())
            } else {
                action.id.clone()
            };

            sqlx::query(
                r#"
                INSERT INTO rule_actions (id, rule_id, action_type, params, action_order)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&id)
            .bind(&rule.id)
            .bind(action.action_type.as_str())
            .bind(Value::Object(action.params.clone()))
            .bind(order as i32)
            .execute(&mut *tx)
            .await?;
        }
        Ok(())
    }

    /// 批量加载条件与动作，组装成完整规则
    async fn hydrate(&self, rule_rows: Vec<RuleRow>) -> Result<Vec<Rule>> {
        if rule_rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = rule_rows.iter().map(|r| r.id.clone()).collect();

        let condition_rows = sqlx::query_as::<_, ConditionRow>(
            r#"
            SELECT id, rule_id, condition_type, field, operator, value, parent_id, condition_order
            FROM rule_conditions
            WHERE rule_id = ANY($1)
            ORDER BY condition_order ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let action_rows = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT id, rule_id, action_type, params
            FROM rule_actions
            WHERE rule_id = ANY($1)
            ORDER BY action_order ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut conditions_by_rule: HashMap<String, Vec<ConditionRow>> = HashMap::new();
        for row in condition_rows {
            conditions_by_rule
                .entry(row.rule_id.clone())
                .or_default()
                .push(row);
        }

        let mut actions_by_rule: HashMap<String, Vec<Action>> = HashMap::new();
        for row in action_rows {
            let action = Action::new(ActionType::parse(&row.action_type), row.params).with_id(row.id);
            actions_by_rule.entry(row.rule_id).or_default().push(action);
        }

        let rules = rule_rows
            .into_iter()
            .map(|row| Rule {
                conditions: assemble_conditions(
                    conditions_by_rule.remove(&row.id).unwrap_or_default(),
                ),
                actions: actions_by_rule.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                enabled: row.enabled,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
            .collect();

        Ok(rules)
    }
}

/// 把条件树展开成行（先序），缺少 ID 的节点分配新 ID
fn flatten_conditions(rule_id: &str, conditions: &[Condition]) -> Vec<ConditionRow> {
    fn visit(
        rule_id: &str,
        def: ConditionDef,
        parent_id: Option<String>,
        order: usize,
        out: &mut Vec<ConditionRow>,
    ) {
        let id = if def.id.is_empty() {
            format!("cond-{}", Uuid::new_v4())
        } else {
            def.id
        };

        out.push(ConditionRow {
            id: id.clone(),
            rule_id: rule_id.to_string(),
            condition_type: def.condition_type.as_str().to_string(),
            field: def.field,
            operator: def.operator,
            value: def.value.map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            }),
            parent_id,
            condition_order: order as i32,
        });

        for (child_order, child) in def.children.into_iter().enumerate() {
            visit(rule_id, child, Some(id.clone()), child_order, out);
        }
    }

    let mut rows = Vec::new();
    for (order, condition) in conditions.iter().enumerate() {
        visit(rule_id, ConditionDef::from(condition.clone()), None, order, &mut rows);
    }
    rows
}

/// 按 parent_id 把行重新组装成条件树，同级按 condition_order 排列
fn assemble_conditions(rows: Vec<ConditionRow>) -> Vec<Condition> {
    let mut children: HashMap<Option<String>, Vec<ConditionRow>> = HashMap::new();
    for row in rows {
        children.entry(row.parent_id.clone()).or_default().push(row);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|r| r.condition_order);
    }

    fn build(
        parent: Option<String>,
        children: &mut HashMap<Option<String>, Vec<ConditionRow>>,
    ) -> Vec<ConditionDef> {
        let Some(rows) = children.remove(&parent) else {
            return Vec::new();
        };

        rows.into_iter()
            .map(|row| ConditionDef {
                children: build(Some(row.id.clone()), children),
                id: row.id,
                condition_type: ConditionType::parse(&row.condition_type),
                field: row.field,
                operator: row.operator,
                value: row.value.map(Value::String),
            })
            .collect()
    }

    build(None, &mut children)
        .into_iter()
        .map(Condition::from)
        .collect()
}

#[async_trait]
impl RuleRepository for PgRuleRepository {
    async fn insert_rule(&self, rule: &Rule) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO rules (id, name, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.name)
        .bind(rule.enabled)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(RuleError::AlreadyExists(rule.id.clone()));
        }

        let rows = flatten_conditions(&rule.id, &rule.conditions);
        Self::insert_conditions(&mut tx, &rows).await?;
        Self::insert_actions(&mut tx, rule).await?;

        tx.commit().await?;

        debug!(rule_id = %rule.id, conditions = rows.len(), actions = rule.actions.len(), "规则已写入");
        Ok(())
    }

    async fn get_rule_by_id(&self, rule_id: &str) -> Result<Option<Rule>> {
        let row = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT id, name, enabled, created_at, updated_at
            FROM rules
            WHERE id = $1
            "#,
        )
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn list_rules(&self) -> Result<Vec<Rule>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT id, name, enabled, created_at, updated_at
            FROM rules
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn delete_rule(&self, rule_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM rule_actions WHERE rule_id = $1")
            .bind(rule_id)
            .execute(&mut *tx)
            .await?;

        // 同一条语句删除整棵条件树，自引用外键在语句结束时检查
        sqlx::query("DELETE FROM rule_conditions WHERE rule_id = $1")
            .bind(rule_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM rules WHERE id = $1")
            .bind(rule_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(deleted.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConditionNode;
    use crate::operators::{LogicalOperator, Operator};

    fn sample_conditions() -> Vec<Condition> {
        vec![
            Condition::predicate("event", Operator::Equals, "purchase").with_id("cond-a"),
            Condition::or(vec![
                Condition::predicate("amount", Operator::GreaterThan, "200").with_id("cond-c"),
                Condition::predicate("tier", Operator::Equals, "gold").with_id("cond-d"),
            ])
            .with_id("cond-b"),
        ]
    }

    #[test]
    fn test_flatten_is_preorder_with_parents() {
        let rows = flatten_conditions("rule-1", &sample_conditions());

        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["cond-a", "cond-b", "cond-c", "cond-d"]);
        assert_eq!(rows[0].parent_id, None);
        assert_eq!(rows[2].parent_id.as_deref(), Some("cond-b"));
        assert_eq!(rows[3].condition_order, 1);
        assert_eq!(rows[1].operator, "or");
        assert_eq!(rows[2].value.as_deref(), Some("200"));
    }

    #[test]
    fn test_flatten_assigns_missing_ids() {
        let rows = flatten_conditions(
            "rule-1",
            &[Condition::and(vec![Condition::predicate("a", Operator::Equals, "1")])],
        );

        assert!(rows.iter().all(|r| r.id.starts_with("cond-")));
        assert_eq!(rows[1].parent_id.as_deref(), Some(rows[0].id.as_str()));
    }

    #[test]
    fn test_assemble_restores_tree() {
        let original = sample_conditions();
        let mut rows = flatten_conditions("rule-1", &original);
        // 数据库返回的行顺序不保证
        rows.reverse();

        let assembled = assemble_conditions(rows);
        assert_eq!(assembled, original);

        let ConditionNode::Group(group) = &assembled[1].node else {
            panic!("expected group node");
        };
        assert_eq!(group.operator, LogicalOperator::Or);
        assert_eq!(group.children.len(), 2);
    }

    #[test]
    fn test_assemble_empty() {
        assert!(assemble_conditions(Vec::new()).is_empty());
    }
}
