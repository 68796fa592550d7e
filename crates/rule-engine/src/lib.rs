//! 奖励规则引擎
//!
//! 提供可复用的规则评估能力，支持：
//! - 条件树（顶层隐式 AND，条件内部显式 AND/OR 嵌套）
//! - 宽松类型的比较语义（字符串化相等、浮点数值比较）
//! - 动作执行器：只描述副作用，不直接写账本
//! - 规则持久化（内存 / PostgreSQL）与规则服务

pub mod action;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod operators;
pub mod repository;
pub mod rule;
pub mod service;

pub use action::{Action, ActionExecutor, ActionResult, ActionType};
pub use engine::{RuleEngine, RuleMatch};
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use models::{Condition, ConditionNode, ConditionType, EvaluationContext, LogicalGroup, Predicate};
pub use operators::{LogicalOperator, Operator};
pub use repository::{MemoryRuleRepository, PgRuleRepository, RuleRepository};
pub use rule::Rule;
pub use service::{CreateRuleRequest, RuleService};
