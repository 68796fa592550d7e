//! 规则仓储
//!
//! 服务层只依赖 [`RuleRepository`]，内存与 PostgreSQL 两种实现可互换

mod memory;
mod postgres;

pub use memory::MemoryRuleRepository;
pub use postgres::PgRuleRepository;

use async_trait::async_trait;

use crate::error::Result;
use crate::rule::Rule;

/// 规则仓储接口
///
/// 删除规则时连带删除其条件与动作，作为一个整体完成
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn insert_rule(&self, rule: &Rule) -> Result<()>;
    async fn get_rule_by_id(&self, rule_id: &str) -> Result<Option<Rule>>;
    /// 按创建时间倒序
    async fn list_rules(&self) -> Result<Vec<Rule>>;
    /// 返回是否删除了规则
    async fn delete_rule(&self, rule_id: &str) -> Result<bool>;
}
