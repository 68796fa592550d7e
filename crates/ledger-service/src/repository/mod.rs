//! 账本仓储层
//!
//! 服务层只依赖 [`LedgerRepository`]，内存与 PostgreSQL 两种实现可互换。
//!
//! ## 约定
//!
//! - 幂等键冲突由仓储返回 [`LedgerError::DuplicateReference`](crate::error::LedgerError::DuplicateReference)
//! - 状态更新采用比较并交换，预期状态不符时返回 `false`，不做任何修改
//! - 冲正的两次写入（原流水置为 reversed + 插入冲正流水）在同一个原子单元内完成

mod memory;
mod postgres;

pub use memory::MemoryLedgerRepository;
pub use postgres::PgLedgerRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{LedgerEntry, RewardStatus};

/// 账本仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn insert_entry(&self, entry: &LedgerEntry) -> Result<()>;
    async fn get_entry_by_id(&self, entry_id: &str) -> Result<Option<LedgerEntry>>;
    async fn get_entry_by_reference_id(&self, reference_id: &str) -> Result<Option<LedgerEntry>>;
    /// 按创建时间倒序
    async fn list_entries_by_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>>;
    /// 按创建时间倒序
    async fn list_entries(&self) -> Result<Vec<LedgerEntry>>;

    /// 仅当当前状态为 `expected` 时更新，返回是否更新成功
    async fn update_entry_status(
        &self,
        entry_id: &str,
        expected: RewardStatus,
        status: RewardStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// 原流水置为 reversed 并插入冲正流水
    ///
    /// 原流水不存在或已冲正时不做任何写入，返回 `false`
    async fn apply_reversal(
        &self,
        original_id: &str,
        reversed_at: DateTime<Utc>,
        reversal: &LedgerEntry,
    ) -> Result<bool>;
}
