//! 推荐奖励账本
//!
//! 以不可变流水记录奖励的发放与冲正：
//!
//! - 幂等创建：同一 `reference_id` 至多对应一条原始流水
//! - 状态机：pending -> confirmed -> paid，任意非终态可冲正为 reversed
//! - 冲正：原流水置为 reversed 的同时生成一条终态冲正流水，两者原子提交
//! - 余额：已冲正的流水不计入，精确十进制累加
//!
//! 持久化通过 [`repository::LedgerRepository`] 注入，提供内存与 PostgreSQL 两种实现。

pub mod cli;
pub mod error;
pub mod lock;
pub mod models;
pub mod repository;
pub mod service;
pub mod state;

pub use error::{LedgerError, Result};
pub use models::{EntryType, LedgerEntry, RewardStatus};
pub use repository::{LedgerRepository, MemoryLedgerRepository, PgLedgerRepository};
pub use service::{
    CreateRewardRequest, GrantReport, LedgerResponse, LedgerService, ReversalOutcome,
    RewardGranter,
};
