//! 业务服务层
//!
//! - [`LedgerService`]：奖励流水的幂等创建、状态流转、余额查询
//! - [`RewardGranter`]：把规则命中的奖励动作写入账本

pub mod dto;
mod ledger_service;
mod reward_granter;

pub use dto::{CreateRewardRequest, GrantReport, LedgerResponse, ReversalOutcome};
pub use ledger_service::{LedgerService, original_entry_id};
pub use reward_granter::RewardGranter;
