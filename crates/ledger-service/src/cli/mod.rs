//! CLI 模块
//!
//! 把账本与规则服务暴露为命令行操作，输出与传输层约定同形的 JSON：
//!
//! - `migrate` - 执行数据库迁移
//! - `rule add|list|get|delete` - 规则创作与管理
//! - `evaluate` - 评估事件上下文，可选为命中的奖励动作入账
//! - `reward create|confirm|pay|reverse|status` - 奖励流水与状态流转
//! - `balance` / `entries` - 余额与流水查询
//!
//! # 使用示例
//!
//! ```bash
//! referral-ledger rule add --file rules/high_value.json
//! referral-ledger evaluate --context '{"amount": 500}' --user u1 --event-ref order-1
//! referral-ledger reward create --user u1 --amount 50 --reference r1
//! referral-ledger reward reverse entry-... --reason fraud
//! referral-ledger balance --user u1
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands, RewardCommand, RuleCommand};
pub use runner::{CommandRunner, error_body};
