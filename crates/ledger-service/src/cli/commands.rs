//! CLI 命令定义

use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand};

use crate::models::RewardStatus;

/// 推荐奖励账本命令行工具
#[derive(Parser, Debug)]
#[command(name = "referral-ledger")]
#[command(version, about = "推荐奖励规则与账本工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 存储后端，覆盖配置文件中的 storage.backend
    #[arg(long, global = true, value_parser = ["memory", "postgres"])]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 执行数据库迁移（仅 postgres 后端）
    Migrate,

    /// 规则管理
    #[command(subcommand)]
    Rule(RuleCommand),

    /// 评估事件上下文
    ///
    /// 同时给出 --user 与 --event-ref 时，命中的奖励动作会写入账本
    Evaluate {
        /// 上下文 JSON 对象
        #[arg(short, long)]
        context: String,

        /// 奖励归属用户
        #[arg(short, long, requires = "event_ref")]
        user: Option<String>,

        /// 事件引用，用于生成幂等键
        #[arg(short, long, requires = "user")]
        event_ref: Option<String>,
    },

    /// 奖励流水操作
    #[command(subcommand)]
    Reward(RewardCommand),

    /// 查询用户余额
    Balance {
        #[arg(short, long)]
        user: String,
    },

    /// 查询流水（按创建时间倒序）
    Entries {
        /// 仅列出该用户的流水
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RuleCommand {
    /// 从 JSON 文件创建规则
    Add {
        #[arg(short, long)]
        file: String,
    },
    /// 列出全部规则
    List,
    /// 查看规则
    Get { id: String },
    /// 删除规则（连同条件与动作）
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum RewardCommand {
    /// 创建奖励流水（幂等）
    Create {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        amount: BigDecimal,

        /// 幂等键
        #[arg(short, long)]
        reference: String,

        #[arg(long)]
        currency: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// pending -> confirmed
    Confirm { id: String },
    /// confirmed -> paid
    Pay { id: String },
    /// 冲正
    Reverse {
        id: String,

        #[arg(short, long)]
        reason: Option<String>,
    },
    /// 按目标状态流转
    Status {
        id: String,

        /// 目标状态：confirmed, paid, reversed
        #[arg(long, value_parser = parse_status)]
        to: RewardStatus,

        #[arg(short, long)]
        reason: Option<String>,
    },
}

fn parse_status(s: &str) -> Result<RewardStatus, String> {
    RewardStatus::parse(s).ok_or_else(|| format!("无效的状态: {s}"))
}
