//! 推荐奖励账本 CLI
//!
//! 加载配置、初始化可观测性，按存储后端组装服务后执行单个子命令，
//! 结果以 JSON 输出到 stdout，日志输出到 stderr。

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use referral_ledger::cli::{Cli, CommandRunner, error_body};
use referral_shared::config::{AppConfig, StorageBackend};
use referral_shared::observability;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load("referral-ledger").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });
    match cli.backend.as_deref() {
        Some("memory") => config.storage.backend = StorageBackend::Memory,
        Some("postgres") => config.storage.backend = StorageBackend::Postgres,
        _ => {}
    }

    let _guard = observability::init(&config.observability_config()).await?;

    if config.storage.backend == StorageBackend::Memory {
        warn!("内存后端的数据在进程退出后丢失");
    }

    let result = match CommandRunner::from_config(&config).await {
        Ok(runner) => runner.run(cli.command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&error_body(&e))?);
            Err(e)
        }
    }
}
