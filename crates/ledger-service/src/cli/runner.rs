//! 命令执行器
//!
//! 按存储后端组装仓储与服务，把子命令转换为服务调用，结果以 JSON 返回。

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::info;

use referral_shared::config::{AppConfig, StorageBackend};
use referral_shared::database::Database;
use referral_shared::error::SharedError;
use rule_engine::{
    CreateRuleRequest, EvaluationContext, MemoryRuleRepository, PgRuleRepository, RuleError,
    RuleRepository, RuleService,
};

use crate::cli::commands::{Commands, RewardCommand, RuleCommand};
use crate::error::LedgerError;
use crate::repository::{LedgerRepository, MemoryLedgerRepository, PgLedgerRepository};
use crate::service::{CreateRewardRequest, LedgerService, RewardGranter};

/// 命令执行器
pub struct CommandRunner {
    ledger: Arc<LedgerService>,
    rules: Arc<RuleService>,
    granter: RewardGranter,
    database: Option<Database>,
}

impl CommandRunner {
    /// 内存后端
    pub async fn in_memory() -> Result<Self> {
        let ledger_repo: Arc<dyn LedgerRepository> = Arc::new(MemoryLedgerRepository::new());
        let rule_repo: Arc<dyn RuleRepository> = Arc::new(MemoryRuleRepository::new());
        Self::assemble(ledger_repo, rule_repo, None).await
    }

    /// 按配置选择存储后端
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                info!("使用内存存储后端");
                Self::in_memory().await
            }
            StorageBackend::Postgres => {
                let database = Database::connect(&config.database)
                    .await
                    .context("连接数据库失败")?;
                database.health_check().await?;
                if config.database.run_migrations {
                    database.run_migrations().await?;
                }

                let ledger_repo: Arc<dyn LedgerRepository> =
                    Arc::new(PgLedgerRepository::new(database.pool().clone()));
                let rule_repo: Arc<dyn RuleRepository> =
                    Arc::new(PgRuleRepository::new(database.pool().clone()));
                Self::assemble(ledger_repo, rule_repo, Some(database)).await
            }
        }
    }

    async fn assemble(
        ledger_repo: Arc<dyn LedgerRepository>,
        rule_repo: Arc<dyn RuleRepository>,
        database: Option<Database>,
    ) -> Result<Self> {
        let ledger = Arc::new(LedgerService::new(ledger_repo));
        let rules = Arc::new(RuleService::load(rule_repo).await?);
        let granter = RewardGranter::new(ledger.clone(), rules.clone());

        Ok(Self {
            ledger,
            rules,
            granter,
            database,
        })
    }

    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    pub fn rules(&self) -> &RuleService {
        &self.rules
    }

    /// 执行子命令
    pub async fn run(&self, command: Commands) -> Result<Value> {
        match command {
            Commands::Migrate => self.run_migrate().await,
            Commands::Rule(command) => self.run_rule(command).await,
            Commands::Evaluate {
                context,
                user,
                event_ref,
            } => self.run_evaluate(&context, user, event_ref).await,
            Commands::Reward(command) => self.run_reward(command).await,
            Commands::Balance { user } => {
                let balance = self.ledger.get_user_balance(&user).await?;
                Ok(json!({"success": true, "userId": user, "balance": balance}))
            }
            Commands::Entries { user } => {
                let entries = match user {
                    Some(user) => self.ledger.get_user_entries(&user).await?,
                    None => self.ledger.list_entries().await?,
                };
                Ok(json!({"success": true, "entries": entries}))
            }
        }
    }

    async fn run_migrate(&self) -> Result<Value> {
        match &self.database {
            Some(database) => {
                database.run_migrations().await?;
                Ok(json!({"success": true, "migrated": true}))
            }
            None => Ok(json!({"success": true, "migrated": false})),
        }
    }

    async fn run_rule(&self, command: RuleCommand) -> Result<Value> {
        match command {
            RuleCommand::Add { file } => {
                let content = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("读取规则文件失败: {file}"))?;
                let request: CreateRuleRequest =
                    serde_json::from_str(&content).map_err(RuleError::from)?;
                let rule = self.rules.create_rule(request).await?;
                Ok(json!({"success": true, "rule": rule}))
            }
            RuleCommand::List => {
                let rules = self.rules.list_rules().await?;
                Ok(json!({"success": true, "rules": rules}))
            }
            RuleCommand::Get { id } => {
                let rule = self
                    .rules
                    .get_rule(&id)
                    .await?
                    .ok_or_else(|| RuleError::RuleNotFound(id.clone()))?;
                Ok(json!({"success": true, "rule": rule}))
            }
            RuleCommand::Delete { id } => {
                let deleted = self.rules.delete_rule(&id).await?;
                Ok(json!({"success": true, "deleted": deleted}))
            }
        }
    }

    async fn run_evaluate(
        &self,
        context: &str,
        user: Option<String>,
        event_ref: Option<String>,
    ) -> Result<Value> {
        let context = EvaluationContext::from_json(context)
            .map_err(|e| LedgerError::Validation(format!("context 必须是 JSON 对象: {e}")))?;

        match (user, event_ref) {
            (Some(user), Some(event_ref)) => {
                let report = self.granter.grant(&user, &event_ref, &context).await?;
                Ok(json!({"success": true, "report": report}))
            }
            _ => {
                let matches = self.rules.evaluate(&context);
                Ok(json!({"success": true, "matches": matches}))
            }
        }
    }

    async fn run_reward(&self, command: RewardCommand) -> Result<Value> {
        let value = match command {
            RewardCommand::Create {
                user,
                amount,
                reference,
                currency,
                description,
            } => {
                let mut request = CreateRewardRequest::new(user, amount, reference);
                request.currency = currency;
                request.description = description;
                serde_json::to_value(self.ledger.create_reward(request).await?)?
            }
            RewardCommand::Confirm { id } => {
                ledger_body(serde_json::to_value(self.ledger.confirm(&id).await?)?)
            }
            RewardCommand::Pay { id } => {
                ledger_body(serde_json::to_value(self.ledger.mark_paid(&id).await?)?)
            }
            RewardCommand::Reverse { id, reason } => {
                let outcome = self.ledger.reverse(&id, reason.as_deref()).await?;
                json!({
                    "success": true,
                    "entry": outcome.original,
                    "reversal": outcome.reversal,
                    "isDuplicate": false,
                })
            }
            RewardCommand::Status { id, to, reason } => {
                let entry = self.ledger.transition(&id, to, reason.as_deref()).await?;
                ledger_body(serde_json::to_value(entry)?)
            }
        };
        Ok(value)
    }
}

fn ledger_body(entry: Value) -> Value {
    json!({"success": true, "entry": entry, "isDuplicate": false})
}

/// 错误响应体：携带错误码、对应的 HTTP 状态以及是否可重试
pub fn error_body(err: &anyhow::Error) -> Value {
    let (code, status, retryable) = if let Some(e) = err.downcast_ref::<LedgerError>() {
        (e.error_code(), e.http_status(), e.is_retryable())
    } else if let Some(e) = err.downcast_ref::<RuleError>() {
        let status = match e {
            RuleError::Validation(_) | RuleError::JsonError(_) => 400,
            RuleError::RuleNotFound(_) => 404,
            RuleError::AlreadyExists(_) => 409,
            RuleError::Database(_) => 500,
        };
        (e.error_code(), status, e.is_retryable())
    } else if let Some(e) = err.downcast_ref::<SharedError>() {
        (e.code(), 500, e.is_retryable())
    } else {
        ("INTERNAL_ERROR", 500, false)
    };

    json!({
        "success": false,
        "error": code,
        "status": status,
        "retryable": retryable,
        "message": format!("{err:#}"),
    })
}
