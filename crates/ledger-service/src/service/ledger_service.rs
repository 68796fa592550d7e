//! 账本服务
//!
//! 负责奖励流水的幂等创建、状态流转与余额计算：
//! - 创建：按幂等键串行化，已存在则返回原流水
//! - 流转：按流水 ID 串行化，仓储层再以预期状态做条件更新
//! - 冲正：原流水置为 reversed 与冲正流水的插入由仓储一次提交
//!
//! 服务不做自动重试，写路径失败直接返回给调用方。

use std::sync::Arc;

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument, warn};

use referral_shared::observability::metrics::{record_reward_created, record_transition};

use crate::error::{LedgerError, Result};
use crate::lock::KeyedLocks;
use crate::models::{LedgerEntry, RewardStatus};
use crate::repository::LedgerRepository;
use crate::service::dto::{CreateRewardRequest, LedgerResponse, ReversalOutcome};
use crate::state::{LedgerAction, next_status};

/// 余额展示精度
const BALANCE_SCALE: i64 = 2;

/// 账本服务
pub struct LedgerService<R: ?Sized = dyn LedgerRepository> {
    repository: Arc<R>,
    reference_locks: KeyedLocks,
    entry_locks: KeyedLocks,
}

impl<R> LedgerService<R>
where
    R: LedgerRepository + ?Sized,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            reference_locks: KeyedLocks::new(),
            entry_locks: KeyedLocks::new(),
        }
    }

    /// 创建奖励流水
    ///
    /// 幂等键已存在时返回已有流水（`is_duplicate = true`），不产生任何写入
    #[instrument(skip(self, request), fields(user_id = %request.user_id, reference_id = %request.reference_id))]
    pub async fn create_reward(&self, request: CreateRewardRequest) -> Result<LedgerResponse> {
        request.check()?;

        let _guard = self.reference_locks.lock(&request.reference_id).await;

        if let Some(existing) = self
            .repository
            .get_entry_by_reference_id(&request.reference_id)
            .await?
        {
            return Ok(self.duplicate(existing));
        }

        let metadata = request.metadata.clone().filter(|m| !m.is_null());
        let entry = LedgerEntry::new_credit(
            request.user_id.clone(),
            request.amount.clone(),
            request.currency_or_default(),
            request.reference_id.clone(),
            request.description.clone(),
            metadata,
            Utc::now(),
        );

        match self.repository.insert_entry(&entry).await {
            Ok(()) => {}
            // 其他进程抢先写入了同一幂等键，以存储中的流水为准
            Err(LedgerError::DuplicateReference(reference_id)) => {
                let existing = self
                    .repository
                    .get_entry_by_reference_id(&reference_id)
                    .await?
                    .ok_or_else(|| {
                        LedgerError::Storage(format!("幂等键冲突但未找到流水: {reference_id}"))
                    })?;
                return Ok(self.duplicate(existing));
            }
            Err(e) => return Err(e),
        }

        record_reward_created(false);
        info!(entry_id = %entry.id, amount = %entry.amount, "奖励流水已创建");

        Ok(LedgerResponse::created(entry))
    }

    fn duplicate(&self, existing: LedgerEntry) -> LedgerResponse {
        record_reward_created(true);
        info!(entry_id = %existing.id, "幂等键已存在，返回已有流水");
        LedgerResponse::duplicate(existing)
    }

    /// pending -> confirmed
    #[instrument(skip(self))]
    pub async fn confirm(&self, entry_id: &str) -> Result<LedgerEntry> {
        self.advance(entry_id, LedgerAction::Confirm).await
    }

    /// confirmed -> paid
    #[instrument(skip(self))]
    pub async fn mark_paid(&self, entry_id: &str) -> Result<LedgerEntry> {
        self.advance(entry_id, LedgerAction::MarkPaid).await
    }

    /// 冲正流水，同时生成一条终态的冲正流水
    #[instrument(skip(self))]
    pub async fn reverse(&self, entry_id: &str, reason: Option<&str>) -> Result<ReversalOutcome> {
        let _guard = self.entry_locks.lock(entry_id).await;

        let entry = self.load(entry_id).await?;
        next_status(entry_id, entry.status, LedgerAction::Reverse)?;

        let now = Utc::now();
        let reversal = LedgerEntry::reversal_of(&entry, reason, now);

        if !self
            .repository
            .apply_reversal(entry_id, now, &reversal)
            .await?
        {
            return Err(self.conflict(entry_id, LedgerAction::Reverse).await);
        }

        record_transition(RewardStatus::Reversed.as_str());
        info!(
            reversal_id = %reversal.id,
            reason = reversal.metadata["reason"].as_str().unwrap_or_default(),
            "流水已冲正"
        );

        Ok(ReversalOutcome {
            original: entry.with_status(RewardStatus::Reversed, now),
            reversal,
        })
    }

    /// 按目标状态流转，pending 不是合法目标
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        entry_id: &str,
        target: RewardStatus,
        reason: Option<&str>,
    ) -> Result<LedgerEntry> {
        match LedgerAction::for_target(target) {
            Some(LedgerAction::Reverse) => Ok(self.reverse(entry_id, reason).await?.original),
            Some(action) => self.advance(entry_id, action).await,
            None => {
                let entry = self.load(entry_id).await?;
                Err(LedgerError::InvalidTransition {
                    entry_id: entry_id.to_string(),
                    from: entry.status,
                    to: target,
                })
            }
        }
    }

    pub async fn get_entry(&self, entry_id: &str) -> Result<LedgerEntry> {
        self.load(entry_id).await
    }

    /// 用户流水，按创建时间倒序
    pub async fn get_user_entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.repository.list_entries_by_user(user_id).await?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// 全部流水，按创建时间倒序
    pub async fn list_entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.repository.list_entries().await?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// 用户余额
    ///
    /// 已冲正的流水（原流水与冲正流水）都不计入；精确累加后四舍五入到两位小数
    #[instrument(skip(self))]
    pub async fn get_user_balance(&self, user_id: &str) -> Result<BigDecimal> {
        let entries = self.repository.list_entries_by_user(user_id).await?;

        let total = entries
            .iter()
            .filter(|e| e.counts_toward_balance())
            .fold(BigDecimal::zero(), |acc, e| acc + e.signed_amount());

        Ok(total.with_scale_round(BALANCE_SCALE, RoundingMode::HalfUp))
    }

    /// 确认与支付共用的流转逻辑
    async fn advance(&self, entry_id: &str, action: LedgerAction) -> Result<LedgerEntry> {
        let _guard = self.entry_locks.lock(entry_id).await;

        let entry = self.load(entry_id).await?;
        let target = next_status(entry_id, entry.status, action)?;
        let now = Utc::now();

        if !self
            .repository
            .update_entry_status(entry_id, entry.status, target, now)
            .await?
        {
            return Err(self.conflict(entry_id, action).await);
        }

        record_transition(target.as_str());
        info!(from = %entry.status, to = %target, "流水状态已更新");

        Ok(entry.with_status(target, now))
    }

    async fn load(&self, entry_id: &str) -> Result<LedgerEntry> {
        self.repository
            .get_entry_by_id(entry_id)
            .await?
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id.to_string()))
    }

    /// 条件更新未生效：其他写者已改变了状态，按最新状态报告错误
    async fn conflict(&self, entry_id: &str, action: LedgerAction) -> LedgerError {
        let current = match self.load(entry_id).await {
            Ok(entry) => entry,
            Err(e) => return e,
        };

        warn!(entry_id, status = %current.status, "状态已被并发修改");
        match next_status(entry_id, current.status, action) {
            Err(e) => e,
            Ok(_) => LedgerError::InvalidTransition {
                entry_id: entry_id.to_string(),
                from: current.status,
                to: action.target(),
            },
        }
    }
}

/// 从流水元数据中读取原流水 ID（仅冲正流水有）
pub fn original_entry_id(entry: &LedgerEntry) -> Option<&str> {
    match &entry.metadata {
        Value::Object(map) => map.get("originalEntryId").and_then(Value::as_str),
        _ => None,
    }
}
