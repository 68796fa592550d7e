//! PostgreSQL 账本仓储
//!
//! 幂等键由 `reference_id` 唯一约束保证；状态更新带上预期状态做条件更新；
//! 冲正在一个事务内完成两次写入

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use super::LedgerRepository;
use crate::error::{LedgerError, Result, is_unique_violation};
use crate::models::{LedgerEntry, RewardStatus};

const ENTRY_COLUMNS: &str = "id, user_id, entry_type, amount, currency, status, reference_id, \
                             description, metadata, created_at, updated_at";

/// PostgreSQL 账本仓储
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中插入流水，唯一约束冲突转换为 DuplicateReference
    async fn insert_in_tx(conn: &mut PgConnection, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, user_id, entry_type, amount, currency, status,
                                        reference_id, description, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(entry.entry_type)
        .bind(&entry.amount)
        .bind(&entry.currency)
        .bind(entry.status)
        .bind(&entry.reference_id)
        .bind(&entry.description)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::DuplicateReference(entry.reference_id.clone())
            } else {
                LedgerError::Database(e)
            }
        })?;

        Ok(())
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn insert_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_in_tx(&mut *conn, entry).await
    }

    async fn get_entry_by_id(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE id = $1"
        ))
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn get_entry_by_reference_id(&self, reference_id: &str) -> Result<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE reference_id = $1"
        ))
        .bind(reference_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn list_entries_by_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn list_entries(&self) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn update_entry_status(
        &self,
        entry_id: &str,
        expected: RewardStatus,
        status: RewardStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ledger_entries
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(status)
        .bind(updated_at)
        .bind(entry_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn apply_reversal(
        &self,
        original_id: &str,
        reversed_at: DateTime<Utc>,
        reversal: &LedgerEntry,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE ledger_entries
            SET status = 'reversed', updated_at = $1
            WHERE id = $2 AND status <> 'reversed'
            "#,
        )
        .bind(reversed_at)
        .bind(original_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        // 插入失败时事务随 tx 丢弃回滚，原流水状态不变
        Self::insert_in_tx(&mut *tx, reversal).await?;
        tx.commit().await?;

        debug!(original_id, reversal_id = %reversal.id, "冲正事务已提交");
        Ok(true)
    }
}
