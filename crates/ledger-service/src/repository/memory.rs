use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::LedgerRepository;
use crate::error::{LedgerError, Result};
use crate::models::{LedgerEntry, RewardStatus};

#[derive(Debug, Default)]
struct LedgerState {
    /// 按插入顺序保存，状态变更时原位替换
    entries: Vec<LedgerEntry>,
    by_id: HashMap<String, usize>,
    by_reference: HashMap<String, usize>,
}

impl LedgerState {
    fn insert(&mut self, entry: &LedgerEntry) -> Result<()> {
        if self.by_reference.contains_key(&entry.reference_id) {
            return Err(LedgerError::DuplicateReference(entry.reference_id.clone()));
        }
        if self.by_id.contains_key(&entry.id) {
            return Err(LedgerError::Storage(format!("流水 ID 重复: {}", entry.id)));
        }

        let index = self.entries.len();
        self.by_id.insert(entry.id.clone(), index);
        self.by_reference.insert(entry.reference_id.clone(), index);
        self.entries.push(entry.clone());
        Ok(())
    }

    fn get_mut(&mut self, entry_id: &str) -> Option<&mut LedgerEntry> {
        let index = *self.by_id.get(entry_id)?;
        self.entries.get_mut(index)
    }

    /// 创建时间倒序；同一时间后插入的在前
    fn newest_first<'a>(entries: impl DoubleEndedIterator<Item = &'a LedgerEntry>) -> Vec<LedgerEntry> {
        let mut result: Vec<LedgerEntry> = entries.rev().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }
}

/// 内存账本仓储
///
/// 所有写操作在同一把写锁内完成，冲正的两次写入对读者不可分割
#[derive(Debug, Default)]
pub struct MemoryLedgerRepository {
    state: RwLock<LedgerState>,
}

impl MemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前流水总数
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LedgerRepository for MemoryLedgerRepository {
    async fn insert_entry(&self, entry: &LedgerEntry) -> Result<()> {
        self.state.write().insert(entry)
    }

    async fn get_entry_by_id(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        let state = self.state.read();
        Ok(state
            .by_id
            .get(entry_id)
            .and_then(|&index| state.entries.get(index))
            .cloned())
    }

    async fn get_entry_by_reference_id(&self, reference_id: &str) -> Result<Option<LedgerEntry>> {
        let state = self.state.read();
        Ok(state
            .by_reference
            .get(reference_id)
            .and_then(|&index| state.entries.get(index))
            .cloned())
    }

    async fn list_entries_by_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read();
        let entries: Vec<&LedgerEntry> =
            state.entries.iter().filter(|e| e.user_id == user_id).collect();
        Ok(LedgerState::newest_first(entries.into_iter()))
    }

    async fn list_entries(&self) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read();
        Ok(LedgerState::newest_first(state.entries.iter()))
    }

    async fn update_entry_status(
        &self,
        entry_id: &str,
        expected: RewardStatus,
        status: RewardStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.write();
        match state.get_mut(entry_id) {
            Some(entry) if entry.status == expected => {
                *entry = entry.with_status(status, updated_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_reversal(
        &self,
        original_id: &str,
        reversed_at: DateTime<Utc>,
        reversal: &LedgerEntry,
    ) -> Result<bool> {
        let mut state = self.state.write();

        match state.by_id.get(original_id).and_then(|&i| state.entries.get(i)) {
            Some(original) if !original.status.is_terminal() => {}
            _ => return Ok(false),
        }

        // 先插入冲正流水：幂等键冲突时原流水保持不变
        state.insert(reversal)?;
        if let Some(original) = state.get_mut(original_id) {
            *original = original.with_status(RewardStatus::Reversed, reversed_at);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Duration;

    fn entry(user_id: &str, reference_id: &str, offset_secs: i64) -> LedgerEntry {
        LedgerEntry::new_credit(
            user_id,
            BigDecimal::from(10),
            "USD",
            reference_id,
            None,
            None,
            Utc::now() + Duration::seconds(offset_secs),
        )
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let repo = MemoryLedgerRepository::new();
        let e = entry("u1", "ref-1", 0);
        repo.insert_entry(&e).await.unwrap();

        assert_eq!(repo.get_entry_by_id(&e.id).await.unwrap(), Some(e.clone()));
        assert_eq!(
            repo.get_entry_by_reference_id("ref-1").await.unwrap(),
            Some(e)
        );
        assert!(repo.get_entry_by_id("entry-missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let repo = MemoryLedgerRepository::new();
        repo.insert_entry(&entry("u1", "ref-1", 0)).await.unwrap();

        let err = repo.insert_entry(&entry("u2", "ref-1", 0)).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateReference(r) if r == "ref-1"));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let repo = MemoryLedgerRepository::new();
        repo.insert_entry(&entry("u1", "old", -60)).await.unwrap();
        repo.insert_entry(&entry("u1", "new", 60)).await.unwrap();
        repo.insert_entry(&entry("u2", "other", 0)).await.unwrap();
        repo.insert_entry(&entry("u1", "mid", 0)).await.unwrap();

        let refs: Vec<_> = repo
            .list_entries_by_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.reference_id)
            .collect();
        assert_eq!(refs, vec!["new", "mid", "old"]);
        assert_eq!(repo.list_entries().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_update_status_compare_and_set() {
        let repo = MemoryLedgerRepository::new();
        let e = entry("u1", "ref-1", 0);
        repo.insert_entry(&e).await.unwrap();
        let later = e.updated_at + Duration::seconds(1);

        assert!(!repo
            .update_entry_status(&e.id, RewardStatus::Confirmed, RewardStatus::Paid, later)
            .await
            .unwrap());
        assert!(repo
            .update_entry_status(&e.id, RewardStatus::Pending, RewardStatus::Confirmed, later)
            .await
            .unwrap());

        let stored = repo.get_entry_by_id(&e.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RewardStatus::Confirmed);
        assert_eq!(stored.updated_at, later);
        assert_eq!(stored.created_at, e.created_at);
    }

    #[tokio::test]
    async fn test_apply_reversal_once() {
        let repo = MemoryLedgerRepository::new();
        let e = entry("u1", "ref-1", 0);
        repo.insert_entry(&e).await.unwrap();

        let reversal = LedgerEntry::reversal_of(&e, Some("fraud"), Utc::now());
        assert!(repo.apply_reversal(&e.id, Utc::now(), &reversal).await.unwrap());

        let again = LedgerEntry::reversal_of(&e, Some("fraud"), Utc::now());
        assert!(!repo.apply_reversal(&e.id, Utc::now(), &again).await.unwrap());

        assert_eq!(repo.len(), 2);
        let original = repo.get_entry_by_id(&e.id).await.unwrap().unwrap();
        assert_eq!(original.status, RewardStatus::Reversed);
        assert!(repo
            .get_entry_by_reference_id(&format!("reversal-{}", e.id))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_apply_reversal_missing_original() {
        let repo = MemoryLedgerRepository::new();
        let ghost = entry("u1", "ref-1", 0);
        let reversal = LedgerEntry::reversal_of(&ghost, None, Utc::now());

        assert!(!repo.apply_reversal(&ghost.id, Utc::now(), &reversal).await.unwrap());
        assert!(repo.is_empty());
    }
}
