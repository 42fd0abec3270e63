// ==========================================
// 葡萄酒产线批次系统 - 批次台账 Trait
// ==========================================
// 职责: 定义序号恢复所需的查询接口（不包含实现）
// 实现者: BatchRepository（SQLite）, InMemoryLedger（进程内）
// ==========================================

use crate::domain::types::{BatchId, LineId};
use crate::repository::error::{RepositoryError, RepositoryResult};
use std::collections::HashMap;
use std::sync::Mutex;

// ==========================================
// BatchLedger Trait
// ==========================================
pub trait BatchLedger: Send + Sync {
    /// 查询每条产线已使用的最大批次号
    ///
    /// # 返回
    /// - Ok(map): 仅包含存在历史批次的产线；无批次的产线不出现
    /// - Err: 查询失败（调用方必须视为致命错误）
    fn max_batch_ids(&self, lines: &[LineId]) -> RepositoryResult<HashMap<LineId, BatchId>>;
}

// ==========================================
// InMemoryLedger - 进程内台账
// ==========================================
// 用途: 发布模式（批次不落库）与单元测试
// 限制: 进程退出即丢失，跨进程唯一性无法保证
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    batches: Mutex<HashMap<LineId, BatchId>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已知的最大批次号预置台账
    pub fn with_batches(batches: impl IntoIterator<Item = (LineId, BatchId)>) -> Self {
        let ledger = Self::new();
        for (line_id, batch_id) in batches {
            // 新建的 Mutex 不会中毒
            let _ = ledger.record(line_id, batch_id);
        }
        ledger
    }

    /// 登记一个新批次（仅保留每条产线的最大值）
    pub fn record(&self, line_id: LineId, batch_id: BatchId) -> RepositoryResult<()> {
        let mut batches = self
            .batches
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let entry = batches.entry(line_id).or_insert(batch_id);
        if batch_id > *entry {
            *entry = batch_id;
        }
        Ok(())
    }
}

impl BatchLedger for InMemoryLedger {
    fn max_batch_ids(&self, lines: &[LineId]) -> RepositoryResult<HashMap<LineId, BatchId>> {
        let batches = self
            .batches
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(lines
            .iter()
            .filter_map(|line| batches.get(line).map(|id| (*line, *id)))
            .collect())
    }
}
