// ==========================================
// 葡萄酒产线批次系统 - 批次实体
// ==========================================

use crate::domain::types::{BatchId, LineId};
use serde::{Deserialize, Serialize};

/// 批次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: BatchId,
    pub line_id: LineId,
    pub fill_count: u32,
}

impl Batch {
    pub fn sequence(&self) -> u32 {
        self.batch_id.sequence()
    }
}

/// 单条记录的分配结果
///
/// `opened_new_batch = true` 时，下游必须先持久化批次行，再写入引用它的记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAssignment {
    pub batch_id: BatchId,
    pub line_id: LineId,
    /// 追加本条记录之后的批次填充数
    pub fill_count: u32,
    pub opened_new_batch: bool,
}
