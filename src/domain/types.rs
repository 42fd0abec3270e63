// ==========================================
// 葡萄酒产线批次系统 - 领域类型定义
// ==========================================
// 批次号结构: <line_id><sequence 三位>
// 例: 产线 2 的第 7 个批次 = 2007
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 仓库 ID
pub type WarehouseId = i64;

/// 产线 ID
pub type LineId = i64;

/// 批次序号在复合批次号中占用的十进制位数所对应的模
pub const SEQUENCE_MODULUS: i64 = 1_000;

/// 单条产线可用的最大批次序号（三位数）
pub const MAX_SEQUENCE: u32 = 999;

/// 每个批次的固定容量（业务规则）
pub const BATCH_CAPACITY: u32 = 120;

// ==========================================
// 复合批次号 (Composite Batch ID)
// ==========================================
// 红线: sequence 必须在 [1, 999]，越界由分配器拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(i64);

impl BatchId {
    /// 由产线与序号组合批次号
    ///
    /// # 返回
    /// - Some(BatchId): 序号合法
    /// - None: 序号为 0 或超过 999
    pub fn compose(line_id: LineId, sequence: u32) -> Option<Self> {
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return None;
        }
        Some(Self(line_id * SEQUENCE_MODULUS + i64::from(sequence)))
    }

    /// 从数据库原始值构造（不做校验）
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// 批次号中编码的产线 ID
    pub fn line_id(&self) -> LineId {
        self.0 / SEQUENCE_MODULUS
    }

    /// 批次号中编码的序号
    pub fn sequence(&self) -> u32 {
        // rem_euclid 保证非负，且结果 < 1000
        self.0.rem_euclid(SEQUENCE_MODULUS) as u32
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 日志展示格式: 产线号与序号各补齐三位，如 001007
        write!(f, "{:03}{:03}", self.line_id(), self.sequence())
    }
}

impl From<BatchId> for i64 {
    fn from(id: BatchId) -> Self {
        id.0
    }
}
