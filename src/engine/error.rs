// ==========================================
// 葡萄酒产线批次系统 - 分配引擎错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 以下错误均为配置/编程错误，调用方不得重试
// ==========================================

use crate::domain::types::LineId;
use crate::repository::error::RepositoryError;
use crate::sink::error::SinkError;
use thiserror::Error;

/// 批次分配错误类型
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("未知产线: line_id={0}")]
    UnknownLine(LineId),

    #[error("批次序号已耗尽: line_id={line_id}, 已用至 {last_sequence}")]
    SequenceExhausted { line_id: LineId, last_sequence: u32 },

    #[error("轮转产线列表为空")]
    EmptyLineRotation,

    #[error("换批阈值区间无效: [{min}, {max}] (容量 {capacity})")]
    InvalidRollover { min: u32, max: u32, capacity: u32 },

    #[error("批次序号恢复失败: {0}")]
    RecoveryFailed(#[from] RepositoryError),
}

/// Result 类型别名
pub type AllocationResult<T> = Result<T, AllocationError>;

/// 流水线错误类型
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("投递失败 [{sink}]: {source}")]
    Delivery {
        sink: &'static str,
        #[source]
        source: SinkError,
    },

    #[error("收到停止信号，运行已取消")]
    Cancelled,
}

/// Result 类型别名
pub type PipelineResult<T> = Result<T, PipelineError>;
