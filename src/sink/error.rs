// ==========================================
// 葡萄酒产线批次系统 - 投递层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 记录投递错误类型
#[derive(Error, Debug)]
pub enum SinkError {
    // ===== 存储 =====
    #[error("存储写入失败: {0}")]
    Storage(#[from] RepositoryError),

    #[error("投递端已结束，不再接收记录: {0}")]
    Closed(&'static str),

    // ===== 发布 =====
    #[error("消息序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("消息发布失败 [{channel}]: {message}")]
    Publish {
        channel: &'static str,
        message: String,
    },

    #[error("等待确认超时 [{channel}]: {timeout_ms} ms")]
    AckTimeout {
        channel: &'static str,
        timeout_ms: u64,
    },

    #[error("服务端拒绝 (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

impl SinkError {
    pub fn publish(channel: &'static str, message: impl Into<String>) -> Self {
        SinkError::Publish {
            channel,
            message: message.into(),
        }
    }
}

/// Result 类型别名
pub type SinkResult<T> = Result<T, SinkError>;
