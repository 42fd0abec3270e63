// ==========================================
// 葡萄酒产线批次系统 - 配置错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 配置无效时在分配开始前失败
// ==========================================

use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("配置项无效: {key}={value:?} ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("换批阈值区间无效: [{min}, {max}]，须满足 1 <= min <= max <= {capacity}")]
    InvalidRolloverRange { min: u32, max: u32, capacity: u32 },
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            message: message.into(),
        }
    }
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
