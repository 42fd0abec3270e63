// ==========================================
// 葡萄酒产线批次系统 - 数据源错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 数据源有任何缺失/损坏都在构造阶段失败，不产出部分数据
// ==========================================

use thiserror::Error;

/// 数据源（回放）错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("数据源不可用 ({path}): {reason}")]
    SourceUnavailable { path: String, reason: String },

    #[error("文件格式不支持: {0}（仅支持 .csv）")]
    UnsupportedFormat(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 数据映射错误 =====
    #[error("记录格式错误 (行 {row}, 字段 {field}): {message}")]
    MalformedRecord {
        row: usize,
        field: String,
        message: String,
    },
}

impl ImportError {
    pub fn unavailable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ImportError::SourceUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
