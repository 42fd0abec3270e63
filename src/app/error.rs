// ==========================================
// 葡萄酒产线批次系统 - 应用层错误类型
// ==========================================
// 汇总各层错误，供运行入口统一返回
// ==========================================

use crate::config::error::ConfigError;
use crate::engine::error::{AllocationError, PipelineError};
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use crate::sink::error::SinkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("数据库初始化失败 ({path}): {source}")]
    Database {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("存储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("数据源错误: {0}")]
    Import(#[from] ImportError),

    #[error("批次分配错误: {0}")]
    Allocation(#[from] AllocationError),

    #[error("投递端错误: {0}")]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("未知运行模式 '{0}'（可选 backfill / simulate / publish）")]
    UnknownMode(String),
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
