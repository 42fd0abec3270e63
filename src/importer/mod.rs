// ==========================================
// 葡萄酒产线批次系统 - 数据源层
// ==========================================
// 职责: 外部数据集读取、字段映射、回放
// 支持: CSV
// ==========================================

// 模块声明
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod replay_source;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper;
pub use file_parser::{CsvParser, RawRow};
pub use replay_source::{ReplaySource, ReplayStream};
