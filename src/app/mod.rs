// ==========================================
// 葡萄酒产线批次系统 - 应用层
// ==========================================
// 职责: 组装配置、存储、数据源与流水线
// ==========================================

pub mod error;
pub mod runner;
pub mod state;

// 重导出
pub use error::{AppError, AppResult};
pub use runner::{run_backfill, run_publish, run_simulate, RunMode};
pub use state::{get_default_db_path, AppState};
