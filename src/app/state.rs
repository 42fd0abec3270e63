// ==========================================
// 葡萄酒产线批次系统 - 应用状态
// ==========================================
// 职责: 持有共享数据库连接、配置、工厂拓扑与仓储实例
// ==========================================

use crate::app::error::{AppError, AppResult};
use crate::config::SimulationConfig;
use crate::db::{configure_sqlite_connection, ensure_schema, open_sqlite_connection};
use crate::domain::topology::Topology;
use crate::repository::{BatchRepository, ProductRepository};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 运行配置
    pub config: SimulationConfig,

    /// 工厂拓扑
    pub topology: Topology,

    /// 共享连接（投递端直接使用）
    pub conn: Arc<Mutex<Connection>>,

    /// 批次仓储（同时作为序号恢复的台账）
    pub batch_repo: Arc<BatchRepository>,

    /// 产品仓储
    pub product_repo: Arc<ProductRepository>,
}

impl AppState {
    /// 打开数据库、建表并写入拓扑主数据
    ///
    /// 数据库路径: config.db_path，未配置时取 [`get_default_db_path`]
    pub fn new(config: SimulationConfig) -> AppResult<Self> {
        let db_path = config.db_path.clone().unwrap_or_else(get_default_db_path);
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|source| AppError::Database {
            path: db_path.clone(),
            source,
        })?;
        Self::from_connection(db_path, conn, config)
    }

    /// 基于已打开的连接创建（测试使用内存库）
    pub fn from_connection(
        db_path: String,
        conn: Connection,
        config: SimulationConfig,
    ) -> AppResult<Self> {
        configure_sqlite_connection(&conn)
            .and_then(|_| ensure_schema(&conn))
            .map_err(|source| AppError::Database {
                path: db_path.clone(),
                source,
            })?;
        let conn = Arc::new(Mutex::new(conn));

        let topology = Topology::wine_default();
        let batch_repo = Arc::new(BatchRepository::from_connection(conn.clone()));
        let inserted = batch_repo.ensure_topology(&topology)?;
        if inserted > 0 {
            tracing::info!("已写入拓扑主数据: {} 行", inserted);
        }

        Ok(Self {
            db_path,
            config,
            topology,
            product_repo: Arc::new(ProductRepository::from_connection(conn.clone())),
            batch_repo,
            conn,
        })
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 用户数据目录/wine-batch/wine_batch.db
/// - 无法获取用户数据目录时: ./wine_batch.db
pub fn get_default_db_path() -> String {
    let Some(data_dir) = dirs::data_dir() else {
        return "./wine_batch.db".to_string();
    };

    let dir = data_dir.join("wine-batch");
    // 目录创建失败时退回当前目录
    if std::fs::create_dir_all(&dir).is_err() {
        return "./wine_batch.db".to_string();
    }
    dir.join("wine_batch.db").to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with("wine_batch.db"));
    }

    #[test]
    fn test_state_provisions_schema_and_topology() {
        let conn = Connection::open_in_memory().unwrap();
        let state =
            AppState::from_connection(":memory:".to_string(), conn, SimulationConfig::default())
                .unwrap();

        assert_eq!(state.topology.all_lines(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(state.batch_repo.count().unwrap(), 0);
        assert_eq!(state.product_repo.count().unwrap(), 0);

        let lines: i64 = state
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM line", [], |row| row.get(0))
            .unwrap();
        assert_eq!(lines, 6);
    }
}
