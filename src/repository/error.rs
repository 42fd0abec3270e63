// ==========================================
// 葡萄酒产线批次系统 - 仓储层错误类型
// ==========================================
// 约束失败按 SQLite 扩展错误码归类:
// - 批次号重复（UNIQUE / PRIMARY KEY）→ UniqueConstraintViolation
// - 记录引用了未落库的批次（FOREIGN KEY）→ ForeignKeyViolation
// ==========================================

use rusqlite::ffi;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 台账不可达（序号恢复时视为致命）
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("批次号重复: {0}")]
    UniqueConstraintViolation(String),

    #[error("批次不存在或未落库: {0}")]
    ForeignKeyViolation(String),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        let rusqlite::Error::SqliteFailure(failure, msg) = &err else {
            return RepositoryError::DatabaseQueryError(err.to_string());
        };
        let detail = msg.clone().unwrap_or_else(|| failure.to_string());

        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                RepositoryError::UniqueConstraintViolation(detail)
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => RepositoryError::ForeignKeyViolation(detail),
            ffi::SQLITE_CANTOPEN | ffi::SQLITE_NOTADB => {
                RepositoryError::DatabaseConnectionError(detail)
            }
            _ => RepositoryError::DatabaseQueryError(detail),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE batches (batch_id INTEGER PRIMARY KEY, line_id INTEGER NOT NULL);
             CREATE TABLE product (product_id INTEGER PRIMARY KEY,
                                   batch_id INTEGER NOT NULL REFERENCES batches(batch_id));",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_duplicate_batch_maps_to_unique_violation() {
        let conn = conn();
        conn.execute("INSERT INTO batches VALUES (1001, 1)", []).unwrap();
        let err: RepositoryError = conn
            .execute("INSERT INTO batches VALUES (1001, 1)", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_missing_batch_maps_to_foreign_key_violation() {
        let err: RepositoryError = conn()
            .execute("INSERT INTO product (batch_id) VALUES (2001)", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
    }

    #[test]
    fn test_other_failures_are_query_errors() {
        let err: RepositoryError = conn()
            .execute("SELECT * FROM missing_table", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::DatabaseQueryError(_)));
    }
}
