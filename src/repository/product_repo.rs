// ==========================================
// 葡萄酒产线批次系统 - 产品数据仓储
// ==========================================
// 职责: product / quality_test 表的写入与统计
// 说明: 质量评分存于独立的 quality_test 表，以 product_id 关联
// ==========================================

use crate::domain::record::WineRecord;
use crate::domain::types::BatchId;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在调用方的事务/连接中插入产品行
    ///
    /// # 返回
    /// - Ok(i64): 新产品的 product_id
    pub fn insert_product_tx(
        conn: &Connection,
        batch_id: BatchId,
        record: &WineRecord,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO product (
                batch_id, density, chlorides, alcohol, sulphates, pH,
                fixed_acidity, citric_acid, volatile_acidity,
                free_sulfur_dioxide, total_sulfur_dioxide, residual_sugar
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                batch_id.value(),
                record.density,
                record.chlorides,
                record.alcohol,
                record.sulphates,
                record.ph,
                record.fixed_acidity,
                record.citric_acid,
                record.volatile_acidity,
                record.free_sulfur_dioxide,
                record.total_sulfur_dioxide,
                record.residual_sugar,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 在调用方的事务/连接中插入质量评分
    pub fn insert_quality_tx(conn: &Connection, product_id: i64, score: f64) -> RepositoryResult<()> {
        conn.execute(
            "INSERT INTO quality_test (product_id, score) VALUES (?1, ?2)",
            params![product_id, score],
        )?;
        Ok(())
    }

    /// 产品总数
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM product", [], |row| row.get(0))?;
        Ok(count)
    }

    /// 指定批次的产品数
    pub fn count_by_batch(&self, batch_id: BatchId) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM product WHERE batch_id = ?1",
            params![batch_id.value()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 质量评分总数
    pub fn count_quality_tests(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM quality_test", [], |row| row.get(0))?;
        Ok(count)
    }
}
