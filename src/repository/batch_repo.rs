// ==========================================
// 葡萄酒产线批次系统 - 批次数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑（批次号由分配器生成）
// ==========================================

use crate::domain::batch::Batch;
use crate::domain::topology::Topology;
use crate::domain::types::{BatchId, LineId};
use crate::repository::batch_ledger::BatchLedger;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// BatchRepository - 批次仓储
// ==========================================

/// 批次仓储
/// 职责: 管理 warehouse / line / batches 表
pub struct BatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BatchRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入仓库与产线主数据（幂等）
    ///
    /// # 返回
    /// - Ok(usize): 新插入的行数（已存在的不计）
    pub fn ensure_topology(&self, topology: &Topology) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut inserted = 0;
        for warehouse in topology.warehouses() {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO warehouse (warehouse_id, categories) VALUES (?1, ?2)",
                params![warehouse.warehouse_id, warehouse.category],
            )?;
        }
        for line in topology.lines() {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO line (line_id, warehouse_id) VALUES (?1, ?2)",
                params![line.line_id, line.warehouse_id],
            )?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// 在调用方的事务/连接中插入批次行
    pub fn insert_batch_tx(conn: &Connection, batch: &Batch) -> RepositoryResult<()> {
        conn.execute(
            "INSERT INTO batches (batch_id, line_id) VALUES (?1, ?2)",
            params![batch.batch_id.value(), batch.line_id],
        )?;
        Ok(())
    }

    /// 在调用方的事务/连接中查询每条产线的最大批次号
    pub fn max_batch_ids_tx(
        conn: &Connection,
        lines: &[LineId],
    ) -> RepositoryResult<HashMap<LineId, BatchId>> {
        if lines.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = (1..=lines.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT line_id, MAX(batch_id) FROM batches WHERE line_id IN ({}) GROUP BY line_id",
            placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(lines.iter()), |row| {
            Ok((row.get::<_, LineId>(0)?, row.get::<_, Option<i64>>(1)?))
        })?;

        let mut result = HashMap::new();
        for row in rows {
            let (line_id, max_id) = row?;
            if let Some(max_id) = max_id {
                result.insert(line_id, BatchId::from_raw(max_id));
            }
        }
        Ok(result)
    }

    /// 按产线列出批次号（升序）
    pub fn list_batch_ids(&self, line_id: LineId) -> RepositoryResult<Vec<BatchId>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT batch_id FROM batches WHERE line_id = ?1 ORDER BY batch_id")?;
        let ids = stmt
            .query_map(params![line_id], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids.into_iter().map(BatchId::from_raw).collect())
    }

    /// 查询批次及其填充数（按批次号升序）
    pub fn list_batches_with_fill(&self) -> RepositoryResult<Vec<Batch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT b.batch_id, b.line_id, COUNT(p.product_id)
            FROM batches b
            LEFT JOIN product p ON p.batch_id = b.batch_id
            GROUP BY b.batch_id, b.line_id
            ORDER BY b.batch_id
            "#,
        )?;
        let batches = stmt
            .query_map([], |row| {
                Ok(Batch {
                    batch_id: BatchId::from_raw(row.get(0)?),
                    line_id: row.get(1)?,
                    fill_count: row.get::<_, i64>(2)? as u32,
                })
            })?
            .collect::<rusqlite::Result<Vec<Batch>>>()?;
        Ok(batches)
    }

    /// 批次总数
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM batches", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl BatchLedger for BatchRepository {
    fn max_batch_ids(&self, lines: &[LineId]) -> RepositoryResult<HashMap<LineId, BatchId>> {
        let conn = self.get_conn()?;
        Self::max_batch_ids_tx(&conn, lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, ensure_schema};

    fn setup() -> BatchRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        let repo = BatchRepository::from_connection(Arc::new(Mutex::new(conn)));
        repo.ensure_topology(&Topology::wine_default()).unwrap();
        repo
    }

    fn insert(repo: &BatchRepository, line_id: LineId, raw: i64) {
        let conn = repo.get_conn().unwrap();
        BatchRepository::insert_batch_tx(
            &conn,
            &Batch {
                batch_id: BatchId::from_raw(raw),
                line_id,
                fill_count: 0,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_ensure_topology_is_idempotent() {
        let repo = setup();
        assert_eq!(repo.ensure_topology(&Topology::wine_default()).unwrap(), 0);
    }

    #[test]
    fn test_max_batch_ids_scoped_per_line() {
        let repo = setup();
        insert(&repo, 1, 1001);
        insert(&repo, 1, 1004);
        insert(&repo, 2, 2002);

        let max = repo.max_batch_ids(&[1, 2, 3]).unwrap();
        assert_eq!(max.get(&1), Some(&BatchId::from_raw(1004)));
        assert_eq!(max.get(&2), Some(&BatchId::from_raw(2002)));
        assert!(!max.contains_key(&3));

        // 仅查询部分产线
        let max = repo.max_batch_ids(&[2]).unwrap();
        assert_eq!(max.len(), 1);
    }

    #[test]
    fn test_duplicate_batch_id_is_unique_violation() {
        let repo = setup();
        insert(&repo, 1, 1001);

        let conn = repo.get_conn().unwrap();
        let err = BatchRepository::insert_batch_tx(
            &conn,
            &Batch {
                batch_id: BatchId::from_raw(1001),
                line_id: 1,
                fill_count: 0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }
}
