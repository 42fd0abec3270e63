// ==========================================
// 葡萄酒产线批次系统 - 事务型投递端（历史回灌）
// ==========================================
// 规则:
// - 构造即 BEGIN TRANSACTION
// - 批次行 / 产品行 / 质量评分全部写在同一事务内
// - finish() → COMMIT；abort() 或未 finish 即析构 → ROLLBACK
// 红线: 任一写入失败，整次回灌不留下任何行
// ==========================================

use crate::domain::batch::{Batch, BatchAssignment};
use crate::domain::record::WineRecord;
use crate::repository::batch_repo::BatchRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::product_repo::ProductRepository;
use crate::sink::error::{SinkError, SinkResult};
use crate::sink::{DeliveryReceipt, RecordSink};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const SINK_NAME: &str = "bulk";

pub struct TransactionalSink {
    conn: Arc<Mutex<Connection>>,
    in_transaction: bool,
    record_quality: bool,
    batches_written: usize,
    products_written: usize,
}

impl TransactionalSink {
    /// 开启事务并创建投递端
    pub fn begin(conn: Arc<Mutex<Connection>>) -> SinkResult<Self> {
        {
            let guard = lock(&conn)?;
            guard
                .execute("BEGIN TRANSACTION", [])
                .map_err(RepositoryError::from)?;
        }
        debug!("回灌事务已开启");

        Ok(Self {
            conn,
            in_transaction: true,
            record_quality: true,
            batches_written: 0,
            products_written: 0,
        })
    }

    /// 不写入 quality_test
    pub fn without_quality(mut self) -> Self {
        self.record_quality = false;
        self
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn batches_written(&self) -> usize {
        self.batches_written
    }

    pub fn products_written(&self) -> usize {
        self.products_written
    }

    fn end_transaction(&mut self, statement: &str) -> SinkResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        let guard = lock(&self.conn)?;
        // 无论结果如何都视为事务已结束，避免析构时重复回滚
        self.in_transaction = false;
        guard.execute(statement, []).map_err(RepositoryError::from)?;
        Ok(())
    }
}

fn lock(conn: &Arc<Mutex<Connection>>) -> RepositoryResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
}

#[async_trait]
impl RecordSink for TransactionalSink {
    fn name(&self) -> &'static str {
        SINK_NAME
    }

    async fn deliver(
        &mut self,
        assignment: &BatchAssignment,
        record: &WineRecord,
    ) -> SinkResult<DeliveryReceipt> {
        if !self.in_transaction {
            return Err(SinkError::Closed(SINK_NAME));
        }

        let conn = lock(&self.conn)?;
        if assignment.opened_new_batch {
            BatchRepository::insert_batch_tx(
                &conn,
                &Batch {
                    batch_id: assignment.batch_id,
                    line_id: assignment.line_id,
                    fill_count: 0,
                },
            )?;
            self.batches_written += 1;
        }

        let product_id = ProductRepository::insert_product_tx(&conn, assignment.batch_id, record)?;
        if self.record_quality {
            if let Some(score) = record.quality {
                ProductRepository::insert_quality_tx(&conn, product_id, score)?;
            }
        }
        self.products_written += 1;

        Ok(DeliveryReceipt {
            batch_id: assignment.batch_id,
            product_id: Some(product_id),
            message_id: None,
        })
    }

    async fn finish(&mut self) -> SinkResult<()> {
        if !self.in_transaction {
            return Err(SinkError::Closed(SINK_NAME));
        }
        self.end_transaction("COMMIT")?;
        info!(
            "回灌事务已提交: {} 个批次, {} 条记录",
            self.batches_written, self.products_written
        );
        Ok(())
    }

    async fn abort(&mut self) -> SinkResult<()> {
        if self.in_transaction {
            self.end_transaction("ROLLBACK")?;
            warn!(
                "回灌事务已回滚: 丢弃 {} 个批次, {} 条记录",
                self.batches_written, self.products_written
            );
        }
        Ok(())
    }
}

impl Drop for TransactionalSink {
    fn drop(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.end_transaction("ROLLBACK") {
                warn!("析构时回滚失败: {}", e);
            } else {
                warn!("回灌事务未提交即释放，已回滚");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, ensure_schema};
    use crate::domain::topology::Topology;
    use crate::domain::types::BatchId;

    fn setup() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        BatchRepository::from_connection(conn.clone())
            .ensure_topology(&Topology::wine_default())
            .unwrap();
        conn
    }

    fn record(quality: Option<f64>) -> WineRecord {
        WineRecord {
            density: 0.99,
            chlorides: 0.04,
            alcohol: 10.0,
            sulphates: 0.5,
            ph: 3.2,
            fixed_acidity: 7.0,
            citric_acid: 0.3,
            volatile_acidity: 0.3,
            free_sulfur_dioxide: 30.0,
            total_sulfur_dioxide: 120.0,
            residual_sugar: 2.0,
            quality,
        }
    }

    fn assignment(raw: i64, fill: u32, opened: bool) -> BatchAssignment {
        BatchAssignment {
            batch_id: BatchId::from_raw(raw),
            line_id: raw / 1000,
            fill_count: fill,
            opened_new_batch: opened,
        }
    }

    #[tokio::test]
    async fn test_commit_persists_all_rows() {
        let conn = setup();
        let mut sink = TransactionalSink::begin(conn.clone()).unwrap();

        sink.deliver(&assignment(1001, 1, true), &record(Some(6.0)))
            .await
            .unwrap();
        sink.deliver(&assignment(1001, 2, false), &record(None))
            .await
            .unwrap();
        sink.finish().await.unwrap();
        assert!(!sink.in_transaction());

        let products = ProductRepository::from_connection(conn.clone());
        assert_eq!(products.count().unwrap(), 2);
        assert_eq!(products.count_quality_tests().unwrap(), 1);
        assert_eq!(BatchRepository::from_connection(conn).count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_abort_discards_everything() {
        let conn = setup();
        let mut sink = TransactionalSink::begin(conn.clone()).unwrap();
        sink.deliver(&assignment(2001, 1, true), &record(Some(5.0)))
            .await
            .unwrap();
        sink.abort().await.unwrap();

        assert_eq!(ProductRepository::from_connection(conn.clone()).count().unwrap(), 0);
        assert_eq!(BatchRepository::from_connection(conn).count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_drop_without_finish_rolls_back() {
        let conn = setup();
        {
            let mut sink = TransactionalSink::begin(conn.clone()).unwrap();
            sink.deliver(&assignment(3001, 1, true), &record(None))
                .await
                .unwrap();
        }
        assert_eq!(BatchRepository::from_connection(conn).count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deliver_after_finish_is_rejected() {
        let conn = setup();
        let mut sink = TransactionalSink::begin(conn).unwrap();
        sink.finish().await.unwrap();
        let err = sink
            .deliver(&assignment(1001, 1, true), &record(None))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Closed(_)));
    }

    #[tokio::test]
    async fn test_product_for_unwritten_batch_violates_foreign_key() {
        let conn = setup();
        let mut sink = TransactionalSink::begin(conn.clone()).unwrap();
        let err = sink
            .deliver(&assignment(1001, 1, false), &record(None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SinkError::Storage(RepositoryError::ForeignKeyViolation(_))
        ));
        sink.abort().await.unwrap();
    }
}
