// ==========================================
// 葡萄酒产线批次系统 - 逐条提交投递端（实时仿真）
// ==========================================
// 每条记录一个短事务: 批次行（若新开）+ 产品行 → 立即提交
// 失败只回滚当前这一条，之前已提交的记录保留
// ==========================================

use crate::domain::batch::{Batch, BatchAssignment};
use crate::domain::record::WineRecord;
use crate::repository::batch_repo::BatchRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::product_repo::ProductRepository;
use crate::sink::error::SinkResult;
use crate::sink::{DeliveryReceipt, RecordSink};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub struct StreamingDbSink {
    conn: Arc<Mutex<Connection>>,
    record_quality: bool,
    committed: usize,
}

impl StreamingDbSink {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            record_quality: false,
            committed: 0,
        }
    }

    /// 同时写入 quality_test（实时场景默认不写）
    pub fn with_quality(mut self, record_quality: bool) -> Self {
        self.record_quality = record_quality;
        self
    }

    /// 已提交的记录数
    pub fn committed(&self) -> usize {
        self.committed
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl RecordSink for StreamingDbSink {
    fn name(&self) -> &'static str {
        "streaming"
    }

    async fn deliver(
        &mut self,
        assignment: &BatchAssignment,
        record: &WineRecord,
    ) -> SinkResult<DeliveryReceipt> {
        let product_id = {
            let conn = self.get_conn()?;
            let tx = conn.unchecked_transaction().map_err(RepositoryError::from)?;

            if assignment.opened_new_batch {
                BatchRepository::insert_batch_tx(
                    &tx,
                    &Batch {
                        batch_id: assignment.batch_id,
                        line_id: assignment.line_id,
                        fill_count: 0,
                    },
                )?;
                info!(
                    "新批次 {} 已创建 (line={})",
                    assignment.batch_id, assignment.line_id
                );
            }

            let product_id =
                ProductRepository::insert_product_tx(&tx, assignment.batch_id, record)?;
            if self.record_quality {
                if let Some(score) = record.quality {
                    ProductRepository::insert_quality_tx(&tx, product_id, score)?;
                }
            }

            tx.commit().map_err(RepositoryError::from)?;
            product_id
        };
        self.committed += 1;

        debug!(
            "记录已提交: product={}, batch={}, fill={}",
            product_id, assignment.batch_id, assignment.fill_count
        );
        Ok(DeliveryReceipt {
            batch_id: assignment.batch_id,
            product_id: Some(product_id),
            message_id: None,
        })
    }

    async fn finish(&mut self) -> SinkResult<()> {
        info!("实时写入结束: 共提交 {} 条记录", self.committed);
        Ok(())
    }

    /// 逐条提交模式没有未决事务
    async fn abort(&mut self) -> SinkResult<()> {
        Ok(())
    }
}
