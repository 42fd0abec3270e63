// ==========================================
// 葡萄酒产线批次系统 - 发布投递端
// ==========================================
// 消息格式（JSON）:
// { "message_id": uuid, "timestamp": 秒(f64),
//   "warehouse_id": 1 或 null, "line_id": 1,
//   "batch_id": 1001, "product_number": 批次内序号,
//   "payload": { 11 项指标, "pH", "quality": 数值或 null } }
// 说明: 发布模式不落库，批次号只在进程内唯一
// ==========================================

use crate::domain::batch::BatchAssignment;
use crate::domain::record::WineRecord;
use crate::domain::topology::Topology;
use crate::domain::types::{BatchId, LineId, WarehouseId};
use crate::sink::channel::MessageChannel;
use crate::sink::error::SinkResult;
use crate::sink::{DeliveryReceipt, RecordSink};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// 发布消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishMessage {
    pub message_id: Uuid,
    /// Unix 时间戳（秒，含小数）
    pub timestamp: f64,
    /// 产线所属仓库（拓扑未知时为 null）
    pub warehouse_id: Option<WarehouseId>,
    pub line_id: LineId,
    pub batch_id: BatchId,
    /// 该记录在批次内的序号（从 1 开始）
    pub product_number: u32,
    pub payload: WineRecord,
}

impl PublishMessage {
    pub fn new(
        assignment: &BatchAssignment,
        warehouse_id: Option<WarehouseId>,
        record: &WineRecord,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            warehouse_id,
            line_id: assignment.line_id,
            batch_id: assignment.batch_id,
            product_number: assignment.fill_count,
            payload: record.clone(),
        }
    }
}

// ==========================================
// PublishSink
// ==========================================
pub struct PublishSink<C: MessageChannel> {
    channel: C,
    topology: Option<Topology>,
    published: usize,
}

impl<C: MessageChannel> PublishSink<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            topology: None,
            published: 0,
        }
    }

    /// 用于在消息中标注仓库
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// 已确认的消息数
    pub fn published(&self) -> usize {
        self.published
    }
}

#[async_trait]
impl<C: MessageChannel> RecordSink for PublishSink<C> {
    fn name(&self) -> &'static str {
        self.channel.name()
    }

    async fn deliver(
        &mut self,
        assignment: &BatchAssignment,
        record: &WineRecord,
    ) -> SinkResult<DeliveryReceipt> {
        let warehouse_id = self
            .topology
            .as_ref()
            .and_then(|t| t.warehouse_of(assignment.line_id));
        let message = PublishMessage::new(assignment, warehouse_id, record);
        self.channel.send(&message).await?;
        self.published += 1;

        if assignment.opened_new_batch {
            info!(
                "新批次 {} 开始发布 (line={})",
                assignment.batch_id, assignment.line_id
            );
        }
        debug!(
            "已发布: message={}, batch={}, fill={}",
            message.message_id, assignment.batch_id, assignment.fill_count
        );

        Ok(DeliveryReceipt {
            batch_id: assignment.batch_id,
            product_id: None,
            message_id: Some(message.message_id),
        })
    }

    async fn finish(&mut self) -> SinkResult<()> {
        info!(
            "发布结束 [{}]: 共确认 {} 条消息",
            self.channel.name(),
            self.published
        );
        self.channel.close().await
    }

    async fn abort(&mut self) -> SinkResult<()> {
        self.channel.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::error::SinkError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<PublishMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, message: &PublishMessage) -> SinkResult<()> {
            if self.fail {
                return Err(SinkError::publish("recording", "broker unavailable"));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn record(quality: Option<f64>) -> WineRecord {
        WineRecord {
            density: 0.9978,
            chlorides: 0.076,
            alcohol: 9.4,
            sulphates: 0.56,
            ph: 3.51,
            fixed_acidity: 7.4,
            citric_acid: 0.0,
            volatile_acidity: 0.7,
            free_sulfur_dioxide: 11.0,
            total_sulfur_dioxide: 34.0,
            residual_sugar: 1.9,
            quality,
        }
    }

    fn assignment(raw: i64, fill_count: u32) -> BatchAssignment {
        BatchAssignment {
            batch_id: BatchId::from_raw(raw),
            line_id: raw / 1000,
            fill_count,
            opened_new_batch: fill_count == 1,
        }
    }

    #[test]
    fn test_message_wire_format() {
        let message = PublishMessage::new(&assignment(2003, 1), Some(1), &record(None));
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["batch_id"], 2003);
        assert_eq!(value["line_id"], 2);
        assert_eq!(value["warehouse_id"], 1);
        assert_eq!(value["product_number"], 1);
        assert!(value["timestamp"].as_f64().unwrap() > 1_600_000_000.0);
        assert_eq!(value["payload"]["pH"], 3.51);
        assert!(value["payload"]["quality"].is_null());
        assert!(value["payload"].get("ph").is_none());
        assert_eq!(value["payload"].as_object().unwrap().len(), 12);
        assert_eq!(
            value["message_id"].as_str().unwrap(),
            message.message_id.to_string()
        );
    }

    #[tokio::test]
    async fn test_deliver_tags_warehouse_and_product_number() {
        let mut sink =
            PublishSink::new(RecordingChannel::default()).with_topology(Topology::wine_default());

        let r1 = sink
            .deliver(&assignment(1001, 1), &record(Some(5.0)))
            .await
            .unwrap();
        let r2 = sink
            .deliver(&assignment(1001, 2), &record(Some(6.0)))
            .await
            .unwrap();
        sink.finish().await.unwrap();

        assert_eq!(sink.published(), 2);
        assert!(r1.product_id.is_none());
        assert_ne!(r1.message_id, r2.message_id);

        let sent = sink.channel().sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].payload.quality, Some(6.0));
        assert!(sent.iter().all(|m| m.warehouse_id == Some(1)));
        assert_eq!(
            sent.iter().map(|m| m.product_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_deliver_without_topology_leaves_warehouse_empty() {
        let mut sink = PublishSink::new(RecordingChannel::default());
        sink.deliver(&assignment(4001, 1), &record(None))
            .await
            .unwrap();

        let sent = sink.channel().sent.lock().unwrap();
        assert_eq!(sent[0].warehouse_id, None);
        assert!(serde_json::to_value(&sent[0]).unwrap()["warehouse_id"].is_null());
    }

    #[tokio::test]
    async fn test_channel_failure_propagates() {
        let mut sink = PublishSink::new(RecordingChannel {
            fail: true,
            ..Default::default()
        });
        let err = sink
            .deliver(&assignment(1001, 1), &record(None))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Publish { .. }));
        assert_eq!(sink.published(), 0);
    }
}
