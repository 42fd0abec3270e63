// ==========================================
// 葡萄酒产线批次系统 - 投递层
// ==========================================
// 职责: 把 (分配结果, 记录) 送往存储或消息通道
// 实现:
// - TransactionalSink: 整体事务（历史回灌）
// - StreamingDbSink: 逐条提交（实时仿真）
// - PublishSink: 消息发布（MQTT / HTTP）
// 约定: assignment.opened_new_batch = true 时先写批次行，再写记录
// ==========================================

pub mod bulk;
pub mod channel;
pub mod error;
pub mod publish;
pub mod streaming;

use crate::domain::batch::BatchAssignment;
use crate::domain::record::WineRecord;
use crate::domain::types::BatchId;
use async_trait::async_trait;
use uuid::Uuid;

pub use bulk::TransactionalSink;
pub use channel::{HttpChannel, MessageChannel, MqttChannel};
pub use error::{SinkError, SinkResult};
pub use publish::{PublishMessage, PublishSink};
pub use streaming::StreamingDbSink;

/// 单条投递回执
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub batch_id: BatchId,
    /// 存储类投递端返回的 product_id
    pub product_id: Option<i64>,
    /// 发布类投递端返回的消息 ID
    pub message_id: Option<Uuid>,
}

// ==========================================
// RecordSink Trait
// ==========================================
// 实现者: TransactionalSink / StreamingDbSink / PublishSink
#[async_trait]
pub trait RecordSink: Send {
    /// 投递端名称（用于日志）
    fn name(&self) -> &'static str;

    /// 投递一条已分配批次的记录
    async fn deliver(
        &mut self,
        assignment: &BatchAssignment,
        record: &WineRecord,
    ) -> SinkResult<DeliveryReceipt>;

    /// 正常结束（事务型投递端在此提交）
    async fn finish(&mut self) -> SinkResult<()>;

    /// 放弃本次运行（事务型投递端在此回滚）
    async fn abort(&mut self) -> SinkResult<()>;
}
