// ==========================================
// 葡萄酒产线批次系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + MQTT/HTTP
// 系统定位: 产线批次分配 + 历史回灌 + 实时数据仿真
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 批次分配与运行流水线
pub mod engine;

// 数据源层 - 数据集回放
pub mod importer;

// 投递层 - 写库 / 发布
pub mod sink;

// 配置层 - 运行参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 应用层 - 运行入口
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BatchId, LineId, WarehouseId, BATCH_CAPACITY, MAX_SEQUENCE};

// 领域实体
pub use domain::{Batch, BatchAssignment, Topology, WineRecord};

// 引擎
pub use engine::{BackfillPipeline, BatchAllocator, SequenceRecovery, StreamSimulator};

// 数据源 / 投递端
pub use importer::ReplaySource;
pub use sink::{PublishSink, RecordSink, StreamingDbSink, TransactionalSink};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "葡萄酒产线批次系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
