// ==========================================
// 葡萄酒产线批次系统 - 领域模型层
// ==========================================
// 职责: 定义拓扑、批次、记录等领域实体与类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod batch;
pub mod record;
pub mod topology;
pub mod types;

// 重导出核心类型
pub use batch::{Batch, BatchAssignment};
pub use record::WineRecord;
pub use topology::{Line, Topology, Warehouse};
pub use types::{BatchId, LineId, WarehouseId, BATCH_CAPACITY, MAX_SEQUENCE, SEQUENCE_MODULUS};
