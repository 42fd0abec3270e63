// ==========================================
// 葡萄酒产线批次系统 - 引擎层
// ==========================================
// 职责: 批次序号恢复、批次分配、运行流水线
// 红线: Engine 不拼 SQL（持久化经 Repository / Sink）
// ==========================================

pub mod allocator;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod recovery;
pub mod round_robin;

// 重导出核心引擎
pub use allocator::{BatchAllocator, LineState};
pub use error::{AllocationError, AllocationResult, PipelineError, PipelineResult};
pub use pipeline::{
    BackfillPipeline, BackfillPlan, BackfillReport, BackfillStage, FailurePolicy,
    ShutdownSignal, SimulationReport, StreamSimulator,
};
pub use policy::{
    FixedLineSelector, FixedRollover, LineSelector, RandomRollover, RolloverThreshold,
    UniformLineSelector, DEFAULT_ROLLOVER_MAX, DEFAULT_ROLLOVER_MIN,
};
pub use recovery::SequenceRecovery;
pub use round_robin::RoundRobinFill;
