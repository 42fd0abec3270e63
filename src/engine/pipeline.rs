// ==========================================
// 葡萄酒产线批次系统 - 运行流水线
// ==========================================
// BackfillPipeline: 历史回灌（轮转填充 + 整体事务）
//   按仓库 → 按轮次回放数据集，每个阶段都从该仓库首条产线开始轮转
//   首个仓库按文件顺序回放，其余仓库每轮重新洗牌
// StreamSimulator: 实时仿真（阈值换批 + 逐条投递 + 节拍延迟）
// 停止信号: watch 通道，每条记录前检查，并与节拍延迟竞争
// 红线: 正在投递的记录总是完成后才响应停止
// ==========================================

use crate::domain::batch::BatchAssignment;
use crate::domain::record::WineRecord;
use crate::domain::topology::Topology;
use crate::domain::types::{LineId, WarehouseId};
use crate::engine::allocator::BatchAllocator;
use crate::engine::error::{AllocationError, PipelineError, PipelineResult};
use crate::engine::policy::{LineSelector, RolloverThreshold};
use crate::importer::replay_source::ReplaySource;
use crate::sink::RecordSink;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 停止信号接收端（true 表示请求停止）
pub type ShutdownSignal = watch::Receiver<bool>;

fn shutdown_requested(shutdown: Option<&ShutdownSignal>) -> bool {
    shutdown.map_or(false, |rx| *rx.borrow())
}

/// 投递失败后的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 放弃本次运行（写库模式）
    Abort,
    /// 记录日志后继续下一条（发布模式，重投由 broker 负责）
    LogAndContinue,
}

// ==========================================
// 历史回灌
// ==========================================

/// 回灌阶段: 一个仓库的一轮回放
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillStage {
    pub warehouse_id: WarehouseId,
    pub lines: Vec<LineId>,
    /// 从 1 开始
    pub cycle: u32,
    pub shuffle: bool,
}

/// 回灌计划
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillPlan {
    pub cycles: u32,
    /// 首个仓库之后的仓库是否每轮洗牌
    pub shuffle: bool,
}

impl Default for BackfillPlan {
    fn default() -> Self {
        Self {
            cycles: 1,
            shuffle: true,
        }
    }
}

impl BackfillPlan {
    /// 展开为有序阶段列表（跳过没有产线的仓库）
    pub fn stages(&self, topology: &Topology) -> Vec<BackfillStage> {
        let mut stages = Vec::new();
        for (idx, warehouse) in topology.warehouses().iter().enumerate() {
            if warehouse.lines.is_empty() {
                continue;
            }
            for cycle in 1..=self.cycles {
                stages.push(BackfillStage {
                    warehouse_id: warehouse.warehouse_id,
                    lines: warehouse.lines.clone(),
                    cycle,
                    shuffle: self.shuffle && idx > 0,
                });
            }
        }
        stages
    }
}

/// 回灌结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillReport {
    pub run_id: Uuid,
    pub records: usize,
    pub batches_opened: usize,
    /// 仓库 → 写入记录数
    pub records_by_warehouse: BTreeMap<WarehouseId, usize>,
    pub elapsed_ms: u128,
}

pub struct BackfillPipeline<'a> {
    allocator: &'a mut BatchAllocator,
    shutdown: Option<ShutdownSignal>,
}

impl<'a> BackfillPipeline<'a> {
    pub fn new(allocator: &'a mut BatchAllocator) -> Self {
        Self {
            allocator,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// 执行回灌
    ///
    /// 成功 → sink.finish()（事务型投递端提交）
    /// 任何失败或取消 → sink.abort()（整体回滚）后返回错误
    #[instrument(skip_all, fields(cycles = plan.cycles))]
    pub async fn run<S, R>(
        &mut self,
        topology: &Topology,
        source: &ReplaySource,
        plan: &BackfillPlan,
        sink: &mut S,
        rng: &mut R,
    ) -> PipelineResult<BackfillReport>
    where
        S: RecordSink + ?Sized,
        R: Rng,
    {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!(
            "开始历史回灌: run_id={}, 数据集 {} 条, 投递端 {}",
            run_id,
            source.len(),
            sink.name()
        );

        match self.run_stages(topology, source, plan, sink, rng).await {
            Ok((records, batches_opened, records_by_warehouse)) => {
                sink.finish().await.map_err(|source| PipelineError::Delivery {
                    sink: sink.name(),
                    source,
                })?;
                let report = BackfillReport {
                    run_id,
                    records,
                    batches_opened,
                    records_by_warehouse,
                    elapsed_ms: started.elapsed().as_millis(),
                };
                info!(
                    "历史回灌完成: {} 条记录, {} 个批次, 耗时 {} ms",
                    report.records, report.batches_opened, report.elapsed_ms
                );
                Ok(report)
            }
            Err(e) => {
                error!("历史回灌失败，放弃全部写入: {}", e);
                if let Err(abort_err) = sink.abort().await {
                    error!("回滚失败: {}", abort_err);
                }
                Err(e)
            }
        }
    }

    async fn run_stages<S, R>(
        &mut self,
        topology: &Topology,
        source: &ReplaySource,
        plan: &BackfillPlan,
        sink: &mut S,
        rng: &mut R,
    ) -> PipelineResult<(usize, usize, BTreeMap<WarehouseId, usize>)>
    where
        S: RecordSink + ?Sized,
        R: Rng,
    {
        let mut records = 0;
        let mut batches_opened = 0;
        let mut by_warehouse = BTreeMap::new();

        for stage in plan.stages(topology) {
            debug!(
                "回灌阶段: 仓库 {} 第 {} 轮 (shuffle={})",
                stage.warehouse_id, stage.cycle, stage.shuffle
            );
            let stream = source.stream_with_rng(stage.shuffle, 1, &mut *rng);
            let mut fill = self.allocator.round_robin(&stage.lines, stream)?;

            while let Some(item) = fill.next() {
                if shutdown_requested(self.shutdown.as_ref()) {
                    return Err(PipelineError::Cancelled);
                }
                let (assignment, record) = item?;
                sink.deliver(&assignment, &record)
                    .await
                    .map_err(|source| PipelineError::Delivery {
                        sink: sink.name(),
                        source,
                    })?;
                records += 1;
                *by_warehouse.entry(stage.warehouse_id).or_insert(0) += 1;
            }
            batches_opened += fill.batches_opened();
        }

        Ok((records, batches_opened, by_warehouse))
    }
}

// ==========================================
// 实时仿真
// ==========================================

/// 仿真结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub run_id: Uuid,
    pub delivered: usize,
    pub failed: usize,
    pub batches_opened: usize,
    pub cancelled: bool,
    pub last_assignment: Option<BatchAssignment>,
}

pub struct StreamSimulator<'a, T, L> {
    allocator: &'a mut BatchAllocator,
    lines: Vec<LineId>,
    thresholds: T,
    selector: L,
    delay: Duration,
    failure_policy: FailurePolicy,
    shutdown: Option<ShutdownSignal>,
}

impl<'a, T, L> StreamSimulator<'a, T, L>
where
    T: RolloverThreshold,
    L: LineSelector,
{
    /// # 参数
    /// - lines: 候选产线（选择器从中挑选目标产线）
    /// - thresholds: 每个新批次的换批阈值来源
    pub fn new(allocator: &'a mut BatchAllocator, lines: Vec<LineId>, thresholds: T, selector: L) -> Self {
        Self {
            allocator,
            lines,
            thresholds,
            selector,
            delay: Duration::ZERO,
            failure_policy: FailurePolicy::Abort,
            shutdown: None,
        }
    }

    /// 每条记录投递后的节拍延迟
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// 逐条分配并投递，直到记录流耗尽或收到停止信号
    ///
    /// # 返回
    /// - Ok(report): 正常结束或被取消（report.cancelled）
    /// - Err(Allocation): 产线未知/序号耗尽（致命）
    /// - Err(Delivery): FailurePolicy::Abort 下的投递失败
    #[instrument(skip_all)]
    pub async fn run<I, S>(&mut self, records: I, sink: &mut S) -> PipelineResult<SimulationReport>
    where
        I: IntoIterator<Item = WineRecord>,
        S: RecordSink + ?Sized,
    {
        let mut report = SimulationReport {
            run_id: Uuid::new_v4(),
            delivered: 0,
            failed: 0,
            batches_opened: 0,
            cancelled: false,
            last_assignment: None,
        };
        info!("开始实时仿真: run_id={}, 投递端 {}", report.run_id, sink.name());

        for record in records {
            if shutdown_requested(self.shutdown.as_ref()) {
                report.cancelled = true;
                break;
            }

            let assignment = match self.assign_next() {
                Ok(assignment) => assignment,
                Err(e) => {
                    error!("批次分配失败，停止仿真: {}", e);
                    if let Err(abort_err) = sink.abort().await {
                        error!("投递端终止失败: {}", abort_err);
                    }
                    return Err(e.into());
                }
            };
            if assignment.opened_new_batch {
                report.batches_opened += 1;
            }

            match sink.deliver(&assignment, &record).await {
                Ok(receipt) => {
                    report.delivered += 1;
                    report.last_assignment = Some(assignment);
                    debug!(
                        "投递成功: batch={}, fill={}, product={:?}, message={:?}",
                        receipt.batch_id, assignment.fill_count, receipt.product_id, receipt.message_id
                    );
                }
                Err(e) => match self.failure_policy {
                    FailurePolicy::Abort => {
                        error!("投递失败，停止仿真 (batch={}): {}", assignment.batch_id, e);
                        if let Err(abort_err) = sink.abort().await {
                            error!("投递端终止失败: {}", abort_err);
                        }
                        return Err(PipelineError::Delivery {
                            sink: sink.name(),
                            source: e,
                        });
                    }
                    FailurePolicy::LogAndContinue => {
                        warn!("投递失败，继续下一条 (batch={}): {}", assignment.batch_id, e);
                        report.failed += 1;
                    }
                },
            }

            if self.pause().await {
                report.cancelled = true;
                break;
            }
        }

        if report.cancelled {
            info!("收到停止信号，仿真在记录边界停止");
        }
        sink.finish().await.map_err(|source| PipelineError::Delivery {
            sink: sink.name(),
            source,
        })?;

        info!(
            "实时仿真结束: 成功 {}, 失败 {}, 新批次 {}",
            report.delivered, report.failed, report.batches_opened
        );
        Ok(report)
    }

    fn assign_next(&mut self) -> Result<BatchAssignment, AllocationError> {
        let line_id = self
            .selector
            .select(&self.lines)
            .ok_or(AllocationError::EmptyLineRotation)?;
        self.allocator.assign_rollover(line_id, &mut self.thresholds)
    }

    /// 节拍延迟；返回 true 表示延迟期间收到停止信号
    async fn pause(&mut self) -> bool {
        if self.delay.is_zero() {
            return false;
        }
        let rx = match self.shutdown.as_mut() {
            Some(rx) => rx,
            None => {
                tokio::time::sleep(self.delay).await;
                return false;
            }
        };

        let changed = tokio::select! {
            _ = tokio::time::sleep(self.delay) => return false,
            changed = rx.changed() => changed,
        };

        match changed {
            Ok(()) => *rx.borrow(),
            Err(_) => {
                // 发送端已释放，此后不会再有停止信号
                self.shutdown = None;
                tokio::time::sleep(self.delay).await;
                false
            }
        }
    }
}
