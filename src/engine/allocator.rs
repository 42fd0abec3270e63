// ==========================================
// 葡萄酒产线批次系统 - 批次分配器
// ==========================================
// 职责: 为每条记录确定归属批次，必要时开新批次
// 策略:
// - 轮转填充（历史回灌）: 见 round_robin.rs
// - 阈值换批（实时仿真）: assign_rollover
// 红线:
// - 序号每开一个批次严格 +1，不回退、不跳号
// - 序号只在开批成功时推进
// - 单进程内产线状态只归本分配器所有
// ==========================================

use crate::domain::batch::{Batch, BatchAssignment};
use crate::domain::types::{BatchId, LineId};
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::policy::RolloverThreshold;
use crate::engine::recovery::SequenceRecovery;
use crate::engine::round_robin::RoundRobinFill;
use crate::repository::batch_ledger::BatchLedger;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// 当前打开的批次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenBatch {
    batch_id: BatchId,
    fill_count: u32,
    /// 换批阈值（仅阈值换批策略设置）
    rollover_threshold: Option<u32>,
}

/// 单条产线的分配状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineState {
    pub line_id: LineId,
    /// 已使用的最大序号
    pub sequence: u32,
    /// 当前打开的批次（None 表示没有可接收记录的批次）
    pub open_batch: Option<Batch>,
    /// 当前批次的换批阈值
    pub rollover_threshold: Option<u32>,
}

// ==========================================
// BatchAllocator
// ==========================================
#[derive(Debug)]
pub struct BatchAllocator {
    capacity: u32,
    sequences: BTreeMap<LineId, u32>,
    open: BTreeMap<LineId, OpenBatch>,
}

impl BatchAllocator {
    /// 以已恢复的序号构造分配器
    ///
    /// # 参数
    /// - capacity: 批次固定容量
    /// - recovered: 产线 → 已用序号
    pub fn new(capacity: u32, recovered: HashMap<LineId, u32>) -> Self {
        Self {
            capacity,
            sequences: recovered.into_iter().collect(),
            open: BTreeMap::new(),
        }
    }

    /// 从台账恢复序号并构造分配器
    pub fn bootstrap<L: BatchLedger + ?Sized>(
        ledger: &L,
        lines: &[LineId],
        capacity: u32,
    ) -> AllocationResult<Self> {
        let recovered = SequenceRecovery::bootstrap(ledger, lines)?;
        info!(
            "批次分配器已就绪: {} 条产线, 容量 {}",
            recovered.len(),
            capacity
        );
        Ok(Self::new(capacity, recovered))
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// 已登记的全部产线（升序）
    pub fn lines(&self) -> Vec<LineId> {
        self.sequences.keys().copied().collect()
    }

    pub fn knows_line(&self, line_id: LineId) -> bool {
        self.sequences.contains_key(&line_id)
    }

    /// 产线已使用的最大序号
    pub fn current_sequence(&self, line_id: LineId) -> Option<u32> {
        self.sequences.get(&line_id).copied()
    }

    /// 产线当前打开的批次
    pub fn open_batch(&self, line_id: LineId) -> Option<Batch> {
        self.open.get(&line_id).map(|open| Batch {
            batch_id: open.batch_id,
            line_id,
            fill_count: open.fill_count,
        })
    }

    /// 全部产线状态快照
    pub fn snapshot(&self) -> Vec<LineState> {
        self.sequences
            .iter()
            .map(|(&line_id, &sequence)| {
                let open = self.open.get(&line_id);
                LineState {
                    line_id,
                    sequence,
                    open_batch: self.open_batch(line_id),
                    rollover_threshold: open.and_then(|o| o.rollover_threshold),
                }
            })
            .collect()
    }

    // ==========================================
    // 核心原语
    // ==========================================

    /// 为产线开一个新批次
    ///
    /// 序号 +1，批次号 = line_id * 1000 + sequence，填充数清零。
    /// 原先打开的批次随之关闭。
    ///
    /// # 返回
    /// - Ok(Batch): 新批次（调用方须先落库再写记录）
    /// - Err(UnknownLine): 产线未登记
    /// - Err(SequenceExhausted): 序号已达 999（序号不推进）
    pub fn open_new_batch(&mut self, line_id: LineId) -> AllocationResult<Batch> {
        self.open_batch_with_threshold(line_id, None)
    }

    fn open_batch_with_threshold(
        &mut self,
        line_id: LineId,
        rollover_threshold: Option<u32>,
    ) -> AllocationResult<Batch> {
        let sequence = self
            .sequences
            .get_mut(&line_id)
            .ok_or(AllocationError::UnknownLine(line_id))?;

        let next = *sequence + 1;
        // compose 拒绝超过 MAX_SEQUENCE 的序号
        let batch_id = match BatchId::compose(line_id, next) {
            Some(id) => id,
            None => {
                return Err(AllocationError::SequenceExhausted {
                    line_id,
                    last_sequence: *sequence,
                })
            }
        };
        *sequence = next;

        self.open.insert(
            line_id,
            OpenBatch {
                batch_id,
                fill_count: 0,
                rollover_threshold,
            },
        );

        debug!(
            "开新批次: batch={}, line={}, threshold={:?}",
            batch_id, line_id, rollover_threshold
        );
        Ok(Batch {
            batch_id,
            line_id,
            fill_count: 0,
        })
    }

    /// 关闭产线当前批次（关闭后批次不可再接收记录）
    pub fn close_batch(&mut self, line_id: LineId) -> Option<Batch> {
        self.open.remove(&line_id).map(|open| Batch {
            batch_id: open.batch_id,
            line_id,
            fill_count: open.fill_count,
        })
    }

    /// 向产线当前打开的批次追加一条记录
    ///
    /// 调用方保证批次已打开且未满
    pub(crate) fn append(
        &mut self,
        line_id: LineId,
        opened_new_batch: bool,
    ) -> AllocationResult<BatchAssignment> {
        let open = self
            .open
            .get_mut(&line_id)
            .ok_or(AllocationError::UnknownLine(line_id))?;
        open.fill_count += 1;

        Ok(BatchAssignment {
            batch_id: open.batch_id,
            line_id,
            fill_count: open.fill_count,
            opened_new_batch,
        })
    }

    // ==========================================
    // 阈值换批策略（实时仿真）
    // ==========================================

    /// 将一条记录分配到产线当前批次
    ///
    /// 规则:
    /// 1) 产线无打开批次 → 开新批次
    /// 2) 当前批次填充数已达换批阈值 → 开新批次
    /// 3) 记录追加到当前批次，填充数 +1
    ///
    /// 阈值在开批时抽取一次，且不超过批次容量。
    pub fn assign_rollover<T: RolloverThreshold + ?Sized>(
        &mut self,
        line_id: LineId,
        thresholds: &mut T,
    ) -> AllocationResult<BatchAssignment> {
        if !self.knows_line(line_id) {
            return Err(AllocationError::UnknownLine(line_id));
        }

        let needs_new = match self.open.get(&line_id) {
            None => true,
            Some(open) => {
                let limit = open
                    .rollover_threshold
                    .unwrap_or(self.capacity)
                    .min(self.capacity);
                open.fill_count >= limit
            }
        };

        if needs_new {
            let threshold = thresholds.draw().clamp(1, self.capacity);
            self.open_batch_with_threshold(line_id, Some(threshold))?;
        }

        self.append(line_id, needs_new)
    }

    // ==========================================
    // 轮转填充策略（历史回灌）
    // ==========================================

    /// 按产线轮转顺序把记录流切成固定容量批次
    ///
    /// # 参数
    /// - lines: 有序产线队列
    /// - records: 扁平记录流
    ///
    /// # 返回
    /// 惰性迭代器，逐条产出 (分配结果, 记录)
    pub fn round_robin<I>(
        &mut self,
        lines: &[LineId],
        records: I,
    ) -> AllocationResult<RoundRobinFill<'_, I::IntoIter>>
    where
        I: IntoIterator,
    {
        if lines.is_empty() {
            return Err(AllocationError::EmptyLineRotation);
        }
        if let Some(&unknown) = lines.iter().find(|l| !self.knows_line(**l)) {
            return Err(AllocationError::UnknownLine(unknown));
        }
        Ok(RoundRobinFill::new(self, lines.to_vec(), records.into_iter()))
    }
}
