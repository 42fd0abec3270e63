// ==========================================
// 葡萄酒产线批次系统 - 分配策略组件
// ==========================================
// 职责:
// - 换批阈值抽取（实时仿真，每批次独立抽取）
// - 目标产线选择（均匀随机 / 单线固定）
// ==========================================

use crate::domain::types::LineId;
use crate::engine::error::{AllocationError, AllocationResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// 默认换批阈值下限
pub const DEFAULT_ROLLOVER_MIN: u32 = 20;

/// 默认换批阈值上限
pub const DEFAULT_ROLLOVER_MAX: u32 = 50;

// ==========================================
// 换批阈值
// ==========================================

/// 换批阈值来源
///
/// 每开一个新批次调用一次 `draw`，批次填充数达到该值后关闭
pub trait RolloverThreshold {
    fn draw(&mut self) -> u32;
}

/// 区间内均匀随机抽取的换批阈值
#[derive(Debug)]
pub struct RandomRollover<R: Rng = StdRng> {
    rng: R,
    min: u32,
    max: u32,
}

impl RandomRollover<StdRng> {
    /// 默认区间 [20, 50]，熵源随机
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            min: DEFAULT_ROLLOVER_MIN,
            max: DEFAULT_ROLLOVER_MAX,
        }
    }

    /// 固定种子（可复现）
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            min: DEFAULT_ROLLOVER_MIN,
            max: DEFAULT_ROLLOVER_MAX,
        }
    }
}

impl<R: Rng> RandomRollover<R> {
    /// 自定义区间
    ///
    /// # 约束
    /// - 1 <= min <= max <= capacity
    pub fn with_range(rng: R, min: u32, max: u32, capacity: u32) -> AllocationResult<Self> {
        if min == 0 || min > max || max > capacity {
            return Err(AllocationError::InvalidRollover { min, max, capacity });
        }
        Ok(Self { rng, min, max })
    }

    pub fn range(&self) -> (u32, u32) {
        (self.min, self.max)
    }
}

impl<R: Rng> RolloverThreshold for RandomRollover<R> {
    fn draw(&mut self) -> u32 {
        self.rng.gen_range(self.min..=self.max)
    }
}

/// 固定换批阈值（单元测试 / 确定性回放）
#[derive(Debug, Clone, Copy)]
pub struct FixedRollover(pub u32);

impl RolloverThreshold for FixedRollover {
    fn draw(&mut self) -> u32 {
        self.0
    }
}

// ==========================================
// 产线选择
// ==========================================

/// 目标产线选择器
pub trait LineSelector {
    /// 从候选产线中选出本条记录的目标产线
    ///
    /// 候选列表为空时返回 None
    fn select(&mut self, lines: &[LineId]) -> Option<LineId>;
}

impl<S: LineSelector + ?Sized> LineSelector for Box<S> {
    fn select(&mut self, lines: &[LineId]) -> Option<LineId> {
        (**self).select(lines)
    }
}

/// 均匀随机选择
#[derive(Debug)]
pub struct UniformLineSelector<R: Rng = StdRng> {
    rng: R,
}

impl UniformLineSelector<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> UniformLineSelector<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> LineSelector for UniformLineSelector<R> {
    fn select(&mut self, lines: &[LineId]) -> Option<LineId> {
        lines.choose(&mut self.rng).copied()
    }
}

/// 单线模式：始终选择同一产线
#[derive(Debug, Clone, Copy)]
pub struct FixedLineSelector(pub LineId);

impl LineSelector for FixedLineSelector {
    fn select(&mut self, _lines: &[LineId]) -> Option<LineId> {
        Some(self.0)
    }
}
