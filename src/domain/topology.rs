// ==========================================
// 葡萄酒产线批次系统 - 工厂拓扑
// ==========================================
// 职责: 描述仓库、产线与批次容量（纯配置数据，无行为）
// 生产布局: 2 个仓库 × 3 条产线，每批次 120 件
// ==========================================

use crate::domain::types::{LineId, WarehouseId, BATCH_CAPACITY};
use serde::{Deserialize, Serialize};

/// 仓库
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub warehouse_id: WarehouseId,
    pub category: String,
    /// 有序产线列表（轮转顺序即此顺序）
    pub lines: Vec<LineId>,
}

/// 产线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub line_id: LineId,
    pub warehouse_id: WarehouseId,
}

/// 工厂拓扑
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    warehouses: Vec<Warehouse>,
    capacity: u32,
}

impl Topology {
    pub fn new(warehouses: Vec<Warehouse>) -> Self {
        Self {
            warehouses,
            capacity: BATCH_CAPACITY,
        }
    }

    /// 生产环境默认布局
    pub fn wine_default() -> Self {
        Self::new(vec![
            Warehouse {
                warehouse_id: 1,
                category: "Primary Production".to_string(),
                lines: vec![1, 2, 3],
            },
            Warehouse {
                warehouse_id: 2,
                category: "Secondary Production".to_string(),
                lines: vec![4, 5, 6],
            },
        ])
    }

    /// 单产线布局（单线仿真模式）
    pub fn single_line(warehouse_id: WarehouseId, line_id: LineId) -> Self {
        Self::new(vec![Warehouse {
            warehouse_id,
            category: format!("Line {} only", line_id),
            lines: vec![line_id],
        }])
    }

    /// 指定仓库的有序产线列表；未知仓库返回空切片
    pub fn lines_of(&self, warehouse_id: WarehouseId) -> &[LineId] {
        self.warehouses
            .iter()
            .find(|w| w.warehouse_id == warehouse_id)
            .map(|w| w.lines.as_slice())
            .unwrap_or(&[])
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn warehouses(&self) -> &[Warehouse] {
        &self.warehouses
    }

    /// 全部产线（按仓库顺序展开）
    pub fn all_lines(&self) -> Vec<LineId> {
        self.warehouses
            .iter()
            .flat_map(|w| w.lines.iter().copied())
            .collect()
    }

    /// 全部产线及其归属仓库
    pub fn lines(&self) -> Vec<Line> {
        self.warehouses
            .iter()
            .flat_map(|w| {
                w.lines.iter().map(move |&line_id| Line {
                    line_id,
                    warehouse_id: w.warehouse_id,
                })
            })
            .collect()
    }

    pub fn warehouse_of(&self, line_id: LineId) -> Option<WarehouseId> {
        self.warehouses
            .iter()
            .find(|w| w.lines.contains(&line_id))
            .map(|w| w.warehouse_id)
    }
}
