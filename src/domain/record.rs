// ==========================================
// 葡萄酒产线批次系统 - 测量记录
// ==========================================
// 11 项理化指标 + 可选质量评分
// 记录创建后不可变，归属于唯一批次
// ==========================================

use serde::{Deserialize, Serialize};

/// 葡萄酒理化测量记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WineRecord {
    pub density: f64,
    pub chlorides: f64,
    pub alcohol: f64,
    pub sulphates: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
    pub fixed_acidity: f64,
    pub citric_acid: f64,
    pub volatile_acidity: f64,
    pub free_sulfur_dioxide: f64,
    pub total_sulfur_dioxide: f64,
    pub residual_sugar: f64,
    /// 质量评分（标签），实时场景可能缺失
    pub quality: Option<f64>,
}

/// 可选标签字段
pub const QUALITY_FIELD: &str = "quality";
