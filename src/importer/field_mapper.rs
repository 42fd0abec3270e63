// ==========================================
// 葡萄酒产线批次系统 - 字段映射器
// ==========================================
// 职责: 原始行 → WineRecord（类型转换 + 必填校验）
// 列名规则: 忽略大小写，空格与下划线等价
//   例: "fixed acidity" / "Fixed_Acidity" → fixed_acidity
// 红线: 必填字段缺失/非数值 → MalformedRecord，不做填补
// ==========================================

use crate::domain::record::{WineRecord, QUALITY_FIELD};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRow;
use std::collections::HashMap;

pub struct FieldMapper;

impl FieldMapper {
    /// 映射一行
    ///
    /// # 参数
    /// - row: 原始行
    /// - row_number: 数据行号（从 1 开始，不含表头）
    pub fn map_to_record(&self, row: &RawRow, row_number: usize) -> ImportResult<WineRecord> {
        let normalized: HashMap<String, &str> = row
            .iter()
            .map(|(k, v)| (normalize_column(k), v.as_str()))
            .collect();

        let required = |field: &str| self.parse_required(&normalized, field, row_number);

        Ok(WineRecord {
            density: required("density")?,
            chlorides: required("chlorides")?,
            alcohol: required("alcohol")?,
            sulphates: required("sulphates")?,
            ph: required("pH")?,
            fixed_acidity: required("fixed_acidity")?,
            citric_acid: required("citric_acid")?,
            volatile_acidity: required("volatile_acidity")?,
            free_sulfur_dioxide: required("free_sulfur_dioxide")?,
            total_sulfur_dioxide: required("total_sulfur_dioxide")?,
            residual_sugar: required("residual_sugar")?,
            quality: self.parse_optional(&normalized, QUALITY_FIELD, row_number)?,
        })
    }

    fn parse_required(
        &self,
        row: &HashMap<String, &str>,
        field: &str,
        row_number: usize,
    ) -> ImportResult<f64> {
        self.parse_optional(row, field, row_number)?
            .ok_or_else(|| ImportError::MalformedRecord {
                row: row_number,
                field: field.to_string(),
                message: "必填字段缺失".to_string(),
            })
    }

    /// 可选数值字段：缺列或空值 → None；非数值/非有限值 → MalformedRecord
    fn parse_optional(
        &self,
        row: &HashMap<String, &str>,
        field: &str,
        row_number: usize,
    ) -> ImportResult<Option<f64>> {
        let raw = match row.get(&normalize_column(field)) {
            Some(v) if !v.trim().is_empty() => v.trim(),
            _ => return Ok(None),
        };

        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            Ok(_) => Err(ImportError::MalformedRecord {
                row: row_number,
                field: field.to_string(),
                message: format!("非有限数值: {}", raw),
            }),
            Err(e) => Err(ImportError::MalformedRecord {
                row: row_number,
                field: field.to_string(),
                message: format!("数值解析失败 '{}': {}", raw, e),
            }),
        }
    }
}

fn normalize_column(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .collect()
}
