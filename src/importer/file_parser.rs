// ==========================================
// 葡萄酒产线批次系统 - CSV 文件解析器
// ==========================================
// 职责: 读取 CSV 为“表头 → 值”的原始行
// 说明: 不做类型转换（见 field_mapper.rs）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// 原始行: 表头 → 去除首尾空白的单元格文本
pub type RawRow = HashMap<String, String>;

pub struct CsvParser;

impl CsvParser {
    /// 解析 CSV 文件
    ///
    /// # 返回
    /// - Ok(Vec<RawRow>): 全部非空行
    /// - Err(SourceUnavailable): 文件不存在/不可读
    /// - Err(UnsupportedFormat): 扩展名不是 csv
    /// - Err(CsvParseError): CSV 结构损坏
    pub fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        let path_display = file_path.display().to_string();

        // 检查文件存在
        if !file_path.exists() {
            return Err(ImportError::unavailable(path_display, "文件不存在"));
        }

        // 检查扩展名
        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(file_path)
            .map_err(|e| ImportError::unavailable(path_display.clone(), e.to_string()))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致，缺列在字段映射阶段报错
            .from_reader(file);

        // 读取表头
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row_map = HashMap::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            records.push(row_map);
        }

        Ok(records)
    }
}
