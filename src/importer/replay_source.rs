// ==========================================
// 葡萄酒产线批次系统 - 回放数据源
// ==========================================
// 职责: 从有限数据集产出有序/乱序记录流
// 规则:
// - 构造时一次性读取并校验全部数据，失败则不产出任何记录
// - 每次 stream() 都从数据集开头重新开始
// - shuffle=true 时每一轮独立地对“原始数据集”重新洗牌
// - cycles=N 时总共产出 N × |dataset| 条记录
// ==========================================

use crate::domain::record::WineRecord;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::CsvParser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const IN_MEMORY_SOURCE: &str = "<memory>";

// ==========================================
// ReplaySource
// ==========================================
#[derive(Debug, Clone)]
pub struct ReplaySource {
    path: PathBuf,
    records: Arc<Vec<WineRecord>>,
}

impl ReplaySource {
    /// 从 CSV 文件构造
    ///
    /// 文件缺失/不可读、格式不支持、CSV 损坏、任一行字段缺失或非数值、
    /// 无数据行，一律返回 SourceUnavailable（reason 保留具体原因）
    pub fn open<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let path = path.as_ref();
        let unavailable = |err: ImportError| match err {
            ImportError::SourceUnavailable { .. } => err,
            other => ImportError::unavailable(path.display().to_string(), other.to_string()),
        };

        let rows = CsvParser
            .parse_to_raw_records(path)
            .map_err(unavailable)?;

        let mapper = FieldMapper;
        let records = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| mapper.map_to_record(row, idx + 1))
            .collect::<ImportResult<Vec<_>>>()
            .map_err(unavailable)?;

        if records.is_empty() {
            return Err(ImportError::unavailable(
                path.display().to_string(),
                "数据集为空",
            ));
        }

        info!("数据集已加载: {} ({} 条记录)", path.display(), records.len());
        Ok(Self {
            path: path.to_path_buf(),
            records: Arc::new(records),
        })
    }

    /// 从内存记录构造
    pub fn from_records(records: Vec<WineRecord>) -> ImportResult<Self> {
        if records.is_empty() {
            return Err(ImportError::unavailable(IN_MEMORY_SOURCE, "数据集为空"));
        }
        Ok(Self {
            path: PathBuf::from(IN_MEMORY_SOURCE),
            records: Arc::new(records),
        })
    }

    /// 重新读取源文件（内存数据源保持不变）
    pub fn reload(&mut self) -> ImportResult<()> {
        if self.path.as_os_str() == IN_MEMORY_SOURCE {
            return Ok(());
        }
        *self = Self::open(&self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[WineRecord] {
        &self.records
    }

    /// 产出记录流（熵源随机）
    pub fn stream(&self, shuffle: bool, cycles: u32) -> ReplayStream<StdRng> {
        self.stream_with_rng(shuffle, cycles, StdRng::from_entropy())
    }

    /// 产出记录流（指定随机源，可复现）
    pub fn stream_with_rng<R: Rng>(&self, shuffle: bool, cycles: u32, rng: R) -> ReplayStream<R> {
        ReplayStream {
            records: Arc::clone(&self.records),
            order: Vec::new(),
            position: 0,
            cycle: 0,
            cycles,
            shuffle,
            rng,
        }
    }
}

// ==========================================
// ReplayStream - 惰性记录流
// ==========================================
pub struct ReplayStream<R> {
    records: Arc<Vec<WineRecord>>,
    order: Vec<usize>,
    position: usize,
    cycle: u32,
    cycles: u32,
    shuffle: bool,
    rng: R,
}

impl<R: Rng> ReplayStream<R> {
    /// 当前所处轮次（从 1 开始；尚未开始为 0）
    pub fn current_cycle(&self) -> u32 {
        self.cycle
    }

    fn start_next_cycle(&mut self) {
        self.cycle += 1;
        // 每轮都从原始顺序出发重新洗牌，轮次之间互不依赖
        self.order = (0..self.records.len()).collect();
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
        self.position = 0;
    }
}

impl<R: Rng> Iterator for ReplayStream<R> {
    type Item = WineRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.order.len() {
            if self.cycle >= self.cycles {
                return None;
            }
            self.start_next_cycle();
        }

        let idx = self.order[self.position];
        self.position += 1;
        Some(self.records[idx].clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let in_cycle = self.order.len() - self.position;
        let later = (self.cycles.saturating_sub(self.cycle)) as usize * self.records.len();
        let remaining = in_cycle + later;
        (remaining, Some(remaining))
    }
}

impl<R: Rng> ExactSizeIterator for ReplayStream<R> {}
