// ==========================================
// 葡萄酒产线批次系统 - 轮转填充（历史回灌）
// ==========================================
// 规则:
// 1) 按产线队列顺序轮转
// 2) 每到一条产线先开新批次，再从全局记录流头部连续取至多 capacity 条
// 3) 记录流耗尽即停止；最后一个批次可以不满
// 4) 离开产线时关闭其批次（同一产线同时最多一个打开批次）
// ==========================================

use crate::domain::batch::BatchAssignment;
use crate::domain::types::LineId;
use crate::engine::allocator::BatchAllocator;
use crate::engine::error::AllocationResult;

/// 轮转填充迭代器
///
/// 由 [`BatchAllocator::round_robin`] 创建；惰性消费记录流，
/// 只有在确有记录时才开新批次。出错后不再产出。
pub struct RoundRobinFill<'a, I> {
    allocator: &'a mut BatchAllocator,
    lines: Vec<LineId>,
    next_line: usize,
    current: Option<LineId>,
    remaining: u32,
    records: I,
    batches_opened: usize,
    failed: bool,
}

impl<'a, I: Iterator> RoundRobinFill<'a, I> {
    pub(crate) fn new(allocator: &'a mut BatchAllocator, lines: Vec<LineId>, records: I) -> Self {
        Self {
            allocator,
            lines,
            next_line: 0,
            current: None,
            remaining: 0,
            records,
            batches_opened: 0,
            failed: false,
        }
    }

    /// 截至目前开出的批次数
    pub fn batches_opened(&self) -> usize {
        self.batches_opened
    }

    fn rotate(&mut self) -> AllocationResult<LineId> {
        if let Some(previous) = self.current.take() {
            self.allocator.close_batch(previous);
        }

        let line_id = self.lines[self.next_line % self.lines.len()];
        self.next_line += 1;

        self.allocator.open_new_batch(line_id)?;
        self.batches_opened += 1;
        self.current = Some(line_id);
        self.remaining = self.allocator.capacity();
        Ok(line_id)
    }
}

impl<'a, I: Iterator> Iterator for RoundRobinFill<'a, I> {
    type Item = AllocationResult<(BatchAssignment, I::Item)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let record = match self.records.next() {
            Some(record) => record,
            None => {
                if let Some(last) = self.current.take() {
                    self.allocator.close_batch(last);
                }
                return None;
            }
        };

        let (line_id, opened) = match self.current {
            Some(line_id) if self.remaining > 0 => (line_id, false),
            _ => match self.rotate() {
                Ok(line_id) => (line_id, true),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            },
        };

        self.remaining -= 1;
        Some(
            self.allocator
                .append(line_id, opened)
                .map(|assignment| (assignment, record)),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::allocator::BatchAllocator;
    use crate::engine::error::AllocationError;
    use std::collections::BTreeMap;

    fn fill(
        recovered: &[(i64, u32)],
        lines: &[i64],
        capacity: u32,
        count: usize,
    ) -> (BatchAllocator, BTreeMap<i64, u32>) {
        let mut alloc = BatchAllocator::new(capacity, recovered.iter().copied().collect());
        let mut fills = BTreeMap::new();
        for item in alloc.round_robin(lines, 0..count).unwrap() {
            let (assignment, _) = item.unwrap();
            fills.insert(assignment.batch_id.value(), assignment.fill_count);
        }
        (alloc, fills)
    }

    #[test]
    fn test_even_split_one_batch_per_line() {
        let (_, fills) = fill(&[(1, 0), (2, 0), (3, 0)], &[1, 2, 3], 120, 360);
        let expected: BTreeMap<i64, u32> = [(1001, 120), (2001, 120), (3001, 120)].into();
        assert_eq!(fills, expected);
    }

    #[test]
    fn test_remainder_goes_to_last_line_visited() {
        let (alloc, fills) = fill(&[(1, 0), (2, 0)], &[1, 2], 10, 35);
        let expected: BTreeMap<i64, u32> =
            [(1001, 10), (1002, 10), (2001, 10), (2002, 5)].into();
        assert_eq!(fills, expected);
        assert_eq!(alloc.current_sequence(1), Some(2));
        assert_eq!(alloc.current_sequence(2), Some(2));
        // 记录流耗尽后不留打开批次
        assert!(alloc.open_batch(2).is_none());
    }

    #[test]
    fn test_batches_per_line_is_ceil_of_assigned() {
        let capacity = 7u32;
        let (_, fills) = fill(&[(1, 0), (2, 0), (3, 0)], &[1, 2, 3], capacity, 100);

        let mut per_line: BTreeMap<i64, Vec<u32>> = BTreeMap::new();
        for (id, count) in &fills {
            per_line.entry(id / 1000).or_default().push(*count);
        }
        for counts in per_line.values() {
            let assigned: u32 = counts.iter().sum();
            let expected_batches = (assigned + capacity - 1) / capacity;
            assert_eq!(counts.len() as u32, expected_batches);
            // 除最后一个批次外均为满批
            for c in &counts[..counts.len() - 1] {
                assert_eq!(*c, capacity);
            }
        }
        assert_eq!(fills.values().sum::<u32>(), 100);
    }

    #[test]
    fn test_resumes_after_recovered_sequence() {
        let (_, fills) = fill(&[(4, 7)], &[4], 120, 50);
        let expected: BTreeMap<i64, u32> = [(4008, 50)].into();
        assert_eq!(fills, expected);
    }

    #[test]
    fn test_empty_stream_opens_nothing() {
        let (alloc, fills) = fill(&[(1, 3)], &[1], 120, 0);
        assert!(fills.is_empty());
        assert_eq!(alloc.current_sequence(1), Some(3));
    }

    #[test]
    fn test_empty_rotation_rejected() {
        let mut alloc = BatchAllocator::new(120, [(1, 0)].into_iter().collect());
        assert!(matches!(
            alloc.round_robin(&[], 0..10),
            Err(AllocationError::EmptyLineRotation)
        ));
    }

    #[test]
    fn test_stops_after_sequence_exhausted() {
        let mut alloc = BatchAllocator::new(2, [(1, 998)].into_iter().collect());
        let results: Vec<_> = alloc.round_robin(&[1], 0..10).unwrap().collect();
        // 999 号批次装满 2 条，第 3 条触发耗尽错误，之后不再产出
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok() && results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(AllocationError::SequenceExhausted { line_id: 1, .. })
        ));
    }
}
