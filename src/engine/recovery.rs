// ==========================================
// 葡萄酒产线批次系统 - 批次序号恢复
// ==========================================
// 职责: 启动时从已持久化的批次号恢复每条产线的序号
// 规则: resumed_sequence = max_batch_id mod 1000；无历史批次 → 0
// 红线: 查询失败必须致命，禁止静默从 0 开始（会与历史批次号冲突）
// ==========================================

use crate::domain::types::{LineId, SEQUENCE_MODULUS};
use crate::engine::error::AllocationResult;
use crate::repository::batch_ledger::BatchLedger;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

pub struct SequenceRecovery;

impl SequenceRecovery {
    /// 恢复产线序号
    ///
    /// # 参数
    /// - ledger: 批次台账
    /// - lines: 需要恢复的产线集合
    ///
    /// # 返回
    /// - Ok(map): 每条产线（含无历史批次的产线）的已用序号
    /// - Err(RecoveryFailed): 台账查询失败
    #[instrument(skip(ledger))]
    pub fn bootstrap<L: BatchLedger + ?Sized>(
        ledger: &L,
        lines: &[LineId],
    ) -> AllocationResult<HashMap<LineId, u32>> {
        let max_ids = ledger.max_batch_ids(lines)?;

        let mut sequences = HashMap::with_capacity(lines.len());
        for &line_id in lines {
            let sequence = match max_ids.get(&line_id) {
                Some(max_id) => {
                    if max_id.line_id() != line_id {
                        // 历史数据可能不是复合批次号，仍按 mod 1000 取序号
                        warn!(
                            "产线 {} 的最大批次号 {} 不符合复合编码，按 mod {} 恢复",
                            line_id,
                            max_id.value(),
                            SEQUENCE_MODULUS
                        );
                    }
                    max_id.sequence()
                }
                None => 0,
            };
            sequences.insert(line_id, sequence);
        }

        info!("批次序号恢复完成: {:?}", sequences);
        Ok(sequences)
    }
}
