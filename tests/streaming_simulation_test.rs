// ==========================================
// 实时仿真（写库）集成测试
// ==========================================
// 覆盖: 随机换批、单线模式、续号、逐条提交、停止信号
// ==========================================

mod test_helpers;

use test_helpers::*;
use tokio::sync::watch;
use wine_batch::app::{run_simulate, AppError};
use wine_batch::engine::{PipelineError, DEFAULT_ROLLOVER_MAX};
use wine_batch::sink::SinkError;
use wine_batch::BatchId;

#[tokio::test]
async fn test_simulate_rolls_over_within_threshold_range() {
    let csv = write_dataset_csv(200);
    let (_db, state) = create_test_state(&csv, |_| {});
    let (_tx, rx) = watch::channel(false);

    let report = run_simulate(&state, rx).await.unwrap();
    assert_eq!(report.delivered, 200);
    assert_eq!(report.failed, 0);
    assert!(!report.cancelled);

    let batches = state.batch_repo.list_batches_with_fill().unwrap();
    assert_eq!(batches.len(), report.batches_opened);
    assert!(batches
        .iter()
        .all(|b| (1..=DEFAULT_ROLLOVER_MAX).contains(&b.fill_count)));
    assert_eq!(batches.iter().map(|b| b.fill_count).sum::<u32>(), 200);

    // 每条产线的序号从 1 连续递增
    for line_id in state.topology.all_lines() {
        let ids = state.batch_repo.list_batch_ids(line_id).unwrap();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(id.line_id(), line_id);
            assert_eq!(id.sequence(), i as u32 + 1);
        }
    }

    assert_eq!(state.product_repo.count().unwrap(), 200);
    assert_eq!(state.product_repo.count_quality_tests().unwrap(), 0);
}

#[tokio::test]
async fn test_simulate_records_quality_when_enabled() {
    let csv = write_dataset_csv(20);
    let (_db, state) = create_test_state(&csv, |config| config.record_quality = true);
    let (_tx, rx) = watch::channel(false);

    run_simulate(&state, rx).await.unwrap();
    assert_eq!(state.product_repo.count_quality_tests().unwrap(), 20);
}

#[tokio::test]
async fn test_simulate_single_line_resumes_sequence() {
    let csv = write_dataset_csv(60);
    let (_db, state) = create_test_state(&csv, |config| config.sim_line = Some(3));
    seed_batches(&state.conn, &[(3, 3005)]);
    let (_tx, rx) = watch::channel(false);

    let report = run_simulate(&state, rx).await.unwrap();
    assert_eq!(report.delivered, 60);

    let ids = state.batch_repo.list_batch_ids(3).unwrap();
    assert_eq!(ids[0], BatchId::from_raw(3005));
    assert_eq!(ids[1], BatchId::from_raw(3006));
    // 60 条记录、阈值不超过 50 → 至少两个新批次
    assert!(ids.len() >= 3);
    assert_eq!(state.batch_repo.count().unwrap(), ids.len() as i64);
}

#[tokio::test]
async fn test_simulate_failure_keeps_committed_records() {
    let csv = write_dataset_csv(30);
    let (_db, state) = create_test_state(&csv, |_| {});
    fail_product_insert_at(&state.conn, 6);
    let (_tx, rx) = watch::channel(false);

    let err = run_simulate(&state, rx).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Pipeline(PipelineError::Delivery {
            source: SinkError::Storage(_),
            ..
        })
    ));

    assert_eq!(state.product_repo.count().unwrap(), 5);
    // 失败记录所在事务整体回滚，不会留下空批次
    let batches = state.batch_repo.list_batches_with_fill().unwrap();
    assert!(batches.iter().all(|b| b.fill_count > 0));
}

#[tokio::test]
async fn test_simulate_stops_before_start_when_signalled() {
    let csv = write_dataset_csv(10);
    let (_db, state) = create_test_state(&csv, |_| {});
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let report = run_simulate(&state, rx).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.delivered, 0);
    assert_eq!(state.batch_repo.count().unwrap(), 0);
}

#[tokio::test]
async fn test_simulate_unknown_line_is_rejected() {
    let csv = write_dataset_csv(10);
    let (_db, state) = create_test_state(&csv, |config| config.sim_line = Some(42));
    let (_tx, rx) = watch::channel(false);

    assert!(matches!(
        run_simulate(&state, rx).await,
        Err(AppError::Allocation(_))
    ));
    assert_eq!(state.product_repo.count().unwrap(), 0);
}
