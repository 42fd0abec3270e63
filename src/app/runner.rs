// ==========================================
// 葡萄酒产线批次系统 - 运行入口
// ==========================================
// backfill: 历史回灌 → TransactionalSink（整体事务）
// simulate: 实时仿真 → StreamingDbSink（逐条提交，失败即停）
// publish : 实时发布 → PublishSink（MQTT/HTTP，失败记日志后继续）
// ==========================================

use crate::app::error::{AppError, AppResult};
use crate::app::state::AppState;
use crate::config::{PublishChannelKind, SimulationConfig};
use crate::domain::topology::Topology;
use crate::domain::types::LineId;
use crate::engine::allocator::BatchAllocator;
use crate::engine::error::AllocationError;
use crate::engine::pipeline::{
    BackfillPipeline, BackfillPlan, BackfillReport, FailurePolicy, ShutdownSignal,
    SimulationReport, StreamSimulator,
};
use crate::engine::policy::{FixedLineSelector, LineSelector, RandomRollover, UniformLineSelector};
use crate::importer::replay_source::ReplaySource;
use crate::repository::batch_ledger::InMemoryLedger;
use crate::sink::{HttpChannel, MqttChannel, PublishSink, RecordSink, StreamingDbSink, TransactionalSink};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Backfill,
    Simulate,
    Publish,
}

impl FromStr for RunMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backfill" => Ok(RunMode::Backfill),
            "simulate" => Ok(RunMode::Simulate),
            "publish" => Ok(RunMode::Publish),
            other => Err(AppError::UnknownMode(other.to_string())),
        }
    }
}

// ==========================================
// 随机源
// ==========================================

// 各组件使用互不相同的派生种子
const SHUFFLE_STREAM: u64 = 0;
const ROLLOVER_STREAM: u64 = 1;
const SELECTOR_STREAM: u64 = 2;

fn rng_for(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_entropy(),
    }
}

// ==========================================
// backfill
// ==========================================

/// 历史回灌: 全部仓库 × FACTORY_LOAD_CYCLES 轮，单事务写入
#[instrument(skip_all)]
pub async fn run_backfill(state: &AppState, shutdown: ShutdownSignal) -> AppResult<BackfillReport> {
    let config = &state.config;
    let source = ReplaySource::open(&config.csv_path)?;

    let mut allocator = BatchAllocator::bootstrap(
        state.batch_repo.as_ref(),
        &state.topology.all_lines(),
        state.topology.capacity(),
    )?;

    let plan = BackfillPlan {
        cycles: config.cycles,
        shuffle: config.shuffle,
    };
    let mut rng = rng_for(config.seed, SHUFFLE_STREAM);
    let mut sink = TransactionalSink::begin(state.conn.clone())?;

    let report = BackfillPipeline::new(&mut allocator)
        .with_shutdown(shutdown)
        .run(&state.topology, &source, &plan, &mut sink, &mut rng)
        .await?;
    Ok(report)
}

// ==========================================
// simulate / publish
// ==========================================

/// 实时仿真: 写入数据库，每条记录独立提交
#[instrument(skip_all)]
pub async fn run_simulate(state: &AppState, shutdown: ShutdownSignal) -> AppResult<SimulationReport> {
    let config = &state.config;
    let source = ReplaySource::open(&config.csv_path)?;
    let lines = candidate_lines(&state.topology, config.sim_line)?;

    let mut allocator = BatchAllocator::bootstrap(
        state.batch_repo.as_ref(),
        &state.topology.all_lines(),
        state.topology.capacity(),
    )?;
    let mut sink = StreamingDbSink::new(state.conn.clone()).with_quality(config.record_quality);

    simulate(
        &mut allocator,
        config,
        lines,
        &source,
        &mut sink,
        config.sim_delay,
        FailurePolicy::Abort,
        shutdown,
    )
    .await
}

/// 实时发布: 经 MQTT / HTTP 发送，批次台账只在进程内维护
#[instrument(skip_all)]
pub async fn run_publish(
    config: &SimulationConfig,
    shutdown: ShutdownSignal,
) -> AppResult<SimulationReport> {
    let topology = Topology::wine_default();
    let source = ReplaySource::open(&config.csv_path)?;
    let lines = candidate_lines(&topology, config.sim_line)?;

    // 发布模式不落库，序号从空台账起步
    let mut allocator =
        BatchAllocator::bootstrap(&InMemoryLedger::new(), &topology.all_lines(), topology.capacity())?;
    warn!("发布模式: 批次号仅在本进程内唯一，不与数据库对账");

    match config.publish_channel {
        PublishChannelKind::Mqtt => {
            let channel = MqttChannel::connect(
                &config.mqtt_host,
                config.mqtt_port,
                config.mqtt_topic.clone(),
                config.ack_timeout,
            );
            let mut sink = PublishSink::new(channel).with_topology(topology.clone());
            simulate(
                &mut allocator,
                config,
                lines,
                &source,
                &mut sink,
                config.publish_delay,
                FailurePolicy::LogAndContinue,
                shutdown,
            )
            .await
        }
        PublishChannelKind::Http => {
            let channel = HttpChannel::new(config.backend_url.clone(), config.ack_timeout)?;
            let mut sink = PublishSink::new(channel).with_topology(topology.clone());
            simulate(
                &mut allocator,
                config,
                lines,
                &source,
                &mut sink,
                config.publish_delay,
                FailurePolicy::LogAndContinue,
                shutdown,
            )
            .await
        }
    }
}

/// 候选产线: 单线模式只含 SIM_LINE，否则为全部产线
fn candidate_lines(topology: &Topology, sim_line: Option<LineId>) -> AppResult<Vec<LineId>> {
    let all = topology.all_lines();
    match sim_line {
        Some(line_id) if !all.contains(&line_id) => {
            Err(AllocationError::UnknownLine(line_id).into())
        }
        Some(line_id) => {
            info!("单产线模式: line={}", line_id);
            Ok(vec![line_id])
        }
        None => Ok(all),
    }
}

#[allow(clippy::too_many_arguments)]
async fn simulate<S>(
    allocator: &mut BatchAllocator,
    config: &SimulationConfig,
    lines: Vec<LineId>,
    source: &ReplaySource,
    sink: &mut S,
    delay: Duration,
    failure_policy: FailurePolicy,
    shutdown: ShutdownSignal,
) -> AppResult<SimulationReport>
where
    S: RecordSink + ?Sized,
{
    let thresholds = RandomRollover::with_range(
        rng_for(config.seed, ROLLOVER_STREAM),
        config.rollover_min,
        config.rollover_max,
        allocator.capacity(),
    )?;
    let selector: Box<dyn LineSelector + Send> = match lines.as_slice() {
        [only] => Box::new(FixedLineSelector(*only)),
        _ => Box::new(UniformLineSelector::new(rng_for(config.seed, SELECTOR_STREAM))),
    };
    let records = source.stream_with_rng(
        config.shuffle,
        config.cycles,
        rng_for(config.seed, SHUFFLE_STREAM),
    );

    let report = StreamSimulator::new(allocator, lines, thresholds, selector)
        .with_delay(delay)
        .with_failure_policy(failure_policy)
        .with_shutdown(shutdown)
        .run(records, sink)
        .await?;
    Ok(report)
}
