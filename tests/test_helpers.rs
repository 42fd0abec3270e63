// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、数据集 CSV、测试记录生成
// ==========================================

#![allow(dead_code)]

use rusqlite::{params, Connection};
use std::error::Error;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use wine_batch::app::AppState;
use wine_batch::config::SimulationConfig;
use wine_batch::db::{ensure_schema, open_sqlite_connection};
use wine_batch::domain::topology::Topology;
use wine_batch::repository::BatchRepository;
use wine_batch::WineRecord;

/// 数据集表头（与公开数据集的拼写一致）
pub const DATASET_HEADER: &str = "type,fixed acidity,volatile acidity,citric acid,residual sugar,chlorides,free sulfur dioxide,total sulfur dioxide,density,pH,sulphates,alcohol,quality";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接并写入默认拓扑
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    let conn = open_sqlite_connection(db_path).unwrap();
    let conn = Arc::new(Mutex::new(conn));
    BatchRepository::from_connection(conn.clone())
        .ensure_topology(&Topology::wine_default())
        .unwrap();
    conn
}

/// 基于临时数据库与给定 CSV 创建应用状态
pub fn create_test_state(
    csv: &NamedTempFile,
    tweak: impl FnOnce(&mut SimulationConfig),
) -> (NamedTempFile, AppState) {
    let (db_file, db_path) = create_test_db().unwrap();
    let mut config = SimulationConfig {
        db_path: Some(db_path),
        csv_path: csv.path().to_path_buf(),
        sim_delay: std::time::Duration::ZERO,
        publish_delay: std::time::Duration::ZERO,
        seed: Some(2024),
        ..SimulationConfig::default()
    };
    tweak(&mut config);
    let state = AppState::new(config).unwrap();
    (db_file, state)
}

/// 生成第 i 条测试记录（density 唯一，可用于比对顺序）
pub fn wine_record(i: usize) -> WineRecord {
    WineRecord {
        density: 0.99 + i as f64 * 1e-6,
        chlorides: 0.045,
        alcohol: 8.8 + (i % 40) as f64 * 0.1,
        sulphates: 0.45,
        ph: 3.0 + (i % 50) as f64 * 0.01,
        fixed_acidity: 7.0,
        citric_acid: 0.36,
        volatile_acidity: 0.27,
        free_sulfur_dioxide: 45.0,
        total_sulfur_dioxide: 170.0,
        residual_sugar: 20.7,
        quality: Some((3 + i % 7) as f64),
    }
}

/// 写出 n 行数据集 CSV
pub fn write_dataset_csv(n: usize) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "{}", DATASET_HEADER).unwrap();
    for i in 0..n {
        let r = wine_record(i);
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            if i % 2 == 0 { "white" } else { "red" },
            r.fixed_acidity,
            r.volatile_acidity,
            r.citric_acid,
            r.residual_sugar,
            r.chlorides,
            r.free_sulfur_dioxide,
            r.total_sulfur_dioxide,
            r.density,
            r.ph,
            r.sulphates,
            r.alcohol,
            r.quality.unwrap(),
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

/// 预置历史批次
pub fn seed_batches(conn: &Arc<Mutex<Connection>>, batches: &[(i64, i64)]) {
    let conn = conn.lock().unwrap();
    for (line_id, batch_id) in batches {
        conn.execute(
            "INSERT INTO batches (batch_id, line_id) VALUES (?1, ?2)",
            params![batch_id, line_id],
        )
        .unwrap();
    }
}

/// 在第 n 次插入 product 时让 SQLite 报错
pub fn fail_product_insert_at(conn: &Arc<Mutex<Connection>>, n: usize) {
    let sql = format!(
        "CREATE TRIGGER fail_product_insert BEFORE INSERT ON product \
         WHEN (SELECT COUNT(*) FROM product) >= {} \
         BEGIN SELECT RAISE(ABORT, 'injected product failure'); END;",
        n - 1
    );
    conn.lock().unwrap().execute_batch(&sql).unwrap();
}

pub fn count_rows(conn: &Arc<Mutex<Connection>>, table: &str) -> i64 {
    conn.lock()
        .unwrap()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
}
