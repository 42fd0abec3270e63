// ==========================================
// 葡萄酒产线批次系统 - 运行配置
// ==========================================
// 规则:
// - 未设置或空字符串 → 默认值
// - 设置了但无法解析 → ConfigError::InvalidValue
// - FACTORY_LOAD_CYCLES 小于 1 时按 1 处理
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::domain::types::{LineId, BATCH_CAPACITY};
use crate::engine::policy::{DEFAULT_ROLLOVER_MAX, DEFAULT_ROLLOVER_MIN};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 存储
    pub const DB_PATH: &str = "WINE_BATCH_DB_PATH";

    // 数据源
    pub const CSV_PATH: &str = "CSV_PATH";
    pub const SHUFFLE: &str = "SHUFFLE";
    pub const FACTORY_LOAD_CYCLES: &str = "FACTORY_LOAD_CYCLES";

    // 节奏
    pub const SIM_DELAY_SEC: &str = "SIM_DELAY_SEC";
    pub const PUBLISH_DELAY_SEC: &str = "PUBLISH_DELAY_SEC";

    // 发布
    pub const PUBLISH_CHANNEL: &str = "PUBLISH_CHANNEL";
    pub const MQTT_HOST: &str = "MQTT_HOST";
    pub const MQTT_PORT: &str = "MQTT_PORT";
    pub const MQTT_TOPIC: &str = "MQTT_TOPIC";
    pub const BACKEND_URL: &str = "BACKEND_URL";
    pub const PUBLISH_ACK_TIMEOUT_SEC: &str = "PUBLISH_ACK_TIMEOUT_SEC";

    // 分配
    pub const ROLLOVER_MIN: &str = "ROLLOVER_MIN";
    pub const ROLLOVER_MAX: &str = "ROLLOVER_MAX";
    pub const SIM_LINE: &str = "SIM_LINE";
    pub const SIM_SEED: &str = "SIM_SEED";
    pub const SIM_RECORD_QUALITY: &str = "SIM_RECORD_QUALITY";
}

pub const DEFAULT_CSV_PATH: &str = "winequalityN.csv";
pub const DEFAULT_MQTT_HOST: &str = "127.0.0.1";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_MQTT_TOPIC: &str = "wine/simulation";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5001/api/simulation/data";

/// 发布通道类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishChannelKind {
    Mqtt,
    Http,
}

impl FromStr for PublishChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mqtt" => Ok(PublishChannelKind::Mqtt),
            "http" => Ok(PublishChannelKind::Http),
            other => Err(format!("未知发布通道 '{}'（可选 mqtt / http）", other)),
        }
    }
}

// ==========================================
// SimulationConfig
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// 显式指定的数据库路径（None → 用户数据目录）
    pub db_path: Option<String>,
    pub csv_path: PathBuf,
    pub shuffle: bool,
    pub cycles: u32,
    pub sim_delay: Duration,
    pub publish_delay: Duration,
    pub publish_channel: PublishChannelKind,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_topic: String,
    pub backend_url: String,
    pub ack_timeout: Duration,
    pub rollover_min: u32,
    pub rollover_max: u32,
    /// 单产线模式
    pub sim_line: Option<LineId>,
    /// 随机种子（洗牌 / 阈值 / 产线选择可复现）
    pub seed: Option<u64>,
    /// 实时写库时是否同时写 quality_test
    pub record_quality: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            shuffle: true,
            cycles: 1,
            sim_delay: Duration::from_secs(1),
            publish_delay: Duration::from_millis(1500),
            publish_channel: PublishChannelKind::Mqtt,
            mqtt_host: DEFAULT_MQTT_HOST.to_string(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_topic: DEFAULT_MQTT_TOPIC.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            ack_timeout: Duration::from_secs(10),
            rollover_min: DEFAULT_ROLLOVER_MIN,
            rollover_max: DEFAULT_ROLLOVER_MAX,
            sim_line: None,
            seed: None,
            record_quality: false,
        }
    }
}

impl SimulationConfig {
    /// 从进程环境加载
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        use config_keys::*;

        let get = |key: &str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let cycles = match get(FACTORY_LOAD_CYCLES) {
            Some(raw) => parse_value::<i64>(FACTORY_LOAD_CYCLES, &raw)?.clamp(1, u32::MAX as i64) as u32,
            None => defaults.cycles,
        };

        let config = Self {
            db_path: get(DB_PATH),
            csv_path: get(CSV_PATH).map(PathBuf::from).unwrap_or(defaults.csv_path),
            shuffle: parse_or(get(SHUFFLE), SHUFFLE, defaults.shuffle, parse_flag)?,
            cycles,
            sim_delay: parse_or(get(SIM_DELAY_SEC), SIM_DELAY_SEC, defaults.sim_delay, parse_seconds)?,
            publish_delay: parse_or(
                get(PUBLISH_DELAY_SEC),
                PUBLISH_DELAY_SEC,
                defaults.publish_delay,
                parse_seconds,
            )?,
            publish_channel: parse_or(
                get(PUBLISH_CHANNEL),
                PUBLISH_CHANNEL,
                defaults.publish_channel,
                |key, raw| parse_value(key, raw),
            )?,
            mqtt_host: get(MQTT_HOST).unwrap_or(defaults.mqtt_host),
            mqtt_port: parse_or(get(MQTT_PORT), MQTT_PORT, defaults.mqtt_port, |key, raw| {
                parse_value(key, raw)
            })?,
            mqtt_topic: get(MQTT_TOPIC).unwrap_or(defaults.mqtt_topic),
            backend_url: get(BACKEND_URL).unwrap_or(defaults.backend_url),
            ack_timeout: parse_or(
                get(PUBLISH_ACK_TIMEOUT_SEC),
                PUBLISH_ACK_TIMEOUT_SEC,
                defaults.ack_timeout,
                parse_seconds,
            )?,
            rollover_min: parse_or(get(ROLLOVER_MIN), ROLLOVER_MIN, defaults.rollover_min, |key, raw| {
                parse_value(key, raw)
            })?,
            rollover_max: parse_or(get(ROLLOVER_MAX), ROLLOVER_MAX, defaults.rollover_max, |key, raw| {
                parse_value(key, raw)
            })?,
            sim_line: get(SIM_LINE)
                .map(|raw| parse_line(SIM_LINE, &raw))
                .transpose()?,
            seed: get(SIM_SEED)
                .map(|raw| parse_value::<u64>(SIM_SEED, &raw))
                .transpose()?,
            record_quality: parse_or(
                get(SIM_RECORD_QUALITY),
                SIM_RECORD_QUALITY,
                defaults.record_quality,
                parse_flag,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// 跨字段校验
    pub fn validate(&self) -> ConfigResult<()> {
        let (min, max) = (self.rollover_min, self.rollover_max);
        if min == 0 || min > max || max > BATCH_CAPACITY {
            return Err(ConfigError::InvalidRolloverRange {
                min,
                max,
                capacity: BATCH_CAPACITY,
            });
        }
        Ok(())
    }
}

// ==========================================
// 解析辅助函数
// ==========================================

fn parse_or<T, P>(raw: Option<String>, key: &str, default: T, parse: P) -> ConfigResult<T>
where
    P: Fn(&str, &str) -> ConfigResult<T>,
{
    match raw {
        Some(raw) => parse(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::invalid(key, raw, e.to_string()))
}

/// 开关: 0/false/no/off 关闭，1/true/yes/on 开启（忽略大小写）
fn parse_flag(key: &str, raw: &str) -> ConfigResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => Err(ConfigError::invalid(key, raw, "应为 0/1/true/false")),
    }
}

/// 秒数（可带小数，须为非负有限值）
fn parse_seconds(key: &str, raw: &str) -> ConfigResult<Duration> {
    let secs: f64 = parse_value(key, raw)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::invalid(key, raw, "秒数须为非负有限值"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::invalid(key, raw, e.to_string()))
}

fn parse_line(key: &str, raw: &str) -> ConfigResult<LineId> {
    let line_id: LineId = parse_value(key, raw)?;
    if line_id <= 0 {
        return Err(ConfigError::invalid(key, raw, "产线编号须为正整数"));
    }
    Ok(line_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> ConfigResult<SimulationConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SimulationConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert!(config.shuffle);
        assert_eq!(config.cycles, 1);
        assert_eq!(config.publish_delay, Duration::from_millis(1500));
        assert_eq!(config.publish_channel, PublishChannelKind::Mqtt);
        assert_eq!((config.rollover_min, config.rollover_max), (20, 50));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (config_keys::DB_PATH, " /tmp/wine.db "),
            (config_keys::SHUFFLE, "False"),
            (config_keys::FACTORY_LOAD_CYCLES, "3"),
            (config_keys::SIM_DELAY_SEC, "0.25"),
            (config_keys::PUBLISH_CHANNEL, "HTTP"),
            (config_keys::MQTT_PORT, "8883"),
            (config_keys::SIM_LINE, "4"),
            (config_keys::SIM_SEED, "42"),
        ])
        .unwrap();

        assert_eq!(config.db_path.as_deref(), Some("/tmp/wine.db"));
        assert!(!config.shuffle);
        assert_eq!(config.cycles, 3);
        assert_eq!(config.sim_delay, Duration::from_millis(250));
        assert_eq!(config.publish_channel, PublishChannelKind::Http);
        assert_eq!(config.mqtt_port, 8883);
        assert_eq!(config.sim_line, Some(4));
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn test_cycles_clamped_to_one() {
        let config = load(&[(config_keys::FACTORY_LOAD_CYCLES, "0")]).unwrap();
        assert_eq!(config.cycles, 1);
        let config = load(&[(config_keys::FACTORY_LOAD_CYCLES, "-5")]).unwrap();
        assert_eq!(config.cycles, 1);
    }

    #[test]
    fn test_empty_value_falls_back_to_default() {
        let config = load(&[(config_keys::CSV_PATH, "  "), (config_keys::SIM_LINE, "")]).unwrap();
        assert_eq!(config.csv_path, PathBuf::from(DEFAULT_CSV_PATH));
        assert_eq!(config.sim_line, None);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = load(&[(config_keys::SIM_DELAY_SEC, "soon")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == config_keys::SIM_DELAY_SEC
        ));

        assert!(load(&[(config_keys::SIM_DELAY_SEC, "-1")]).is_err());
        for key in [
            config_keys::SIM_DELAY_SEC,
            config_keys::PUBLISH_DELAY_SEC,
            config_keys::PUBLISH_ACK_TIMEOUT_SEC,
        ] {
            assert!(matches!(
                load(&[(key, "1e30")]),
                Err(ConfigError::InvalidValue { ref value, .. }) if value == "1e30"
            ));
        }
        assert!(load(&[(config_keys::SHUFFLE, "maybe")]).is_err());
        assert!(load(&[(config_keys::PUBLISH_CHANNEL, "kafka")]).is_err());
        assert!(load(&[(config_keys::MQTT_PORT, "70000")]).is_err());
        assert!(load(&[(config_keys::SIM_LINE, "0")]).is_err());
        assert!(load(&[(config_keys::FACTORY_LOAD_CYCLES, "two")]).is_err());
    }

    #[test]
    fn test_rollover_range_validated() {
        let err = load(&[
            (config_keys::ROLLOVER_MIN, "60"),
            (config_keys::ROLLOVER_MAX, "50"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidRolloverRange {
                min: 60,
                max: 50,
                capacity: BATCH_CAPACITY
            }
        );
        assert!(load(&[(config_keys::ROLLOVER_MAX, "121")]).is_err());
        assert!(load(&[(config_keys::ROLLOVER_MIN, "0")]).is_err());
    }
}
