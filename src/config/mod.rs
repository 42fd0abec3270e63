// ==========================================
// 葡萄酒产线批次系统 - 配置层
// ==========================================
// 职责: 从环境变量加载运行参数并校验
// 来源: 进程环境（测试可注入任意查找函数）
// ==========================================

pub mod error;
pub mod sim_config;

// 重导出核心配置
pub use error::{ConfigError, ConfigResult};
pub use sim_config::{config_keys, PublishChannelKind, SimulationConfig};
