// weft-core: weft 织入引擎的基础设施
//
// 提供：
// - 分层配置（TOML / 环境变量 / 内存）
// - 基于 tracing 的日志初始化
// - 引用图校验（缺失引用、循环引用）

pub mod config;
pub mod error;
pub mod graph;
pub mod logging;

// 重新导出常用类型
pub use config::{EnvSource, MapSource, SettingValue, Settings, SettingsSource, TomlSource};
pub use error::{CoreError, CoreResult, Result};
pub use graph::{validate_reference_graph, ReferenceGraphError};
pub use logging::{LogFormat, LogLevel, LoggingConfig};

/// Prelude 模块
pub mod prelude {
    pub use crate::config::{MapSource, Settings, SettingsSource, TomlSource};
    pub use crate::error::Result;
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use anyhow::{anyhow, Context};
}
