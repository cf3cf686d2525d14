//! 统一的错误处理类型
//!
//! 框架内部使用 `thiserror` 定义结构化错误，对外的通知（advice）与目标方法
//! 统一使用 `anyhow::Result` 传播异常。

use thiserror::Error;

/// 通知与目标方法使用的结果类型
///
/// # 示例
///
/// ```rust,ignore
/// use weft_core::Result;
///
/// fn load() -> Result<String> {
///     Ok(std::fs::read_to_string("application.toml")?)
/// }
/// ```
pub use anyhow::Result;

/// weft-core 的错误类型
#[derive(Debug, Error)]
pub enum CoreError {
    /// 配置文件读取失败
    #[error("Failed to read settings file {path}: {source}")]
    SettingsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("Failed to parse TOML settings '{name}': {source}")]
    SettingsParse {
        name: String,
        #[source]
        source: toml::de::Error,
    },

    /// 日志系统初始化失败
    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
