//! AOP 配置
//!
//! ```toml
//! [aop]
//! proceed_guard = "strict"
//! exclude_classes = ["Legacy*"]
//!
//! [aop.global_objects]
//! tenant = "acme"
//! ```

use crate::condition::GlobalObjects;
use crate::error::AopResult;
use crate::pointcut::NamePattern;
use std::fmt;
use std::str::FromStr;
use weft_core::Settings;

/// 目标方法已执行后再次调用 `proceed()` 的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProceedGuard {
    /// 返回 `AopError::ProceedAfterCompletion`
    #[default]
    Strict,
    /// 记录警告并再次执行原始方法
    Replay,
}

impl FromStr for ProceedGuard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(ProceedGuard::Strict),
            "replay" => Ok(ProceedGuard::Replay),
            _ => Err(format!("Invalid proceed guard: {}", s)),
        }
    }
}

impl fmt::Display for ProceedGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProceedGuard::Strict => f.write_str("strict"),
            ProceedGuard::Replay => f.write_str("replay"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AopConfig {
    pub proceed_guard: ProceedGuard,
    /// 永远不织入的类
    pub exclude_classes: Vec<NamePattern>,
    pub global_objects: GlobalObjects,
}

impl AopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proceed_guard(mut self, guard: ProceedGuard) -> Self {
        self.proceed_guard = guard;
        self
    }

    pub fn exclude(mut self, pattern: &str) -> AopResult<Self> {
        self.exclude_classes.push(NamePattern::wildcard(pattern)?);
        Ok(self)
    }

    pub fn global_objects(mut self, globals: GlobalObjects) -> Self {
        self.global_objects = globals;
        self
    }

    /// 从配置加载，无效的 `proceed_guard` 记录警告后使用默认值
    pub fn from_settings(settings: &Settings) -> AopResult<Self> {
        let mut config = Self::new();

        if let Some(guard) = settings.get_string("aop.proceed_guard") {
            match guard.parse() {
                Ok(guard) => config.proceed_guard = guard,
                Err(e) => tracing::warn!("{}, falling back to '{}'", e, config.proceed_guard),
            }
        }

        for pattern in settings
            .get_string_array("aop.exclude_classes")
            .unwrap_or_default()
        {
            config.exclude_classes.push(NamePattern::wildcard(&pattern)?);
        }

        config.global_objects = GlobalObjects::from_settings(settings);
        Ok(config)
    }

    pub fn is_excluded(&self, class_name: &str) -> bool {
        self.exclude_classes.iter().any(|p| p.matches(class_name))
    }
}
