//! 连接点（JoinPoint）定义
//!
//! 连接点表示一次被拦截的方法调用

use crate::advice_chain::{AdviceChain, ChainStep};
use crate::error::AopError;
use crate::error_info::ErrorInfo;
use crate::proxy::ProxyInstance;
use serde_json::{Map, Value};
use std::fmt;
use std::time::{Duration, Instant};

/// 调用参数：参数名 -> 值，保持声明顺序
pub type Arguments = Map<String, Value>;

/// 方法调用的结果：返回值或异常，二者互斥
#[derive(Debug)]
pub enum Outcome {
    Returned(Value),
    Raised(anyhow::Error),
}

impl Outcome {
    pub fn from_result(result: anyhow::Result<Value>) -> Self {
        match result {
            Ok(value) => Outcome::Returned(value),
            Err(error) => Outcome::Raised(error),
        }
    }

    pub fn into_result(self) -> anyhow::Result<Value> {
        match self {
            Outcome::Returned(value) => Ok(value),
            Outcome::Raised(error) => Err(error),
        }
    }

    pub fn is_raised(&self) -> bool {
        matches!(self, Outcome::Raised(_))
    }
}

/// 连接点
///
/// 包含方法执行时的上下文信息。由代理在每次调用时创建，调用结束后丢弃。
pub struct JoinPoint<'a> {
    /// 被调用的代理实例
    proxy: &'a ProxyInstance,

    /// 方法名
    method_name: String,

    /// 方法参数
    arguments: Arguments,

    /// 执行结果，仅在方法执行后存在
    outcome: Option<Outcome>,

    /// 本次调用的环绕通知链
    chain: Option<AdviceChain<'a>>,

    /// 调用开始时间
    started_at: Instant,
}

impl<'a> JoinPoint<'a> {
    pub fn new(proxy: &'a ProxyInstance, method_name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            proxy,
            method_name: method_name.into(),
            arguments,
            outcome: None,
            chain: None,
            started_at: Instant::now(),
        }
    }

    /// 获取方法签名
    pub fn signature(&self) -> String {
        format!("{}->{}", self.proxy.class_name(), self.method_name)
    }

    pub fn proxy(&self) -> &'a ProxyInstance {
        self.proxy
    }

    pub fn class_name(&self) -> &'a str {
        self.proxy.class_name()
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }

    /// 修改参数，后续的通知和原始方法看到的是修改后的值
    pub fn set_argument(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.arguments.insert(name.into(), value.into());
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// 方法返回值（仅在成功返回后存在）
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Some(Outcome::Returned(value)) => Some(value),
            _ => None,
        }
    }

    /// 替换返回值；在异常通知中调用等同于恢复
    pub fn set_result(&mut self, value: impl Into<Value>) {
        self.outcome = Some(Outcome::Returned(value.into()));
    }

    /// 方法抛出的异常（仅在失败后存在）
    pub fn exception(&self) -> Option<&anyhow::Error> {
        match &self.outcome {
            Some(Outcome::Raised(error)) => Some(error),
            _ => None,
        }
    }

    pub fn has_exception(&self) -> bool {
        self.exception().is_some()
    }

    pub fn exception_info(&self) -> Option<ErrorInfo> {
        self.exception().map(ErrorInfo::from_anyhow)
    }

    /// 用返回值替换异常，返回是否发生了恢复
    pub fn recover(&mut self, value: impl Into<Value>) -> bool {
        if self.has_exception() {
            self.outcome = Some(Outcome::Returned(value.into()));
            true
        } else {
            false
        }
    }

    /// 用另一个异常替换当前结果
    pub fn replace_exception(&mut self, error: anyhow::Error) {
        self.outcome = Some(Outcome::Raised(error));
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 把调用交给通知链中的下一个环节
    ///
    /// 运行时条件不满足的通知会被跳过；通知链耗尽后以当前参数执行原始方法。
    pub fn proceed(&mut self) -> anyhow::Result<Value> {
        let step = self.chain.as_mut().map(|chain| chain.next_step());

        match step {
            None => Err(AopError::NoAdviceChain {
                signature: self.signature(),
            }
            .into()),
            Some(ChainStep::Advice(link, globals)) => {
                if link.applies(self, &globals) {
                    tracing::trace!("↪ {} -> {}", self.signature(), link.advice().identifier());
                    link.advice().invoke_around(self)
                } else {
                    self.proceed()
                }
            }
            Some(ChainStep::Target(target)) => target(self),
            Some(ChainStep::Replay(target)) => {
                tracing::warn!(
                    "⚠️  proceed() called again on {} after the original method ran, invoking it again",
                    self.signature()
                );
                target(self)
            }
            Some(ChainStep::Completed) => Err(AopError::ProceedAfterCompletion {
                signature: self.signature(),
            }
            .into()),
        }
    }

    pub(crate) fn attach_chain(&mut self, chain: AdviceChain<'a>) {
        self.chain = Some(chain);
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }

    pub(crate) fn take_outcome(&mut self) -> Option<Outcome> {
        self.outcome.take()
    }
}

impl fmt::Debug for JoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("signature", &self.signature())
            .field("arguments", &self.arguments)
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl fmt::Display for JoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}
