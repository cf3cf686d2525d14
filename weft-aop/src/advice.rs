//! 通知（Advice）定义
//!
//! 定义了在连接点执行的各种动作

use crate::JoinPoint;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceType {
    /// 前置通知
    Before,
    /// 返回后通知（成功返回时执行，可替换返回值）
    AfterReturning,
    /// 异常通知（抛出异常时执行，可恢复或替换异常）
    AfterThrowing,
    /// 后置通知（无论成功还是失败都执行）
    After,
    /// 环绕通知（可以控制方法执行）
    Around,
}

impl fmt::Display for AdviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdviceType::Before => "Before",
            AdviceType::AfterReturning => "AfterReturning",
            AdviceType::AfterThrowing => "AfterThrowing",
            AdviceType::After => "After",
            AdviceType::Around => "Around",
        };
        f.write_str(name)
    }
}

/// 前置 / 返回后 / 异常 / 后置通知的执行体
pub trait Interceptor: Send + Sync {
    fn intercept(&self, join_point: &mut JoinPoint<'_>) -> anyhow::Result<()>;
}

impl<F> Interceptor for F
where
    F: Fn(&mut JoinPoint<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn intercept(&self, join_point: &mut JoinPoint<'_>) -> anyhow::Result<()> {
        self(join_point)
    }
}

/// 环绕通知的执行体
///
/// 实现者通过 [`JoinPoint::proceed`] 把调用交给链中的下一个通知或原始方法。
/// 约定：行为良好的环绕通知恰好调用一次 `proceed()`；不调用表示短路并以自己
/// 的返回值作为结果。
pub trait AroundInterceptor: Send + Sync {
    fn around(&self, join_point: &mut JoinPoint<'_>) -> anyhow::Result<Value>;
}

impl<F> AroundInterceptor for F
where
    F: Fn(&mut JoinPoint<'_>) -> anyhow::Result<Value> + Send + Sync,
{
    fn around(&self, join_point: &mut JoinPoint<'_>) -> anyhow::Result<Value> {
        self(join_point)
    }
}

#[derive(Clone)]
enum AdviceBody {
    Intercept(Arc<dyn Interceptor>),
    Around(Arc<dyn AroundInterceptor>),
}

/// 一个通知：执行体 + 所属切面 + 优先级
#[derive(Clone)]
pub struct Advice {
    advice_type: AdviceType,
    aspect: Arc<str>,
    name: String,
    priority: i32,
    body: AdviceBody,
}

impl Advice {
    fn intercepting<F>(advice_type: AdviceType, aspect: &str, name: &str, body: F) -> Self
    where
        F: Fn(&mut JoinPoint<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            advice_type,
            aspect: Arc::from(aspect),
            name: name.to_string(),
            priority: 0,
            body: AdviceBody::Intercept(Arc::new(body)),
        }
    }

    pub fn before<F>(aspect: &str, name: &str, body: F) -> Self
    where
        F: Fn(&mut JoinPoint<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::intercepting(AdviceType::Before, aspect, name, body)
    }

    pub fn after_returning<F>(aspect: &str, name: &str, body: F) -> Self
    where
        F: Fn(&mut JoinPoint<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::intercepting(AdviceType::AfterReturning, aspect, name, body)
    }

    pub fn after_throwing<F>(aspect: &str, name: &str, body: F) -> Self
    where
        F: Fn(&mut JoinPoint<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::intercepting(AdviceType::AfterThrowing, aspect, name, body)
    }

    pub fn after<F>(aspect: &str, name: &str, body: F) -> Self
    where
        F: Fn(&mut JoinPoint<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::intercepting(AdviceType::After, aspect, name, body)
    }

    pub fn around<F>(aspect: &str, name: &str, body: F) -> Self
    where
        F: Fn(&mut JoinPoint<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            advice_type: AdviceType::Around,
            aspect: Arc::from(aspect),
            name: name.to_string(),
            priority: 0,
            body: AdviceBody::Around(Arc::new(body)),
        }
    }

    /// 使用自定义的 [`Interceptor`] 实现
    pub fn from_interceptor(
        advice_type: AdviceType,
        aspect: &str,
        name: &str,
        interceptor: Arc<dyn Interceptor>,
    ) -> Self {
        Self {
            advice_type,
            aspect: Arc::from(aspect),
            name: name.to_string(),
            priority: 0,
            body: AdviceBody::Intercept(interceptor),
        }
    }

    /// 使用自定义的 [`AroundInterceptor`] 实现
    pub fn from_around(aspect: &str, name: &str, interceptor: Arc<dyn AroundInterceptor>) -> Self {
        Self {
            advice_type: AdviceType::Around,
            aspect: Arc::from(aspect),
            name: name.to_string(),
            priority: 0,
            body: AdviceBody::Around(interceptor),
        }
    }

    /// 优先级越高越先执行，同优先级按声明顺序
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn advice_type(&self) -> AdviceType {
        self.advice_type
    }

    pub fn aspect(&self) -> &str {
        &self.aspect
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// `Aspect->adviceName`
    pub fn identifier(&self) -> String {
        format!("{}->{}", self.aspect, self.name)
    }

    pub(crate) fn invoke(&self, join_point: &mut JoinPoint<'_>) -> anyhow::Result<()> {
        match &self.body {
            AdviceBody::Intercept(interceptor) => interceptor.intercept(join_point),
            // 环绕通知不会出现在非环绕分组中，这里按副作用调用并丢弃返回值
            AdviceBody::Around(interceptor) => interceptor.around(join_point).map(|_| ()),
        }
    }

    pub(crate) fn invoke_around(&self, join_point: &mut JoinPoint<'_>) -> anyhow::Result<Value> {
        match &self.body {
            AdviceBody::Around(interceptor) => interceptor.around(join_point),
            AdviceBody::Intercept(interceptor) => {
                interceptor.intercept(join_point)?;
                join_point.proceed()
            }
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advice")
            .field("type", &self.advice_type)
            .field("identifier", &self.identifier())
            .field("priority", &self.priority)
            .finish()
    }
}
