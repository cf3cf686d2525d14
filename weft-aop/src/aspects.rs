// ============================================================================
// 预定义的常用切面
// ============================================================================

use crate::advice::Advice;
use crate::aspect::{Aspect, AspectContainer};
use crate::error::AopResult;
use crate::pointcut::PointcutExpression;
use std::sync::Arc;
use std::time::Duration;

/// 日志切面 - 记录方法调用
pub struct LoggingAspect {
    log_args: bool,
    log_result: bool,
    priority: i32,
    pointcut: PointcutExpression,
}

impl LoggingAspect {
    pub const NAME: &'static str = "LoggingAspect";

    pub fn new(pointcut: PointcutExpression) -> Self {
        Self {
            log_args: false,
            log_result: true,
            priority: 0,
            pointcut,
        }
    }

    pub fn with_args(mut self) -> Self {
        self.log_args = true;
        self
    }

    pub fn without_result(mut self) -> Self {
        self.log_result = false;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Aspect for LoggingAspect {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn declare(self: Arc<Self>, container: &mut AspectContainer) -> AopResult<()> {
        let log_args = self.log_args;
        container.advise(
            Advice::before(Self::NAME, "logEntry", move |jp| {
                if log_args {
                    tracing::info!("→ Entering: {} {:?}", jp.signature(), jp.arguments());
                } else {
                    tracing::info!("→ Entering: {}", jp.signature());
                }
                Ok(())
            })
            .with_priority(self.priority),
            self.pointcut.clone(),
        )?;

        if self.log_result {
            container.advise(
                Advice::after_returning(Self::NAME, "logResult", |jp| {
                    if let Some(result) = jp.result() {
                        tracing::info!("  {} returned {}", jp.signature(), result);
                    }
                    Ok(())
                })
                .with_priority(self.priority),
                self.pointcut.clone(),
            )?;
        }

        container.advise(
            Advice::after(Self::NAME, "logExit", |jp| {
                tracing::info!("← Exiting: {} (took {:?})", jp.signature(), jp.elapsed());
                Ok(())
            })
            .with_priority(self.priority),
            self.pointcut.clone(),
        )
    }
}

/// 性能监控切面
pub struct PerformanceAspect {
    threshold: Duration,
    pointcut: PointcutExpression,
}

impl PerformanceAspect {
    pub const NAME: &'static str = "PerformanceAspect";

    pub fn new(threshold: Duration, pointcut: PointcutExpression) -> Self {
        Self { threshold, pointcut }
    }
}

impl Aspect for PerformanceAspect {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn declare(self: Arc<Self>, container: &mut AspectContainer) -> AopResult<()> {
        let threshold = self.threshold;
        container.advise(
            Advice::after(Self::NAME, "measure", move |jp| {
                let elapsed = jp.elapsed();
                if elapsed > threshold {
                    tracing::warn!(
                        "⚠️ Slow method detected: {} took {}ms (threshold: {}ms)",
                        jp.signature(),
                        elapsed.as_millis(),
                        threshold.as_millis()
                    );
                }
                Ok(())
            }),
            self.pointcut.clone(),
        )
    }
}

/// 异常处理切面
pub struct ExceptionHandlingAspect {
    pointcut: PointcutExpression,
}

impl ExceptionHandlingAspect {
    pub const NAME: &'static str = "ExceptionHandlingAspect";

    pub fn new(pointcut: PointcutExpression) -> Self {
        Self { pointcut }
    }
}

impl Aspect for ExceptionHandlingAspect {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn declare(self: Arc<Self>, container: &mut AspectContainer) -> AopResult<()> {
        container.advise(
            Advice::after_throwing(Self::NAME, "logException", |jp| {
                if let Some(info) = jp.exception_info() {
                    tracing::error!(
                        "❌ Exception in {}: {}",
                        jp.signature(),
                        info.full_description()
                    );
                }
                Ok(())
            }),
            self.pointcut.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::AdviceType;

    #[test]
    fn test_logging_aspect_declares_advice() {
        let aspect = LoggingAspect::new(PointcutExpression::All).with_priority(5);
        let container = AspectContainer::from_aspect(Arc::new(aspect)).unwrap();

        let types: Vec<AdviceType> = container
            .advisors()
            .iter()
            .map(|a| a.advice().advice_type())
            .collect();
        assert_eq!(
            types,
            vec![AdviceType::Before, AdviceType::AfterReturning, AdviceType::After]
        );
        assert!(container.advisors().iter().all(|a| a.advice().priority() == 5));
    }

    #[test]
    fn test_logging_aspect_without_result() {
        let aspect = LoggingAspect::new(PointcutExpression::All).without_result();
        let container = AspectContainer::from_aspect(Arc::new(aspect)).unwrap();
        assert_eq!(container.advisors().len(), 2);
    }

    #[test]
    fn test_performance_and_exception_aspects() {
        let performance = AspectContainer::from_aspect(Arc::new(PerformanceAspect::new(
            Duration::from_millis(100),
            PointcutExpression::All,
        )))
        .unwrap();
        assert_eq!(performance.advisors()[0].advice().advice_type(), AdviceType::After);

        let exceptions =
            AspectContainer::from_aspect(Arc::new(ExceptionHandlingAspect::new(PointcutExpression::All)))
                .unwrap();
        assert_eq!(
            exceptions.advisors()[0].advice().advice_type(),
            AdviceType::AfterThrowing
        );
    }
}
