//! 通知器：通知 + 切点

use crate::advice::Advice;
use crate::pointcut::PointcutExpression;

/// 把一个通知绑定到一个切点上，创建后不可变
#[derive(Debug, Clone)]
pub struct Advisor {
    advice: Advice,
    pointcut: PointcutExpression,
}

impl Advisor {
    pub fn new(advice: Advice, pointcut: PointcutExpression) -> Self {
        Self { advice, pointcut }
    }

    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    pub fn pointcut(&self) -> &PointcutExpression {
        &self.pointcut
    }

    /// 声明该通知的切面
    pub fn aspect(&self) -> &str {
        self.advice.aspect()
    }
}
