//! Weft AOP - 面向切面编程的织入引擎
//!
//! 提供：
//! - 声明式切面定义（通知、命名切点、接口/属性引入）
//! - 多种通知类型（Before、Around、AfterReturning、AfterThrowing、After）
//! - 可组合的切点表达式，静态匹配 + 运行时条件
//! - 启动时一次性织入，运行时通过代理实例按序执行通知
//! - 通过 inventory 自动发现切面

pub mod advice;
pub mod advice_chain;
pub mod advisor;
pub mod aspect;
pub mod aspects;
pub mod condition;
pub mod config;
pub mod error;
pub mod error_info;
pub mod introduction;
pub mod invoker;
pub mod joinpoint;
pub mod metadata;
pub mod pointcut;
pub mod proxy;
pub mod weaver;

// 重新导出核心类型
pub use advice::{Advice, AdviceType, AroundInterceptor, Interceptor};
pub use advice_chain::{AdviceChain, ChainLink, GroupedAdvices};
pub use advisor::Advisor;
pub use aspect::{get_all_aspect_registrations, Aspect, AspectContainer, AspectRegistration};
pub use aspects::{ExceptionHandlingAspect, LoggingAspect, PerformanceAspect};
pub use condition::{ConditionError, GlobalObjects, Operand, Operator, RuntimeCondition};
pub use config::{AopConfig, ProceedGuard};
pub use error::{AopError, AopResult};
pub use error_info::ErrorInfo;
pub use introduction::{InterfaceDefinition, InterfaceIntroduction, PropertyIntroduction};
pub use invoker::ProxyInvoker;
pub use joinpoint::{Arguments, JoinPoint, Outcome};
pub use metadata::{
    ClassMetadata, ClassMetadataProvider, ClassNameIndex, ClassRegistry, MethodMetadata,
    ParameterMetadata, PropertyMetadata, Visibility, CONSTRUCTOR_METHOD,
};
pub use pointcut::{
    MatchContext, MethodPointcut, NamePattern, NamedPointcuts, Pointcut, PointcutExpression,
    PointcutFilter, Residual, RuntimeFilter, WeavingContext,
};
pub use proxy::ProxyInstance;
pub use weaver::{Weaver, WeavingRegistry, WovenClass};

// 导出供宏使用
pub use inventory;
pub use serde_json;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::{Advice, AdviceType};
    pub use crate::aspect::{Aspect, AspectContainer, AspectRegistration};
    pub use crate::condition::{GlobalObjects, Operand, Operator, RuntimeCondition};
    pub use crate::config::{AopConfig, ProceedGuard};
    pub use crate::error::{AopError, AopResult};
    pub use crate::error_info::ErrorInfo;
    pub use crate::introduction::InterfaceDefinition;
    pub use crate::invoker::ProxyInvoker;
    pub use crate::joinpoint::{Arguments, JoinPoint};
    pub use crate::metadata::{
        ClassMetadata, ClassMetadataProvider, ClassRegistry, MethodMetadata, PropertyMetadata,
        Visibility,
    };
    pub use crate::pointcut::{MethodPointcut, PointcutExpression};
    pub use crate::proxy::ProxyInstance;
    pub use crate::weaver::{Weaver, WeavingRegistry};
    pub use crate::advised;
}
