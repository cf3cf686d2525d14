//! AOP 错误类型
//!
//! 配置错误在织入阶段被检测并终止织入；调用阶段的契约错误（例如
//! proceed 重复调用）作为 `anyhow::Error` 返回给调用方。

use thiserror::Error;
use weft_core::ReferenceGraphError;

#[derive(Debug, Error)]
pub enum AopError {
    /// 引用了未定义的命名切点
    #[error("Undefined pointcut '{reference}' (reference chain: {})", .chain.join(" -> "))]
    UndefinedPointcut { reference: String, chain: Vec<String> },

    /// 命名切点之间存在循环引用
    #[error("Cyclic pointcut reference: {}", .cycle.join(" -> "))]
    CyclicPointcutReference { cycle: Vec<String> },

    /// 同一切面中重复声明的命名切点
    #[error("Pointcut '{name}' is declared more than once")]
    DuplicatePointcut { name: String },

    /// 通知与切面的绑定不合法
    #[error("Malformed advisor in aspect '{aspect}': {reason}")]
    MalformedAdvisor { aspect: String, reason: String },

    /// 名称模式无法编译
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// setting() 指示符引用的配置不存在或不是布尔值
    #[error("Setting '{path}' used in a pointcut of aspect '{aspect}' is missing or not a boolean")]
    InvalidSetting { path: String, aspect: String },

    /// 两个切面向同一个类引入同名属性，或与类已声明的属性冲突
    #[error("Property '{property}' introduced into '{class}' by '{introduced_by}' collides with a property from '{existing}'")]
    PropertyIntroductionCollision {
        class: String,
        property: String,
        introduced_by: String,
        existing: String,
    },

    /// 两个切面向同一个类引入同名但定义不同的接口
    #[error("Interface '{interface}' introduced into '{class}' by '{introduced_by}' conflicts with the definition from '{existing}'")]
    InterfaceIntroductionConflict {
        class: String,
        interface: String,
        introduced_by: String,
        existing: String,
    },

    /// 在某个类上匹配切点时失败
    #[error("Failed to weave aspect '{aspect}' into class '{class}': {source}")]
    Weaving {
        aspect: String,
        class: String,
        #[source]
        source: Box<AopError>,
    },

    /// 环绕通知在目标方法已执行后再次调用 proceed()
    #[error("proceed() called again on '{signature}' after the original method already ran")]
    ProceedAfterCompletion { signature: String },

    /// 在没有通知链的连接点上调用 proceed()
    #[error("Join point '{signature}' has no advice chain to proceed")]
    NoAdviceChain { signature: String },

    /// 调用未被引入的方法
    #[error("Method '{method}' is not an introduced method of '{class}'")]
    UnknownIntroducedMethod { class: String, method: String },

    /// 类元数据解析失败
    #[error("Invalid class metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// 配置加载失败
    #[error(transparent)]
    Core(#[from] weft_core::CoreError),
}

impl From<ReferenceGraphError> for AopError {
    fn from(error: ReferenceGraphError) -> Self {
        match error {
            ReferenceGraphError::Missing { missing, chain } => AopError::UndefinedPointcut {
                reference: missing,
                chain,
            },
            ReferenceGraphError::Cycle { cycle } => AopError::CyclicPointcutReference { cycle },
        }
    }
}

impl AopError {
    /// 是否为织入阶段的配置错误
    pub fn is_configuration_error(&self) -> bool {
        match self {
            AopError::Weaving { source, .. } => source.is_configuration_error(),
            AopError::ProceedAfterCompletion { .. }
            | AopError::NoAdviceChain { .. }
            | AopError::UnknownIntroducedMethod { .. } => false,
            _ => true,
        }
    }
}

pub type AopResult<T> = Result<T, AopError>;
