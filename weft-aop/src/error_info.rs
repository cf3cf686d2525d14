//! 错误信息结构
//!
//! 提供结构化的错误信息传递给切面

use crate::error::AopError;

/// 结构化的错误信息
///
/// 用于在 after_throwing 通知中传递更丰富的错误信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// 错误消息
    pub message: String,

    /// 错误类型：AOP 契约错误为其变体名，其他为 "anyhow::Error"
    pub error_type: String,

    /// 错误源链（cause chain）
    pub source_chain: Vec<String>,
}

impl ErrorInfo {
    /// 从连接点上捕获的 `anyhow::Error` 创建
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        let error_type = match error.downcast_ref::<AopError>() {
            Some(aop) => aop_variant(aop).to_string(),
            None => "anyhow::Error".to_string(),
        };

        Self {
            message: error.to_string(),
            error_type,
            source_chain: error.chain().skip(1).map(|e| e.to_string()).collect(),
        }
    }

    /// 获取完整的错误描述（包含源链）
    pub fn full_description(&self) -> String {
        if self.source_chain.is_empty() {
            self.message.clone()
        } else {
            format!(
                "{}\nCaused by:\n  {}",
                self.message,
                self.source_chain.join("\n  ")
            )
        }
    }
}

fn aop_variant(error: &AopError) -> &'static str {
    match error {
        AopError::UndefinedPointcut { .. } => "UndefinedPointcut",
        AopError::CyclicPointcutReference { .. } => "CyclicPointcutReference",
        AopError::DuplicatePointcut { .. } => "DuplicatePointcut",
        AopError::MalformedAdvisor { .. } => "MalformedAdvisor",
        AopError::InvalidPattern { .. } => "InvalidPattern",
        AopError::InvalidSetting { .. } => "InvalidSetting",
        AopError::PropertyIntroductionCollision { .. } => "PropertyIntroductionCollision",
        AopError::InterfaceIntroductionConflict { .. } => "InterfaceIntroductionConflict",
        AopError::Weaving { .. } => "Weaving",
        AopError::ProceedAfterCompletion { .. } => "ProceedAfterCompletion",
        AopError::NoAdviceChain { .. } => "NoAdviceChain",
        AopError::UnknownIntroducedMethod { .. } => "UnknownIntroducedMethod",
        AopError::Metadata(_) => "Metadata",
        AopError::Core(_) => "Core",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_from_anyhow_chain() {
        let error = Err::<(), _>(anyhow!("connection refused"))
            .context("loading user")
            .unwrap_err();

        let info = ErrorInfo::from_anyhow(&error);
        assert_eq!(info.message, "loading user");
        assert_eq!(info.error_type, "anyhow::Error");
        assert_eq!(info.source_chain, vec!["connection refused"]);
        assert_eq!(
            info.full_description(),
            "loading user\nCaused by:\n  connection refused"
        );
    }

    #[test]
    fn test_aop_error_type() {
        let error = anyhow::Error::from(AopError::ProceedAfterCompletion {
            signature: "A->b".to_string(),
        });
        assert_eq!(ErrorInfo::from_anyhow(&error).error_type, "ProceedAfterCompletion");
    }

    #[test]
    fn test_plain_error_description() {
        let info = ErrorInfo::from_anyhow(&anyhow!("boom"));
        assert!(info.source_chain.is_empty());
        assert_eq!(info.full_description(), "boom");
    }
}
