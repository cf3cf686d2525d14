//! 引入（Introduction）
//!
//! 切面可以给匹配的类增加接口或属性，织入后的类看起来就像原本声明了它们。

use crate::metadata::{MethodMetadata, PropertyMetadata};
use crate::pointcut::PointcutExpression;
use serde::{Deserialize, Serialize};

/// 被引入的接口：名字和方法签名
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceDefinition {
    pub name: String,
    pub methods: Vec<MethodMetadata>,
}

impl InterfaceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: MethodMetadata) -> Self {
        self.methods.push(method);
        self
    }

    pub fn method(&self, name: &str) -> Option<&MethodMetadata> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// 接口引入
#[derive(Debug, Clone)]
pub struct InterfaceIntroduction {
    aspect: String,
    interface: InterfaceDefinition,
    pointcut: PointcutExpression,
}

impl InterfaceIntroduction {
    pub fn new(
        aspect: impl Into<String>,
        interface: InterfaceDefinition,
        pointcut: PointcutExpression,
    ) -> Self {
        Self {
            aspect: aspect.into(),
            interface,
            pointcut,
        }
    }

    pub fn aspect(&self) -> &str {
        &self.aspect
    }

    pub fn interface(&self) -> &InterfaceDefinition {
        &self.interface
    }

    pub fn pointcut(&self) -> &PointcutExpression {
        &self.pointcut
    }
}

/// 属性引入，携带可见性、类型和默认值
#[derive(Debug, Clone)]
pub struct PropertyIntroduction {
    aspect: String,
    property: PropertyMetadata,
    pointcut: PointcutExpression,
}

impl PropertyIntroduction {
    pub fn new(
        aspect: impl Into<String>,
        property: PropertyMetadata,
        pointcut: PointcutExpression,
    ) -> Self {
        Self {
            aspect: aspect.into(),
            property,
            pointcut,
        }
    }

    pub fn aspect(&self) -> &str {
        &self.aspect
    }

    pub fn property(&self) -> &PropertyMetadata {
        &self.property
    }

    pub fn pointcut(&self) -> &PointcutExpression {
        &self.pointcut
    }
}
