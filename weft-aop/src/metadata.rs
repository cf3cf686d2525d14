//! 类元数据
//!
//! 织入引擎不做反射，类的形状（方法、可见性、注解、属性）由外部协作者以
//! 结构化数据的形式提供，可以直接从 JSON 反序列化。

use crate::error::AopResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// 构造函数对应的连接点方法名
pub const CONSTRUCTOR_METHOD: &str = "__construct";

/// 候选类名集合（有序，便于稳定输出）
pub type ClassNameIndex = BTreeSet<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => f.write_str("public"),
            Visibility::Protected => f.write_str("protected"),
            Visibility::Private => f.write_str("private"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterMetadata {
    pub name: String,
    pub type_name: Option<String>,
    pub optional: bool,
    pub default: Option<Value>,
}

impl ParameterMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodMetadata {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_final: bool,
    pub parameters: Vec<ParameterMetadata>,
    pub return_type: Option<String>,
    pub annotations: Vec<String>,
}

impl MethodMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterMetadata) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_METHOD
    }

    /// 静态方法和私有方法不会被代理拦截
    pub fn is_advisable(&self) -> bool {
        !self.is_static && self.visibility != Visibility::Private
    }
}

/// 属性描述：可见性、类型与默认值
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyMetadata {
    pub name: String,
    pub visibility: Visibility,
    pub type_name: Option<String>,
    pub default: Option<Value>,
}

impl PropertyMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassMetadata {
    pub name: String,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub annotations: Vec<String>,
    pub methods: Vec<MethodMetadata>,
    pub properties: Vec<PropertyMetadata>,
}

impl ClassMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 接口元数据
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_interface: true,
            ..Default::default()
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn with_method(mut self, method: MethodMetadata) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_property(mut self, property: PropertyMetadata) -> Self {
        self.properties.push(property);
        self
    }

    pub fn method(&self, name: &str) -> Option<&MethodMetadata> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// 可以被代理的具体类
    pub fn is_weavable(&self) -> bool {
        !self.is_interface && !self.is_abstract
    }
}

/// 类元数据提供者
pub trait ClassMetadataProvider: Send + Sync {
    /// 所有已知的类名
    fn class_names(&self) -> ClassNameIndex;

    fn class(&self, name: &str) -> Option<Arc<ClassMetadata>>;

    /// `class` 是否为 `type_name` 本身，或者（传递地）继承/实现了它
    fn is_subtype_of(&self, class: &str, type_name: &str) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![class.to_string()];

        while let Some(current) = pending.pop() {
            if current == type_name {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(metadata) = self.class(&current) {
                pending.extend(metadata.parent.iter().cloned());
                pending.extend(metadata.interfaces.iter().cloned());
            }
        }

        false
    }
}

/// 内存中的类元数据注册表
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, Arc<ClassMetadata>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: ClassMetadata) -> Self {
        self.insert(class);
        self
    }

    pub fn insert(&mut self, class: ClassMetadata) {
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    /// 从 JSON 数组加载类元数据
    pub fn from_json(json: &str) -> AopResult<Self> {
        let classes: Vec<ClassMetadata> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for class in classes {
            registry.insert(class);
        }
        tracing::debug!("Loaded metadata for {} class(es)", registry.len());
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassMetadataProvider for ClassRegistry {
    fn class_names(&self) -> ClassNameIndex {
        self.classes.keys().cloned().collect()
    }

    fn class(&self, name: &str) -> Option<Arc<ClassMetadata>> {
        self.classes.get(name).cloned()
    }
}
