//! 分层配置（Settings）
//!
//! 多个配置源按优先级叠加，数字越大优先级越高。TOML 结构会被展平为
//! `aop.exclude_classes` 这样的点分隔键。

use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// 配置值
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<SettingValue>),
    Table(BTreeMap<String, SettingValue>),
}

impl SettingValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            SettingValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Int(i) => Some(*i as f64),
            SettingValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 字符串形式的 "true"/"yes"/"on"/"1" 也视为布尔值（环境变量只能是字符串）
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            SettingValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

/// 配置源
pub trait SettingsSource: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<SettingValue>;

    fn keys(&self) -> Vec<String>;

    /// 数字越大优先级越高
    fn priority(&self) -> i32 {
        0
    }
}

/// 叠加后的配置视图
pub struct Settings {
    sources: RwLock<Vec<Box<dyn SettingsSource>>>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources = self.sources.read();
        f.debug_struct("Settings")
            .field(
                "sources",
                &sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Settings {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
        }
    }

    pub fn with_source(self, source: impl SettingsSource + 'static) -> Self {
        self.add_source(Box::new(source));
        self
    }

    /// 添加配置源，并按优先级降序重新排列
    pub fn add_source(&self, source: Box<dyn SettingsSource>) {
        let mut sources = self.sources.write();
        tracing::debug!(
            "Adding settings source '{}' (priority {})",
            source.name(),
            source.priority()
        );
        sources.push(source);
        // 稳定排序：同优先级时先添加的优先
        sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn get(&self, key: &str) -> Option<SettingValue> {
        let sources = self.sources.read();
        sources.iter().find_map(|source| source.get(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// 读取字符串数组
    ///
    /// 支持 TOML 数组 `["a", "b"]` 以及逗号分隔的字符串 `"a, b"`
    pub fn get_string_array(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            SettingValue::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
            ),
            SettingValue::String(s) => Some(
                s.split(',')
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }

    /// 列出某个前缀下的所有键（去重、排序）
    ///
    /// 例如前缀 `aop.global_objects` 会返回 `aop.global_objects.tenant` 等
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let dotted = format!("{}.", prefix);
        let sources = self.sources.read();
        let mut keys: Vec<String> = sources
            .iter()
            .flat_map(|source| source.keys())
            .filter(|key| key.starts_with(&dotted))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Settings Sources ==========

/// TOML 配置源
pub struct TomlSource {
    name: String,
    values: BTreeMap<String, SettingValue>,
    priority: i32,
}

impl TomlSource {
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CoreError::SettingsIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, path.display().to_string())
    }

    pub fn parse(content: &str, name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        let value: toml::Value = toml::from_str(content).map_err(|source| CoreError::SettingsParse {
            name: name.clone(),
            source,
        })?;

        let mut values = BTreeMap::new();
        flatten(&value, String::new(), &mut values);

        Ok(Self {
            name,
            values,
            priority: 0,
        })
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// 展平 TOML 表：`{ aop: { proceed_guard: "strict" } }` -> `aop.proceed_guard`
///
/// 表本身也会以 `Table` 形式保留在自己的键下
fn flatten(value: &toml::Value, prefix: String, out: &mut BTreeMap<String, SettingValue>) {
    if let toml::Value::Table(table) = value {
        for (key, child) in table {
            let child_key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            flatten(child, child_key, out);
        }
    }
    if !prefix.is_empty() {
        out.insert(prefix, convert(value));
    }
}

fn convert(value: &toml::Value) -> SettingValue {
    match value {
        toml::Value::String(s) => SettingValue::String(s.clone()),
        toml::Value::Integer(i) => SettingValue::Int(*i),
        toml::Value::Float(f) => SettingValue::Float(*f),
        toml::Value::Boolean(b) => SettingValue::Bool(*b),
        toml::Value::Datetime(dt) => SettingValue::String(dt.to_string()),
        toml::Value::Array(items) => SettingValue::Array(items.iter().map(convert).collect()),
        toml::Value::Table(table) => SettingValue::Table(
            table
                .iter()
                .map(|(k, v)| (k.clone(), convert(v)))
                .collect(),
        ),
    }
}

impl SettingsSource for TomlSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 内存配置源（测试或运行时覆盖）
pub struct MapSource {
    name: String,
    values: BTreeMap<String, SettingValue>,
    priority: i32,
}

impl MapSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
            priority: 50,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl SettingsSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 环境变量配置源
///
/// 变量名中出现 `__` 时以它作为层级分隔符，单个下划线保留为键名的一部分：
/// `WEFT_AOP__GLOBAL_OBJECTS__TENANT` 对应 `aop.global_objects.tenant`。
/// 否则每个下划线都是分隔符，`WEFT_LOGGING_LEVEL` 对应 `logging.level`。
/// 按键查找时两种写法都会尝试。
pub struct EnvSource {
    prefix: String,
    priority: i32,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            priority: 100,
        }
    }

    fn key_to_vars(&self, key: &str) -> [String; 2] {
        let key = key.to_uppercase();
        [
            format!("{}{}", self.prefix, key.replace('.', "__")),
            format!("{}{}", self.prefix, key.replace('.', "_")),
        ]
    }

    fn var_to_key(&self, var: &str) -> String {
        let name = var.strip_prefix(&self.prefix).unwrap_or(var).to_lowercase();
        if name.contains("__") {
            name.split("__").collect::<Vec<_>>().join(".")
        } else {
            name.replace('_', ".")
        }
    }
}

impl SettingsSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<SettingValue> {
        self.key_to_vars(key)
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .map(SettingValue::String)
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars()
            .filter(|(name, _)| name.starts_with(&self.prefix))
            .map(|(name, _)| self.var_to_key(&name))
            .collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
