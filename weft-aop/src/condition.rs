//! 运行时条件
//!
//! 静态匹配无法决定的部分（参数值、`this` 上的属性、全局对象）在每次调用时
//! 针对当前连接点重新求值。

use crate::JoinPoint;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use weft_core::{SettingValue, Settings};

/// 运行时条件求值错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("Unknown global object '{0}'")]
    UnknownGlobal(String),

    #[error("Invalid regular expression '{pattern}' in runtime condition: {message}")]
    InvalidRegex { pattern: String, message: String },
}

type GlobalProvider = Arc<dyn Fn() -> Value + Send + Sync>;

/// 运行时条件可以访问的全局对象
///
/// 每个全局对象由一个提供者函数给出当前值，例如当前登录用户。
#[derive(Clone, Default)]
pub struct GlobalObjects {
    providers: BTreeMap<String, GlobalProvider>,
}

impl GlobalObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个动态提供者
    pub fn register<F>(&mut self, name: impl Into<String>, provider: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.providers.insert(name.into(), Arc::new(provider));
    }

    pub fn with_provider<F>(mut self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.register(name, provider);
        self
    }

    /// 注册一个固定值
    pub fn with_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.with_provider(name, move || value.clone())
    }

    /// 读取 `aop.global_objects.<name>` 下的固定值
    pub fn from_settings(settings: &Settings) -> Self {
        const PREFIX: &str = "aop.global_objects";

        let mut globals = Self::new();
        for key in settings.keys_with_prefix(PREFIX) {
            let Some(name) = key.strip_prefix(PREFIX).and_then(|k| k.strip_prefix('.')) else {
                continue;
            };
            // 只取顶层名字，嵌套表作为整体值
            if name.contains('.') {
                continue;
            }
            if let Some(value) = settings.get(&key) {
                globals = globals.with_value(name, setting_to_json(&value));
            }
        }
        globals
    }

    pub fn resolve(&self, name: &str) -> Option<Value> {
        self.providers.get(name).map(|provider| provider())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

impl fmt::Debug for GlobalObjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.providers.keys()).finish()
    }
}

pub(crate) fn setting_to_json(value: &SettingValue) -> Value {
    match value {
        SettingValue::String(s) => Value::from(s.as_str()),
        SettingValue::Int(i) => Value::from(*i),
        SettingValue::Float(f) => Value::from(*f),
        SettingValue::Bool(b) => Value::from(*b),
        SettingValue::Array(items) => Value::Array(items.iter().map(setting_to_json).collect()),
        SettingValue::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), setting_to_json(v)))
                .collect(),
        ),
    }
}

/// 条件中的操作数
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    /// 方法参数，例如 `user.name`
    Argument(String),
    /// 代理实例上的属性
    This(String),
    /// 全局对象，例如 `securityContext.account`
    Global(String),
}

impl Operand {
    pub fn literal(value: impl Into<Value>) -> Self {
        Operand::Literal(value.into())
    }

    pub fn argument(path: impl Into<String>) -> Self {
        Operand::Argument(path.into())
    }

    pub fn this(path: impl Into<String>) -> Self {
        Operand::This(path.into())
    }

    pub fn global(path: impl Into<String>) -> Self {
        Operand::Global(path.into())
    }

    fn resolve(
        &self,
        join_point: &JoinPoint<'_>,
        globals: &GlobalObjects,
    ) -> Result<Value, ConditionError> {
        match self {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Argument(path) => {
                let (head, rest) = split_path(path);
                let root = join_point.argument(head).cloned().unwrap_or(Value::Null);
                Ok(navigate(root, rest))
            }
            Operand::This(path) => {
                let (head, rest) = split_path(path);
                let root = join_point.proxy().property(head).unwrap_or(Value::Null);
                Ok(navigate(root, rest))
            }
            Operand::Global(path) => {
                let (head, rest) = split_path(path);
                let root = globals
                    .resolve(head)
                    .ok_or_else(|| ConditionError::UnknownGlobal(head.to_string()))?;
                Ok(navigate(root, rest))
            }
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Argument(path) => write!(f, "{}", path),
            Operand::This(path) => write!(f, "this.{}", path),
            Operand::Global(path) => write!(f, "{}", path),
        }
    }
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

fn navigate(root: Value, rest: Option<&str>) -> Value {
    let Some(rest) = rest else {
        return root;
    };

    let mut current = root;
    for segment in rest.split('.') {
        current = match current {
            Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
            Value::Array(mut items) => match segment.parse::<usize>() {
                Ok(index) if index < items.len() => items.swap_remove(index),
                _ => Value::Null,
            },
            _ => Value::Null,
        };
    }
    current
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    /// 左值是右侧数组的元素，或右侧对象的键
    In,
    /// 左侧数组包含右值，或左侧字符串包含右侧子串
    Contains,
    /// 左侧字符串匹配右侧正则表达式
    Matches,
}

impl Operator {
    fn apply(self, left: &Value, right: &Value) -> Result<bool, ConditionError> {
        let matched = match self {
            Operator::Equal => values_equal(left, right),
            Operator::NotEqual => !values_equal(left, right),
            Operator::LessThan => compare(left, right) == Some(Ordering::Less),
            Operator::LessOrEqual => matches!(
                compare(left, right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::GreaterThan => compare(left, right) == Some(Ordering::Greater),
            Operator::GreaterOrEqual => matches!(
                compare(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::In => contains(right, left),
            Operator::Contains => contains(left, right),
            Operator::Matches => match (left, right) {
                (Value::String(subject), Value::String(pattern)) => {
                    compiled_pattern(pattern)?.is_match(subject)
                }
                _ => false,
            },
        };
        Ok(matched)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::In => "in",
            Operator::Contains => "contains",
            Operator::Matches => "matches",
        };
        f.write_str(symbol)
    }
}

/// 已编译的 `matches` 模式
static PATTERNS: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// 模式可能来自参数值，缓存超过上限时整体清空
const PATTERN_CACHE_LIMIT: usize = 256;

fn compiled_pattern(pattern: &str) -> Result<Regex, ConditionError> {
    if let Some(regex) = PATTERNS.lock().get(pattern) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(pattern).map_err(|e| ConditionError::InvalidRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut patterns = PATTERNS.lock();
    if patterns.len() >= PATTERN_CACHE_LIMIT {
        patterns.clear();
    }
    patterns.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Array(items), _) => items.iter().any(|item| values_equal(item, needle)),
        (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

type Predicate = Arc<dyn Fn(&JoinPoint<'_>) -> bool + Send + Sync>;

/// 运行时条件
#[derive(Clone)]
pub enum RuntimeCondition {
    Compare {
        left: Operand,
        operator: Operator,
        right: Operand,
    },
    Truthy(Operand),
    /// 具名的自定义判断
    Predicate { name: String, predicate: Predicate },
}

impl RuntimeCondition {
    pub fn compare(left: Operand, operator: Operator, right: Operand) -> Self {
        RuntimeCondition::Compare {
            left,
            operator,
            right,
        }
    }

    pub fn equals(left: Operand, right: Operand) -> Self {
        Self::compare(left, Operator::Equal, right)
    }

    pub fn truthy(operand: Operand) -> Self {
        RuntimeCondition::Truthy(operand)
    }

    pub fn predicate<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&JoinPoint<'_>) -> bool + Send + Sync + 'static,
    {
        RuntimeCondition::Predicate {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn evaluate(
        &self,
        join_point: &JoinPoint<'_>,
        globals: &GlobalObjects,
    ) -> Result<bool, ConditionError> {
        match self {
            RuntimeCondition::Compare {
                left,
                operator,
                right,
            } => {
                let left = left.resolve(join_point, globals)?;
                let right = right.resolve(join_point, globals)?;
                operator.apply(&left, &right)
            }
            RuntimeCondition::Truthy(operand) => {
                Ok(is_truthy(&operand.resolve(join_point, globals)?))
            }
            RuntimeCondition::Predicate { predicate, .. } => Ok(predicate(join_point)),
        }
    }
}

impl fmt::Debug for RuntimeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for RuntimeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeCondition::Compare {
                left,
                operator,
                right,
            } => write!(f, "{} {} {}", left, operator, right),
            RuntimeCondition::Truthy(operand) => write!(f, "{}", operand),
            RuntimeCondition::Predicate { name, .. } => write!(f, "{}()", name),
        }
    }
}
