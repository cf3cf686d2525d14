//! 切点（Pointcut）表达式系统
//!
//! 定义了如何匹配连接点的规则。
//!
//! 织入时只看类与方法的静态形状，结果是三值的 [`Residual`]：确定匹配、
//! 确定不匹配，或者"可能匹配"并附带一个需要在每次调用时求值的
//! [`RuntimeFilter`]。

use crate::condition::{ConditionError, GlobalObjects, Operand, Operator, RuntimeCondition};
use crate::error::{AopError, AopResult};
use crate::metadata::{ClassMetadata, ClassMetadataProvider, MethodMetadata, Visibility};
use crate::JoinPoint;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use weft_core::Settings;

// ========== Name Pattern ==========

/// 类名 / 方法名 / 注解名的匹配模式
///
/// 支持的通配符模式：
/// - `*` - 匹配任意字符串
/// - `User*` - 以 User 开头
/// - `*Service` - 以 Service 结尾
/// - `*Service*` - 包含 Service
#[derive(Clone)]
pub enum NamePattern {
    Any,
    Exact(String),
    Regex { source: String, regex: Regex },
}

impl NamePattern {
    /// 通配符模式，`*` 以外的字符按字面匹配
    pub fn wildcard(pattern: &str) -> AopResult<Self> {
        if pattern == "*" {
            return Ok(NamePattern::Any);
        }
        if !pattern.contains('*') {
            return Ok(NamePattern::Exact(pattern.to_string()));
        }

        let translated = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        Self::compile(pattern, &format!("^{}$", translated))
    }

    /// 正则表达式模式，整体锚定
    pub fn regex(pattern: &str) -> AopResult<Self> {
        Self::compile(pattern, &format!("^(?:{})$", pattern))
    }

    fn compile(source: &str, expression: &str) -> AopResult<Self> {
        let regex = Regex::new(expression).map_err(|e| AopError::InvalidPattern {
            pattern: source.to_string(),
            source: e,
        })?;
        Ok(NamePattern::Regex {
            source: source.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Any => true,
            NamePattern::Exact(expected) => expected == name,
            NamePattern::Regex { regex, .. } => regex.is_match(name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NamePattern::Any => "*",
            NamePattern::Exact(expected) => expected,
            NamePattern::Regex { source, .. } => source,
        }
    }
}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== Residual ==========

/// 织入时无法确定、需要在调用时求值的条件树
#[derive(Clone)]
pub enum RuntimeFilter {
    Condition(Arc<RuntimeCondition>),
    And(Box<RuntimeFilter>, Box<RuntimeFilter>),
    Or(Box<RuntimeFilter>, Box<RuntimeFilter>),
    Not(Box<RuntimeFilter>),
}

impl RuntimeFilter {
    pub fn evaluate(
        &self,
        join_point: &JoinPoint<'_>,
        globals: &GlobalObjects,
    ) -> Result<bool, ConditionError> {
        match self {
            RuntimeFilter::Condition(condition) => condition.evaluate(join_point, globals),
            RuntimeFilter::And(left, right) => {
                Ok(left.evaluate(join_point, globals)? && right.evaluate(join_point, globals)?)
            }
            RuntimeFilter::Or(left, right) => {
                Ok(left.evaluate(join_point, globals)? || right.evaluate(join_point, globals)?)
            }
            RuntimeFilter::Not(inner) => Ok(!inner.evaluate(join_point, globals)?),
        }
    }
}

impl fmt::Debug for RuntimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeFilter::Condition(c) => write!(f, "{}", c),
            RuntimeFilter::And(l, r) => write!(f, "({:?} && {:?})", l, r),
            RuntimeFilter::Or(l, r) => write!(f, "({:?} || {:?})", l, r),
            RuntimeFilter::Not(e) => write!(f, "!{:?}", e),
        }
    }
}

/// 静态匹配结果
#[derive(Debug, Clone)]
pub enum Residual {
    Always,
    Never,
    Conditional(RuntimeFilter),
}

impl Residual {
    pub fn from_bool(matched: bool) -> Self {
        if matched {
            Residual::Always
        } else {
            Residual::Never
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Residual::Never)
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Residual::Always)
    }

    /// 静态上可能匹配（确定匹配或需要运行时判断）
    pub fn may_match(&self) -> bool {
        !self.is_never()
    }

    /// 调用时还需要检查的条件；确定匹配时为 `None`
    pub fn into_filter(self) -> Option<RuntimeFilter> {
        match self {
            Residual::Conditional(filter) => Some(filter),
            Residual::Always | Residual::Never => None,
        }
    }

    pub fn and(self, other: Residual) -> Residual {
        match (self, other) {
            (Residual::Never, _) | (_, Residual::Never) => Residual::Never,
            (Residual::Always, other) | (other, Residual::Always) => other,
            (Residual::Conditional(l), Residual::Conditional(r)) => {
                Residual::Conditional(RuntimeFilter::And(Box::new(l), Box::new(r)))
            }
        }
    }

    pub fn or(self, other: Residual) -> Residual {
        match (self, other) {
            (Residual::Always, _) | (_, Residual::Always) => Residual::Always,
            (Residual::Never, other) | (other, Residual::Never) => other,
            (Residual::Conditional(l), Residual::Conditional(r)) => {
                Residual::Conditional(RuntimeFilter::Or(Box::new(l), Box::new(r)))
            }
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Residual {
        match self {
            Residual::Always => Residual::Never,
            Residual::Never => Residual::Always,
            Residual::Conditional(filter) => Residual::Conditional(RuntimeFilter::Not(Box::new(filter))),
        }
    }
}

// ========== Match Context ==========

/// 织入期间所有切面共享的只读上下文
#[derive(Clone, Copy)]
pub struct WeavingContext<'c> {
    pub provider: &'c dyn ClassMetadataProvider,
    pub pointcuts: &'c NamedPointcuts,
    pub settings: &'c Settings,
}

impl<'c> WeavingContext<'c> {
    pub fn new(
        provider: &'c dyn ClassMetadataProvider,
        pointcuts: &'c NamedPointcuts,
        settings: &'c Settings,
    ) -> Self {
        Self {
            provider,
            pointcuts,
            settings,
        }
    }

    /// 针对某个类（以及可选的方法）的匹配上下文
    pub fn matching<'m>(
        &self,
        aspect: &'m str,
        class: &'m ClassMetadata,
        method: Option<&'m MethodMetadata>,
    ) -> MatchContext<'m>
    where
        'c: 'm,
    {
        MatchContext {
            weaving: *self,
            aspect,
            class,
            method,
        }
    }
}

/// 单次静态匹配的上下文
#[derive(Clone, Copy)]
pub struct MatchContext<'c> {
    pub weaving: WeavingContext<'c>,
    /// 声明切点的切面，用于解析不带限定名的引用
    pub aspect: &'c str,
    pub class: &'c ClassMetadata,
    /// 为 `None` 时只做类级别的匹配（例如引入）
    pub method: Option<&'c MethodMetadata>,
}

// ========== Pointcut Expression ==========

/// 自定义的静态过滤器
pub trait PointcutFilter: Send + Sync {
    fn matches(&self, class: &ClassMetadata, method: Option<&MethodMetadata>) -> bool;

    fn describe(&self) -> String {
        "filter(...)".to_string()
    }
}

impl<F> PointcutFilter for F
where
    F: Fn(&ClassMetadata, Option<&MethodMetadata>) -> bool + Send + Sync,
{
    fn matches(&self, class: &ClassMetadata, method: Option<&MethodMetadata>) -> bool {
        self(class, method)
    }
}

/// 方法签名匹配：类名、方法名、可见性以及参数约束
#[derive(Clone)]
pub struct MethodPointcut {
    class: NamePattern,
    method: NamePattern,
    visibility: Option<Visibility>,
    constraints: Vec<RuntimeCondition>,
}

impl MethodPointcut {
    pub fn new(class_pattern: &str, method_pattern: &str) -> AopResult<Self> {
        Ok(Self {
            class: NamePattern::wildcard(class_pattern)?,
            method: NamePattern::wildcard(method_pattern)?,
            visibility: None,
            constraints: Vec::new(),
        })
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// 参数约束，例如 `name == "Andi"`，调用时求值
    pub fn where_argument(
        mut self,
        argument: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.constraints.push(RuntimeCondition::compare(
            Operand::argument(argument),
            operator,
            Operand::literal(value),
        ));
        self
    }

    fn evaluate(&self, class: &ClassMetadata, method: &MethodMetadata) -> Residual {
        let static_match = self.class.matches(&class.name)
            && self.method.matches(&method.name)
            && self.visibility.map_or(true, |v| v == method.visibility);

        if !static_match {
            return Residual::Never;
        }

        self.constraints
            .iter()
            .fold(Residual::Always, |residual, condition| {
                residual.and(Residual::Conditional(RuntimeFilter::Condition(Arc::new(
                    condition.clone(),
                ))))
            })
    }
}

impl fmt::Debug for MethodPointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method(")?;
        if let Some(visibility) = self.visibility {
            write!(f, "{} ", visibility)?;
        }
        write!(f, "{:?}->{:?}(", self.class, self.method)?;
        let constraints: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        write!(f, "{}))", constraints.join(", "))
    }
}

/// 切点表达式
///
/// 用于匹配连接点
#[derive(Clone)]
pub enum PointcutExpression {
    /// 匹配所有方法
    All,

    /// 按类名匹配，例如 `class(*Service)`
    Class(NamePattern),

    /// 按方法签名匹配，例如 `method(TargetClass01->sayHello())`
    Method(MethodPointcut),

    /// 类是给定类型或其子类型（含接口），例如 `within(SayHelloInterface)`
    Within(String),

    /// 类上带有匹配的注解
    ClassAnnotatedWith(NamePattern),

    /// 方法上带有匹配的注解
    MethodAnnotatedWith(NamePattern),

    /// 由布尔配置项开关，例如 `setting(Acme.Demo.enableLogging)`
    Setting(String),

    /// 运行时条件
    Evaluate(Arc<RuntimeCondition>),

    /// 自定义静态过滤器
    Filter(Arc<dyn PointcutFilter>),

    /// 引用命名切点，`Aspect->name` 或同切面内的 `name`
    Reference(String),

    /// 与运算（AND）
    And(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 或运算（OR）
    Or(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 非运算（NOT）
    Not(Box<PointcutExpression>),
}

impl PointcutExpression {
    pub fn class(pattern: &str) -> AopResult<Self> {
        Ok(PointcutExpression::Class(NamePattern::wildcard(pattern)?))
    }

    pub fn method(class_pattern: &str, method_pattern: &str) -> AopResult<Self> {
        Ok(PointcutExpression::Method(MethodPointcut::new(
            class_pattern,
            method_pattern,
        )?))
    }

    pub fn within(type_name: impl Into<String>) -> Self {
        PointcutExpression::Within(type_name.into())
    }

    pub fn class_annotated_with(pattern: &str) -> AopResult<Self> {
        Ok(PointcutExpression::ClassAnnotatedWith(NamePattern::wildcard(
            pattern,
        )?))
    }

    pub fn method_annotated_with(pattern: &str) -> AopResult<Self> {
        Ok(PointcutExpression::MethodAnnotatedWith(NamePattern::wildcard(
            pattern,
        )?))
    }

    pub fn setting(path: impl Into<String>) -> Self {
        PointcutExpression::Setting(path.into())
    }

    pub fn evaluate_condition(condition: RuntimeCondition) -> Self {
        PointcutExpression::Evaluate(Arc::new(condition))
    }

    pub fn filter(filter: impl PointcutFilter + 'static) -> Self {
        PointcutExpression::Filter(Arc::new(filter))
    }

    pub fn reference(name: impl Into<String>) -> Self {
        PointcutExpression::Reference(name.into())
    }

    /// 与运算
    pub fn and(self, other: PointcutExpression) -> Self {
        PointcutExpression::And(Box::new(self), Box::new(other))
    }

    /// 或运算
    pub fn or(self, other: PointcutExpression) -> Self {
        PointcutExpression::Or(Box::new(self), Box::new(other))
    }

    /// 非运算
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        PointcutExpression::Not(Box::new(self))
    }

    /// 表达式直接引用的命名切点（已限定为 `Aspect->name`）
    pub fn references(&self, aspect: &str) -> Vec<String> {
        let mut found = Vec::new();
        self.collect_references(aspect, &mut found);
        found
    }

    fn collect_references(&self, aspect: &str, found: &mut Vec<String>) {
        match self {
            PointcutExpression::Reference(name) => found.push(qualify(name, aspect)),
            PointcutExpression::And(l, r) | PointcutExpression::Or(l, r) => {
                l.collect_references(aspect, found);
                r.collect_references(aspect, found);
            }
            PointcutExpression::Not(e) => e.collect_references(aspect, found),
            _ => {}
        }
    }

    /// 静态匹配
    ///
    /// AND / OR 从左到右求值并短路。
    pub fn evaluate(&self, ctx: &MatchContext<'_>) -> AopResult<Residual> {
        let mut stack = Vec::new();
        self.evaluate_in(ctx, ctx.aspect, &mut stack)
    }

    fn evaluate_in(
        &self,
        ctx: &MatchContext<'_>,
        aspect: &str,
        stack: &mut Vec<String>,
    ) -> AopResult<Residual> {
        let residual = match self {
            PointcutExpression::All => Residual::Always,

            PointcutExpression::Class(pattern) => Residual::from_bool(pattern.matches(&ctx.class.name)),

            PointcutExpression::Method(method_pointcut) => match ctx.method {
                Some(method) => method_pointcut.evaluate(ctx.class, method),
                None => Residual::Never,
            },

            PointcutExpression::Within(type_name) => Residual::from_bool(
                ctx.weaving
                    .provider
                    .is_subtype_of(&ctx.class.name, type_name),
            ),

            PointcutExpression::ClassAnnotatedWith(pattern) => {
                Residual::from_bool(ctx.class.annotations.iter().any(|a| pattern.matches(a)))
            }

            PointcutExpression::MethodAnnotatedWith(pattern) => match ctx.method {
                Some(method) => {
                    Residual::from_bool(method.annotations.iter().any(|a| pattern.matches(a)))
                }
                None => Residual::Never,
            },

            PointcutExpression::Setting(path) => {
                match ctx.weaving.settings.get(path).and_then(|v| v.as_bool()) {
                    Some(enabled) => Residual::from_bool(enabled),
                    None => {
                        return Err(AopError::InvalidSetting {
                            path: path.clone(),
                            aspect: aspect.to_string(),
                        })
                    }
                }
            }

            PointcutExpression::Evaluate(condition) => {
                Residual::Conditional(RuntimeFilter::Condition(Arc::clone(condition)))
            }

            PointcutExpression::Filter(filter) => {
                Residual::from_bool(filter.matches(ctx.class, ctx.method))
            }

            PointcutExpression::Reference(name) => {
                let qualified = qualify(name, aspect);

                if let Some(start) = stack.iter().position(|n| *n == qualified) {
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(qualified);
                    return Err(AopError::CyclicPointcutReference { cycle });
                }

                let Some(pointcut) = ctx.weaving.pointcuts.get(&qualified) else {
                    let mut chain = stack.clone();
                    chain.push(qualified.clone());
                    return Err(AopError::UndefinedPointcut {
                        reference: qualified,
                        chain,
                    });
                };

                stack.push(qualified);
                let residual = pointcut
                    .expression()
                    .evaluate_in(ctx, pointcut.aspect(), stack)?;
                stack.pop();
                residual
            }

            PointcutExpression::And(left, right) => {
                let left = left.evaluate_in(ctx, aspect, stack)?;
                if left.is_never() {
                    return Ok(Residual::Never);
                }
                left.and(right.evaluate_in(ctx, aspect, stack)?)
            }

            PointcutExpression::Or(left, right) => {
                let left = left.evaluate_in(ctx, aspect, stack)?;
                if left.is_always() {
                    return Ok(Residual::Always);
                }
                left.or(right.evaluate_in(ctx, aspect, stack)?)
            }

            PointcutExpression::Not(inner) => inner.evaluate_in(ctx, aspect, stack)?.not(),
        };

        Ok(residual)
    }
}

impl fmt::Debug for PointcutExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointcutExpression::All => write!(f, "all()"),
            PointcutExpression::Class(p) => write!(f, "class({:?})", p),
            PointcutExpression::Method(m) => write!(f, "{:?}", m),
            PointcutExpression::Within(t) => write!(f, "within({})", t),
            PointcutExpression::ClassAnnotatedWith(p) => write!(f, "classAnnotatedWith({:?})", p),
            PointcutExpression::MethodAnnotatedWith(p) => {
                write!(f, "methodAnnotatedWith({:?})", p)
            }
            PointcutExpression::Setting(path) => write!(f, "setting({})", path),
            PointcutExpression::Evaluate(c) => write!(f, "evaluate({})", c),
            PointcutExpression::Filter(filter) => f.write_str(&filter.describe()),
            PointcutExpression::Reference(name) => f.write_str(name),
            PointcutExpression::And(l, r) => write!(f, "({:?} && {:?})", l, r),
            PointcutExpression::Or(l, r) => write!(f, "({:?} || {:?})", l, r),
            PointcutExpression::Not(e) => write!(f, "!{:?}", e),
        }
    }
}

/// 把引用名限定为 `Aspect->name`
pub fn qualify(reference: &str, aspect: &str) -> String {
    if reference.contains("->") {
        reference.to_string()
    } else {
        format!("{}->{}", aspect, reference)
    }
}

// ========== Named Pointcuts ==========

/// 命名切点
#[derive(Debug, Clone)]
pub struct Pointcut {
    aspect: String,
    name: String,
    expression: PointcutExpression,
}

impl Pointcut {
    pub fn new(aspect: impl Into<String>, name: impl Into<String>, expression: PointcutExpression) -> Self {
        Self {
            aspect: aspect.into(),
            name: name.into(),
            expression,
        }
    }

    pub fn aspect(&self) -> &str {
        &self.aspect
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Aspect->name`
    pub fn qualified_name(&self) -> String {
        format!("{}->{}", self.aspect, self.name)
    }

    pub fn expression(&self) -> &PointcutExpression {
        &self.expression
    }

    /// 该切点直接引用的其他命名切点
    pub fn references(&self) -> Vec<String> {
        self.expression.references(&self.aspect)
    }
}

/// 所有切面声明的命名切点，按限定名索引
#[derive(Debug, Clone, Default)]
pub struct NamedPointcuts {
    pointcuts: BTreeMap<String, Pointcut>,
}

impl NamedPointcuts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pointcut: Pointcut) -> AopResult<()> {
        let name = pointcut.qualified_name();
        if self.pointcuts.contains_key(&name) {
            return Err(AopError::DuplicatePointcut { name });
        }
        self.pointcuts.insert(name, pointcut);
        Ok(())
    }

    pub fn get(&self, qualified_name: &str) -> Option<&Pointcut> {
        self.pointcuts.get(qualified_name)
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.pointcuts.contains_key(qualified_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pointcut> {
        self.pointcuts.values()
    }

    pub fn len(&self) -> usize {
        self.pointcuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointcuts.is_empty()
    }

    /// 引用图：限定名 -> 直接引用的限定名
    pub fn reference_graph(&self) -> BTreeMap<String, Vec<String>> {
        self.pointcuts
            .iter()
            .map(|(name, pointcut)| (name.clone(), pointcut.references()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ClassRegistry;
    use weft_core::MapSource;

    fn fixture() -> (ClassRegistry, Settings) {
        let registry = ClassRegistry::new()
            .with_class(ClassMetadata::interface("SayHelloInterface"))
            .with_class(
                ClassMetadata::new("TargetClass01")
                    .implements("SayHelloInterface")
                    .with_annotation("Entity")
                    .with_method(MethodMetadata::new("sayHello").with_annotation("Cached"))
                    .with_method(
                        MethodMetadata::new("secret").with_visibility(Visibility::Private),
                    ),
            );
        let settings = Settings::new().with_source(
            MapSource::new("test")
                .with("Demo.enabled", true)
                .with("Demo.name", "x"),
        );
        (registry, settings)
    }

    fn eval(
        expression: &PointcutExpression,
        pointcuts: &NamedPointcuts,
        method: Option<&str>,
    ) -> AopResult<Residual> {
        let (registry, settings) = fixture();
        let class = registry.class("TargetClass01").unwrap();
        let method = method.and_then(|m| class.method(m));
        let weaving = WeavingContext::new(&registry, pointcuts, &settings);
        let ctx = weaving.matching("DemoAspect", &class, method);
        expression.evaluate(&ctx)
    }

    #[test]
    fn test_wildcard_patterns() {
        assert!(NamePattern::wildcard("*").unwrap().matches("Anything"));
        assert!(NamePattern::wildcard("User*").unwrap().matches("UserService"));
        assert!(NamePattern::wildcard("*Service").unwrap().matches("UserService"));
        assert!(NamePattern::wildcard("*Serv*").unwrap().matches("UserService"));
        assert!(!NamePattern::wildcard("User*").unwrap().matches("OrderService"));
        // 点号按字面匹配
        assert!(!NamePattern::wildcard("a.b*").unwrap().matches("axb"));
        assert!(NamePattern::regex("Target(Class)?0[1-9]").unwrap().matches("TargetClass01"));
    }

    #[test]
    fn test_invalid_regex_pattern() {
        let err = NamePattern::regex("Target(").err().unwrap();
        assert!(matches!(err, AopError::InvalidPattern { .. }));
    }

    #[test]
    fn test_static_designators() {
        let pointcuts = NamedPointcuts::new();

        let method = PointcutExpression::method("TargetClass01", "sayHello").unwrap();
        assert!(eval(&method, &pointcuts, Some("sayHello")).unwrap().is_always());
        assert!(eval(&method, &pointcuts, Some("secret")).unwrap().is_never());
        // 类级别匹配时方法指示符不匹配
        assert!(eval(&method, &pointcuts, None).unwrap().is_never());

        let within = PointcutExpression::within("SayHelloInterface");
        assert!(eval(&within, &pointcuts, None).unwrap().is_always());

        let annotated = PointcutExpression::class_annotated_with("Entity").unwrap();
        assert!(eval(&annotated, &pointcuts, None).unwrap().is_always());

        let cached = PointcutExpression::method_annotated_with("Cach*").unwrap();
        assert!(eval(&cached, &pointcuts, Some("sayHello")).unwrap().is_always());

        let private_only = PointcutExpression::Method(
            MethodPointcut::new("*", "*")
                .unwrap()
                .with_visibility(Visibility::Private),
        );
        assert!(eval(&private_only, &pointcuts, Some("secret")).unwrap().is_always());
        assert!(eval(&private_only, &pointcuts, Some("sayHello")).unwrap().is_never());
    }

    #[test]
    fn test_boolean_combinators() {
        let pointcuts = NamedPointcuts::new();
        let class = PointcutExpression::class("Target*").unwrap();

        let negated = class.clone().not();
        assert!(eval(&negated, &pointcuts, None).unwrap().is_never());

        let either = PointcutExpression::class("Other").unwrap().or(class.clone());
        assert!(eval(&either, &pointcuts, None).unwrap().is_always());

        let conditional = class.and(PointcutExpression::evaluate_condition(
            RuntimeCondition::truthy(Operand::argument("name")),
        ));
        assert!(matches!(
            eval(&conditional, &pointcuts, None).unwrap(),
            Residual::Conditional(_)
        ));
    }

    #[test]
    fn test_short_circuit_skips_right_operand() {
        let pointcuts = NamedPointcuts::new();
        // 右侧引用未定义，但左侧已确定不匹配
        let expression = PointcutExpression::class("Nope")
            .unwrap()
            .and(PointcutExpression::reference("undefined"));
        assert!(eval(&expression, &pointcuts, None).unwrap().is_never());
    }

    #[test]
    fn test_setting_designator() {
        let pointcuts = NamedPointcuts::new();

        let enabled = PointcutExpression::setting("Demo.enabled");
        assert!(eval(&enabled, &pointcuts, None).unwrap().is_always());

        let missing = PointcutExpression::setting("Demo.missing");
        assert!(matches!(
            eval(&missing, &pointcuts, None),
            Err(AopError::InvalidSetting { .. })
        ));

        let not_boolean = PointcutExpression::setting("Demo.name");
        assert!(eval(&not_boolean, &pointcuts, None).is_err());
    }

    #[test]
    fn test_named_references() {
        let mut pointcuts = NamedPointcuts::new();
        pointcuts
            .insert(Pointcut::new(
                "DemoAspect",
                "targets",
                PointcutExpression::class("Target*").unwrap(),
            ))
            .unwrap();
        pointcuts
            .insert(Pointcut::new(
                "OtherAspect",
                "greeters",
                PointcutExpression::reference("DemoAspect->targets"),
            ))
            .unwrap();

        let local = PointcutExpression::reference("targets");
        assert!(eval(&local, &pointcuts, None).unwrap().is_always());

        let qualified = PointcutExpression::reference("OtherAspect->greeters");
        assert!(eval(&qualified, &pointcuts, None).unwrap().is_always());

        let duplicate = pointcuts.insert(Pointcut::new("DemoAspect", "targets", PointcutExpression::All));
        assert!(matches!(duplicate, Err(AopError::DuplicatePointcut { .. })));
    }

    #[test]
    fn test_cyclic_reference_detected_during_evaluation() {
        let mut pointcuts = NamedPointcuts::new();
        pointcuts
            .insert(Pointcut::new("A", "pointcutA", PointcutExpression::reference("pointcutB")))
            .unwrap();
        pointcuts
            .insert(Pointcut::new("A", "pointcutB", PointcutExpression::reference("pointcutA")))
            .unwrap();

        let (registry, settings) = fixture();
        let class = registry.class("TargetClass01").unwrap();
        let weaving = WeavingContext::new(&registry, &pointcuts, &settings);
        let ctx = weaving.matching("A", &class, None);

        match PointcutExpression::reference("pointcutA").evaluate(&ctx) {
            Err(AopError::CyclicPointcutReference { cycle }) => {
                assert_eq!(cycle, vec!["A->pointcutA", "A->pointcutB", "A->pointcutA"]);
            }
            other => panic!("expected cycle, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_reference_graph() {
        let mut pointcuts = NamedPointcuts::new();
        pointcuts
            .insert(Pointcut::new(
                "A",
                "both",
                PointcutExpression::reference("left").or(PointcutExpression::reference("B->right").not()),
            ))
            .unwrap();

        let graph = pointcuts.reference_graph();
        assert_eq!(graph["A->both"], vec!["A->left", "B->right"]);
    }
}
