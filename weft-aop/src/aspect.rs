//! 切面（Aspect）定义
//!
//! 切面是横切关注点的模块化。每个切面在织入前被展开成一个
//! [`AspectContainer`]，其中保存它声明的通知器、引入和命名切点。

use crate::advice::Advice;
use crate::advisor::Advisor;
use crate::error::{AopError, AopResult};
use crate::introduction::{InterfaceDefinition, InterfaceIntroduction, PropertyIntroduction};
use crate::metadata::{ClassMetadata, ClassNameIndex, MethodMetadata, PropertyMetadata};
use crate::pointcut::{Pointcut, PointcutExpression, Residual, WeavingContext};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// 切面 Trait
///
/// 实现此 trait 以定义切面逻辑。`declare` 接收 `Arc<Self>`，通知闭包可以
/// 持有切面实例本身。
pub trait Aspect: Send + Sync {
    /// 切面名称
    fn name(&self) -> &str;

    /// 向容器声明通知、引入和命名切点
    fn declare(self: Arc<Self>, container: &mut AspectContainer) -> AopResult<()>;
}

/// 切面注册器
///
/// 用于 inventory 自动收集和注册切面
pub struct AspectRegistration {
    /// 切面名称
    pub name: &'static str,

    /// 创建切面实例的函数
    pub creator: fn() -> Arc<dyn Aspect>,
}

impl AspectRegistration {
    /// 创建新的切面注册器
    pub const fn new(name: &'static str, creator: fn() -> Arc<dyn Aspect>) -> Self {
        Self { name, creator }
    }

    /// 创建切面实例
    pub fn create_instance(&self) -> Arc<dyn Aspect> {
        (self.creator)()
    }
}

// 使用 inventory 收集所有切面注册器
inventory::collect!(AspectRegistration);

/// 获取所有注册的切面注册器
pub fn get_all_aspect_registrations() -> impl Iterator<Item = &'static AspectRegistration> {
    inventory::iter::<AspectRegistration>()
}

/// 一个切面的全部声明
pub struct AspectContainer {
    name: String,
    instance: Option<Arc<dyn Aspect>>,
    advisors: Vec<Advisor>,
    interface_introductions: Vec<InterfaceIntroduction>,
    property_introductions: Vec<PropertyIntroduction>,
    pointcuts: Vec<Pointcut>,
    /// 上一次缩减的 (候选集合, 结果)
    reduction_cache: Mutex<Option<(ClassNameIndex, ClassNameIndex)>>,
}

impl AspectContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: None,
            advisors: Vec::new(),
            interface_introductions: Vec::new(),
            property_introductions: Vec::new(),
            pointcuts: Vec::new(),
            reduction_cache: Mutex::new(None),
        }
    }

    /// 由切面实例展开
    pub fn from_aspect(aspect: Arc<dyn Aspect>) -> AopResult<Self> {
        let mut container = Self::new(aspect.name());
        container.instance = Some(Arc::clone(&aspect));
        aspect.declare(&mut container)?;

        tracing::debug!(
            "Declared aspect {}: {} advisor(s), {} introduction(s), {} pointcut(s)",
            container.name,
            container.advisors.len(),
            container.interface_introductions.len() + container.property_introductions.len(),
            container.pointcuts.len()
        );
        Ok(container)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> Option<&Arc<dyn Aspect>> {
        self.instance.as_ref()
    }

    pub fn add_advisor(&mut self, advisor: Advisor) -> AopResult<()> {
        if advisor.aspect() != self.name {
            return Err(AopError::MalformedAdvisor {
                aspect: self.name.clone(),
                reason: format!(
                    "advice '{}' belongs to aspect '{}'",
                    advisor.advice().name(),
                    advisor.aspect()
                ),
            });
        }
        if self
            .advisors
            .iter()
            .any(|existing| existing.advice().name() == advisor.advice().name())
        {
            return Err(AopError::MalformedAdvisor {
                aspect: self.name.clone(),
                reason: format!("advice '{}' is declared more than once", advisor.advice().name()),
            });
        }
        self.advisors.push(advisor);
        Ok(())
    }

    /// 声明一个通知
    pub fn advise(&mut self, advice: Advice, pointcut: PointcutExpression) -> AopResult<()> {
        self.add_advisor(Advisor::new(advice, pointcut))
    }

    /// 声明命名切点，之后可以用 `name` 或 `Aspect->name` 引用
    pub fn add_pointcut(&mut self, name: &str, expression: PointcutExpression) -> AopResult<()> {
        if self.pointcuts.iter().any(|p| p.name() == name) {
            return Err(AopError::DuplicatePointcut {
                name: format!("{}->{}", self.name, name),
            });
        }
        self.pointcuts.push(Pointcut::new(self.name.as_str(), name, expression));
        Ok(())
    }

    pub fn introduce_interface(&mut self, interface: InterfaceDefinition, pointcut: PointcutExpression) {
        self.interface_introductions
            .push(InterfaceIntroduction::new(self.name.as_str(), interface, pointcut));
    }

    pub fn introduce_property(&mut self, property: PropertyMetadata, pointcut: PointcutExpression) {
        self.property_introductions
            .push(PropertyIntroduction::new(self.name.as_str(), property, pointcut));
    }

    pub fn advisors(&self) -> &[Advisor] {
        &self.advisors
    }

    pub fn interface_introductions(&self) -> &[InterfaceIntroduction] {
        &self.interface_introductions
    }

    pub fn property_introductions(&self) -> &[PropertyIntroduction] {
        &self.property_introductions
    }

    pub fn pointcuts(&self) -> &[Pointcut] {
        &self.pointcuts
    }

    /// 在候选类中筛选出可能被本切面影响的类
    ///
    /// 只做静态匹配：类的任一可拦截方法可能匹配某个通知器，或类本身可能匹配
    /// 某个引入。同一候选集合的结果会被缓存。
    pub fn reduce_target_class_names(
        &self,
        candidates: &ClassNameIndex,
        ctx: &WeavingContext<'_>,
    ) -> AopResult<ClassNameIndex> {
        if let Some((cached_candidates, reduced)) = self.reduction_cache.lock().as_ref() {
            if cached_candidates == candidates {
                return Ok(reduced.clone());
            }
        }

        let mut reduced = ClassNameIndex::new();
        for class_name in candidates {
            let Some(class) = ctx.provider.class(class_name) else {
                continue;
            };
            if self.may_affect(&class, ctx)? {
                reduced.insert(class_name.clone());
            }
        }

        tracing::debug!(
            "Aspect {} reduced {} candidate class(es) to {}",
            self.name,
            candidates.len(),
            reduced.len()
        );
        *self.reduction_cache.lock() = Some((candidates.clone(), reduced.clone()));
        Ok(reduced)
    }

    pub fn clear_cache(&self) {
        *self.reduction_cache.lock() = None;
    }

    fn may_affect(&self, class: &ClassMetadata, ctx: &WeavingContext<'_>) -> AopResult<bool> {
        for advisor in &self.advisors {
            for method in class.methods.iter().filter(|m| m.is_advisable()) {
                if self
                    .evaluate(advisor.pointcut(), class, Some(method), ctx)?
                    .may_match()
                {
                    return Ok(true);
                }
            }
        }

        let introduction_pointcuts = self
            .interface_introductions
            .iter()
            .map(InterfaceIntroduction::pointcut)
            .chain(self.property_introductions.iter().map(PropertyIntroduction::pointcut));
        for pointcut in introduction_pointcuts {
            if self.evaluate(pointcut, class, None, ctx)?.may_match() {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// 在本切面的上下文中匹配，错误附带切面与类名
    pub(crate) fn evaluate(
        &self,
        expression: &PointcutExpression,
        class: &ClassMetadata,
        method: Option<&MethodMetadata>,
        ctx: &WeavingContext<'_>,
    ) -> AopResult<Residual> {
        expression
            .evaluate(&ctx.matching(&self.name, class, method))
            .map_err(|e| AopError::Weaving {
                aspect: self.name.clone(),
                class: class.name.clone(),
                source: Box::new(e),
            })
    }
}

impl fmt::Debug for AspectContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectContainer")
            .field("name", &self.name)
            .field("advisors", &self.advisors)
            .field("interface_introductions", &self.interface_introductions)
            .field("property_introductions", &self.property_introductions)
            .field("pointcuts", &self.pointcuts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ClassMetadataProvider, ClassRegistry};
    use crate::pointcut::NamedPointcuts;
    use weft_core::Settings;

    struct GreetingAspect;

    impl Aspect for GreetingAspect {
        fn name(&self) -> &str {
            "GreetingAspect"
        }

        fn declare(self: Arc<Self>, container: &mut AspectContainer) -> AopResult<()> {
            container.add_pointcut("greeters", PointcutExpression::method("*", "sayHello")?)?;
            container.advise(
                Advice::before("GreetingAspect", "wave", |_jp| Ok(())),
                PointcutExpression::reference("greeters"),
            )?;
            container.introduce_property(
                PropertyMetadata::new("greeted"),
                PointcutExpression::class("Marked*")?,
            );
            Ok(())
        }
    }

    fn registry() -> ClassRegistry {
        ClassRegistry::new()
            .with_class(ClassMetadata::new("Greeter").with_method(MethodMetadata::new("sayHello")))
            .with_class(
                ClassMetadata::new("StaticGreeter")
                    .with_method(MethodMetadata::new("sayHello").static_method()),
            )
            .with_class(ClassMetadata::new("MarkedEntity"))
            .with_class(ClassMetadata::new("Unrelated").with_method(MethodMetadata::new("run")))
    }

    fn pointcuts_of(container: &AspectContainer) -> NamedPointcuts {
        let mut pointcuts = NamedPointcuts::new();
        for pointcut in container.pointcuts() {
            pointcuts.insert(pointcut.clone()).unwrap();
        }
        pointcuts
    }

    #[test]
    fn test_from_aspect() {
        let container = AspectContainer::from_aspect(Arc::new(GreetingAspect)).unwrap();
        assert_eq!(container.name(), "GreetingAspect");
        assert_eq!(container.advisors().len(), 1);
        assert_eq!(container.pointcuts().len(), 1);
        assert_eq!(container.property_introductions().len(), 1);
        assert!(container.instance().is_some());
    }

    #[test]
    fn test_advisor_from_other_aspect_is_rejected() {
        let mut container = AspectContainer::new("Mine");
        let result = container.advise(
            Advice::after("Theirs", "cleanup", |_jp| Ok(())),
            PointcutExpression::All,
        );
        assert!(matches!(result, Err(AopError::MalformedAdvisor { .. })));
    }

    #[test]
    fn test_duplicate_advice_name_is_rejected() {
        let mut container = AspectContainer::new("A");
        container
            .advise(Advice::before("A", "guard", |_jp| Ok(())), PointcutExpression::All)
            .unwrap();
        let result = container.advise(
            Advice::after("A", "guard", |_jp| Ok(())),
            PointcutExpression::reference("nowhere"),
        );
        assert!(matches!(
            result,
            Err(AopError::MalformedAdvisor { reason, .. }) if reason.contains("more than once")
        ));
        assert_eq!(container.advisors().len(), 1);
    }

    #[test]
    fn test_duplicate_pointcut() {
        let mut container = AspectContainer::new("A");
        container.add_pointcut("p", PointcutExpression::All).unwrap();
        let result = container.add_pointcut("p", PointcutExpression::All);
        assert!(matches!(result, Err(AopError::DuplicatePointcut { name }) if name == "A->p"));
    }

    #[test]
    fn test_reduce_target_class_names() {
        let container = AspectContainer::from_aspect(Arc::new(GreetingAspect)).unwrap();
        let registry = registry();
        let pointcuts = pointcuts_of(&container);
        let settings = Settings::new();
        let ctx = WeavingContext::new(&registry, &pointcuts, &settings);

        let all = registry.class_names();
        let reduced = container.reduce_target_class_names(&all, &ctx).unwrap();
        let expected: ClassNameIndex = ["Greeter", "MarkedEntity"].iter().map(|s| s.to_string()).collect();
        assert_eq!(reduced, expected);

        // 幂等
        assert_eq!(container.reduce_target_class_names(&reduced, &ctx).unwrap(), reduced);

        // 单调
        let subset: ClassNameIndex = ["Greeter", "Unrelated"].iter().map(|s| s.to_string()).collect();
        let reduced_subset = container.reduce_target_class_names(&subset, &ctx).unwrap();
        assert!(reduced_subset.is_subset(&reduced));

        container.clear_cache();
        assert_eq!(container.reduce_target_class_names(&all, &ctx).unwrap(), expected);
    }

    #[test]
    fn test_evaluation_errors_carry_context() {
        let mut container = AspectContainer::new("Broken");
        container
            .advise(
                Advice::before("Broken", "b", |_jp| Ok(())),
                PointcutExpression::reference("missing"),
            )
            .unwrap();

        let registry = registry();
        let pointcuts = NamedPointcuts::new();
        let settings = Settings::new();
        let ctx = WeavingContext::new(&registry, &pointcuts, &settings);

        let err = container
            .reduce_target_class_names(&registry.class_names(), &ctx)
            .unwrap_err();
        match err {
            AopError::Weaving { aspect, source, .. } => {
                assert_eq!(aspect, "Broken");
                assert!(matches!(*source, AopError::UndefinedPointcut { .. }));
            }
            other => panic!("expected weaving error, got {:?}", other),
        }
    }
}
