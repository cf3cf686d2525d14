//! 织入器
//!
//! 在应用启动时运行一次：校验命名切点、按切面缩减候选类，然后为每个目标类
//! 计算引入的接口/属性以及每个方法上排好序的通知。结果是只读的
//! [`WeavingRegistry`]，交给 [`ProxyInvoker`](crate::ProxyInvoker) 在调用时使用。

use crate::advice_chain::ChainLink;
use crate::aspect::{get_all_aspect_registrations, Aspect, AspectContainer};
use crate::config::AopConfig;
use crate::error::{AopError, AopResult};
use crate::introduction::InterfaceDefinition;
use crate::metadata::{ClassMetadata, ClassMetadataProvider, ClassNameIndex, MethodMetadata, PropertyMetadata};
use crate::pointcut::{NamedPointcuts, WeavingContext};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use weft_core::{validate_reference_graph, Settings};

/// 织入后的类：代理生成所需的全部信息
#[derive(Debug, Clone)]
pub struct WovenClass {
    metadata: Arc<ClassMetadata>,
    interfaces: Vec<InterfaceDefinition>,
    properties: Vec<PropertyMetadata>,
    introduced_methods: Vec<MethodMetadata>,
    advised_methods: BTreeMap<String, Vec<ChainLink>>,
}

impl WovenClass {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &Arc<ClassMetadata> {
        &self.metadata
    }

    pub fn introduced_interfaces(&self) -> &[InterfaceDefinition] {
        &self.interfaces
    }

    pub fn introduced_properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    /// 由引入的接口带来、类本身没有声明的方法
    pub fn introduced_methods(&self) -> &[MethodMetadata] {
        &self.introduced_methods
    }

    pub fn introduced_method(&self, name: &str) -> Option<&MethodMetadata> {
        self.introduced_methods.iter().find(|m| m.name == name)
    }

    pub fn introduces_interface(&self, name: &str) -> bool {
        self.interfaces.iter().any(|i| i.name == name)
    }

    /// 方法名 -> 按执行顺序排列的通知
    pub fn advised_methods(&self) -> impl Iterator<Item = (&str, &[ChainLink])> {
        self.advised_methods
            .iter()
            .map(|(name, links)| (name.as_str(), links.as_slice()))
    }

    pub fn bindings(&self, method: &str) -> &[ChainLink] {
        self.advised_methods
            .get(method)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_advised(&self, method: &str) -> bool {
        self.advised_methods.contains_key(method)
    }
}

/// 织入结果，织入完成后只读
#[derive(Clone)]
pub struct WeavingRegistry {
    classes: BTreeMap<String, Arc<WovenClass>>,
    provider: Arc<dyn ClassMetadataProvider>,
}

impl WeavingRegistry {
    /// 不包含任何织入类的注册表
    pub fn empty(provider: Arc<dyn ClassMetadataProvider>) -> Self {
        Self {
            classes: BTreeMap::new(),
            provider,
        }
    }

    pub fn woven_class(&self, name: &str) -> Option<Arc<WovenClass>> {
        self.classes.get(name).cloned()
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn woven_classes(&self) -> impl Iterator<Item = &Arc<WovenClass>> {
        self.classes.values()
    }

    pub fn provider(&self) -> &Arc<dyn ClassMetadataProvider> {
        &self.provider
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl fmt::Debug for WeavingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeavingRegistry")
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 织入器
pub struct Weaver {
    containers: Vec<AspectContainer>,
    config: AopConfig,
    settings: Arc<Settings>,
}

impl Weaver {
    pub fn new(config: AopConfig) -> Self {
        Self {
            containers: Vec::new(),
            config,
            settings: Arc::new(Settings::new()),
        }
    }

    /// 从配置创建，`setting()` 切点也读取同一份配置
    pub fn from_settings(settings: Arc<Settings>) -> AopResult<Self> {
        let config = AopConfig::from_settings(&settings)?;
        Ok(Self {
            containers: Vec::new(),
            config,
            settings,
        })
    }

    pub fn with_settings(mut self, settings: Arc<Settings>) -> Self {
        self.settings = settings;
        self
    }

    pub fn config(&self) -> &AopConfig {
        &self.config
    }

    pub fn containers(&self) -> &[AspectContainer] {
        &self.containers
    }

    pub fn register(&mut self, container: AspectContainer) -> AopResult<()> {
        if self.containers.iter().any(|c| c.name() == container.name()) {
            return Err(AopError::MalformedAdvisor {
                aspect: container.name().to_string(),
                reason: "aspect is registered more than once".to_string(),
            });
        }
        tracing::debug!("Registering aspect: {}", container.name());
        self.containers.push(container);
        Ok(())
    }

    pub fn register_aspect(&mut self, aspect: Arc<dyn Aspect>) -> AopResult<()> {
        self.register(AspectContainer::from_aspect(aspect)?)
    }

    /// 从 inventory 自动加载所有注册的切面
    ///
    /// 使用示例：
    /// ```ignore
    /// inventory::submit! {
    ///     AspectRegistration::new("AuditAspect", create_audit_aspect)
    /// }
    ///
    /// let mut weaver = Weaver::new(AopConfig::default());
    /// weaver.auto_load_aspects()?;
    /// ```
    pub fn auto_load_aspects(&mut self) -> AopResult<usize> {
        let registrations: Vec<_> = get_all_aspect_registrations().collect();
        tracing::info!("Auto-loading {} aspect(s) from registry", registrations.len());

        for registration in &registrations {
            tracing::debug!("  ├─ Loading aspect: {}", registration.name);
            self.register_aspect(registration.create_instance())?;
        }

        Ok(registrations.len())
    }

    /// 织入
    pub fn weave(&self, provider: Arc<dyn ClassMetadataProvider>) -> AopResult<WeavingRegistry> {
        tracing::info!("🧵 Weaving {} aspect(s)", self.containers.len());

        // 类元数据、配置和命名切点都可能已经变化，上一次的缩减结果不能复用
        for container in &self.containers {
            container.clear_cache();
        }

        let pointcuts = self.collect_pointcuts()?;
        self.validate_references(&pointcuts)?;

        let universe: ClassNameIndex = provider
            .class_names()
            .into_iter()
            .filter(|name| {
                provider
                    .class(name)
                    .map_or(false, |class| class.is_weavable())
                    && !self.config.is_excluded(name)
            })
            .collect();

        let ctx = WeavingContext::new(provider.as_ref(), &pointcuts, &self.settings);

        let mut targets = ClassNameIndex::new();
        for container in &self.containers {
            targets.extend(container.reduce_target_class_names(&universe, &ctx)?);
        }

        let mut classes = BTreeMap::new();
        for class_name in &targets {
            let Some(class) = provider.class(class_name) else {
                continue;
            };
            let woven = self.weave_class(class, &ctx)?;
            tracing::debug!(
                "  ├─ {}: {} advised method(s), {} interface(s), {} property(ies)",
                class_name,
                woven.advised_methods.len(),
                woven.interfaces.len(),
                woven.properties.len()
            );
            classes.insert(class_name.clone(), Arc::new(woven));
        }

        tracing::info!(
            "✅ Woven {} of {} candidate class(es)",
            classes.len(),
            universe.len()
        );

        Ok(WeavingRegistry { classes, provider })
    }

    fn collect_pointcuts(&self) -> AopResult<NamedPointcuts> {
        let mut pointcuts = NamedPointcuts::new();
        for container in &self.containers {
            for pointcut in container.pointcuts() {
                pointcuts.insert(pointcut.clone())?;
            }
        }
        Ok(pointcuts)
    }

    /// 命名切点以及通知器 / 引入对它们的引用必须存在且无环
    fn validate_references(&self, pointcuts: &NamedPointcuts) -> AopResult<()> {
        let mut graph = pointcuts.reference_graph();

        for container in &self.containers {
            let aspect = container.name();
            // 同名的声明合并引用，不能互相覆盖
            for advisor in container.advisors() {
                graph
                    .entry(format!("{}->@{}", aspect, advisor.advice().name()))
                    .or_default()
                    .extend(advisor.pointcut().references(aspect));
            }
            for introduction in container.interface_introductions() {
                graph
                    .entry(format!("{}->@introduce {}", aspect, introduction.interface().name))
                    .or_default()
                    .extend(introduction.pointcut().references(aspect));
            }
            for introduction in container.property_introductions() {
                graph
                    .entry(format!("{}->@introduce ${}", aspect, introduction.property().name))
                    .or_default()
                    .extend(introduction.pointcut().references(aspect));
            }
        }

        validate_reference_graph(&graph).map_err(AopError::from)
    }

    fn weave_class(&self, class: Arc<ClassMetadata>, ctx: &WeavingContext<'_>) -> AopResult<WovenClass> {
        let (interfaces, properties) = self.introductions_for(&class, ctx)?;

        let introduced_methods: Vec<MethodMetadata> = interfaces
            .iter()
            .flat_map(|interface| interface.methods.iter())
            .filter(|method| class.method(&method.name).is_none())
            .cloned()
            .collect();

        let candidates = class
            .methods
            .iter()
            .filter(|m| m.is_advisable())
            .chain(introduced_methods.iter());

        let mut advised_methods = BTreeMap::new();
        for method in candidates {
            let links = self.bindings_for(&class, method, ctx)?;
            if !links.is_empty() {
                advised_methods.insert(method.name.clone(), links);
            }
        }

        Ok(WovenClass {
            metadata: class,
            interfaces,
            properties,
            introduced_methods,
            advised_methods,
        })
    }

    /// 方法上的通知：优先级降序，同优先级按全局声明顺序
    fn bindings_for(
        &self,
        class: &ClassMetadata,
        method: &MethodMetadata,
        ctx: &WeavingContext<'_>,
    ) -> AopResult<Vec<ChainLink>> {
        let mut matched = Vec::new();
        let mut declaration_index = 0usize;

        for container in &self.containers {
            for advisor in container.advisors() {
                let residual = container.evaluate(advisor.pointcut(), class, Some(method), ctx)?;
                if residual.may_match() {
                    matched.push((
                        advisor.advice().priority(),
                        declaration_index,
                        ChainLink::new(advisor.advice().clone(), residual.into_filter()),
                    ));
                }
                declaration_index += 1;
            }
        }

        matched.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(matched.into_iter().map(|(_, _, link)| link).collect())
    }

    fn introductions_for(
        &self,
        class: &ClassMetadata,
        ctx: &WeavingContext<'_>,
    ) -> AopResult<(Vec<InterfaceDefinition>, Vec<PropertyMetadata>)> {
        let mut interfaces: Vec<InterfaceDefinition> = Vec::new();
        let mut interface_owners: HashMap<String, String> = HashMap::new();
        let mut properties: Vec<PropertyMetadata> = Vec::new();
        let mut property_owners: HashMap<String, String> = HashMap::new();

        for container in &self.containers {
            for introduction in container.interface_introductions() {
                // 运行时条件在类级别无法求值，可能匹配即引入
                if !container
                    .evaluate(introduction.pointcut(), class, None, ctx)?
                    .may_match()
                {
                    continue;
                }

                let interface = introduction.interface();
                if ctx.provider.is_subtype_of(&class.name, &interface.name) {
                    tracing::debug!(
                        "{} already implements {}, skipping introduction by {}",
                        class.name,
                        interface.name,
                        container.name()
                    );
                    continue;
                }

                match interfaces.iter().find(|i| i.name == interface.name) {
                    Some(existing) if existing == interface => {}
                    Some(_) => {
                        return Err(AopError::InterfaceIntroductionConflict {
                            class: class.name.clone(),
                            interface: interface.name.clone(),
                            introduced_by: container.name().to_string(),
                            existing: interface_owners
                                .get(&interface.name)
                                .cloned()
                                .unwrap_or_default(),
                        })
                    }
                    None => {
                        interface_owners.insert(interface.name.clone(), container.name().to_string());
                        interfaces.push(interface.clone());
                    }
                }
            }

            for introduction in container.property_introductions() {
                if !container
                    .evaluate(introduction.pointcut(), class, None, ctx)?
                    .may_match()
                {
                    continue;
                }

                let property = introduction.property();
                let existing = if class.property(&property.name).is_some() {
                    Some(class.name.clone())
                } else {
                    property_owners.get(&property.name).cloned()
                };

                if let Some(existing) = existing {
                    return Err(AopError::PropertyIntroductionCollision {
                        class: class.name.clone(),
                        property: property.name.clone(),
                        introduced_by: container.name().to_string(),
                        existing,
                    });
                }

                property_owners.insert(property.name.clone(), container.name().to_string());
                properties.push(property.clone());
            }
        }

        Ok((interfaces, properties))
    }
}

impl Default for Weaver {
    fn default() -> Self {
        Self::new(AopConfig::default())
    }
}
