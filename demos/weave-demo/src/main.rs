use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use weft_aop::prelude::*;
use weft_aop::{ExceptionHandlingAspect, LoggingAspect, PerformanceAspect, PropertyMetadata};
use weft_core::{EnvSource, LoggingConfig, Settings, TomlSource};

const APPLICATION_TOML: &str = include_str!("../config/application.toml");
const CLASSES_JSON: &str = include_str!("../config/classes.json");

// ==================== 切面定义 ====================

/// 问候切面 - 扩展返回值并引入审计接口
struct GreetingAspect;

impl GreetingAspect {
    const NAME: &'static str = "GreetingAspect";
}

impl Aspect for GreetingAspect {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn declare(self: Arc<Self>, container: &mut AspectContainer) -> AopResult<()> {
        container.add_pointcut("greetings", PointcutExpression::within("GreetingInterface"))?;

        container.advise(
            Advice::around(Self::NAME, "extendSayHello", |jp| {
                let result = jp.proceed()?;
                Ok(json!(format!("{} World", result.as_str().unwrap_or_default())))
            }),
            PointcutExpression::reference("greetings")
                .and(PointcutExpression::method("*", "sayHello")?),
        )?;

        // 只对 acme 租户生效
        container.advise(
            Advice::before(Self::NAME, "politeGreeting", |jp| {
                let name = jp.argument("name").and_then(Value::as_str).unwrap_or("stranger");
                let polite = format!("dear {}", name);
                jp.set_argument("name", polite);
                Ok(())
            })
            .with_priority(10),
            PointcutExpression::method("GreetingService", "greet")?.and(
                PointcutExpression::evaluate_condition(RuntimeCondition::equals(
                    Operand::global("tenant"),
                    Operand::literal("acme"),
                )),
            ),
        )?;

        container.advise(
            Advice::after_throwing(Self::NAME, "recoverDivision", |jp| {
                if jp.argument("divisor") == Some(&json!(0)) {
                    jp.recover(0);
                }
                Ok(())
            }),
            PointcutExpression::method("GreetingService", "divide")?,
        )?;

        container.introduce_interface(
            InterfaceDefinition::new("Auditable").with_method(MethodMetadata::new("auditTrail")),
            PointcutExpression::reference("greetings"),
        );
        container.introduce_property(
            PropertyMetadata::new("auditLog")
                .with_visibility(Visibility::Protected)
                .with_default(json!([])),
            PointcutExpression::reference("greetings"),
        );

        container.advise(
            Advice::around(Self::NAME, "auditTrail", |jp| {
                Ok(jp.proxy().property("auditLog").unwrap_or(Value::Null))
            }),
            PointcutExpression::method("*", "auditTrail")?,
        )?;
        container.advise(
            Advice::after_returning(Self::NAME, "recordAudit", |jp| {
                let mut log = jp.proxy().property("auditLog").unwrap_or_else(|| json!([]));
                if let Some(entries) = log.as_array_mut() {
                    entries.push(json!(jp.signature()));
                }
                jp.proxy().set_property("auditLog", log);
                Ok(())
            }),
            PointcutExpression::method("GreetingService", "greet")?,
        )
    }
}

fn create_greeting_aspect() -> Arc<dyn Aspect> {
    Arc::new(GreetingAspect)
}

weft_aop::inventory::submit! {
    AspectRegistration::new(GreetingAspect::NAME, create_greeting_aspect)
}

// ==================== 业务方法 ====================

fn greet(jp: &mut JoinPoint<'_>) -> anyhow::Result<Value> {
    let name = jp.argument("name").and_then(Value::as_str).unwrap_or("nobody");
    Ok(json!(format!("Hello {}", name)))
}

fn divide(jp: &mut JoinPoint<'_>) -> anyhow::Result<Value> {
    let dividend = jp.argument("dividend").and_then(Value::as_i64).unwrap_or(0);
    let divisor = jp.argument("divisor").and_then(Value::as_i64).unwrap_or(0);
    if divisor == 0 {
        anyhow::bail!("division by zero");
    }
    Ok(json!(dividend / divisor))
}

fn main() -> anyhow::Result<()> {
    let settings = Arc::new(
        Settings::new()
            .with_source(TomlSource::parse(APPLICATION_TOML, "application.toml")?)
            .with_source(EnvSource::new("WEFT_")),
    );
    LoggingConfig::from_settings(&settings).init()?;

    println!("🧵 Weft weaving demo\n");

    // ==================== 织入 ====================

    let classes = Arc::new(ClassRegistry::from_json(CLASSES_JSON)?);

    let mut weaver = Weaver::from_settings(Arc::clone(&settings))?;
    weaver.auto_load_aspects()?;

    let services = PointcutExpression::class("GreetingService")?;
    weaver.register_aspect(Arc::new(
        LoggingAspect::new(PointcutExpression::setting("Demo.logging.enabled").and(services.clone()))
            .with_args(),
    ))?;
    weaver.register_aspect(Arc::new(PerformanceAspect::new(
        Duration::from_millis(50),
        services.clone(),
    )))?;
    weaver.register_aspect(Arc::new(ExceptionHandlingAspect::new(services)))?;

    let registry = weaver.weave(classes)?;
    for woven in registry.woven_classes() {
        let methods: Vec<&str> = woven.advised_methods().map(|(name, _)| name).collect();
        println!("📦 {} advised methods: {:?}", woven.name(), methods);
    }

    let invoker = Arc::new(ProxyInvoker::new(registry, weaver.config()));

    // ==================== 调用 ====================

    let service = ProxyInstance::new("GreetingService", Arc::clone(&invoker));
    service.construct(
        Arguments::new(),
        |jp| {
            if let Some(name) = jp.argument("name").cloned() {
                jp.proxy().set_property("currentName", name);
            }
            Ok(Value::Null)
        },
        |proxy| {
            println!("🚀 {} initialized", proxy.class_name());
            Ok(())
        },
    )?;

    let hello = advised!(service, "sayHello", |_jp| Ok(json!("Hello")))?;
    println!("👋 sayHello() = {}", hello);

    let greeting = advised!(service, "greet", { "name": "Robert" }, greet)?;
    println!("👋 greet(Robert) = {}", greeting);

    let quotient = advised!(service, "divide", { "dividend": 10, "divisor": 0 }, divide)?;
    println!("➗ divide(10, 0) = {}", quotient);

    println!("🔍 implements Auditable: {}", service.implements("Auditable"));
    let trail = service.invoke_introduced("auditTrail", Arguments::new())?;
    println!("📜 auditTrail() = {}", trail);

    println!("\n✅ {} advice chain(s) built", invoker.chains_built());
    Ok(())
}
