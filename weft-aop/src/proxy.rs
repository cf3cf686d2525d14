//! 代理实例
//!
//! 运行时的包装对象：持有织入后的类、调用器和属性，所有方法调用都经由
//! [`ProxyInstance::invoke`] 进入通知链。

use crate::error::AopError;
use crate::invoker::ProxyInvoker;
use crate::joinpoint::{Arguments, JoinPoint};
use crate::metadata::CONSTRUCTOR_METHOD;
use crate::weaver::WovenClass;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

pub struct ProxyInstance {
    class_name: String,
    invoker: Arc<ProxyInvoker>,
    properties: RwLock<Map<String, Value>>,
    /// 正在通知链中执行的 (线程, 方法)
    advice_mode: Mutex<HashSet<(ThreadId, String)>>,
    initialized: OnceCell<()>,
}

impl ProxyInstance {
    /// 创建代理实例，属性按声明的默认值和引入属性的默认值初始化
    pub fn new(class_name: impl Into<String>, invoker: Arc<ProxyInvoker>) -> Self {
        let class_name = class_name.into();
        let registry = invoker.registry();
        let woven = registry.woven_class(&class_name);

        let mut properties = Map::new();
        if let Some(metadata) = registry.provider().class(&class_name) {
            for property in &metadata.properties {
                properties.insert(
                    property.name.clone(),
                    property.default.clone().unwrap_or(Value::Null),
                );
            }
        }
        if let Some(woven) = &woven {
            for property in woven.introduced_properties() {
                properties.insert(
                    property.name.clone(),
                    property.default.clone().unwrap_or(Value::Null),
                );
            }
        }

        Self {
            class_name,
            invoker,
            properties: RwLock::new(properties),
            advice_mode: Mutex::new(HashSet::new()),
            initialized: OnceCell::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// 当前织入结果中的类；调用器重新加载后随之变化
    pub fn woven_class(&self) -> Option<Arc<WovenClass>> {
        self.invoker.registry().woven_class(&self.class_name)
    }

    pub fn invoker(&self) -> &Arc<ProxyInvoker> {
        &self.invoker
    }

    /// 类是否（传递地）声明或通过引入获得了某个类型
    pub fn implements(&self, type_name: &str) -> bool {
        let registry = self.invoker.registry();
        let provider = registry.provider();

        if provider.is_subtype_of(&self.class_name, type_name) {
            return true;
        }

        registry.woven_class(&self.class_name).map_or(false, |woven| {
            woven
                .introduced_interfaces()
                .iter()
                .any(|interface| provider.is_subtype_of(&interface.name, type_name))
        })
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.properties.read().get(name).cloned()
    }

    pub fn set_property(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.write().insert(name.into(), value.into());
    }

    pub fn properties(&self) -> Map<String, Value> {
        self.properties.read().clone()
    }

    /// 调用一个方法
    ///
    /// 同一线程上同一方法的嵌套调用（例如原始方法内部再次调用自身）不再经过通知。
    pub fn invoke<F>(&self, method: &str, arguments: Arguments, target: F) -> anyhow::Result<Value>
    where
        F: Fn(&mut JoinPoint<'_>) -> anyhow::Result<Value>,
    {
        let key = (thread::current().id(), method.to_string());
        if !self.advice_mode.lock().insert(key.clone()) {
            tracing::trace!("↺ {}->{} re-entered, bypassing advice", self.class_name, method);
            let mut join_point = JoinPoint::new(self, method, arguments);
            return target(&mut join_point);
        }

        let _advice_mode = AdviceModeGuard { proxy: self, key };
        let join_point = JoinPoint::new(self, method, arguments);
        self.invoker.invoke(join_point, &target)
    }

    /// 调用引入接口中的方法，没有原始实现，除非通知给出结果否则返回 `null`
    pub fn invoke_introduced(&self, method: &str, arguments: Arguments) -> anyhow::Result<Value> {
        let introduced = self
            .woven_class()
            .map_or(false, |woven| woven.introduced_method(method).is_some());

        if !introduced {
            return Err(AopError::UnknownIntroducedMethod {
                class: self.class_name.clone(),
                method: method.to_string(),
            }
            .into());
        }

        self.invoke(method, arguments, |_jp| Ok(Value::Null))
    }

    /// 构造：构造函数作为连接点被拦截，之后执行一次生命周期初始化
    pub fn construct<C, I>(&self, arguments: Arguments, constructor: C, initializer: I) -> anyhow::Result<Value>
    where
        C: Fn(&mut JoinPoint<'_>) -> anyhow::Result<Value>,
        I: FnOnce(&ProxyInstance) -> anyhow::Result<()>,
    {
        let result = self.invoke(CONSTRUCTOR_METHOD, arguments, constructor)?;
        self.initialize_once(initializer)?;
        Ok(result)
    }

    /// 执行生命周期初始化，每个实例最多一次；返回本次是否执行了
    pub fn initialize_once<I>(&self, initializer: I) -> anyhow::Result<bool>
    where
        I: FnOnce(&ProxyInstance) -> anyhow::Result<()>,
    {
        let mut ran = false;
        self.initialized.get_or_try_init(|| {
            ran = true;
            initializer(self)
        })?;

        if ran {
            tracing::debug!("Initialized {} instance", self.class_name);
        }
        Ok(ran)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }
}

impl fmt::Debug for ProxyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyInstance")
            .field("class", &self.class_name)
            .field("woven", &self.woven_class().is_some())
            .field("properties", &*self.properties.read())
            .finish()
    }
}

struct AdviceModeGuard<'p> {
    proxy: &'p ProxyInstance,
    key: (ThreadId, String),
}

impl Drop for AdviceModeGuard<'_> {
    fn drop(&mut self) {
        self.proxy.advice_mode.lock().remove(&self.key);
    }
}

/// 通过代理调用方法
///
/// ```ignore
/// let greeting = advised!(proxy, "sayHello", { "name": "Andi" }, |jp| {
///     Ok(json!(format!("Hello {}", jp.argument("name").and_then(|v| v.as_str()).unwrap_or(""))))
/// })?;
/// ```
#[macro_export]
macro_rules! advised {
    ($proxy:expr, $method:expr, { $($name:literal : $value:expr),* $(,)? }, $target:expr) => {{
        #[allow(unused_mut)]
        let mut arguments = $crate::Arguments::new();
        $(
            arguments.insert($name.to_string(), $crate::serde_json::json!($value));
        )*
        $proxy.invoke($method, arguments, $target)
    }};
    ($proxy:expr, $method:expr, $target:expr) => {
        $proxy.invoke($method, $crate::Arguments::new(), $target)
    };
}
