//! 运行时调度
//!
//! 负责在代理方法被调用时按顺序执行通知：
//! 1. 前置通知
//! 2. 环绕通知链（最内层为原始方法）
//! 3. 返回后通知或异常通知
//! 4. 后置通知

use crate::advice_chain::{AdviceChain, GroupedAdvices, TargetMethod};
use crate::condition::GlobalObjects;
use crate::config::{AopConfig, ProceedGuard};
use crate::joinpoint::{JoinPoint, Outcome};
use crate::weaver::WeavingRegistry;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type ChainCell = Arc<OnceCell<Option<Arc<GroupedAdvices>>>>;

/// 代理调用器
///
/// 持有织入结果和每个 (类, 方法) 的通知缓存。同一方法的通知组只构建一次，
/// 并发的首次调用会等待同一次构建完成。
pub struct ProxyInvoker {
    registry: RwLock<Arc<WeavingRegistry>>,
    chains: Mutex<HashMap<(String, String), ChainCell>>,
    globals: Arc<GlobalObjects>,
    guard: ProceedGuard,
    chains_built: AtomicUsize,
}

impl ProxyInvoker {
    pub fn new(registry: WeavingRegistry, config: &AopConfig) -> Self {
        Self {
            registry: RwLock::new(Arc::new(registry)),
            chains: Mutex::new(HashMap::new()),
            globals: Arc::new(config.global_objects.clone()),
            guard: config.proceed_guard,
            chains_built: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> Arc<WeavingRegistry> {
        Arc::clone(&self.registry.read())
    }

    pub fn globals(&self) -> &GlobalObjects {
        &self.globals
    }

    pub fn proceed_guard(&self) -> ProceedGuard {
        self.guard
    }

    /// 替换织入结果并清空通知缓存
    pub fn reload(&self, registry: WeavingRegistry) {
        *self.registry.write() = Arc::new(registry);
        self.chains.lock().clear();
        tracing::info!("🔄 Weaving registry reloaded, advice cache cleared");
    }

    /// 已构建的通知组数量
    pub fn chains_built(&self) -> usize {
        self.chains_built.load(Ordering::SeqCst)
    }

    /// 某个方法的通知组；没有通知时为 `None`
    pub fn advices_for(&self, class_name: &str, method: &str) -> Option<Arc<GroupedAdvices>> {
        let cell = {
            let mut chains = self.chains.lock();
            Arc::clone(
                chains
                    .entry((class_name.to_string(), method.to_string()))
                    .or_default(),
            )
        };

        cell.get_or_init(|| {
            let registry = self.registry();
            let grouped = registry.woven_class(class_name).and_then(|woven| {
                let links = woven.bindings(method);
                if links.is_empty() {
                    None
                } else {
                    Some(Arc::new(GroupedAdvices::from_links(links.iter().cloned())))
                }
            });

            self.chains_built.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                "Built advice chain for {}->{} ({} advice(s))",
                class_name,
                method,
                grouped.as_ref().map_or(0, |g| g.len())
            );
            grouped
        })
        .clone()
    }

    /// 执行一次被拦截的调用
    pub fn invoke<'a, F>(&self, mut join_point: JoinPoint<'a>, target: &'a F) -> anyhow::Result<Value>
    where
        F: Fn(&mut JoinPoint<'a>) -> anyhow::Result<Value> + 'a,
    {
        let Some(advices) = self.advices_for(join_point.class_name(), join_point.method_name()) else {
            return target(&mut join_point);
        };

        tracing::trace!("▶ {} ({} advice(s))", join_point.signature(), advices.len());

        let mut before_error = None;
        for link in advices.before() {
            if !link.applies(&join_point, &self.globals) {
                continue;
            }
            if let Err(e) = link.advice().invoke(&mut join_point) {
                before_error = Some(e);
                break;
            }
        }

        let outcome = match before_error {
            Some(error) => Outcome::Raised(error),
            None => {
                let target: &'a TargetMethod<'a> = target;
                join_point.attach_chain(AdviceChain::new(
                    advices.around_links(),
                    target,
                    self.guard,
                    Arc::clone(&self.globals),
                ));
                Outcome::from_result(join_point.proceed())
            }
        };
        join_point.set_outcome(outcome);

        if join_point.has_exception() {
            for link in advices.after_throwing() {
                // 已被前面的异常通知恢复
                if !join_point.has_exception() {
                    break;
                }
                if link.applies(&join_point, &self.globals) {
                    link.advice().invoke(&mut join_point)?;
                }
            }
        } else {
            for link in advices.after_returning() {
                if link.applies(&join_point, &self.globals) {
                    link.advice().invoke(&mut join_point)?;
                }
            }
        }

        for link in advices.after() {
            if link.applies(&join_point, &self.globals) {
                link.advice().invoke(&mut join_point)?;
            }
        }

        tracing::trace!("◀ {}", join_point.signature());
        join_point
            .take_outcome()
            .map_or(Ok(Value::Null), Outcome::into_result)
    }
}

impl std::fmt::Debug for ProxyInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyInvoker")
            .field("registry", &*self.registry.read())
            .field("guard", &self.guard)
            .field("chains_built", &self.chains_built())
            .finish()
    }
}
