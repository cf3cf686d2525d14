//! 通知链
//!
//! 每个 (类, 方法) 的通知按类型分组并排好序后缓存；环绕通知在每次调用时
//! 包装成一条 [`AdviceChain`]，由 [`JoinPoint::proceed`] 逐个推进。

use crate::advice::{Advice, AdviceType};
use crate::condition::GlobalObjects;
use crate::config::ProceedGuard;
use crate::pointcut::RuntimeFilter;
use crate::JoinPoint;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 原始方法
pub type TargetMethod<'a> = dyn Fn(&mut JoinPoint<'a>) -> anyhow::Result<Value> + 'a;

/// 链中的一个通知及其运行时条件
#[derive(Clone)]
pub struct ChainLink {
    advice: Advice,
    guard: Option<Arc<RuntimeFilter>>,
}

impl ChainLink {
    pub fn new(advice: Advice, guard: Option<RuntimeFilter>) -> Self {
        Self {
            advice,
            guard: guard.map(Arc::new),
        }
    }

    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    pub fn is_conditional(&self) -> bool {
        self.guard.is_some()
    }

    /// 运行时条件是否满足；求值失败视为不满足
    pub(crate) fn applies(&self, join_point: &JoinPoint<'_>, globals: &GlobalObjects) -> bool {
        let Some(guard) = &self.guard else {
            return true;
        };

        match guard.evaluate(join_point, globals) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(
                    "⚠️  Runtime condition of {} on {} could not be evaluated, skipping: {}",
                    self.advice.identifier(),
                    join_point.signature(),
                    e
                );
                false
            }
        }
    }
}

impl fmt::Debug for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLink")
            .field("advice", &self.advice.identifier())
            .field("guard", &self.guard)
            .finish()
    }
}

/// 某个方法的全部通知，按类型分组，组内已排序
#[derive(Debug, Clone)]
pub struct GroupedAdvices {
    before: Vec<ChainLink>,
    around: Arc<[ChainLink]>,
    after_returning: Vec<ChainLink>,
    after_throwing: Vec<ChainLink>,
    after: Vec<ChainLink>,
}

impl GroupedAdvices {
    /// 按类型分组，保持输入顺序
    pub fn from_links(links: impl IntoIterator<Item = ChainLink>) -> Self {
        let mut before = Vec::new();
        let mut around = Vec::new();
        let mut after_returning = Vec::new();
        let mut after_throwing = Vec::new();
        let mut after = Vec::new();

        for link in links {
            match link.advice().advice_type() {
                AdviceType::Before => before.push(link),
                AdviceType::Around => around.push(link),
                AdviceType::AfterReturning => after_returning.push(link),
                AdviceType::AfterThrowing => after_throwing.push(link),
                AdviceType::After => after.push(link),
            }
        }

        Self {
            before,
            around: around.into(),
            after_returning,
            after_throwing,
            after,
        }
    }

    pub fn before(&self) -> &[ChainLink] {
        &self.before
    }

    pub fn around(&self) -> &[ChainLink] {
        &self.around
    }

    pub fn after_returning(&self) -> &[ChainLink] {
        &self.after_returning
    }

    pub fn after_throwing(&self) -> &[ChainLink] {
        &self.after_throwing
    }

    pub fn after(&self) -> &[ChainLink] {
        &self.after
    }

    pub fn len(&self) -> usize {
        self.before.len()
            + self.around.len()
            + self.after_returning.len()
            + self.after_throwing.len()
            + self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn around_links(&self) -> Arc<[ChainLink]> {
        Arc::clone(&self.around)
    }
}

pub(crate) enum ChainStep<'a> {
    Advice(ChainLink, Arc<GlobalObjects>),
    Target(&'a TargetMethod<'a>),
    Replay(&'a TargetMethod<'a>),
    Completed,
}

/// 单次调用的环绕通知链
pub struct AdviceChain<'a> {
    links: Arc<[ChainLink]>,
    cursor: usize,
    target: &'a TargetMethod<'a>,
    target_calls: usize,
    guard: ProceedGuard,
    globals: Arc<GlobalObjects>,
}

impl<'a> AdviceChain<'a> {
    pub(crate) fn new(
        links: Arc<[ChainLink]>,
        target: &'a TargetMethod<'a>,
        guard: ProceedGuard,
        globals: Arc<GlobalObjects>,
    ) -> Self {
        Self {
            links,
            cursor: 0,
            target,
            target_calls: 0,
            guard,
            globals,
        }
    }

    pub(crate) fn next_step(&mut self) -> ChainStep<'a> {
        if let Some(link) = self.links.get(self.cursor) {
            self.cursor += 1;
            return ChainStep::Advice(link.clone(), Arc::clone(&self.globals));
        }

        self.target_calls += 1;
        match (self.target_calls, self.guard) {
            (1, _) => ChainStep::Target(self.target),
            (_, ProceedGuard::Replay) => ChainStep::Replay(self.target),
            (_, ProceedGuard::Strict) => ChainStep::Completed,
        }
    }

    /// 原始方法被执行的次数
    pub fn target_calls(&self) -> usize {
        self.target_calls
    }
}
