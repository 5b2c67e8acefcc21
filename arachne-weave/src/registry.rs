//! 织入注册表
//!
//! 管理声明的通知与混入。注册顺序就是包裹顺序。
//! 除显式注册外，支持通过 inventory 在链接期收集声明，
//! 由 `auto_load` 一次性装入；非法声明在装载时立即报错。

use std::sync::Arc;

use arachne_core::{ClassSpec, MethodSpec, WeaveResult};
use once_cell::sync::Lazy;

use crate::advice::AdviceBundle;
use crate::mixin::MixinSpec;

/// 通知注册器
///
/// 用于 inventory 自动收集通知声明。
pub struct AdviceRegistration {
    /// 通知名称
    pub name: &'static str,

    /// 创建通知的函数
    pub creator: fn() -> WeaveResult<Arc<AdviceBundle>>,
}

impl AdviceRegistration {
    /// 创建新的通知注册器
    pub const fn new(name: &'static str, creator: fn() -> WeaveResult<Arc<AdviceBundle>>) -> Self {
        Self { name, creator }
    }
}

inventory::collect!(AdviceRegistration);

/// 混入注册器
pub struct MixinRegistration {
    /// 混入名称
    pub name: &'static str,

    /// 创建混入的函数
    pub creator: fn() -> WeaveResult<Arc<MixinSpec>>,
}

impl MixinRegistration {
    /// 创建新的混入注册器
    pub const fn new(name: &'static str, creator: fn() -> WeaveResult<Arc<MixinSpec>>) -> Self {
        Self { name, creator }
    }
}

inventory::collect!(MixinRegistration);

/// 获取所有链接期收集的通知注册器
pub fn get_all_advice_registrations() -> impl Iterator<Item = &'static AdviceRegistration> {
    inventory::iter::<AdviceRegistration>.into_iter()
}

/// 获取所有链接期收集的混入注册器
pub fn get_all_mixin_registrations() -> impl Iterator<Item = &'static MixinRegistration> {
    inventory::iter::<MixinRegistration>.into_iter()
}

/// 全局织入注册表
///
/// 首次访问时装入所有链接期收集的声明。隔离场景请自建
/// `WeaveRegistry` 并显式注册。
static GLOBAL_REGISTRY: Lazy<WeaveRegistry> = Lazy::new(|| {
    let mut registry = WeaveRegistry::new();
    if let Err(e) = registry.auto_load() {
        tracing::error!("Failed to auto-load registrations: {}", e);
    }
    registry
});

/// 获取全局织入注册表
pub fn global_registry() -> &'static WeaveRegistry {
    &GLOBAL_REGISTRY
}

/// 织入注册表
///
/// 在织入开始前发布一次；织入期间只读共享，匹配与查找无须加锁。
#[derive(Default)]
pub struct WeaveRegistry {
    advice: Vec<Arc<AdviceBundle>>,
    mixins: Vec<Arc<MixinSpec>>,
}

impl WeaveRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册通知；注册顺序决定包裹顺序
    pub fn register_advice(&mut self, advice: Arc<AdviceBundle>) {
        tracing::debug!(advice = %advice.name, "Registering advice");
        self.advice.push(advice);
    }

    /// 注册混入
    pub fn register_mixin(&mut self, mixin: Arc<MixinSpec>) {
        tracing::debug!(mixin = %mixin.name, "Registering mixin");
        self.mixins.push(mixin);
    }

    /// 已注册的通知
    pub fn advice(&self) -> &[Arc<AdviceBundle>] {
        &self.advice
    }

    /// 已注册的混入
    pub fn mixins(&self) -> &[Arc<MixinSpec>] {
        &self.mixins
    }

    /// 匹配指定方法的通知，按注册顺序
    pub fn advice_for(&self, class: &ClassSpec, method: &MethodSpec) -> Vec<Arc<AdviceBundle>> {
        self.advice
            .iter()
            .filter(|bundle| {
                bundle
                    .pointcut
                    .matches(&class.name, &class.interfaces, method)
            })
            .cloned()
            .collect()
    }

    /// 注册的声明总数
    pub fn len(&self) -> usize {
        self.advice.len() + self.mixins.len()
    }

    /// 是否没有任何声明
    pub fn is_empty(&self) -> bool {
        self.advice.is_empty() && self.mixins.is_empty()
    }

    /// 清除所有声明
    pub fn clear(&mut self) {
        self.advice.clear();
        self.mixins.clear();
    }

    /// 从 inventory 装入所有链接期收集的声明
    ///
    /// 非法声明立即返回错误，不会被静默忽略。
    pub fn auto_load(&mut self) -> WeaveResult<()> {
        let advice_registrations: Vec<_> = get_all_advice_registrations().collect();
        let mixin_registrations: Vec<_> = get_all_mixin_registrations().collect();
        tracing::info!(
            "Auto-loading {} advice and {} mixin registration(s)",
            advice_registrations.len(),
            mixin_registrations.len()
        );

        for registration in advice_registrations {
            tracing::debug!("  ├─ Loading advice: {}", registration.name);
            let bundle = (registration.creator)()?;
            self.register_advice(bundle);
        }

        for registration in mixin_registrations {
            tracing::debug!("  ├─ Loading mixin: {}", registration.name);
            let mixin = (registration.creator)()?;
            self.register_mixin(mixin);
        }

        Ok(())
    }
}
