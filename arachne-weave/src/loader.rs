//! 隔离织入装载器
//!
//! `IsolatedWeaver` 是一个独立命名空间：持有类定义与发布后的
//! 通知/混入表，按需产出织入类与实例。不同装载器之间不共享任何
//! 状态，测试因此互不干扰。
//!
//! 变换按类名记忆化：一个类至多变换一次，并发首用的所有线程
//! 观察到同一份织入结果。单个类的变换失败不影响其它类。

use std::collections::HashMap;
use std::sync::Arc;

use arachne_core::{ClassSpec, EngineConfig, Value, WeaveError, WeaveResult};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::advice::AdviceBundle;
use crate::mixin::MixinSpec;
use crate::registry::WeaveRegistry;
use crate::transformer::Transformer;
use crate::woven::{Instance, WeaveOptions, WovenClass};

/// 隔离织入装载器
///
/// ## 使用示例
///
/// ```ignore
/// let weaver = IsolatedWeaver::builder()
///     .advice(advice)
///     .mixin(mixin)
///     .build();
/// weaver.define_class(spec)?;
/// let instance = weaver.new_instance("app.BasicMisc")?;
/// ```
pub struct IsolatedWeaver {
    classes: RwLock<HashMap<String, ClassSpec>>,
    advice: Vec<Arc<AdviceBundle>>,
    mixins: Vec<Arc<MixinSpec>>,
    woven: RwLock<HashMap<String, Arc<WovenClass>>>,
    options: WeaveOptions,
}

impl IsolatedWeaver {
    /// 创建装载器构建器
    pub fn builder() -> IsolatedWeaverBuilder {
        IsolatedWeaverBuilder::new()
    }

    /// 注册类定义
    ///
    /// 同名类重复定义在注册时拒绝。
    pub fn define_class(&self, spec: ClassSpec) -> WeaveResult<()> {
        let mut classes = self.classes.write();
        if classes.contains_key(&spec.name) {
            return Err(WeaveError::InvalidClass {
                name: spec.name.clone(),
                reason: "class already defined".to_string(),
            });
        }
        debug!(class = %spec.name, "class defined");
        classes.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// 取得织入类，必要时执行变换
    ///
    /// 变换按类记忆化：已织入的类直接返回同一份结果。
    pub fn woven_class(&self, name: &str) -> WeaveResult<Arc<WovenClass>> {
        if let Some(woven) = self.woven.read().get(name) {
            return Ok(Arc::clone(woven));
        }

        let mut woven = self.woven.write();
        // 并发首用：持写锁期间重查，保证至多变换一次
        if let Some(existing) = woven.get(name) {
            return Ok(Arc::clone(existing));
        }

        let spec = self
            .classes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| WeaveError::ClassNotFound(name.to_string()))?;
        let class = Transformer::transform(&spec, &self.advice, &self.mixins, self.options)?;
        woven.insert(name.to_string(), Arc::clone(&class));
        Ok(class)
    }

    /// 创建织入实例
    pub fn new_instance(&self, name: &str) -> WeaveResult<Arc<Instance>> {
        Ok(self.woven_class(name)?.new_instance())
    }

    /// 调用织入类的静态方法
    pub fn invoke_static(
        &self,
        class: &str,
        method: &str,
        args: &[Value],
    ) -> WeaveResult<Result<Value, arachne_core::Fault>> {
        let woven = self.woven_class(class)?;
        Ok(woven.invoke_static(method, args))
    }
}

/// 装载器构建器
///
/// 通知与混入表在 `build()` 时一次性发布，装载器存续期间只读。
pub struct IsolatedWeaverBuilder {
    advice: Vec<Arc<AdviceBundle>>,
    mixins: Vec<Arc<MixinSpec>>,
    options: WeaveOptions,
}

impl IsolatedWeaverBuilder {
    fn new() -> Self {
        Self {
            advice: Vec::new(),
            mixins: Vec::new(),
            options: WeaveOptions::default(),
        }
    }

    /// 追加通知；顺序决定包裹顺序
    pub fn advice(mut self, advice: Arc<AdviceBundle>) -> Self {
        self.advice.push(advice);
        self
    }

    /// 追加混入
    pub fn mixin(mut self, mixin: Arc<MixinSpec>) -> Self {
        self.mixins.push(mixin);
        self
    }

    /// 并入注册表中的全部声明
    pub fn registry(mut self, registry: &WeaveRegistry) -> Self {
        self.advice.extend_from_slice(registry.advice());
        self.mixins.extend_from_slice(registry.mixins());
        self
    }

    /// 应用引擎配置
    pub fn config(mut self, config: &EngineConfig) -> Self {
        self.options = WeaveOptions {
            log_hook_faults: config.weaver.log_hook_faults,
        };
        self
    }

    /// 构建装载器
    pub fn build(self) -> IsolatedWeaver {
        info!(
            advice = self.advice.len(),
            mixins = self.mixins.len(),
            "isolated weaver ready"
        );
        IsolatedWeaver {
            classes: RwLock::new(HashMap::new()),
            advice: self.advice,
            mixins: self.mixins,
            woven: RwLock::new(HashMap::new()),
            options: self.options,
        }
    }
}

impl Default for IsolatedWeaverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
