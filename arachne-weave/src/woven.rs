//! 织入结果
//!
//! `WovenClass` 是变换后的派发表：每个条目记录签名、匹配到的通知层
//! 以及未经改动的方法体。`Instance` 是织入类的一个对象，
//! 持有实例私有状态与每个混入的隔离状态。
//! 所有调用（包括方法体的再入调用）都经过这张派发表。

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use arachne_core::{Dispatcher, Fault, MethodSpec, StateFactory, Value};
use parking_lot::Mutex;

use crate::advice::AdviceBundle;
use crate::mixin::MixinSpec;
use crate::protocol;

/// 织入选项，来自引擎配置
#[derive(Debug, Clone, Copy)]
pub struct WeaveOptions {
    /// 被隔离的钩子故障记录为 warn（否则仅 trace）
    pub log_hook_faults: bool,
}

impl Default for WeaveOptions {
    fn default() -> Self {
        Self {
            log_hook_faults: true,
        }
    }
}

/// 派发表中的一个方法条目
///
/// `advice` 按声明顺序排列：第 0 条最外层。
/// 带标记包装的方法拆成多层条目，外层条目的方法体只做委托。
pub struct WovenMethod {
    /// 该层的方法签名（包装层使用合成名）
    pub spec: MethodSpec,

    /// 附着在该层的通知
    pub advice: Vec<Arc<AdviceBundle>>,

    /// 混入来源（类自身的方法为 None）
    pub mixin_origin: Option<String>,
}

impl fmt::Debug for WovenMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WovenMethod")
            .field("spec", &self.spec)
            .field("advice", &self.advice.len())
            .field("mixin_origin", &self.mixin_origin)
            .finish()
    }
}

/// 织入后的类
pub struct WovenClass {
    name: String,
    interfaces: Vec<String>,
    methods: HashMap<String, Arc<WovenMethod>>,
    mixins: Vec<Arc<MixinSpec>>,
    state_factory: StateFactory,
    options: WeaveOptions,
}

impl WovenClass {
    pub(crate) fn new(
        name: String,
        interfaces: Vec<String>,
        methods: HashMap<String, Arc<WovenMethod>>,
        mixins: Vec<Arc<MixinSpec>>,
        state_factory: StateFactory,
        options: WeaveOptions,
    ) -> Self {
        Self {
            name,
            interfaces,
            methods,
            mixins,
            state_factory,
            options,
        }
    }

    /// 类名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 实现的能力契约（含混入附加的）
    pub fn capabilities(&self) -> &[String] {
        &self.interfaces
    }

    /// 是否暴露指定能力
    pub fn has_capability(&self, capability: &str) -> bool {
        self.interfaces.iter().any(|i| i == capability)
    }

    /// 按名称查找派发表条目
    pub fn method(&self, name: &str) -> Option<&Arc<WovenMethod>> {
        self.methods.get(name)
    }

    /// 派发表中的方法名（含合成包装名与混入方法）
    pub fn method_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.methods.keys().map(|k| k.as_str())
    }

    pub(crate) fn options(&self) -> WeaveOptions {
        self.options
    }

    /// 创建织入实例
    pub fn new_instance(self: Arc<Self>) -> Arc<Instance> {
        Instance::new(&self)
    }

    /// 调用静态方法
    ///
    /// 协议在没有实例引用的情况下照常执行，
    /// 绑定 `Target` 的钩子参数观察到 `Unit`。
    pub fn invoke_static(&self, method: &str, args: &[Value]) -> Result<Value, Fault> {
        let entry = self.method(method).ok_or_else(|| {
            Fault::new(format!("no such method '{}' on '{}'", method, self.name))
        })?;
        if !entry.spec.is_static {
            return Err(Fault::new(format!(
                "method '{}' on '{}' is not static",
                method, self.name
            )));
        }
        let dispatcher = StaticDispatcher { class: self };
        protocol::execute(self, &dispatcher, entry, args)
    }
}

impl fmt::Debug for WovenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WovenClass")
            .field("name", &self.name)
            .field("interfaces", &self.interfaces)
            .field("methods", &self.methods.len())
            .field("mixins", &self.mixins.len())
            .finish()
    }
}

/// 织入类的一个实例
///
/// 实例状态与每个混入的后备状态都是本实例私有的，
/// 不跨实例共享，也不与混入声明本身共享。
pub struct Instance {
    class: Arc<WovenClass>,
    state: Mutex<Box<dyn Any + Send + Sync>>,
    mixin_states: HashMap<String, Mutex<Box<dyn Any + Send + Sync>>>,
    self_ref: Weak<Instance>,
}

impl Instance {
    fn new(class: &Arc<WovenClass>) -> Arc<Instance> {
        Arc::new_cyclic(|self_ref| Instance {
            class: Arc::clone(class),
            state: Mutex::new((class.state_factory)()),
            mixin_states: class
                .mixins
                .iter()
                .map(|m| (m.name.clone(), Mutex::new((m.state_factory)())))
                .collect(),
            self_ref: self_ref.clone(),
        })
    }

    /// 所属织入类
    pub fn class(&self) -> &Arc<WovenClass> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn capabilities(&self) -> &[String] {
        self.class.capabilities()
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.class.has_capability(capability)
    }

    /// 调用方法
    ///
    /// 经过织入派发表：匹配到通知的方法按执行协议包裹，
    /// 静态条目转走静态路径。
    pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, Fault> {
        let entry = self.class.method(method).ok_or_else(|| {
            Fault::new(format!(
                "no such method '{}' on '{}'",
                method,
                self.class.name()
            ))
        })?;
        if entry.spec.is_static {
            return self.class.invoke_static(method, args);
        }
        protocol::execute(&self.class, self, entry, args)
    }
}

impl Dispatcher for Instance {
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, Fault> {
        self.invoke(method, args)
    }

    fn target_ref(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.self_ref
            .upgrade()
            .map(|instance| instance as Arc<dyn Any + Send + Sync>)
    }

    fn state(&self) -> Option<&Mutex<Box<dyn Any + Send + Sync>>> {
        Some(&self.state)
    }

    fn mixin_state(&self, mixin: &str) -> Option<&Mutex<Box<dyn Any + Send + Sync>>> {
        self.mixin_states.get(mixin)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name())
            .finish()
    }
}

// 静态调用的派发器：没有目标实例，也没有实例状态
struct StaticDispatcher<'a> {
    class: &'a WovenClass,
}

impl Dispatcher for StaticDispatcher<'_> {
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, Fault> {
        self.class.invoke_static(method, args)
    }

    fn target_ref(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }

    fn state(&self) -> Option<&Mutex<Box<dyn Any + Send + Sync>>> {
        None
    }

    fn mixin_state(&self, _mixin: &str) -> Option<&Mutex<Box<dyn Any + Send + Sync>>> {
        None
    }
}
