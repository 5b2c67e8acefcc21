// arachne-weave: 动态织入引擎
//
// 提供声明式的方法拦截与能力混入：
// - 切点模式与方法匹配
// - 通知捆绑与参数注入协议
// - 包裹式类变换（含标记包装方法）
// - 每线程的嵌套抑制
// - 隔离命名空间的织入装载器

pub mod advice;
pub mod loader;
pub mod mixin;
pub mod nesting;
pub mod pointcut;
pub mod protocol;
pub mod registry;
pub mod transformer;
pub mod woven;

// 重新导出核心类型
pub use advice::{AdviceBuilder, AdviceBundle, Hook, HookParam};
pub use loader::{IsolatedWeaver, IsolatedWeaverBuilder};
pub use mixin::{MixinBuilder, MixinSpec};
pub use nesting::{NestingEntry, NestingGuard};
pub use pointcut::{ArgPattern, NamePattern, Pointcut, PointcutBuilder};
pub use registry::{
    get_all_advice_registrations, get_all_mixin_registrations, global_registry,
    AdviceRegistration, MixinRegistration, WeaveRegistry,
};
pub use transformer::{MatchedMethod, Transformer};
pub use woven::{Instance, WeaveOptions, WovenClass, WovenMethod};

// 导出 inventory 供注册声明使用
pub use inventory;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::{AdviceBundle, Hook, HookParam};
    pub use crate::loader::{IsolatedWeaver, IsolatedWeaverBuilder};
    pub use crate::mixin::MixinSpec;
    pub use crate::nesting::NestingGuard;
    pub use crate::pointcut::{ArgPattern, NamePattern, Pointcut};
    pub use crate::registry::{
        global_registry, AdviceRegistration, MixinRegistration, WeaveRegistry,
    };
    pub use crate::transformer::Transformer;
    pub use crate::woven::{Instance, WovenClass};
    pub use arachne_core::prelude::*;
}
