//! 调用上下文
//!
//! 方法体看到的执行环境：当前方法名、参数、实例状态，
//! 以及经由织入派发表的再入调用。派发本身由织入层实现，
//! 这里只定义对象安全的 `Dispatcher` 接缝。

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::fault::Fault;
use crate::value::Value;

/// 织入派发接缝
///
/// 由织入层的实例/静态派发器实现；方法体通过它再入调用，
/// 使得自递归与相互递归同样经过织入后的派发表。
pub trait Dispatcher: Send + Sync {
    /// 经织入派发表调用方法
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, Fault>;

    /// 目标实例引用（静态上下文为 None）
    fn target_ref(&self) -> Option<Arc<dyn Any + Send + Sync>>;

    /// 实例私有状态（静态上下文为 None）
    fn state(&self) -> Option<&Mutex<Box<dyn Any + Send + Sync>>>;

    /// 指定混入的私有状态
    fn mixin_state(&self, mixin: &str) -> Option<&Mutex<Box<dyn Any + Send + Sync>>>;
}

/// 方法体的调用上下文
pub struct CallCtx<'a> {
    method_name: &'a str,
    args: &'a [Value],
    dispatcher: &'a dyn Dispatcher,
    mixin: Option<&'a str>,
}

impl<'a> CallCtx<'a> {
    /// 创建调用上下文（由派发层构造）
    pub fn new(
        method_name: &'a str,
        args: &'a [Value],
        dispatcher: &'a dyn Dispatcher,
        mixin: Option<&'a str>,
    ) -> Self {
        Self {
            method_name,
            args,
            dispatcher,
            mixin,
        }
    }

    /// 正在执行的方法名
    ///
    /// 对带标记包装的方法，方法体观察到的是合成的包装名。
    pub fn method_name(&self) -> &str {
        self.method_name
    }

    /// 调用参数
    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// 按位置取参数
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// 经织入派发表再入调用
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value, Fault> {
        self.dispatcher.call(method, args)
    }

    /// 访问实例私有状态
    pub fn with_state<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, Fault> {
        let state = self
            .dispatcher
            .state()
            .ok_or_else(|| Fault::new("no instance state in static context"))?;
        let mut guard = state.lock();
        let typed = guard.downcast_mut::<T>().ok_or_else(|| {
            Fault::new(format!(
                "instance state is not a {}",
                std::any::type_name::<T>()
            ))
        })?;
        Ok(f(typed))
    }

    /// 访问当前混入方法的私有状态
    ///
    /// 只有混入来源的方法绑定了混入状态。
    pub fn with_mixin_state<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, Fault> {
        let mixin = self
            .mixin
            .ok_or_else(|| Fault::new("method has no mixin state"))?;
        let state = self
            .dispatcher
            .mixin_state(mixin)
            .ok_or_else(|| Fault::new(format!("no state for mixin '{}'", mixin)))?;
        let mut guard = state.lock();
        let typed = guard.downcast_mut::<T>().ok_or_else(|| {
            Fault::new(format!(
                "mixin state is not a {}",
                std::any::type_name::<T>()
            ))
        })?;
        Ok(f(typed))
    }
}
