//! 通知执行协议
//!
//! 每次调用按固定顺序执行：
//! 1. 启用检查（缺省恒真）
//! 2. 嵌套抑制检查（仅不可嵌套的通知）
//! 3. on_before，捕获 traveler
//! 4. 原始方法体（多条通知时逐层内移，方法体只执行一次）
//! 5. on_return 与 on_throw 恰好二选一
//! 6. on_after 总是执行，随后释放嵌套标记
//!
//! 钩子自身的故障被就地隔离：记录日志、降级为空操作，
//! 绝不顶替原始方法的真实结果，也绝不让嵌套标记悬置。

use arachne_core::{CallCtx, Dispatcher, Fault, Value};
use tracing::{trace, warn};

use crate::advice::{AdviceBundle, Hook, HookParam};
use crate::nesting::NestingGuard;
use crate::woven::{WovenClass, WovenMethod};

/// 执行派发表条目：按声明顺序把每条通知的协议包裹到方法体外
pub(crate) fn execute(
    class: &WovenClass,
    handle: &dyn Dispatcher,
    entry: &WovenMethod,
    args: &[Value],
) -> Result<Value, Fault> {
    run_layer(class, handle, entry, 0, args)
}

// 第 depth 条通知包裹其余部分；通知用尽后执行方法体
fn run_layer(
    class: &WovenClass,
    handle: &dyn Dispatcher,
    entry: &WovenMethod,
    depth: usize,
    args: &[Value],
) -> Result<Value, Fault> {
    match entry.advice.get(depth) {
        Some(bundle) => around(class, handle, entry, bundle, depth, args),
        None => {
            let ctx = CallCtx::new(&entry.spec.name, args, handle, entry.mixin_origin.as_deref());
            (entry.spec.body)(ctx)
        }
    }
}

fn around(
    class: &WovenClass,
    handle: &dyn Dispatcher,
    entry: &WovenMethod,
    bundle: &AdviceBundle,
    depth: usize,
    args: &[Value],
) -> Result<Value, Fault> {
    let base = BindCtx {
        handle,
        method_name: &entry.spec.name,
        args,
        ret: None,
        fault: None,
        traveler: None,
    };

    // 1. 启用检查：禁用时本条通知完全退场，方法体照常执行
    if !check_enabled(class, bundle, &base) {
        return run_layer(class, handle, entry, depth + 1, args);
    }

    // 2. 嵌套抑制：同线程已在协议内时直接走内层，不触发任何钩子
    let _token = if !bundle.pointcut.nestable {
        match NestingGuard::try_enter(bundle.id) {
            Some(token) => Some(token),
            None => {
                trace!(
                    advice = %bundle.name,
                    method = %entry.spec.name,
                    "nested invocation suppressed"
                );
                return run_layer(class, handle, entry, depth + 1, args);
            }
        }
    } else {
        None
    };

    // 3. on_before：故障降级为 Unit traveler，协议继续
    let traveler = match &bundle.on_before {
        Some(hook) => match run_hook(hook, &base) {
            Ok(value) => value,
            Err(fault) => {
                report_hook_fault(class, bundle, "on_before", &fault);
                Value::Unit
            }
        },
        None => Value::Unit,
    };

    // 4. 内层链：更内层的通知与原始方法体
    let result = run_layer(class, handle, entry, depth + 1, args);

    // 5. on_return / on_throw 恰好二选一
    let result = match result {
        Ok(value) => {
            let mut out = value;
            if let Some(hook) = &bundle.on_return {
                let bind = BindCtx {
                    ret: Some(&out),
                    traveler: Some(&traveler),
                    ..base
                };
                match run_hook(hook, &bind) {
                    Ok(replacement) if bundle.change_return => out = replacement,
                    Ok(_) => {}
                    Err(fault) => report_hook_fault(class, bundle, "on_return", &fault),
                }
            }
            Ok(out)
        }
        Err(fault) => {
            if let Some(hook) = &bundle.on_throw {
                let bind = BindCtx {
                    fault: Some(&fault),
                    traveler: Some(&traveler),
                    ..base
                };
                if let Err(hook_fault) = run_hook(hook, &bind) {
                    report_hook_fault(class, bundle, "on_throw", &hook_fault);
                }
            }
            // 原样继续传播观察到的同一个故障
            Err(fault)
        }
    };

    // 6. on_after 两条路径都执行；嵌套标记随 token 离开作用域释放
    if let Some(hook) = &bundle.on_after {
        let bind = BindCtx {
            traveler: Some(&traveler),
            ..base
        };
        if let Err(fault) = run_hook(hook, &bind) {
            report_hook_fault(class, bundle, "on_after", &fault);
        }
    }

    result
}

fn check_enabled(class: &WovenClass, bundle: &AdviceBundle, base: &BindCtx<'_>) -> bool {
    match &bundle.is_enabled {
        None => true,
        Some(hook) => match run_hook(hook, base) {
            Ok(Value::Bool(enabled)) => enabled,
            Ok(other) => {
                warn!(
                    advice = %bundle.name,
                    got = other.type_name(),
                    "is_enabled returned a non-bool, treating advice as disabled"
                );
                false
            }
            Err(fault) => {
                report_hook_fault(class, bundle, "is_enabled", &fault);
                false
            }
        },
    }
}

fn run_hook(hook: &Hook, bind: &BindCtx<'_>) -> Result<Value, Fault> {
    let bound: Vec<Value> = hook.params.iter().map(|p| bind.bind(p)).collect();
    (hook.run)(&bound)
}

fn report_hook_fault(class: &WovenClass, bundle: &AdviceBundle, hook: &str, fault: &Fault) {
    if class.options().log_hook_faults {
        warn!(
            advice = %bundle.name,
            hook,
            fault = %fault,
            "advice hook failed, degrading to a no-op"
        );
    } else {
        trace!(advice = %bundle.name, hook, fault = %fault, "advice hook failed");
    }
}

// 一次钩子调用可见的注入源
#[derive(Clone, Copy)]
struct BindCtx<'a> {
    handle: &'a dyn Dispatcher,
    method_name: &'a str,
    args: &'a [Value],
    ret: Option<&'a Value>,
    fault: Option<&'a Fault>,
    traveler: Option<&'a Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::AdviceBundle;
    use crate::pointcut::Pointcut;
    use crate::transformer::Transformer;
    use crate::woven::WeaveOptions;
    use arachne_core::{ClassSpec, MethodSpec};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn xyz_class() -> ClassSpec {
        ClassSpec::builder("app.ProtocolMisc")
            .method(MethodSpec::new("execute_with_return", &[], "str", |_ctx| {
                Ok(Value::Str("xyz".to_string()))
            }))
            .build()
            .unwrap()
    }

    fn match_all() -> Pointcut {
        Pointcut::builder().build().unwrap()
    }

    fn invoke(advice: Arc<AdviceBundle>) -> Result<Value, Fault> {
        let woven =
            Transformer::transform(&xyz_class(), &[advice], &[], WeaveOptions::default()).unwrap();
        woven.new_instance().invoke("execute_with_return", &[])
    }

    #[test]
    fn test_faulty_is_enabled_degrades_to_disabled() {
        let fired = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&fired);
        let advice = AdviceBundle::builder("faulty_enabled")
            .pointcut(match_all())
            .is_enabled(vec![], |_| Err(Fault::new("enablement broke")))
            .on_before(vec![], move |_| {
                probe.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Unit)
            })
            .build()
            .unwrap();

        let result = invoke(advice).unwrap();

        // 启用检查故障视为禁用：钩子全体退场，方法结果不变
        assert_eq!(result, Value::Str("xyz".to_string()));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_non_bool_enablement_treated_as_disabled() {
        let fired = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&fired);
        let advice = AdviceBundle::builder("odd_enabled")
            .pointcut(match_all())
            .is_enabled(vec![], |_| Ok(Value::Int(1)))
            .on_before(vec![], move |_| {
                probe.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Unit)
            })
            .build()
            .unwrap();

        invoke(advice).unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_faulty_on_before_yields_unit_traveler() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let ret = Arc::clone(&seen);
        let after = Arc::clone(&seen);
        let advice = AdviceBundle::builder("faulty_before")
            .pointcut(match_all())
            .on_before(vec![], |_| Err(Fault::new("before broke")))
            .on_return(vec![HookParam::Traveler], move |params| {
                ret.lock().push(params[0].clone());
                Ok(Value::Unit)
            })
            .on_after(vec![HookParam::Traveler], move |params| {
                after.lock().push(params[0].clone());
                Ok(Value::Unit)
            })
            .build()
            .unwrap();

        let result = invoke(advice).unwrap();

        // 协议继续：on_return/on_after 照常执行，traveler 退化为 Unit
        assert_eq!(result, Value::Str("xyz".to_string()));
        assert_eq!(*seen.lock(), vec![Value::Unit, Value::Unit]);
    }

    #[test]
    fn test_faulty_change_return_keeps_original_value() {
        let advice = AdviceBundle::builder("faulty_change")
            .pointcut(match_all())
            .on_return(vec![], |_| Err(Fault::new("return hook broke")))
            .change_return()
            .build()
            .unwrap();

        let result = invoke(advice).unwrap();

        assert_eq!(result, Value::Str("xyz".to_string()));
    }
}

impl BindCtx<'_> {
    fn bind(&self, param: &HookParam) -> Value {
        match param {
            HookParam::Target => self
                .handle
                .target_ref()
                .map(Value::from_shared)
                .unwrap_or(Value::Unit),
            HookParam::MethodArg(index) => {
                self.args.get(*index).cloned().unwrap_or(Value::Unit)
            }
            HookParam::MethodArgs => Value::List(self.args.to_vec()),
            HookParam::MethodName => Value::Str(self.method_name.to_string()),
            HookParam::ReturnValue => self.ret.cloned().unwrap_or(Value::Unit),
            HookParam::Thrown => self
                .fault
                .map(|f| Value::obj(f.clone()))
                .unwrap_or(Value::Unit),
            HookParam::Traveler => self.traveler.cloned().unwrap_or(Value::Unit),
        }
    }
}
