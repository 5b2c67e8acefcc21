//! 通知（Advice）模型
//!
//! 一条通知捆绑一个切点和最多五个钩子：
//! `is_enabled`、`on_before`、`on_return`、`on_throw`、`on_after`。
//! 每个钩子声明自己的注入参数列表，注入契约是显式枚举而非位置约定。
//! 钩子参数的合法性在定义时校验。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arachne_core::{Fault, Value, WeaveError, WeaveResult};

use crate::pointcut::Pointcut;

/// 可注入的钩子参数种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookParam {
    /// 目标实例（静态方法上绑定为 `Unit`）
    Target,

    /// 按位置的单个方法参数
    MethodArg(usize),

    /// 完整参数数组
    MethodArgs,

    /// 方法名（带标记包装时为合成包装名）
    MethodName,

    /// 返回值（仅 `on_return`）
    ReturnValue,

    /// 逃逸故障（仅 `on_throw`）
    Thrown,

    /// 从 `on_before` 携带的 traveler 值
    Traveler,
}

/// 钩子过程及其声明的注入参数
#[derive(Clone)]
pub struct Hook {
    /// 注入参数列表，按声明顺序绑定
    pub params: Vec<HookParam>,

    /// 钩子过程
    pub run: Arc<dyn Fn(&[Value]) -> Result<Value, Fault> + Send + Sync>,
}

impl Hook {
    /// 创建钩子
    pub fn new<F>(params: Vec<HookParam>, run: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        Self {
            params,
            run: Arc::new(run),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").field("params", &self.params).finish()
    }
}

// 通知身份：进程内唯一，嵌套抑制按它记账
static NEXT_ADVICE_ID: AtomicU64 = AtomicU64::new(1);

/// 通知捆绑
///
/// 构建后不可变；织入开始前发布一次，之后只读共享。
pub struct AdviceBundle {
    /// 进程内唯一的通知身份
    pub id: u64,

    /// 通知名称（诊断与注册用）
    pub name: String,

    /// 绑定的切点
    pub pointcut: Pointcut,

    /// 启用检查，缺省视为恒真
    pub is_enabled: Option<Hook>,

    /// 前置钩子，其返回值作为 traveler 向后传递
    pub on_before: Option<Hook>,

    /// 正常返回钩子
    pub on_return: Option<Hook>,

    /// 故障逃逸钩子
    pub on_throw: Option<Hook>,

    /// 收尾钩子（两条路径都执行）
    pub on_after: Option<Hook>,

    /// `on_return` 钩子的成功结果是否替换方法返回值
    pub change_return: bool,
}

impl AdviceBundle {
    /// 创建通知构建器
    pub fn builder(name: impl Into<String>) -> AdviceBuilder {
        AdviceBuilder::new(name)
    }
}

impl fmt::Debug for AdviceBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceBundle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pointcut", &self.pointcut)
            .field("change_return", &self.change_return)
            .finish()
    }
}

/// 通知构建器
///
/// ## 使用示例
///
/// ```ignore
/// let advice = AdviceBundle::builder("basic")
///     .pointcut(pointcut)
///     .on_before(vec![HookParam::MethodName], |params| {
///         Ok(Value::Str("a traveler".into()))
///     })
///     .on_after(vec![HookParam::Traveler], |params| Ok(Value::Unit))
///     .build()?;
/// ```
pub struct AdviceBuilder {
    name: String,
    pointcut: Option<Pointcut>,
    is_enabled: Option<Hook>,
    on_before: Option<Hook>,
    on_return: Option<Hook>,
    on_throw: Option<Hook>,
    on_after: Option<Hook>,
    change_return: bool,
}

impl AdviceBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pointcut: None,
            is_enabled: None,
            on_before: None,
            on_return: None,
            on_throw: None,
            on_after: None,
            change_return: false,
        }
    }

    /// 绑定切点
    pub fn pointcut(mut self, pointcut: Pointcut) -> Self {
        self.pointcut = Some(pointcut);
        self
    }

    /// 启用检查钩子
    pub fn is_enabled<F>(mut self, params: Vec<HookParam>, run: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        self.is_enabled = Some(Hook::new(params, run));
        self
    }

    /// 前置钩子
    pub fn on_before<F>(mut self, params: Vec<HookParam>, run: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        self.on_before = Some(Hook::new(params, run));
        self
    }

    /// 正常返回钩子
    pub fn on_return<F>(mut self, params: Vec<HookParam>, run: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        self.on_return = Some(Hook::new(params, run));
        self
    }

    /// 故障逃逸钩子
    pub fn on_throw<F>(mut self, params: Vec<HookParam>, run: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        self.on_throw = Some(Hook::new(params, run));
        self
    }

    /// 收尾钩子
    pub fn on_after<F>(mut self, params: Vec<HookParam>, run: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        self.on_after = Some(Hook::new(params, run));
        self
    }

    /// 声明 `on_return` 的结果替换方法返回值
    pub fn change_return(mut self) -> Self {
        self.change_return = true;
        self
    }

    /// 构建并校验通知
    pub fn build(self) -> WeaveResult<Arc<AdviceBundle>> {
        let invalid = |reason: &str| WeaveError::InvalidAdvice {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        let pointcut = match &self.pointcut {
            Some(p) => p.clone(),
            None => return Err(invalid("advice requires a pointcut")),
        };

        Self::check_hook(&self.name, "is_enabled", &self.is_enabled, &[])?;
        Self::check_hook(&self.name, "on_before", &self.on_before, &[])?;
        Self::check_hook(
            &self.name,
            "on_return",
            &self.on_return,
            &[HookParam::ReturnValue, HookParam::Traveler],
        )?;
        Self::check_hook(
            &self.name,
            "on_throw",
            &self.on_throw,
            &[HookParam::Thrown, HookParam::Traveler],
        )?;
        Self::check_hook(
            &self.name,
            "on_after",
            &self.on_after,
            &[HookParam::Traveler],
        )?;

        if self.change_return && self.on_return.is_none() {
            return Err(invalid("change_return requires an on_return hook"));
        }

        Ok(Arc::new(AdviceBundle {
            id: NEXT_ADVICE_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            pointcut,
            is_enabled: self.is_enabled,
            on_before: self.on_before,
            on_return: self.on_return,
            on_throw: self.on_throw,
            on_after: self.on_after,
            change_return: self.change_return,
        }))
    }

    // 每个钩子只允许基础参数（Target/MethodArg/MethodArgs/MethodName）
    // 加上本阶段额外放行的参数
    fn check_hook(
        name: &str,
        hook_name: &str,
        hook: &Option<Hook>,
        extra: &[HookParam],
    ) -> WeaveResult<()> {
        let Some(hook) = hook else {
            return Ok(());
        };
        for param in &hook.params {
            let allowed = matches!(
                param,
                HookParam::Target
                    | HookParam::MethodArg(_)
                    | HookParam::MethodArgs
                    | HookParam::MethodName
            ) || extra.contains(param);
            if !allowed {
                return Err(WeaveError::InvalidAdvice {
                    name: name.to_string(),
                    reason: format!("{:?} cannot be injected into {}", param, hook_name),
                });
            }
        }
        Ok(())
    }
}
