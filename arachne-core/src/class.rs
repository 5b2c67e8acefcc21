//! 类模型
//!
//! 声明式的类描述符：方法签名加可调用方法体。
//! 描述符在定义时注册、注册时校验，织入引擎据此产出织入后的类。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::call::CallCtx;
use crate::error::{WeaveError, WeaveResult};
use crate::fault::Fault;
use crate::value::Value;

/// 方法体：接收调用上下文，返回值或故障
pub type MethodBody = Arc<dyn Fn(CallCtx<'_>) -> Result<Value, Fault> + Send + Sync>;

/// 实例状态工厂：每个实例一份私有状态
pub type StateFactory = Arc<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// 方法描述符
///
/// `param_types` 中的名称就是匹配用的声明类型名，
/// 原语名（`i32`、`i64`、`f64`、`bool`、`str`）与装箱类型名互不相同。
#[derive(Clone)]
pub struct MethodSpec {
    /// 方法名称
    pub name: String,

    /// 声明的参数类型名，按位置排列
    pub param_types: Vec<String>,

    /// 声明的返回类型名
    pub return_type: String,

    /// 是否静态方法（协议在无实例引用时也要工作）
    pub is_static: bool,

    /// 方法体
    pub body: MethodBody,
}

impl MethodSpec {
    /// 创建实例方法
    pub fn new<F>(name: impl Into<String>, param_types: &[&str], return_type: &str, body: F) -> Self
    where
        F: Fn(CallCtx<'_>) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            param_types: param_types.iter().map(|s| s.to_string()).collect(),
            return_type: return_type.to_string(),
            is_static: false,
            body: Arc::new(body),
        }
    }

    /// 创建静态方法
    pub fn new_static<F>(
        name: impl Into<String>,
        param_types: &[&str],
        return_type: &str,
        body: F,
    ) -> Self
    where
        F: Fn(CallCtx<'_>) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        Self {
            is_static: true,
            ..Self::new(name, param_types, return_type, body)
        }
    }

    /// 完整签名（诊断用）
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.param_types.join(", "))
    }
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("param_types", &self.param_types)
            .field("return_type", &self.return_type)
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// 类描述符
///
/// ## 使用示例
///
/// ```ignore
/// let spec = ClassSpec::builder("app.BasicMisc")
///     .implements("app.Misc")
///     .method(MethodSpec::new("execute1", &[], "unit", |_ctx| Ok(Value::Unit)))
///     .state(|| MyState::default())
///     .build()?;
/// ```
#[derive(Clone)]
pub struct ClassSpec {
    /// 限定类名
    pub name: String,

    /// 实现的能力契约（接口）名称
    pub interfaces: Vec<String>,

    /// 声明的方法集
    pub methods: Vec<MethodSpec>,

    /// 实例状态工厂
    pub state_factory: StateFactory,
}

impl ClassSpec {
    /// 创建类构建器
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name)
    }

    /// 按名称查找方法描述符
    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.name == name)
    }
}

impl fmt::Debug for ClassSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSpec")
            .field("name", &self.name)
            .field("interfaces", &self.interfaces)
            .field("methods", &self.methods)
            .finish()
    }
}

/// 类构建器
pub struct ClassBuilder {
    name: String,
    interfaces: Vec<String>,
    methods: Vec<MethodSpec>,
    state_factory: Option<StateFactory>,
}

impl ClassBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interfaces: Vec::new(),
            methods: Vec::new(),
            state_factory: None,
        }
    }

    /// 声明实现的能力契约
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// 添加方法
    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    /// 设置实例状态工厂
    pub fn state<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.state_factory = Some(Arc::new(move || Box::new(factory())));
        self
    }

    /// 构建并校验类描述符
    ///
    /// 定义时拒绝：空类名、重复方法名。
    pub fn build(self) -> WeaveResult<ClassSpec> {
        if self.name.is_empty() {
            return Err(WeaveError::InvalidClass {
                name: "<unnamed>".to_string(),
                reason: "class name must not be empty".to_string(),
            });
        }

        for (idx, method) in self.methods.iter().enumerate() {
            if method.name.is_empty() {
                return Err(WeaveError::InvalidClass {
                    name: self.name.clone(),
                    reason: "method name must not be empty".to_string(),
                });
            }
            if self.methods[..idx].iter().any(|m| m.name == method.name) {
                return Err(WeaveError::InvalidClass {
                    name: self.name.clone(),
                    reason: format!("duplicate method '{}'", method.name),
                });
            }
        }

        Ok(ClassSpec {
            name: self.name,
            interfaces: self.interfaces,
            methods: self.methods,
            state_factory: self
                .state_factory
                .unwrap_or_else(|| Arc::new(|| Box::new(()))),
        })
    }
}
