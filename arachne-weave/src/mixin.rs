//! 混入（Mixin）模型
//!
//! 向匹配的类声明式地附加一项能力：一个能力契约（接口名）、
//! 一组方法、以及每实例一份的私有后备状态。
//! 以组合实现，不存在任何形式的多重继承。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use arachne_core::{MethodSpec, StateFactory, WeaveError, WeaveResult};

use crate::pointcut::NamePattern;

/// 混入声明
///
/// 目标模式可以指向具体类，也可以指向能力契约（接口）；
/// 后者对随后织入的每个实现类生效。
#[derive(Clone)]
pub struct MixinSpec {
    /// 混入名称
    pub name: String,

    /// 目标类型模式
    pub target: NamePattern,

    /// 附加的能力契约名称
    pub capability: String,

    /// 能力的方法集，方法体通过混入状态读写
    pub methods: Vec<MethodSpec>,

    /// 后备状态工厂：每个织入实例一份隔离状态
    pub state_factory: StateFactory,
}

impl MixinSpec {
    /// 创建混入构建器
    pub fn builder(name: impl Into<String>) -> MixinBuilder {
        MixinBuilder::new(name)
    }

    /// 目标模式是否匹配类名或其实现的任一接口
    pub fn applies_to(&self, class_name: &str, interfaces: &[String]) -> bool {
        self.target.matches(class_name) || interfaces.iter().any(|i| self.target.matches(i))
    }
}

impl fmt::Debug for MixinSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixinSpec")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("capability", &self.capability)
            .finish()
    }
}

/// 混入构建器
///
/// ## 使用示例
///
/// ```ignore
/// let mixin = MixinSpec::builder("has_string")
///     .target("app.Misc")
///     .capability("app.HasString")
///     .method(MethodSpec::new("set_string", &["str"], "unit", |ctx| { .. }))
///     .state(|| String::new())
///     .build()?;
/// ```
pub struct MixinBuilder {
    name: String,
    target: Option<String>,
    capability: Option<String>,
    methods: Vec<MethodSpec>,
    state_factory: Option<StateFactory>,
}

impl MixinBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
            capability: None,
            methods: Vec::new(),
            state_factory: None,
        }
    }

    /// 目标类型模式
    pub fn target(mut self, pattern: impl Into<String>) -> Self {
        self.target = Some(pattern.into());
        self
    }

    /// 附加的能力契约名称
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    /// 添加能力方法
    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    /// 设置后备状态工厂
    pub fn state<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.state_factory = Some(Arc::new(move || Box::new(factory())));
        self
    }

    /// 构建并校验混入声明
    pub fn build(self) -> WeaveResult<Arc<MixinSpec>> {
        let invalid = |reason: String| WeaveError::InvalidMixin {
            name: self.name.clone(),
            reason,
        };

        let target = match &self.target {
            Some(t) => NamePattern::parse(t)?,
            None => return Err(invalid("mixin requires a target pattern".to_string())),
        };

        let capability = match &self.capability {
            Some(c) if !c.is_empty() => c.clone(),
            _ => return Err(invalid("mixin requires a capability name".to_string())),
        };

        if self.methods.is_empty() {
            return Err(invalid("mixin must declare at least one method".to_string()));
        }

        for (idx, method) in self.methods.iter().enumerate() {
            if self.methods[..idx].iter().any(|m| m.name == method.name) {
                return Err(invalid(format!("duplicate mixin method '{}'", method.name)));
            }
        }

        Ok(Arc::new(MixinSpec {
            name: self.name,
            target,
            capability,
            methods: self.methods,
            state_factory: self
                .state_factory
                .unwrap_or_else(|| Arc::new(|| Box::new(()))),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arachne_core::Value;

    fn getter() -> MethodSpec {
        MethodSpec::new("get_string", &[], "str", |ctx| {
            ctx.with_mixin_state::<String, _>(|s| Value::Str(s.clone()))
        })
    }

    #[test]
    fn test_build_mixin() {
        let mixin = MixinSpec::builder("has_string")
            .target("app.Misc")
            .capability("app.HasString")
            .method(getter())
            .state(String::new)
            .build()
            .unwrap();

        assert!(mixin.applies_to("app.Misc", &[]));
        assert!(mixin.applies_to("app.BasicMisc", &["app.Misc".to_string()]));
        assert!(!mixin.applies_to("app.Other", &[]));
    }

    #[test]
    fn test_missing_pieces_rejected() {
        assert!(MixinSpec::builder("m").capability("C").method(getter()).build().is_err());
        assert!(MixinSpec::builder("m").target("T").method(getter()).build().is_err());
        assert!(MixinSpec::builder("m").target("T").capability("C").build().is_err());
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let result = MixinSpec::builder("m")
            .target("T")
            .capability("C")
            .method(getter())
            .method(getter())
            .build();
        assert!(matches!(result, Err(WeaveError::InvalidMixin { .. })));
    }
}
