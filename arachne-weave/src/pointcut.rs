//! 切点（Pointcut）模式系统
//!
//! 决定一个方法签名是否被某条切点选中：
//! 类型模式、方法名模式逐个匹配，参数模式按位置遍历，
//! 支持单参数通配 `*` 与仅限末位的剩余参数通配 `..`。
//! 匹配是纯函数且全定义：不抛错、不兜底猜测。

use std::fmt;

use arachne_core::{MethodSpec, WeaveError, WeaveResult};
use regex::Regex;

/// 名称模式
///
/// 精确名称，或带 `*` 通配段的表达式：
/// - `*` - 匹配任意名称
/// - `app.User*` - 以 app.User 开头
/// - `*Service` - 以 Service 结尾
#[derive(Clone)]
pub enum NamePattern {
    /// 精确匹配
    Exact(String),

    /// 通配匹配（保留原始表达式用于展示）
    Wildcard { raw: String, regex: Regex },
}

impl NamePattern {
    /// 解析名称模式
    ///
    /// 空模式在定义时被拒绝；`*` 之外的文本按字面量处理。
    pub fn parse(pattern: &str) -> WeaveResult<Self> {
        if pattern.is_empty() {
            return Err(WeaveError::InvalidPointcut(
                "name pattern must not be empty".to_string(),
            ));
        }

        if !pattern.contains('*') {
            return Ok(NamePattern::Exact(pattern.to_string()));
        }

        // 把 * 之间的字面段逐段转义，避免把 '.' 等当成正则语法
        let escaped: Vec<String> = pattern.split('*').map(|s| regex::escape(s)).collect();
        let regex_pattern = format!("^{}$", escaped.join(".*"));
        let regex = Regex::new(&regex_pattern).map_err(|e| {
            WeaveError::InvalidPointcut(format!("bad pattern '{}': {}", pattern, e))
        })?;

        Ok(NamePattern::Wildcard {
            raw: pattern.to_string(),
            regex,
        })
    }

    /// 检查名称是否匹配
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Exact(exact) => exact == name,
            NamePattern::Wildcard { regex, .. } => regex.is_match(name),
        }
    }

    /// 原始模式文本
    pub fn raw(&self) -> &str {
        match self {
            NamePattern::Exact(exact) => exact,
            NamePattern::Wildcard { raw, .. } => raw,
        }
    }
}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamePattern({})", self.raw())
    }
}

/// 参数模式元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPattern {
    /// 精确的声明类型名；原语与装箱类型名互不匹配
    Exact(String),

    /// `*`：任意单个参数类型（包括原语）
    AnyType,

    /// `..`：其余任意参数，只允许出现在末位
    AnyRemaining,
}

impl ArgPattern {
    fn parse(pattern: &str) -> WeaveResult<Self> {
        match pattern {
            ".." => Ok(ArgPattern::AnyRemaining),
            "*" => Ok(ArgPattern::AnyType),
            "" => Err(WeaveError::InvalidPointcut(
                "argument pattern must not be empty".to_string(),
            )),
            other => Ok(ArgPattern::Exact(other.to_string())),
        }
    }
}

/// 切点
///
/// 一条选择被织入方法的声明式规则。构建后不可变。
///
/// ## 使用示例
///
/// ```ignore
/// let pointcut = Pointcut::builder()
///     .type_pattern("app.Misc")
///     .method_pattern("execute*")
///     .args(&["str", ".."])
///     .nestable(false)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct Pointcut {
    /// 目标类型模式（类名或接口名）
    pub type_pattern: NamePattern,

    /// 方法名模式
    pub method_pattern: NamePattern,

    /// 参数模式，按位置排列
    pub arg_patterns: Vec<ArgPattern>,

    /// 是否允许同线程重入时再次触发协议
    pub nestable: bool,

    /// 标记文本：声明后织入器为匹配方法合成内部包装方法，
    /// 包装名嵌入该文本用于归因
    pub marker: Option<String>,
}

impl Pointcut {
    /// 创建切点构建器
    pub fn builder() -> PointcutBuilder {
        PointcutBuilder::new()
    }

    /// 类型模式是否匹配类名或其实现的任一接口
    pub fn matches_type(&self, class_name: &str, interfaces: &[String]) -> bool {
        self.type_pattern.matches(class_name)
            || interfaces.iter().any(|i| self.type_pattern.matches(i))
    }

    /// 方法签名是否匹配
    pub fn matches_method(&self, method: &MethodSpec) -> bool {
        if !self.method_pattern.matches(&method.name) {
            return false;
        }
        self.matches_args(&method.param_types)
    }

    /// 完整匹配：声明类型 + 方法签名
    pub fn matches(&self, class_name: &str, interfaces: &[String], method: &MethodSpec) -> bool {
        self.matches_type(class_name, interfaces) && self.matches_method(method)
    }

    fn matches_args(&self, param_types: &[String]) -> bool {
        let mut pos = 0;
        for pattern in &self.arg_patterns {
            match pattern {
                // 末位剩余通配：其余参数（包括零个）全部接受
                ArgPattern::AnyRemaining => return true,
                ArgPattern::AnyType => {
                    if pos >= param_types.len() {
                        return false;
                    }
                    pos += 1;
                }
                ArgPattern::Exact(expected) => {
                    if pos >= param_types.len() || param_types[pos] != *expected {
                        return false;
                    }
                    pos += 1;
                }
            }
        }
        // 没有剩余通配时要求元数完全一致
        pos == param_types.len()
    }
}

/// 切点构建器
///
/// `build()` 在定义时校验模式合法性，非法声明立刻被拒绝。
pub struct PointcutBuilder {
    type_pattern: String,
    method_pattern: String,
    args: Option<Vec<String>>,
    nestable: bool,
    marker: Option<String>,
}

impl PointcutBuilder {
    fn new() -> Self {
        Self {
            type_pattern: "*".to_string(),
            method_pattern: "*".to_string(),
            args: None,
            nestable: true,
            marker: None,
        }
    }

    /// 目标类型模式
    pub fn type_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.type_pattern = pattern.into();
        self
    }

    /// 方法名模式
    pub fn method_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.method_pattern = pattern.into();
        self
    }

    /// 参数模式列表
    ///
    /// 未声明时默认为 `..`（任意参数）；显式声明空列表则只匹配无参方法。
    pub fn args(mut self, patterns: &[&str]) -> Self {
        self.args = Some(patterns.iter().map(|s| s.to_string()).collect());
        self
    }

    /// 是否可嵌套（默认 true）
    pub fn nestable(mut self, nestable: bool) -> Self {
        self.nestable = nestable;
        self
    }

    /// 标记文本，用于合成包装方法名
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// 构建并校验切点
    pub fn build(self) -> WeaveResult<Pointcut> {
        let type_pattern = NamePattern::parse(&self.type_pattern)?;
        let method_pattern = NamePattern::parse(&self.method_pattern)?;

        let raw_args = self.args.unwrap_or_else(|| vec!["..".to_string()]);
        let mut arg_patterns = Vec::with_capacity(raw_args.len());
        for (idx, raw) in raw_args.iter().enumerate() {
            let pattern = ArgPattern::parse(raw)?;
            if pattern == ArgPattern::AnyRemaining && idx != raw_args.len() - 1 {
                return Err(WeaveError::InvalidPointcut(
                    "'..' is only allowed as the final argument pattern".to_string(),
                ));
            }
            arg_patterns.push(pattern);
        }

        if let Some(marker) = &self.marker {
            if marker.is_empty() {
                return Err(WeaveError::InvalidPointcut(
                    "marker text must not be empty".to_string(),
                ));
            }
        }

        Ok(Pointcut {
            type_pattern,
            method_pattern,
            arg_patterns,
            nestable: self.nestable,
            marker: self.marker,
        })
    }
}
