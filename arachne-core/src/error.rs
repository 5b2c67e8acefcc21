//! 统一错误类型
//!
//! 声明与织入阶段的错误走 `WeaveError`，同步返回给发起织入的一方；
//! 通知钩子的运行期失败不在此列，它们被协议就地隔离（见织入层）。
//! 应用侧组合推荐 `anyhow::Context`。

/// 织入引擎错误
#[derive(Debug, thiserror::Error)]
pub enum WeaveError {
    /// 切点声明非法（定义时拒绝）
    #[error("invalid pointcut: {0}")]
    InvalidPointcut(String),

    /// 通知声明非法（定义时拒绝）
    #[error("invalid advice '{name}': {reason}")]
    InvalidAdvice { name: String, reason: String },

    /// 混入声明非法（定义时拒绝）
    #[error("invalid mixin '{name}': {reason}")]
    InvalidMixin { name: String, reason: String },

    /// 类声明非法（定义时拒绝）
    #[error("invalid class '{name}': {reason}")]
    InvalidClass { name: String, reason: String },

    /// 请求的类未注册
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// 单个类的织入失败，不影响其它类
    #[error("weaving failed for class '{class}': {reason}")]
    Transform { class: String, reason: String },

    /// 配置错误
    #[error("invalid configuration: {0}")]
    Config(String),

    /// 其它错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 织入引擎结果类型
pub type WeaveResult<T> = std::result::Result<T, WeaveError>;
