// arachne-core: 织入引擎的核心模型
//
// 提供与织入算法无关的基础设施：
// - 动态值与故障模型
// - 声明式类描述符（方法签名 + 可调用方法体）
// - 方法体调用上下文与派发接缝
// - 配置与日志初始化

pub mod call;
pub mod class;
pub mod config;
pub mod error;
pub mod fault;
pub mod logging;
pub mod value;

// 重新导出常用类型
pub use call::{CallCtx, Dispatcher};
pub use class::{ClassBuilder, ClassSpec, MethodBody, MethodSpec, StateFactory};
pub use config::{EngineConfig, LoggingSection, WeaverSection};
pub use error::{WeaveError, WeaveResult};
pub use fault::Fault;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use value::Value;

// 导出 anyhow 供应用侧组合错误
pub use anyhow;

/// 预导入模块
pub mod prelude {
    pub use crate::call::{CallCtx, Dispatcher};
    pub use crate::class::{ClassBuilder, ClassSpec, MethodBody, MethodSpec, StateFactory};
    pub use crate::config::EngineConfig;
    pub use crate::error::{WeaveError, WeaveResult};
    pub use crate::fault::Fault;
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::value::Value;
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
