//! 故障（Fault）模型
//!
//! 方法体逃逸失败的结构化表示，携带消息、类型名与错误源链，
//! 供 on_throw 钩子观察。协议原样重新抛出观察到的同一个故障。

use std::error::Error;
use std::fmt;

/// 结构化故障信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// 故障消息
    pub message: String,

    /// 故障类型名称
    pub fault_type: String,

    /// 错误源链（cause chain）
    pub source_chain: Vec<String>,
}

impl Fault {
    /// 创建简单故障（只包含消息）
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fault_type: "Fault".to_string(),
            source_chain: Vec::new(),
        }
    }

    /// 创建带类型名的故障
    pub fn with_type(message: impl Into<String>, fault_type: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fault_type: fault_type.into(),
            source_chain: Vec::new(),
        }
    }

    /// 从标准错误创建故障，保留错误源链
    pub fn from_error<E: Error>(error: &E) -> Self {
        let message = error.to_string();
        let fault_type = std::any::type_name::<E>().to_string();

        let mut source_chain = Vec::new();
        let mut current_source = error.source();
        while let Some(source) = current_source {
            source_chain.push(source.to_string());
            current_source = source.source();
        }

        Self {
            message,
            fault_type,
            source_chain,
        }
    }

    /// 获取完整的故障描述（包含源链）
    pub fn full_description(&self) -> String {
        if self.source_chain.is_empty() {
            self.message.clone()
        } else {
            format!(
                "{}\nCaused by:\n  {}",
                self.message,
                self.source_chain.join("\n  ")
            )
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.fault_type, self.message)
    }
}

impl Error for Fault {}
