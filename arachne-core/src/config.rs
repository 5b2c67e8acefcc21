//! 引擎配置
//!
//! TOML 配置加上环境变量覆盖。配置在织入开始前读取一次，
//! 之后只读共享，不再变更。
//!
//! ## 配置示例
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "compact"
//!
//! [weaver]
//! log_hook_faults = true
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{WeaveError, WeaveResult};
use crate::logging::LoggingConfig;

/// 引擎配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 日志配置节
    pub logging: LoggingSection,

    /// 织入器配置节
    pub weaver: WeaverSection,
}

/// 日志配置节
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// 日志级别
    pub level: String,

    /// 日志格式
    pub format: String,

    /// 自定义过滤器
    pub filter: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            filter: None,
        }
    }
}

/// 织入器配置节
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeaverSection {
    /// 是否把被隔离的钩子故障记录为 warn（否则仅 trace）
    pub log_hook_faults: bool,
}

impl Default for WeaverSection {
    fn default() -> Self {
        Self {
            log_hook_faults: true,
        }
    }
}

impl EngineConfig {
    /// 从 TOML 文本解析配置
    pub fn from_toml_str(text: &str) -> WeaveResult<Self> {
        toml::from_str(text).map_err(|e| WeaveError::Config(e.to_string()))
    }

    /// 从 TOML 文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> WeaveResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            WeaveError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// 应用环境变量覆盖
    ///
    /// `ARACHNE_LOG_LEVEL`、`ARACHNE_LOG_FORMAT`、`ARACHNE_LOG_FILTER`。
    pub fn apply_env(mut self) -> Self {
        if let Ok(level) = std::env::var("ARACHNE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("ARACHNE_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(filter) = std::env::var("ARACHNE_LOG_FILTER") {
            self.logging.filter = Some(filter);
        }
        self
    }

    /// 转换为日志配置
    pub fn logging_config(&self) -> WeaveResult<LoggingConfig> {
        let level = self
            .logging
            .level
            .parse()
            .map_err(WeaveError::Config)?;
        let format = self
            .logging
            .format
            .parse()
            .map_err(WeaveError::Config)?;

        let mut config = LoggingConfig::new().level(level).format(format);
        if let Some(filter) = &self.logging.filter {
            config = config.filter(filter.clone());
        }
        Ok(config)
    }
}
