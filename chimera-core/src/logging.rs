//! 日志配置
//!
//! 运行时的诊断信息全部通过 `tracing` 输出；这里负责安装 `tracing-subscriber`。
//! 配置既可以用构建器组装，也可以从配置文件的 `[logging]` 表或环境变量读取。

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing_subscriber::{fmt as subscriber, EnvFilter};

use crate::{ContainerError, ContainerResult};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    /// 用作 `EnvFilter` 指令的名称
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "warning" {
            return Ok(LogLevel::Warn);
        }
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| format!("Invalid log level: {}", s))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 紧凑格式（默认）
    Compact,
    /// 完整格式
    Full,
    /// JSON，每行一条
    Json,
    /// 多行美化格式，适合开发
    Pretty,
}

impl LogFormat {
    const ALL: [LogFormat; 4] = [LogFormat::Compact, LogFormat::Full, LogFormat::Json, LogFormat::Pretty];

    pub const fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Full => "full",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        LogFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == wanted)
            .ok_or_else(|| format!("Invalid log format: {}", s))
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志配置
///
/// 可以直接从配置文件的 `[logging]` 表反序列化，缺省字段取默认值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（默认：Info）
    pub level: LogLevel,

    /// 日志格式（默认：Compact）
    pub format: LogFormat,

    /// 是否显示时间戳（默认：true）
    pub show_timestamp: bool,

    /// 是否显示目标（模块路径）（默认：false）
    pub show_target: bool,

    /// 是否显示线程 ID（默认：false）
    ///
    /// 线程绑定目标源、对象池的日志通常需要它
    pub show_thread_ids: bool,

    /// 是否显示线程名（默认：false）
    pub show_thread_names: bool,

    /// 自定义过滤器，例如 `"chimera_aop=trace,chimera_core=info"`
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            show_timestamp: true,
            show_target: false,
            show_thread_ids: false,
            show_thread_names: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_timestamp(mut self, show: bool) -> Self {
        self.show_timestamp = show;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    /// 显示线程 ID 和线程名
    pub fn show_threads(mut self, show: bool) -> Self {
        self.show_thread_ids = show;
        self.show_thread_names = show;
        self
    }

    /// 设置自定义过滤器
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 从环境变量读取配置
    ///
    /// `RUST_LOG` 作为过滤器，`LOG_LEVEL`、`LOG_FORMAT` 覆盖级别和格式；
    /// 无法解析的值被忽略
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.filter = std::env::var("RUST_LOG").ok();
        if let Some(level) = env_value("LOG_LEVEL") {
            config.level = level;
        }
        if let Some(format) = env_value("LOG_FORMAT") {
            config.format = format;
        }
        config
    }

    /// 构造过滤器：显式过滤器优先，否则为配置的级别
    ///
    /// 显式过滤器无法解析时退回配置的级别
    pub fn env_filter(&self) -> EnvFilter {
        self.filter
            .as_deref()
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(self.level.as_str()))
    }

    /// 安装全局订阅者
    ///
    /// 进程内只能安装一次，重复调用返回错误
    pub fn init(self) -> ContainerResult<()> {
        // 时间戳开关会改变构建器的类型，只能在每个分支里分别处理
        macro_rules! install {
            ($show_timestamp:expr, $builder:expr) => {{
                let builder = $builder;
                if $show_timestamp {
                    builder.try_init()
                } else {
                    builder.without_time().try_init()
                }
            }};
        }

        let base = subscriber()
            .with_env_filter(self.env_filter())
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_thread_names(self.show_thread_names);

        match self.format {
            LogFormat::Compact => install!(self.show_timestamp, base.compact()),
            LogFormat::Full => install!(self.show_timestamp, base),
            LogFormat::Json => install!(self.show_timestamp, base.json()),
            LogFormat::Pretty => install!(self.show_timestamp, base.pretty()),
        }
        .map_err(|e| ContainerError::Other(anyhow::anyhow!("Failed to initialize logging: {}", e)))?;

        tracing::debug!(level = %self.level, format = %self.format, "Logging initialized");
        Ok(())
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" trace ".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_format_round_trips_through_display() {
        for format in LogFormat::ALL {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::new()
            .level(LogLevel::Debug)
            .format(LogFormat::Json)
            .show_timestamp(false)
            .show_target(true)
            .show_threads(true);

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.show_timestamp);
        assert!(config.show_target);
        assert!(config.show_thread_ids && config.show_thread_names);
    }

    #[test]
    fn test_env_filter_prefers_explicit_directives() {
        let config = LoggingConfig::new().level(LogLevel::Warn);
        assert_eq!(config.env_filter().to_string(), "warn");

        let config = config.filter("chimera_aop=trace");
        assert_eq!(config.env_filter().to_string(), "chimera_aop=trace");
    }

    #[test]
    fn test_logging_config_deserialize_with_defaults() {
        let config: LoggingConfig = toml::from_str(
            r#"
            level = "debug"
            format = "json"
            show_thread_ids = true
            "#,
        )
        .unwrap();

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.show_thread_ids);
        assert!(config.show_timestamp);
        assert!(config.filter.is_none());
    }
}
