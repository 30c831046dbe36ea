//! 目标源配置
//!
//! 从 TOML 描述目标源，例如：
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [target_sources.connections]
//! kind = "pooling"
//! target = "connection"
//! max_size = 4
//! when_exhausted = "fail"
//!
//! [target_sources.sessions]
//! kind = "thread_local"
//! target = "session"
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chimera_core::{BeanFactory, BeanFactoryExt, DefaultBeanFactory, LoggingConfig};
use serde::Deserialize;

use crate::advice::Advisor;
use crate::error::{AopError, AopResult};
use crate::pool::WhenExhausted;
use crate::proxy::ProxyFactory;
use crate::target_source::{
    HotSwappableTargetSource, PoolingTargetSource, PrototypeTargetSource, SingletonTargetSource, TargetSource,
    ThreadLocalTargetSource, DEFAULT_MAX_SIZE,
};

/// AOP 配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AopConfig {
    /// 日志配置，缺省时不初始化日志
    pub logging: Option<LoggingConfig>,

    /// 按名称声明的目标源
    pub target_sources: HashMap<String, TargetSourceConfig>,
}

impl AopConfig {
    /// 从文件加载
    pub fn from_file(path: impl AsRef<Path>) -> AopResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AopError::InvalidConfig(format!("failed to read config file {:?}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(content: &str) -> AopResult<Self> {
        let config: AopConfig =
            toml::from_str(content).map_err(|e| AopError::InvalidConfig(format!("failed to parse config: {}", e)))?;
        for (name, source) in &config.target_sources {
            source.validate(name)?;
        }
        Ok(config)
    }

    /// 按配置初始化日志
    pub fn init_logging(&self) -> AopResult<()> {
        match &self.logging {
            Some(logging) => Ok(logging.clone().init()?),
            None => Ok(()),
        }
    }

    pub fn target_source(&self, name: &str) -> AopResult<&TargetSourceConfig> {
        self.target_sources
            .get(name)
            .ok_or_else(|| AopError::InvalidConfig(format!("no target source named '{}'", name)))
    }

    /// 按名称构建目标源
    pub fn build_target_source<T: Any + Send + Sync>(
        &self,
        name: &str,
        factory: &Arc<DefaultBeanFactory>,
    ) -> AopResult<ConfiguredTargetSource<T>> {
        self.target_source(name)?.build(factory)
    }
}

fn default_max_size() -> usize {
    DEFAULT_MAX_SIZE
}

/// 单个目标源的配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSourceConfig {
    Singleton {
        target: String,
    },
    Prototype {
        target: String,
    },
    Pooling {
        target: String,
        #[serde(default = "default_max_size")]
        max_size: usize,
        #[serde(default)]
        when_exhausted: WhenExhausted,
    },
    ThreadLocal {
        target: String,
    },
    HotSwappable {
        target: String,
    },
}

impl TargetSourceConfig {
    /// 目标 Bean 名称
    pub fn target(&self) -> &str {
        match self {
            TargetSourceConfig::Singleton { target }
            | TargetSourceConfig::Prototype { target }
            | TargetSourceConfig::Pooling { target, .. }
            | TargetSourceConfig::ThreadLocal { target }
            | TargetSourceConfig::HotSwappable { target } => target,
        }
    }

    fn validate(&self, name: &str) -> AopResult<()> {
        if self.target().trim().is_empty() {
            return Err(AopError::InvalidConfig(format!(
                "target source '{}' has an empty target bean name",
                name
            )));
        }
        if let TargetSourceConfig::Pooling { max_size: 0, .. } = self {
            return Err(AopError::InvalidConfig(format!(
                "target source '{}' must allow at least one pooled instance",
                name
            )));
        }
        Ok(())
    }

    /// 构建目标源
    ///
    /// 原型类目标源挂接到 `factory`；需要销毁的目标源注册到 `factory`，随其关闭而销毁
    pub fn build<T: Any + Send + Sync>(
        &self,
        factory: &Arc<DefaultBeanFactory>,
    ) -> AopResult<ConfiguredTargetSource<T>> {
        let bean_factory: Arc<dyn BeanFactory> = factory.clone();
        let built = match self {
            TargetSourceConfig::Singleton { target } => ConfiguredTargetSource::Singleton(Arc::new(
                SingletonTargetSource::new(factory.get_typed_bean::<T>(target)?),
            )),
            TargetSourceConfig::Prototype { target } => {
                let source = PrototypeTargetSource::new(target.clone());
                source.attach(bean_factory)?;
                ConfiguredTargetSource::Prototype(Arc::new(source))
            }
            TargetSourceConfig::Pooling {
                target,
                max_size,
                when_exhausted,
            } => {
                let source = Arc::new(
                    PoolingTargetSource::new(target.clone())
                        .with_max_size(*max_size)
                        .with_when_exhausted(*when_exhausted),
                );
                source.attach(bean_factory)?;
                factory.register_disposable(source.clone());
                ConfiguredTargetSource::Pooling(source)
            }
            TargetSourceConfig::ThreadLocal { target } => {
                let source = Arc::new(ThreadLocalTargetSource::new(target.clone()));
                source.attach(bean_factory)?;
                factory.register_disposable(source.clone());
                ConfiguredTargetSource::ThreadLocal(source)
            }
            TargetSourceConfig::HotSwappable { target } => ConfiguredTargetSource::HotSwappable(Arc::new(
                HotSwappableTargetSource::new(factory.get_typed_bean::<T>(target)?),
            )),
        };
        tracing::debug!(target_bean = self.target(), kind = built.kind(), "Built target source from configuration");
        Ok(built)
    }
}

/// 由配置构建出的目标源，保留具体类型以便访问各自的操作
pub enum ConfiguredTargetSource<T> {
    Singleton(Arc<SingletonTargetSource<T>>),
    Prototype(Arc<PrototypeTargetSource<T>>),
    Pooling(Arc<PoolingTargetSource<T>>),
    ThreadLocal(Arc<ThreadLocalTargetSource<T>>),
    HotSwappable(Arc<HotSwappableTargetSource<T>>),
}

impl<T: Any + Send + Sync> ConfiguredTargetSource<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            ConfiguredTargetSource::Singleton(_) => "singleton",
            ConfiguredTargetSource::Prototype(_) => "prototype",
            ConfiguredTargetSource::Pooling(_) => "pooling",
            ConfiguredTargetSource::ThreadLocal(_) => "thread_local",
            ConfiguredTargetSource::HotSwappable(_) => "hot_swappable",
        }
    }

    pub fn target_source(&self) -> Arc<dyn TargetSource<T>> {
        match self {
            ConfiguredTargetSource::Singleton(s) => s.clone(),
            ConfiguredTargetSource::Prototype(s) => s.clone(),
            ConfiguredTargetSource::Pooling(s) => s.clone(),
            ConfiguredTargetSource::ThreadLocal(s) => s.clone(),
            ConfiguredTargetSource::HotSwappable(s) => s.clone(),
        }
    }

    /// 目标源提供的引入（池统计、线程统计）
    pub fn introduction(&self) -> Option<Arc<dyn Advisor>> {
        match self {
            ConfiguredTargetSource::Pooling(s) => Some(s.pooling_config_advisor()),
            ConfiguredTargetSource::ThreadLocal(s) => Some(s.stats_advisor()),
            _ => None,
        }
    }

    /// 以该目标源创建代理工厂，并带上目标源提供的引入
    pub fn proxy_factory(&self) -> ProxyFactory<T> {
        let mut factory = ProxyFactory::for_target_source(self.target_source());
        if let Some(introduction) = self.introduction() {
            factory.add_advisor(introduction);
        }
        factory
    }
}
