// chimera-core: AOP 运行时依赖的容器契约
//
// 提供：
// - 按名称获取对象的 BeanFactory 契约及其默认实现
// - 单例和原型作用域
// - 生命周期管理（init/destroy 回调、关闭时销毁）
// - 日志配置

pub mod bean;
pub mod bean_factory;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod scope;

// 重新导出常用类型
pub use bean::{BeanDefinition, SharedBean, TypeInfo};
pub use bean_factory::{BeanFactory, BeanFactoryExt, DefaultBeanFactory};
pub use error::{ContainerError, ContainerResult, Result};
pub use lifecycle::{BeanFactoryAware, DisposableBean};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use scope::Scope;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::bean::{BeanDefinition, SharedBean, TypeInfo};
    pub use crate::bean_factory::{BeanFactory, BeanFactoryExt, DefaultBeanFactory};
    pub use crate::error::{ContainerError, ContainerResult, Result};
    pub use crate::lifecycle::{BeanFactoryAware, DisposableBean};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::scope::Scope;
    pub use anyhow::{anyhow, Context};
}
