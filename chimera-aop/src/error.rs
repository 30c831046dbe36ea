//! AOP 运行时错误
//!
//! 配置错误在构造/挂接时立即返回；分派错误在包装通知时返回。
//! 运行时调用失败使用 [`Exception`](crate::Exception)。

use chimera_core::ContainerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AopError {
    /// 没有任何适配器能识别该通知
    #[error("Advice object [{0}] is neither a supported subinterface of Advice nor a MethodInterceptor")]
    UnknownAdviceType(String),

    /// 异常通知没有声明任何处理器
    #[error("At least one handler method must be found in throws advice '{0}'")]
    NoThrowsHandlers(String),

    /// 同一异常种类注册了多个处理器
    #[error("Only one handler per exception kind is allowed, found duplicate for '{kind}'")]
    DuplicateThrowsHandler { kind: String },

    /// 原型类目标源指向了单例作用域的 Bean
    #[error("Cannot use prototype-based target source against singleton bean '{0}': instance would not be created on each call")]
    SingletonScopedTarget(String),

    /// 热替换目标为空
    #[error("Cannot swap to a null target")]
    NullSwapTarget,

    /// 目标实例类型与目标源声明的类型不一致
    #[error("Target type mismatch: expected {expected}, found {actual}")]
    TargetTypeMismatch { expected: String, actual: String },

    /// 目标源尚未挂接到 BeanFactory
    #[error("Target source '{0}' has not been attached to a bean factory")]
    NotInitialized(String),

    /// 对象池已关闭
    #[error("Object pool is closed")]
    PoolClosed,

    /// 对象池已耗尽
    #[error("Object pool exhausted: all {max_size} instance(s) are in use")]
    PoolExhausted { max_size: usize },

    /// 配置无效
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// AOP 操作结果
pub type AopResult<T> = std::result::Result<T, AopError>;

impl From<AopError> for ContainerError {
    fn from(error: AopError) -> Self {
        match error {
            AopError::Container(inner) => inner,
            other => ContainerError::Other(anyhow::Error::new(other)),
        }
    }
}
