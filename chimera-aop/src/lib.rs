//! Chimera AOP - 方法拦截运行时
//!
//! 提供：
//! - 通知适配器注册表，把 Before、AfterReturning、Throws 通知转换为拦截器
//! - 按顺序执行的拦截器调用链
//! - 切点表达式与引入（Introduction）
//! - 多种目标源：单例、原型、对象池、线程绑定、可热替换
//! - 从 TOML 加载的目标源配置

pub mod advice;
pub mod config;
pub mod error;
pub mod exception;
pub mod interceptor;
pub mod introduction;
pub mod invocation;
pub mod pointcut;
pub mod pool;
pub mod proxy;
pub mod registry;
pub mod target_source;
pub mod throws;

// 重新导出核心类型
pub use advice::{
    Advice, AdviceType, Advisable, Advisor, AfterReturningAdvice, DefaultPointcutAdvisor, MethodBeforeAdvice,
};
pub use config::{AopConfig, ConfiguredTargetSource, TargetSourceConfig};
pub use error::{AopError, AopResult};
pub use exception::{Exception, ExceptionKind};
pub use interceptor::{AfterReturningAdviceInterceptor, FnInterceptor, MethodBeforeAdviceInterceptor, MethodInterceptor};
pub use introduction::IntroductionInterceptor;
pub use invocation::{Arguments, Invocation, InvocationResult, Method, ReflectiveMethodInvocation, ReturnValue};
pub use pointcut::PointcutExpression;
pub use pool::{ObjectPool, PooledObjectFactory, SimpleObjectPool, WhenExhausted};
pub use proxy::{AopProxy, ProxyFactory};
pub use registry::{
    get_global_adapter_registry, AdvisorAdapter, AdvisorAdapterRegistration, AdvisorAdapterRegistry,
};
pub use target_source::{
    HotSwappableTargetSource, PoolingConfig, PoolingTargetSource, PrototypeTargetSource, SingletonTargetSource,
    TargetSource, ThreadLocalTargetSource, ThreadLocalTargetSourceStats,
};
pub use throws::{ThrowsAdvice, ThrowsAdviceInterceptor, ThrowsHandlers};

// 导出 inventory 供注册自定义适配器使用
pub use inventory;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::{Advice, Advisable, Advisor, AfterReturningAdvice, DefaultPointcutAdvisor, MethodBeforeAdvice};
    pub use crate::error::{AopError, AopResult};
    pub use crate::exception::{self, Exception, ExceptionKind};
    pub use crate::interceptor::{FnInterceptor, MethodInterceptor};
    pub use crate::invocation::{Arguments, Invocation, InvocationResult, Method, ReturnValue};
    pub use crate::pointcut::PointcutExpression;
    pub use crate::proxy::{AopProxy, ProxyFactory};
    pub use crate::registry::{get_global_adapter_registry, AdvisorAdapter, AdvisorAdapterRegistry};
    pub use crate::target_source::{
        HotSwappableTargetSource, PoolingConfig, PoolingTargetSource, PrototypeTargetSource, SingletonTargetSource,
        TargetSource, ThreadLocalTargetSource, ThreadLocalTargetSourceStats,
    };
    pub use crate::throws::{ThrowsAdvice, ThrowsHandlers};
}
