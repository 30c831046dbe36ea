use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chimera_core::{BeanFactory, BeanFactoryAware, ContainerResult, DisposableBean};
use once_cell::sync::OnceCell;

use super::{PrototypeTargetSupport, TargetSource};
use crate::advice::{Advice, Advisor, DefaultPointcutAdvisor};
use crate::error::{AopError, AopResult};
use crate::exception::{Exception, ILLEGAL_STATE};
use crate::introduction::IntroductionInterceptor;
use crate::invocation::{Arguments, Method, ReturnValue};
use crate::pointcut::PointcutExpression;
use crate::pool::{ObjectPool, PooledObjectFactory, SimpleObjectPool, WhenExhausted};

/// 默认的池容量
pub const DEFAULT_MAX_SIZE: usize = 8;

/// 对象池统计信息
///
/// 通过 [`PoolingTargetSource::pooling_config_advisor`] 引入到代理上后，
/// 可以用 [`pooling_config`] 中的方法标识经代理查询。
pub trait PoolingConfig {
    fn max_size(&self) -> usize;

    fn active_count(&self) -> usize;

    fn idle_count(&self) -> usize;
}

/// [`PoolingConfig`] 引入到代理上的方法
pub mod pooling_config {
    use crate::invocation::Method;

    /// 能力名称，即这些方法的声明类型
    pub const CAPABILITY: &str = "PoolingConfig";
    pub const MAX_SIZE: Method = Method::new(CAPABILITY, "max_size");
    pub const ACTIVE_COUNT: Method = Method::new(CAPABILITY, "active_count");
    pub const IDLE_COUNT: Method = Method::new(CAPABILITY, "idle_count");
}

/// 从 BeanFactory 创建池化对象
struct PrototypeObjectFactory<T> {
    support: Arc<PrototypeTargetSupport<T>>,
}

impl<T: Any + Send + Sync> PooledObjectFactory<T> for PrototypeObjectFactory<T> {
    fn make_object(&self) -> AopResult<Arc<T>> {
        self.support.new_prototype_instance()
    }

    fn destroy_object(&self, object: Arc<T>) -> AopResult<()> {
        self.support.destroy_prototype_instance(object)
    }
}

/// 池化目标源
///
/// 挂接到 BeanFactory 时才创建对象池；之前调用 `get_target` 返回
/// [`AopError::NotInitialized`]，销毁后返回 [`AopError::PoolClosed`]。
pub struct PoolingTargetSource<T> {
    support: Arc<PrototypeTargetSupport<T>>,
    max_size: usize,
    when_exhausted: WhenExhausted,
    pool: OnceCell<SimpleObjectPool<T>>,
}

impl<T: Any + Send + Sync> PoolingTargetSource<T> {
    pub fn new(target_bean_name: impl Into<String>) -> Self {
        Self {
            support: Arc::new(PrototypeTargetSupport::new(target_bean_name)),
            max_size: DEFAULT_MAX_SIZE,
            when_exhausted: WhenExhausted::default(),
            pool: OnceCell::new(),
        }
    }

    /// 设置池容量（挂接前有效）
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// 设置池耗尽策略（挂接前有效）
    pub fn with_when_exhausted(mut self, when_exhausted: WhenExhausted) -> Self {
        self.when_exhausted = when_exhausted;
        self
    }

    pub fn target_bean_name(&self) -> &str {
        self.support.target_bean_name()
    }

    pub fn when_exhausted(&self) -> WhenExhausted {
        self.when_exhausted
    }

    /// 挂接到 BeanFactory 并创建对象池
    pub fn attach(&self, factory: Arc<dyn BeanFactory>) -> AopResult<()> {
        if self.pool.get().is_some() {
            return Err(AopError::InvalidConfig(format!(
                "pooling target source for '{}' is already attached",
                self.target_bean_name()
            )));
        }
        let pool = SimpleObjectPool::new(
            PrototypeObjectFactory {
                support: Arc::clone(&self.support),
            },
            self.max_size,
            self.when_exhausted,
        )?;
        self.support.attach(factory)?;

        self.pool.set(pool).map_err(|_| {
            AopError::InvalidConfig(format!(
                "pooling target source for '{}' is already attached",
                self.target_bean_name()
            ))
        })?;
        tracing::info!(
            target_bean = self.target_bean_name(),
            max_size = self.max_size,
            when_exhausted = ?self.when_exhausted,
            "Pooling target source initialized"
        );
        Ok(())
    }

    fn pool(&self) -> AopResult<&SimpleObjectPool<T>> {
        self.pool
            .get()
            .ok_or_else(|| AopError::NotInitialized(self.target_bean_name().to_string()))
    }

    /// 关闭对象池并销毁闲置对象，可重复调用
    pub fn destroy(&self) {
        if let Some(pool) = self.pool.get() {
            tracing::debug!(target_bean = self.target_bean_name(), "Closing pool of target source");
            pool.close();
        }
    }

    /// 通过引入把 [`PoolingConfig`] 暴露到代理上
    pub fn pooling_config_advisor(self: &Arc<Self>) -> Arc<dyn Advisor> {
        let source = Arc::clone(self);
        let interceptor = IntroductionInterceptor::new(
            pooling_config::CAPABILITY,
            move |method: &Method, _args: &Arguments| {
                let value: ReturnValue = match method.name {
                    "max_size" => Box::new(PoolingConfig::max_size(source.as_ref())),
                    "active_count" => Box::new(PoolingConfig::active_count(source.as_ref())),
                    "idle_count" => Box::new(PoolingConfig::idle_count(source.as_ref())),
                    other => {
                        return Err(Exception::new(
                            &ILLEGAL_STATE,
                            format!("PoolingConfig has no method '{}'", other),
                        ))
                    }
                };
                Ok(value)
            },
        );
        Arc::new(
            DefaultPointcutAdvisor::new(Advice::Interceptor(Arc::new(interceptor)))
                .with_pointcut(PointcutExpression::TypePattern(
                    pooling_config::CAPABILITY.to_string(),
                ))
                .with_name("PoolingConfigIntroduction"),
        )
    }
}

impl<T: Any + Send + Sync> PoolingConfig for PoolingTargetSource<T> {
    fn max_size(&self) -> usize {
        self.max_size
    }

    fn active_count(&self) -> usize {
        self.pool.get().map_or(0, |pool| pool.active_count())
    }

    fn idle_count(&self) -> usize {
        self.pool.get().map_or(0, |pool| pool.idle_count())
    }
}

impl<T: Any + Send + Sync> TargetSource<T> for PoolingTargetSource<T> {
    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<T>> {
        self.pool()?.borrow_object()
    }

    fn release_target(&self, target: Arc<T>) -> AopResult<()> {
        self.pool()?.return_object(target)
    }
}

impl<T: Any + Send + Sync> BeanFactoryAware for PoolingTargetSource<T> {
    fn set_bean_factory(&self, factory: Arc<dyn BeanFactory>) -> ContainerResult<()> {
        Ok(self.attach(factory)?)
    }
}

impl<T: Any + Send + Sync> DisposableBean for PoolingTargetSource<T> {
    fn name(&self) -> &str {
        self.target_bean_name()
    }

    fn dispose(&self) -> ContainerResult<()> {
        self.destroy();
        Ok(())
    }
}

impl<T> fmt::Debug for PoolingTargetSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolingTargetSource")
            .field("support", &self.support)
            .field("max_size", &self.max_size)
            .field("when_exhausted", &self.when_exhausted)
            .field("pool", &self.pool.get())
            .finish()
    }
}
