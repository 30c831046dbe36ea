use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chimera_core::{BeanFactory, BeanFactoryAware, BeanFactoryExt, ContainerResult, SharedBean, TypeInfo};
use once_cell::sync::OnceCell;

use super::TargetSource;
use crate::error::{AopError, AopResult};

/// 原型类目标源的公共部分
///
/// 按名称从 BeanFactory 创建和销毁原型作用域的目标。
/// 挂接只允许一次，挂接时校验目标是原型作用域且类型一致。
pub struct PrototypeTargetSupport<T> {
    target_bean_name: String,
    bean_factory: OnceCell<Arc<dyn BeanFactory>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> PrototypeTargetSupport<T> {
    pub fn new(target_bean_name: impl Into<String>) -> Self {
        Self {
            target_bean_name: target_bean_name.into(),
            bean_factory: OnceCell::new(),
            _marker: PhantomData,
        }
    }

    pub fn target_bean_name(&self) -> &str {
        &self.target_bean_name
    }

    pub fn is_attached(&self) -> bool {
        self.bean_factory.get().is_some()
    }

    /// 挂接到 BeanFactory
    pub fn attach(&self, factory: Arc<dyn BeanFactory>) -> AopResult<()> {
        let name = &self.target_bean_name;
        if factory.is_singleton(name)? {
            return Err(AopError::SingletonScopedTarget(name.clone()));
        }

        let actual = factory.get_type(name)?;
        if !actual.is::<T>() {
            return Err(AopError::TargetTypeMismatch {
                expected: TypeInfo::of::<T>().to_string(),
                actual: actual.to_string(),
            });
        }

        self.bean_factory
            .set(factory)
            .map_err(|_| AopError::InvalidConfig(format!("target source for '{}' is already attached", name)))?;
        tracing::debug!(target_bean = %name, "Prototype target source attached to bean factory");
        Ok(())
    }

    fn factory(&self) -> AopResult<&Arc<dyn BeanFactory>> {
        self.bean_factory
            .get()
            .ok_or_else(|| AopError::NotInitialized(self.target_bean_name.clone()))
    }

    /// 创建新的目标实例
    pub fn new_prototype_instance(&self) -> AopResult<Arc<T>> {
        let factory = self.factory()?;
        tracing::trace!(target_bean = %self.target_bean_name, "Creating new instance of prototype target");
        Ok(factory.get_typed_bean::<T>(&self.target_bean_name)?)
    }

    /// 销毁目标实例（执行 Bean 的销毁回调）
    pub fn destroy_prototype_instance(&self, instance: Arc<T>) -> AopResult<()> {
        let factory = self.factory()?;
        tracing::trace!(target_bean = %self.target_bean_name, "Destroying instance of prototype target");
        let bean: SharedBean = instance;
        Ok(factory.destroy_bean(&self.target_bean_name, &bean)?)
    }
}

impl<T> fmt::Debug for PrototypeTargetSupport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrototypeTargetSupport")
            .field("target_bean_name", &self.target_bean_name)
            .field("attached", &self.bean_factory.get().is_some())
            .finish()
    }
}

/// 原型目标源：每次调用都创建一个新目标
///
/// 新实例用完即丢弃，不执行销毁回调
pub struct PrototypeTargetSource<T> {
    support: PrototypeTargetSupport<T>,
}

impl<T: Any + Send + Sync> PrototypeTargetSource<T> {
    pub fn new(target_bean_name: impl Into<String>) -> Self {
        Self {
            support: PrototypeTargetSupport::new(target_bean_name),
        }
    }

    pub fn target_bean_name(&self) -> &str {
        self.support.target_bean_name()
    }

    pub fn attach(&self, factory: Arc<dyn BeanFactory>) -> AopResult<()> {
        self.support.attach(factory)
    }
}

impl<T: Any + Send + Sync> TargetSource<T> for PrototypeTargetSource<T> {
    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<T>> {
        self.support.new_prototype_instance()
    }

    fn release_target(&self, _target: Arc<T>) -> AopResult<()> {
        Ok(())
    }
}

impl<T: Any + Send + Sync> BeanFactoryAware for PrototypeTargetSource<T> {
    fn set_bean_factory(&self, factory: Arc<dyn BeanFactory>) -> ContainerResult<()> {
        Ok(self.attach(factory)?)
    }
}

impl<T> fmt::Debug for PrototypeTargetSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrototypeTargetSource for target bean '{}'", self.support.target_bean_name)
    }
}
