//! Bean Factory - 核心容器接口
//!
//! AOP 运行时只依赖其中很小的一部分：按名称获取对象、判断作用域、
//! 查询声明类型以及销毁通知。

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};

use crate::{
    bean::{BeanDefinition, SharedBean, TypeInfo},
    error::{ContainerError, ContainerResult},
    lifecycle::DisposableBean,
};

/// BeanFactory - 最基础的容器接口
///
/// 注意：此 trait 不包含泛型方法，因此可以作为 trait object 使用
pub trait BeanFactory: Send + Sync {
    /// 通过名称获取 Bean
    fn get_bean(&self, name: &str) -> ContainerResult<SharedBean>;

    /// 检查是否包含指定名称的 Bean
    fn contains_bean(&self, name: &str) -> bool;

    /// 指定名称的 Bean 是否为单例作用域
    fn is_singleton(&self, name: &str) -> ContainerResult<bool>;

    /// 获取 Bean 的声明类型
    fn get_type(&self, name: &str) -> ContainerResult<TypeInfo>;

    /// 销毁通知
    ///
    /// 由持有 Bean 的一方在丢弃实例前调用；若 Bean 定义了销毁回调则执行它
    fn destroy_bean(&self, name: &str, bean: &SharedBean) -> ContainerResult<()>;
}

/// BeanFactoryExt - BeanFactory 的扩展 trait
///
/// 提供泛型方法，不能作为 trait object 使用
pub trait BeanFactoryExt {
    /// 通过名称获取指定类型的 Bean
    fn get_typed_bean<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>>;
}

impl<F: BeanFactory + ?Sized> BeanFactoryExt for F {
    fn get_typed_bean<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        let bean = self.get_bean(name)?;
        bean.downcast::<T>().map_err(|_| ContainerError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>().to_string(),
            actual: self
                .get_type(name)
                .map(|info| info.type_name.to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
        })
    }
}

/// DefaultBeanFactory - BeanFactory 的默认实现
///
/// 支持单例缓存、原型创建、销毁回调以及关闭时的资源清理
pub struct DefaultBeanFactory {
    /// Bean 定义存储
    definitions: RwLock<HashMap<String, BeanDefinition>>,

    /// 单例 Bean 缓存
    singletons: RwLock<HashMap<String, SharedBean>>,

    /// 关闭时需要销毁的对象（按注册顺序）
    disposables: Mutex<Vec<Arc<dyn DisposableBean>>>,
}

impl DefaultBeanFactory {
    /// 创建新的 Bean 工厂
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            singletons: RwLock::new(HashMap::new()),
            disposables: Mutex::new(Vec::new()),
        }
    }

    /// 注册 Bean 定义
    pub fn register(&self, definition: BeanDefinition) -> ContainerResult<()> {
        let name = definition.name.clone();
        tracing::trace!(
            "Registering bean: name='{}', type='{}', scope={:?}",
            name,
            definition.type_info,
            definition.scope
        );

        let mut definitions = self.definitions.write();
        if definitions.contains_key(&name) {
            tracing::warn!("Bean '{}' already exists, registration failed", name);
            return Err(ContainerError::DuplicateBean(name));
        }
        definitions.insert(name.clone(), definition);

        tracing::debug!("Bean definition registered successfully: '{}'", name);
        Ok(())
    }

    /// 注册单例 Bean
    pub fn register_singleton<T, F>(&self, name: impl Into<String>, creator: F) -> ContainerResult<()>
    where
        T: Any + Send + Sync,
        F: Fn() -> crate::Result<T> + Send + Sync + 'static,
    {
        self.register(BeanDefinition::new(name, creator))
    }

    /// 注册原型 Bean
    pub fn register_prototype<T, F>(&self, name: impl Into<String>, creator: F) -> ContainerResult<()>
    where
        T: Any + Send + Sync,
        F: Fn() -> crate::Result<T> + Send + Sync + 'static,
    {
        self.register(BeanDefinition::new(name, creator).with_scope(crate::Scope::Prototype))
    }

    /// 注册需要在关闭时销毁的对象
    pub fn register_disposable(&self, disposable: Arc<dyn DisposableBean>) {
        let mut disposables = self.disposables.lock();
        tracing::debug!("Registered disposable '{}', total: {}", disposable.name(), disposables.len() + 1);
        disposables.push(disposable);
    }

    /// 获取所有 Bean 的名称
    pub fn get_bean_names(&self) -> Vec<String> {
        self.definitions.read().keys().cloned().collect()
    }

    /// 创建 Bean 实例并调用初始化回调
    fn create_bean_internal(&self, name: &str) -> ContainerResult<SharedBean> {
        // 复制出回调后再执行，避免在回调中持有定义锁
        let (creator, init_callback) = {
            let definitions = self.definitions.read();
            let definition = definitions
                .get(name)
                .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))?;
            (Arc::clone(&definition.creator), definition.init_callback.clone())
        };

        let bean = creator()
            .map_err(|e| ContainerError::BeanCreationFailed(format!("{}: {}", name, e)))?;

        if let Some(init_fn) = init_callback {
            init_fn(&bean).map_err(|e| {
                ContainerError::BeanCreationFailed(format!("{} init failed: {}", name, e))
            })?;
        }

        Ok(bean)
    }

    /// 销毁所有单例 Bean（调用 destroy 回调）
    pub fn destroy_singletons(&self) -> ContainerResult<()> {
        tracing::info!("Destroying singleton beans");

        let beans_to_destroy: Vec<(String, SharedBean)> = self.singletons.write().drain().collect();

        let mut failures = Vec::new();
        for (name, bean) in beans_to_destroy {
            if let Err(e) = self.destroy_bean(&name, &bean) {
                tracing::warn!("Failed to destroy bean '{}': {}", name, e);
                failures.push(name);
            }
        }

        tracing::info!("Singleton beans destruction completed");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::DestroyFailed(failures.join(", ")))
        }
    }

    /// 关闭工厂
    ///
    /// 1. 逆序销毁注册的 DisposableBean，单个失败只记录日志
    /// 2. 销毁所有单例
    pub fn shutdown(&self) -> ContainerResult<()> {
        tracing::info!("Starting bean factory shutdown");

        let disposables: Vec<_> = self.disposables.lock().drain(..).collect();
        tracing::info!("Disposing {} disposable bean(s)", disposables.len());
        for disposable in disposables.iter().rev() {
            if let Err(e) = disposable.dispose() {
                tracing::error!("Failed to dispose '{}': {}", disposable.name(), e);
            }
        }

        self.destroy_singletons()?;

        tracing::info!("Bean factory shutdown complete");
        Ok(())
    }
}

impl Default for DefaultBeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactory for DefaultBeanFactory {
    fn get_bean(&self, name: &str) -> ContainerResult<SharedBean> {
        tracing::trace!("Requesting bean: '{}'", name);

        let scope = {
            let definitions = self.definitions.read();
            let definition = definitions.get(name).ok_or_else(|| {
                tracing::debug!("Bean '{}' not found in container", name);
                ContainerError::BeanNotFound(name.to_string())
            })?;
            definition.scope
        };

        match scope {
            crate::Scope::Singleton => {
                if let Some(bean) = self.singletons.read().get(name) {
                    tracing::trace!("Returning cached instance of singleton bean '{}'", name);
                    return Ok(Arc::clone(bean));
                }

                tracing::debug!("Creating shared instance of singleton bean '{}'", name);
                let bean = self.create_bean_internal(name)?;

                // 并发创建时以先写入者为准
                let mut singletons = self.singletons.write();
                let cached = singletons
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::clone(&bean));
                Ok(Arc::clone(cached))
            }
            crate::Scope::Prototype => {
                tracing::trace!("Creating new instance of prototype bean '{}'", name);
                self.create_bean_internal(name)
            }
        }
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    fn is_singleton(&self, name: &str) -> ContainerResult<bool> {
        self.definitions
            .read()
            .get(name)
            .map(BeanDefinition::is_singleton)
            .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))
    }

    fn get_type(&self, name: &str) -> ContainerResult<TypeInfo> {
        self.definitions
            .read()
            .get(name)
            .map(|definition| definition.type_info)
            .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))
    }

    fn destroy_bean(&self, name: &str, bean: &SharedBean) -> ContainerResult<()> {
        let destroy_callback = {
            let definitions = self.definitions.read();
            let definition = definitions
                .get(name)
                .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))?;
            definition.destroy_callback.clone()
        };

        match destroy_callback {
            Some(destroy_fn) => {
                destroy_fn(bean).map_err(|e| ContainerError::DestroyFailed(format!("{}: {}", name, e)))?;
                tracing::debug!("Bean '{}' destroyed successfully", name);
            }
            None => tracing::trace!("Bean '{}' has no destroy callback", name),
        }
        Ok(())
    }
}
