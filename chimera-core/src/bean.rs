use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::Scope;

/// 容器中共享的 Bean 实例
pub type SharedBean = Arc<dyn Any + Send + Sync>;

/// Bean 创建函数
pub type BeanCreator = Arc<dyn Fn() -> crate::Result<SharedBean> + Send + Sync>;

/// 生命周期回调类型
pub type InitCallback = Arc<dyn Fn(&SharedBean) -> crate::Result<()> + Send + Sync>;
pub type DestroyCallback = Arc<dyn Fn(&SharedBean) -> crate::Result<()> + Send + Sync>;

/// Bean 的类型信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl TypeInfo {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// 是否为类型 `T`
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Bean 定义 - 描述如何创建和管理 Bean
pub struct BeanDefinition {
    /// Bean 的名称
    pub name: String,

    /// Bean 的作用域
    pub scope: Scope,

    /// Bean 的声明类型
    pub type_info: TypeInfo,

    /// 创建函数
    pub creator: BeanCreator,

    /// 初始化回调（@PostConstruct）
    pub init_callback: Option<InitCallback>,

    /// 销毁回调（@PreDestroy）
    pub destroy_callback: Option<DestroyCallback>,
}

impl BeanDefinition {
    /// 创建新的 Bean 定义
    pub fn new<T, F>(name: impl Into<String>, creator: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> crate::Result<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            scope: Scope::default(),
            type_info: TypeInfo::of::<T>(),
            creator: Arc::new(move || Ok(Arc::new(creator()?) as SharedBean)),
            init_callback: None,
            destroy_callback: None,
        }
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// 设置初始化回调
    pub fn with_init<T, F>(mut self, init_fn: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> crate::Result<()> + Send + Sync + 'static,
    {
        self.init_callback = Some(Arc::new(move |bean: &SharedBean| match bean.downcast_ref::<T>() {
            Some(typed) => init_fn(typed),
            None => Ok(()),
        }));
        self
    }

    /// 设置销毁回调
    ///
    /// 有销毁回调的 Bean 即视为具备“可销毁”能力
    pub fn with_destroy<T, F>(mut self, destroy_fn: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> crate::Result<()> + Send + Sync + 'static,
    {
        self.destroy_callback = Some(Arc::new(move |bean: &SharedBean| match bean.downcast_ref::<T>() {
            Some(typed) => destroy_fn(typed),
            None => Ok(()),
        }));
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.scope.is_singleton()
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("type_name", &self.type_info.type_name)
            .field("has_init", &self.init_callback.is_some())
            .field("has_destroy", &self.destroy_callback.is_some())
            .finish()
    }
}
