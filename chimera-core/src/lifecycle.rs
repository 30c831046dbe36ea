use crate::{BeanFactory, ContainerResult};
use std::sync::Arc;

/// 可销毁对象
///
/// 类似 Spring 的 DisposableBean，在所属容器关闭时调用。
/// 池化、线程绑定等目标源通过它释放自己持有的实例。
pub trait DisposableBean: Send + Sync {
    /// 名称，仅用于日志
    fn name(&self) -> &str;

    /// 销毁回调
    fn dispose(&self) -> ContainerResult<()>;
}

/// 感知所属 BeanFactory 的对象
///
/// 容器在对象构造完成后调用 `set_bean_factory`，对象借此获得按名称创建实例的能力。
pub trait BeanFactoryAware: Send + Sync {
    fn set_bean_factory(&self, factory: Arc<dyn BeanFactory>) -> ContainerResult<()>;
}
