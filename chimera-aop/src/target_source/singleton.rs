use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::TargetSource;
use crate::error::AopResult;

/// 单例目标源：持有一个固定的目标对象
pub struct SingletonTargetSource<T> {
    target: Arc<T>,
}

impl<T: Any + Send + Sync> SingletonTargetSource<T> {
    pub fn new(target: Arc<T>) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Arc<T> {
        &self.target
    }
}

impl<T: Any + Send + Sync> TargetSource<T> for SingletonTargetSource<T> {
    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> AopResult<Arc<T>> {
        Ok(Arc::clone(&self.target))
    }

    fn release_target(&self, _target: Arc<T>) -> AopResult<()> {
        Ok(())
    }
}

/// 持有同一个对象或目标相等即视为相等
impl<T: PartialEq> PartialEq for SingletonTargetSource<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.target, &other.target) || self.target == other.target
    }
}

impl<T> fmt::Debug for SingletonTargetSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SingletonTargetSource for target object [{}]", std::any::type_name::<T>())
    }
}
