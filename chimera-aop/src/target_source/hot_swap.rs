use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chimera_core::{SharedBean, TypeInfo};
use parking_lot::Mutex;

use super::TargetSource;
use crate::error::{AopError, AopResult};

/// 可热替换的目标源
///
/// 替换是原子的：已经借出目标的调用继续使用旧目标，之后的调用看到新目标
pub struct HotSwappableTargetSource<T> {
    target: Mutex<Arc<T>>,
}

impl<T: Any + Send + Sync> HotSwappableTargetSource<T> {
    pub fn new(initial: Arc<T>) -> Self {
        Self {
            target: Mutex::new(initial),
        }
    }

    /// 替换目标，返回旧目标
    pub fn swap(&self, new_target: Arc<T>) -> Arc<T> {
        let old = std::mem::replace(&mut *self.target.lock(), new_target);
        tracing::debug!(target_type = std::any::type_name::<T>(), "Swapped target");
        old
    }

    /// 以容器对象替换目标
    ///
    /// 空对象返回 [`AopError::NullSwapTarget`]，类型不符返回
    /// [`AopError::TargetTypeMismatch`]；两种情况下当前目标保持不变
    pub fn swap_bean(&self, candidate: Option<SharedBean>) -> AopResult<Arc<T>> {
        let candidate = candidate.ok_or(AopError::NullSwapTarget)?;
        let new_target = candidate
            .downcast::<T>()
            .map_err(|_| AopError::TargetTypeMismatch {
                expected: TypeInfo::of::<T>().to_string(),
                actual: "incompatible bean".to_string(),
            })?;
        Ok(self.swap(new_target))
    }

    /// 当前目标
    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.target.lock())
    }
}

impl<T: Any + Send + Sync> TargetSource<T> for HotSwappableTargetSource<T> {
    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<T>> {
        Ok(self.current())
    }

    fn release_target(&self, _target: Arc<T>) -> AopResult<()> {
        Ok(())
    }
}

/// 当前目标是同一个对象或相等即视为相等
impl<T: PartialEq> PartialEq for HotSwappableTargetSource<T> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        // 分别加锁，避免同时持有两把锁
        let mine = Arc::clone(&self.target.lock());
        let theirs = Arc::clone(&other.target.lock());
        Arc::ptr_eq(&mine, &theirs) || mine == theirs
    }
}

impl<T> fmt::Debug for HotSwappableTargetSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HotSwappableTargetSource for target [{}]", std::any::type_name::<T>())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeter(&'static str);

    #[test]
    fn test_swap_returns_previous_target() {
        let source = HotSwappableTargetSource::new(Arc::new(Greeter("hello")));
        assert!(!source.is_static());

        let borrowed = source.get_target().unwrap();
        let old = source.swap(Arc::new(Greeter("bonjour")));
        assert!(Arc::ptr_eq(&old, &borrowed));
        assert_eq!(borrowed.0, "hello");
        assert_eq!(source.get_target().unwrap().0, "bonjour");
    }

    #[test]
    fn test_swap_bean_validates_without_mutating() {
        let source = HotSwappableTargetSource::new(Arc::new(Greeter("hello")));

        assert!(matches!(source.swap_bean(None), Err(AopError::NullSwapTarget)));
        let wrong: SharedBean = Arc::new(42u32);
        assert!(matches!(
            source.swap_bean(Some(wrong)),
            Err(AopError::TargetTypeMismatch { .. })
        ));
        assert_eq!(source.current().0, "hello");

        let right: SharedBean = Arc::new(Greeter("hola"));
        let old = source.swap_bean(Some(right)).unwrap();
        assert_eq!(old.0, "hello");
        assert_eq!(source.current().0, "hola");
    }

    #[test]
    fn test_equality_follows_current_target() {
        let shared = Arc::new(Greeter("hi"));
        let a = HotSwappableTargetSource::new(Arc::clone(&shared));
        let b = HotSwappableTargetSource::new(shared);
        assert_eq!(a, a);
        assert_eq!(a, b);

        b.swap(Arc::new(Greeter("yo")));
        assert_ne!(a, b);
        a.swap(Arc::new(Greeter("yo")));
        assert_eq!(a, b);
    }

    #[test]
    fn test_concurrent_swaps_hand_back_every_target() {
        let source = Arc::new(HotSwappableTargetSource::new(Arc::new(0usize)));
        let handles: Vec<_> = (1..=8usize)
            .map(|n| {
                let source = Arc::clone(&source);
                thread::spawn(move || *source.swap(Arc::new(n)))
            })
            .collect();

        let mut seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        seen.push(*source.current());
        seen.sort_unstable();
        assert_eq!(seen, (0..=8).collect::<Vec<_>>());
    }
}
