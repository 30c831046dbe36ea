//! 有界对象池
//!
//! 池中对象要么闲置（idle），要么被借出（active），两者之和不超过 `max_size`。
//! 池满时按 [`WhenExhausted`] 策略阻塞等待或立即失败。

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use serde::Deserialize;

use crate::error::{AopError, AopResult};

/// 池耗尽时的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhenExhausted {
    /// 阻塞直到有对象归还
    #[default]
    Block,
    /// 立即返回 [`AopError::PoolExhausted`]
    Fail,
}

/// 池化对象工厂
///
/// 除 `make_object` 外的钩子都有默认实现
pub trait PooledObjectFactory<T>: Send + Sync {
    fn make_object(&self) -> AopResult<Arc<T>>;

    fn destroy_object(&self, _object: Arc<T>) -> AopResult<()> {
        Ok(())
    }

    /// 借出前和归还时校验，返回 false 的对象被销毁
    fn validate_object(&self, _object: &Arc<T>) -> bool {
        true
    }

    /// 借出前调用
    fn activate_object(&self, _object: &Arc<T>) -> AopResult<()> {
        Ok(())
    }

    /// 归还时调用
    fn passivate_object(&self, _object: &Arc<T>) -> AopResult<()> {
        Ok(())
    }
}

/// 对象池
pub trait ObjectPool<T>: Send + Sync {
    fn borrow_object(&self) -> AopResult<Arc<T>>;

    fn return_object(&self, object: Arc<T>) -> AopResult<()>;

    /// 已借出的对象数
    fn active_count(&self) -> usize;

    /// 闲置的对象数
    fn idle_count(&self) -> usize;

    fn max_size(&self) -> usize;

    /// 关闭池：拒绝后续借出并销毁闲置对象，之后归还的对象直接销毁
    fn close(&self);

    fn is_closed(&self) -> bool;
}

struct PoolState<T> {
    idle: Vec<Arc<T>>,
    active: usize,
    closed: bool,
}

enum Slot<T> {
    Idle(Arc<T>),
    Create,
}

/// 简单的有界对象池
///
/// 容量在锁内预留，对象的创建、校验和销毁都在锁外执行
pub struct SimpleObjectPool<T> {
    factory: Box<dyn PooledObjectFactory<T>>,
    max_size: usize,
    when_exhausted: WhenExhausted,
    state: Mutex<PoolState<T>>,
    available: Condvar,
}

impl<T: Send + Sync> SimpleObjectPool<T> {
    pub fn new(
        factory: impl PooledObjectFactory<T> + 'static,
        max_size: usize,
        when_exhausted: WhenExhausted,
    ) -> AopResult<Self> {
        if max_size == 0 {
            return Err(AopError::InvalidConfig("pool max_size must be at least 1".to_string()));
        }

        Ok(Self {
            factory: Box::new(factory),
            max_size,
            when_exhausted,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                active: 0,
                closed: false,
            }),
            available: Condvar::new(),
        })
    }

    pub fn when_exhausted(&self) -> WhenExhausted {
        self.when_exhausted
    }

    fn acquire_slot(&self) -> AopResult<Slot<T>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(AopError::PoolClosed);
            }
            if let Some(object) = state.idle.pop() {
                state.active += 1;
                return Ok(Slot::Idle(object));
            }
            if state.active + state.idle.len() < self.max_size {
                state.active += 1;
                return Ok(Slot::Create);
            }

            match self.when_exhausted {
                WhenExhausted::Fail => {
                    tracing::debug!(max_size = self.max_size, "Object pool exhausted");
                    return Err(AopError::PoolExhausted {
                        max_size: self.max_size,
                    });
                }
                WhenExhausted::Block => {
                    tracing::trace!(max_size = self.max_size, "Object pool exhausted, waiting");
                    self.available.wait(&mut state);
                }
            }
        }
    }

    /// 释放一个借出名额
    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        drop(state);
        self.available.notify_one();
    }

    /// 销毁对象并释放其名额
    fn discard(&self, object: Arc<T>) {
        self.destroy_quietly(object);
        self.release_slot();
    }

    fn destroy_quietly(&self, object: Arc<T>) {
        if let Err(e) = self.factory.destroy_object(object) {
            tracing::warn!("Failed to destroy pooled object: {}", e);
        }
    }

    fn activate(&self, object: Arc<T>) -> AopResult<Arc<T>> {
        match self.factory.activate_object(&object) {
            Ok(()) => Ok(object),
            Err(e) => {
                self.discard(object);
                Err(e)
            }
        }
    }
}

impl<T: Send + Sync> ObjectPool<T> for SimpleObjectPool<T> {
    fn borrow_object(&self) -> AopResult<Arc<T>> {
        loop {
            match self.acquire_slot()? {
                Slot::Idle(object) => {
                    if self.factory.validate_object(&object) {
                        return self.activate(object);
                    }
                    tracing::debug!("Discarding idle object that failed validation");
                    self.discard(object);
                }
                Slot::Create => {
                    let object = match self.factory.make_object() {
                        Ok(object) => object,
                        Err(e) => {
                            self.release_slot();
                            return Err(e);
                        }
                    };
                    return self.activate(object);
                }
            }
        }
    }

    fn return_object(&self, object: Arc<T>) -> AopResult<()> {
        let reusable = self.factory.validate_object(&object)
            && match self.factory.passivate_object(&object) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Failed to passivate pooled object: {}", e);
                    false
                }
            };

        let mut state = self.state.lock();
        if state.active == 0 {
            drop(state);
            tracing::warn!("Object returned to pool that has no outstanding borrows, destroying it");
            self.destroy_quietly(object);
            return Ok(());
        }

        state.active -= 1;
        if reusable && !state.closed {
            state.idle.push(object);
            drop(state);
            self.available.notify_one();
        } else {
            drop(state);
            self.available.notify_one();
            self.destroy_quietly(object);
        }
        Ok(())
    }

    fn active_count(&self) -> usize {
        self.state.lock().active
    }

    fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn close(&self) {
        let idle = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.available.notify_all();

        tracing::debug!(idle = idle.len(), "Closing object pool");
        for object in idle {
            self.destroy_quietly(object);
        }
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl<T> fmt::Debug for SimpleObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimpleObjectPool")
            .field("max_size", &self.max_size)
            .field("when_exhausted", &self.when_exhausted)
            .field("active", &state.active)
            .field("idle", &state.idle.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct CountingFactory {
        made: AtomicUsize,
        destroyed: AtomicUsize,
        reject_on_return: AtomicBool,
    }

    impl PooledObjectFactory<usize> for Arc<CountingFactory> {
        fn make_object(&self) -> AopResult<Arc<usize>> {
            Ok(Arc::new(self.made.fetch_add(1, Ordering::SeqCst)))
        }

        fn destroy_object(&self, _object: Arc<usize>) -> AopResult<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn validate_object(&self, _object: &Arc<usize>) -> bool {
            !self.reject_on_return.load(Ordering::SeqCst)
        }
    }

    fn pool(max_size: usize, when_exhausted: WhenExhausted) -> (SimpleObjectPool<usize>, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory::default());
        let pool = SimpleObjectPool::new(Arc::clone(&factory), max_size, when_exhausted).unwrap();
        (pool, factory)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let factory = Arc::new(CountingFactory::default());
        assert!(matches!(
            SimpleObjectPool::new(factory, 0, WhenExhausted::Fail),
            Err(AopError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_objects_are_reused() {
        let (pool, factory) = pool(2, WhenExhausted::Fail);
        let a = pool.borrow_object().unwrap();
        assert_eq!((pool.active_count(), pool.idle_count()), (1, 0));
        pool.return_object(a).unwrap();
        assert_eq!((pool.active_count(), pool.idle_count()), (0, 1));

        let b = pool.borrow_object().unwrap();
        assert_eq!(*b, 0);
        assert_eq!(factory.made.load(Ordering::SeqCst), 1);
        pool.return_object(b).unwrap();
    }

    #[test]
    fn test_fail_when_exhausted() {
        let (pool, _) = pool(1, WhenExhausted::Fail);
        let held = pool.borrow_object().unwrap();
        assert!(matches!(pool.borrow_object(), Err(AopError::PoolExhausted { max_size: 1 })));
        pool.return_object(held).unwrap();
        assert!(pool.borrow_object().is_ok());
    }

    #[test]
    fn test_block_until_returned() {
        let (pool, _) = pool(1, WhenExhausted::Block);
        let pool = Arc::new(pool);
        let held = pool.borrow_object().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let object = pool.borrow_object().unwrap();
                pool.return_object(object).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        pool.return_object(held).unwrap();
        waiter.join().unwrap();
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_capacity_never_exceeded_under_contention() {
        let (pool, factory) = pool(3, WhenExhausted::Block);
        let pool = Arc::new(pool);
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let object = pool.borrow_object().unwrap();
                        peak.fetch_max(pool.active_count(), Ordering::SeqCst);
                        pool.return_object(object).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(factory.made.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_invalid_objects_destroyed_on_return() {
        let (pool, factory) = pool(2, WhenExhausted::Fail);
        let object = pool.borrow_object().unwrap();
        factory.reject_on_return.store(true, Ordering::SeqCst);
        pool.return_object(object).unwrap();
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(factory.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_destroys_idle_and_late_returns() {
        let (pool, factory) = pool(2, WhenExhausted::Block);
        let a = pool.borrow_object().unwrap();
        let b = pool.borrow_object().unwrap();
        pool.return_object(a).unwrap();

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(factory.destroyed.load(Ordering::SeqCst), 1);
        assert!(matches!(pool.borrow_object(), Err(AopError::PoolClosed)));

        pool.return_object(b).unwrap();
        assert_eq!(factory.destroyed.load(Ordering::SeqCst), 2);
        assert_eq!((pool.active_count(), pool.idle_count()), (0, 0));
    }

    #[test]
    fn test_close_wakes_blocked_borrowers() {
        let (pool, _) = pool(1, WhenExhausted::Block);
        let pool = Arc::new(pool);
        let _held = pool.borrow_object().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.borrow_object())
        };
        thread::sleep(Duration::from_millis(50));
        pool.close();
        assert!(matches!(waiter.join().unwrap(), Err(AopError::PoolClosed)));
    }
}
