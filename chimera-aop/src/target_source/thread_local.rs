use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use chimera_core::{BeanFactory, BeanFactoryAware, ContainerResult, DisposableBean};
use parking_lot::Mutex;

use super::{PrototypeTargetSupport, TargetSource};
use crate::advice::{Advice, Advisor, DefaultPointcutAdvisor};
use crate::error::AopResult;
use crate::exception::{Exception, ILLEGAL_STATE};
use crate::introduction::IntroductionInterceptor;
use crate::invocation::{Arguments, Method, ReturnValue};
use crate::pointcut::PointcutExpression;

/// 线程目标源统计信息
pub trait ThreadLocalTargetSourceStats {
    /// `get_target` 被调用的总次数
    fn invocation_count(&self) -> u64;

    /// 命中当前线程已有实例的次数
    fn hit_count(&self) -> u64;

    /// 已创建的实例数
    fn object_count(&self) -> usize;
}

/// [`ThreadLocalTargetSourceStats`] 引入到代理上的方法
pub mod thread_local_stats {
    use crate::invocation::Method;

    pub const CAPABILITY: &str = "ThreadLocalTargetSourceStats";
    pub const INVOCATION_COUNT: Method = Method::new(CAPABILITY, "invocation_count");
    pub const HIT_COUNT: Method = Method::new(CAPABILITY, "hit_count");
    pub const OBJECT_COUNT: Method = Method::new(CAPABILITY, "object_count");
}

/// 线程目标源：每个线程一个目标实例
///
/// 实例在线程首次调用时创建，之后该线程的调用都命中同一个实例；
/// 销毁时对每个已创建的实例执行一次 Bean 的销毁回调。
pub struct ThreadLocalTargetSource<T> {
    support: PrototypeTargetSupport<T>,
    slots: Mutex<HashMap<ThreadId, Arc<T>>>,
    targets: Mutex<Vec<Arc<T>>>,
    invocations: AtomicU64,
    hits: AtomicU64,
}

impl<T: Any + Send + Sync> ThreadLocalTargetSource<T> {
    pub fn new(target_bean_name: impl Into<String>) -> Self {
        Self {
            support: PrototypeTargetSupport::new(target_bean_name),
            slots: Mutex::new(HashMap::new()),
            targets: Mutex::new(Vec::new()),
            invocations: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    pub fn target_bean_name(&self) -> &str {
        self.support.target_bean_name()
    }

    pub fn attach(&self, factory: Arc<dyn BeanFactory>) -> AopResult<()> {
        self.support.attach(factory)
    }

    /// 销毁所有已创建的实例
    ///
    /// 单个实例销毁失败只记录日志，不影响其余实例
    pub fn destroy(&self) {
        // 先 targets 后 slots，与 get_target 的加锁顺序一致
        let targets = {
            let mut targets = self.targets.lock();
            self.slots.lock().clear();
            std::mem::take(&mut *targets)
        };
        tracing::debug!(
            target_bean = self.target_bean_name(),
            count = targets.len(),
            "Destroying thread-bound targets"
        );
        for target in targets {
            if let Err(e) = self.support.destroy_prototype_instance(target) {
                tracing::warn!(target_bean = self.target_bean_name(), "Thread-bound target failed to destroy: {}", e);
            }
        }
    }

    /// 通过引入把 [`ThreadLocalTargetSourceStats`] 暴露到代理上
    pub fn stats_advisor(self: &Arc<Self>) -> Arc<dyn Advisor> {
        let source = Arc::clone(self);
        let interceptor = IntroductionInterceptor::new(
            thread_local_stats::CAPABILITY,
            move |method: &Method, _args: &Arguments| {
                let value: ReturnValue = match method.name {
                    "invocation_count" => Box::new(source.invocation_count()),
                    "hit_count" => Box::new(source.hit_count()),
                    "object_count" => Box::new(source.object_count()),
                    other => {
                        return Err(Exception::new(
                            &ILLEGAL_STATE,
                            format!("ThreadLocalTargetSourceStats has no method '{}'", other),
                        ))
                    }
                };
                Ok(value)
            },
        );
        Arc::new(
            DefaultPointcutAdvisor::new(Advice::Interceptor(Arc::new(interceptor)))
                .with_pointcut(PointcutExpression::TypePattern(
                    thread_local_stats::CAPABILITY.to_string(),
                ))
                .with_name("ThreadLocalTargetSourceStatsIntroduction"),
        )
    }
}

impl<T: Any + Send + Sync> ThreadLocalTargetSourceStats for ThreadLocalTargetSource<T> {
    fn invocation_count(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn object_count(&self) -> usize {
        self.targets.lock().len()
    }
}

impl<T: Any + Send + Sync> TargetSource<T> for ThreadLocalTargetSource<T> {
    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> AopResult<Arc<T>> {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let thread_id = thread::current().id();

        if let Some(target) = self.slots.lock().get(&thread_id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(target));
        }

        // 只有当前线程会写入自己的槽位，创建实例时无需持锁
        tracing::debug!(
            target_bean = self.target_bean_name(),
            thread = ?thread_id,
            "No target for thread, creating one and binding it to the thread"
        );
        let target = self.support.new_prototype_instance()?;
        let mut targets = self.targets.lock();
        targets.push(Arc::clone(&target));
        self.slots.lock().insert(thread_id, Arc::clone(&target));
        Ok(target)
    }

    fn release_target(&self, _target: Arc<T>) -> AopResult<()> {
        Ok(())
    }
}

impl<T: Any + Send + Sync> BeanFactoryAware for ThreadLocalTargetSource<T> {
    fn set_bean_factory(&self, factory: Arc<dyn BeanFactory>) -> ContainerResult<()> {
        Ok(self.attach(factory)?)
    }
}

impl<T: Any + Send + Sync> DisposableBean for ThreadLocalTargetSource<T> {
    fn name(&self) -> &str {
        self.target_bean_name()
    }

    fn dispose(&self) -> ContainerResult<()> {
        self.destroy();
        Ok(())
    }
}

impl<T> fmt::Debug for ThreadLocalTargetSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadLocalTargetSource")
            .field("support", &self.support)
            .field("threads", &self.slots.lock().len())
            .field("invocations", &self.invocations.load(Ordering::Relaxed))
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    use chimera_core::{BeanDefinition, DefaultBeanFactory, Scope};

    use super::*;

    struct Session {
        id: usize,
    }

    fn factory(fail_destroy_of: Option<usize>, destroyed: Arc<AtomicUsize>) -> Arc<DefaultBeanFactory> {
        let factory = DefaultBeanFactory::new();
        let next = Arc::new(AtomicUsize::new(0));
        factory
            .register(
                BeanDefinition::new("session", move || {
                    Ok(Session {
                        id: next.fetch_add(1, Ordering::SeqCst),
                    })
                })
                .with_scope(Scope::Prototype)
                .with_destroy(move |session: &Session| {
                    if Some(session.id) == fail_destroy_of {
                        anyhow::bail!("session {} refused to close", session.id);
                    }
                    destroyed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();
        Arc::new(factory)
    }

    #[test]
    fn test_same_thread_hits_same_instance() {
        let source = ThreadLocalTargetSource::<Session>::new("session");
        source.attach(factory(None, Arc::new(AtomicUsize::new(0)))).unwrap();

        let first = source.get_target().unwrap();
        let second = source.get_target().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.invocation_count(), 2);
        assert_eq!(source.hit_count(), 1);
        assert_eq!(source.object_count(), 1);
    }

    #[test]
    fn test_threads_get_distinct_instances() {
        let source = Arc::new(ThreadLocalTargetSource::<Session>::new("session"));
        source.attach(factory(None, Arc::new(AtomicUsize::new(0)))).unwrap();

        let barrier = Arc::new(Barrier::new(4));

        let ids: HashSet<usize> = (0..4)
            .map(|_| {
                let source = Arc::clone(&source);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let a = source.get_target().unwrap();
                    let b = source.get_target().unwrap();
                    assert!(Arc::ptr_eq(&a, &b));
                    a.id
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(ids.len(), 4);
        assert_eq!(source.object_count(), 4);
        assert_eq!(source.invocation_count(), 8);
        assert_eq!(source.hit_count(), 4);
    }

    #[test]
    fn test_destroy_continues_after_failure() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let source = Arc::new(ThreadLocalTargetSource::<Session>::new("session"));
        source.attach(factory(Some(0), Arc::clone(&destroyed))).unwrap();

        source.get_target().unwrap();
        for _ in 0..2 {
            let source = Arc::clone(&source);
            thread::spawn(move || source.get_target().map(|_| ()).unwrap())
                .join()
                .unwrap();
        }
        assert_eq!(source.object_count(), 3);

        source.dispose().unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
        assert_eq!(source.object_count(), 0);

        // 销毁后再次调用会重新创建实例
        source.get_target().unwrap();
        assert_eq!(source.object_count(), 1);
    }

    #[test]
    fn test_destroy_racing_with_first_calls_leaves_no_untracked_slot() {
        let source = Arc::new(ThreadLocalTargetSource::<Session>::new("session"));
        source.attach(factory(None, Arc::new(AtomicUsize::new(0)))).unwrap();
        let barrier = Arc::new(Barrier::new(9));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let source = Arc::clone(&source);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    source.get_target().map(|_| ()).unwrap();
                })
            })
            .collect();
        barrier.wait();
        source.destroy();
        for handle in handles {
            handle.join().unwrap();
        }

        let targets = source.targets.lock();
        let slots = source.slots.lock();
        assert!(slots
            .values()
            .all(|bound| targets.iter().any(|tracked| Arc::ptr_eq(tracked, bound))));
    }

    #[test]
    fn test_stats_served_by_introduction() {
        let source = Arc::new(ThreadLocalTargetSource::<Session>::new("session"));
        let advisor = source.stats_advisor();
        assert!(advisor.pointcut().matches(&thread_local_stats::HIT_COUNT));
        assert!(!advisor.pointcut().matches(&Method::new("Session", "hit_count")));
    }
}
