//! 通知适配器注册表
//!
//! 负责把各种通知转换成拦截器。内置三个适配器（前置、返回后、异常），
//! 自定义通知通过 [`AdvisorAdapterRegistry::register_adapter`] 或
//! inventory 注册的 [`AdvisorAdapterRegistration`] 扩展。

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::advice::{Advice, Advisable, Advisor, DefaultPointcutAdvisor};
use crate::error::{AopError, AopResult};
use crate::interceptor::{
    AfterReturningAdviceInterceptor, MethodBeforeAdviceInterceptor, MethodInterceptor,
};
use crate::throws::ThrowsAdviceInterceptor;

/// 通知适配器
///
/// 识别某一类通知，并把持有该通知的通知器转换成拦截器
pub trait AdvisorAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn supports_advice(&self, advice: &Advice) -> bool;

    fn get_interceptor(&self, advisor: &dyn Advisor) -> AopResult<Arc<dyn MethodInterceptor>>;
}

fn unsupported(adapter: &str, advice: &Advice) -> AopError {
    AopError::UnknownAdviceType(format!("{} (passed to {})", advice.describe(), adapter))
}

/// 前置通知适配器
#[derive(Debug, Default)]
pub struct MethodBeforeAdviceAdapter;

impl AdvisorAdapter for MethodBeforeAdviceAdapter {
    fn name(&self) -> &str {
        "MethodBeforeAdviceAdapter"
    }

    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Before(_))
    }

    fn get_interceptor(&self, advisor: &dyn Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::Before(advice) => Ok(Arc::new(MethodBeforeAdviceInterceptor::new(Arc::clone(advice)))),
            other => Err(unsupported(self.name(), other)),
        }
    }
}

/// 返回后通知适配器
#[derive(Debug, Default)]
pub struct AfterReturningAdviceAdapter;

impl AdvisorAdapter for AfterReturningAdviceAdapter {
    fn name(&self) -> &str {
        "AfterReturningAdviceAdapter"
    }

    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::AfterReturning(_))
    }

    fn get_interceptor(&self, advisor: &dyn Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::AfterReturning(advice) => {
                Ok(Arc::new(AfterReturningAdviceInterceptor::new(Arc::clone(advice))))
            }
            other => Err(unsupported(self.name(), other)),
        }
    }
}

/// 异常通知适配器
#[derive(Debug, Default)]
pub struct ThrowsAdviceAdapter;

impl AdvisorAdapter for ThrowsAdviceAdapter {
    fn name(&self) -> &str {
        "ThrowsAdviceAdapter"
    }

    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Throws(_))
    }

    fn get_interceptor(&self, advisor: &dyn Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::Throws(advice) => Ok(Arc::new(ThrowsAdviceInterceptor::new(advice.as_ref())?)),
            other => Err(unsupported(self.name(), other)),
        }
    }
}

/// 适配器注册器
///
/// 用于 inventory 自动收集自定义适配器
pub struct AdvisorAdapterRegistration {
    /// 适配器名称
    pub name: &'static str,

    /// 创建适配器实例的函数
    pub creator: fn() -> Arc<dyn AdvisorAdapter>,
}

impl AdvisorAdapterRegistration {
    pub const fn new(name: &'static str, creator: fn() -> Arc<dyn AdvisorAdapter>) -> Self {
        Self { name, creator }
    }
}

inventory::collect!(AdvisorAdapterRegistration);

/// 获取所有通过 inventory 注册的适配器
pub fn get_all_adapter_registrations() -> impl Iterator<Item = &'static AdvisorAdapterRegistration> {
    inventory::iter::<AdvisorAdapterRegistration>()
}

/// 全局适配器注册表
///
/// 首次访问时创建，包含三个内置适配器以及所有通过 inventory 注册的适配器
static GLOBAL_ADAPTER_REGISTRY: Lazy<Arc<AdvisorAdapterRegistry>> = Lazy::new(|| {
    let registry = AdvisorAdapterRegistry::new();
    registry.auto_load_adapters();
    Arc::new(registry)
});

/// 获取全局适配器注册表
///
/// 未显式指定注册表的 [`ProxyFactory`](crate::ProxyFactory) 使用它
pub fn get_global_adapter_registry() -> &'static Arc<AdvisorAdapterRegistry> {
    &GLOBAL_ADAPTER_REGISTRY
}

/// 通知适配器注册表
///
/// 适配器按注册顺序查询，第一个支持该通知的适配器胜出
pub struct AdvisorAdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn AdvisorAdapter>>>,
}

impl AdvisorAdapterRegistry {
    /// 创建包含三个内置适配器的注册表
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(vec![
                Arc::new(MethodBeforeAdviceAdapter),
                Arc::new(AfterReturningAdviceAdapter),
                Arc::new(ThrowsAdviceAdapter),
            ]),
        }
    }

    /// 注册适配器（追加到末尾）
    pub fn register_adapter(&self, adapter: Arc<dyn AdvisorAdapter>) {
        tracing::debug!("Registering advisor adapter: {}", adapter.name());
        self.adapters.write().push(adapter);
    }

    /// 把通知或通知器包装为通知器
    ///
    /// 已是通知器的原样返回；拦截器或任一适配器支持的通知包装为匹配所有方法的
    /// [`DefaultPointcutAdvisor`]；其他情况返回 [`AopError::UnknownAdviceType`]。
    pub fn wrap(&self, advisable: impl Into<Advisable>) -> AopResult<Arc<dyn Advisor>> {
        match advisable.into() {
            Advisable::Advisor(advisor) => Ok(advisor),
            Advisable::Advice(advice) => {
                if matches!(advice, Advice::Interceptor(_)) || self.find_adapter(&advice).is_some() {
                    Ok(Arc::new(DefaultPointcutAdvisor::new(advice)))
                } else {
                    Err(AopError::UnknownAdviceType(advice.describe()))
                }
            }
        }
    }

    /// 获取通知器对应的拦截器
    ///
    /// 拦截器形态的通知直接返回，其余交给第一个支持它的适配器
    pub fn get_interceptor(&self, advisor: &dyn Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        let advice = advisor.advice();
        if let Advice::Interceptor(interceptor) = advice {
            return Ok(Arc::clone(interceptor));
        }

        match self.find_adapter(advice) {
            Some(adapter) => {
                tracing::trace!(
                    advisor = advisor.name(),
                    adapter = adapter.name(),
                    "Adapting advice to interceptor"
                );
                adapter.get_interceptor(advisor)
            }
            None => Err(AopError::UnknownAdviceType(advice.describe())),
        }
    }

    fn find_adapter(&self, advice: &Advice) -> Option<Arc<dyn AdvisorAdapter>> {
        self.adapters
            .read()
            .iter()
            .find(|adapter| adapter.supports_advice(advice))
            .cloned()
    }

    /// 已注册的适配器名称（按查询顺序）
    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.read().iter().map(|a| a.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.read().is_empty()
    }

    /// 从 inventory 加载所有注册的适配器
    pub fn auto_load_adapters(&self) {
        let registrations: Vec<_> = get_all_adapter_registrations().collect();
        if registrations.is_empty() {
            return;
        }
        tracing::info!("Auto-loading {} advisor adapter(s) from registry", registrations.len());

        for registration in registrations {
            tracing::debug!("  ├─ Loading adapter: {}", registration.name);
            self.register_adapter((registration.creator)());
        }
    }
}

impl Default for AdvisorAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::{Exception, ILLEGAL_STATE, INVALID_ARGUMENT};
    use crate::interceptor::test_support::StubInvocation;
    use crate::invocation::{Invocation, InvocationResult, Method, ReturnValue};
    use crate::throws::ThrowsHandlers;

    /// 自定义的“重试”通知
    struct RetryOnce;

    struct RetryInterceptor;

    impl MethodInterceptor for RetryInterceptor {
        fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationResult {
            invocation.proceed().map(|value| {
                let n = value.downcast_ref::<u32>().copied().unwrap_or_default();
                Box::new(n + 1) as ReturnValue
            })
        }
    }

    struct RetryAdapter;

    impl AdvisorAdapter for RetryAdapter {
        fn name(&self) -> &str {
            "RetryAdapter"
        }

        fn supports_advice(&self, advice: &Advice) -> bool {
            advice.downcast_custom::<RetryOnce>().is_some()
        }

        fn get_interceptor(&self, _advisor: &dyn Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
            Ok(Arc::new(RetryInterceptor))
        }
    }

    fn create_retry_adapter() -> Arc<dyn AdvisorAdapter> {
        Arc::new(RetryAdapter)
    }

    inventory::submit! {
        AdvisorAdapterRegistration::new("RetryAdapter", create_retry_adapter)
    }

    #[test]
    fn test_default_adapters_in_order() {
        let registry = AdvisorAdapterRegistry::new();
        assert_eq!(
            registry.adapter_names(),
            vec!["MethodBeforeAdviceAdapter", "AfterReturningAdviceAdapter", "ThrowsAdviceAdapter"]
        );
    }

    #[test]
    fn test_wrap_advisor_is_identity() {
        let registry = AdvisorAdapterRegistry::new();
        let advisor: Arc<dyn Advisor> =
            Arc::new(DefaultPointcutAdvisor::new(Advice::before_fn(|_, _, _| Ok(()))));
        let wrapped = registry.wrap(Arc::clone(&advisor)).unwrap();
        assert!(Arc::ptr_eq(&advisor, &wrapped));
    }

    #[test]
    fn test_wrap_advice_keeps_original_object() {
        let registry = AdvisorAdapterRegistry::new();
        for advice in [
            Advice::before_fn(|_, _, _| Ok(())),
            Advice::after_returning_fn(|_, _, _, _| Ok(())),
            Advice::Throws(Arc::new(ThrowsHandlers::new("t").on(&INVALID_ARGUMENT, |_| Ok(())))),
            Advice::around_fn("around", |inv| inv.proceed()),
        ] {
            let advisor = registry.wrap(advice.clone()).unwrap();
            assert!(advisor.advice().same_as(&advice));
            assert!(advisor.pointcut().matches(&Method::new("Any", "method")));
        }
    }

    #[test]
    fn test_unknown_advice_rejected() {
        let registry = AdvisorAdapterRegistry::new();
        let err = registry.wrap(Advice::custom(RetryOnce)).err().unwrap();
        assert!(matches!(err, AopError::UnknownAdviceType(_)));

        let advisor = DefaultPointcutAdvisor::new(Advice::custom(RetryOnce));
        assert!(matches!(
            registry.get_interceptor(&advisor),
            Err(AopError::UnknownAdviceType(_))
        ));
    }

    #[test]
    fn test_interceptor_advice_returned_as_is() {
        let registry = AdvisorAdapterRegistry::new();
        let interceptor: Arc<dyn MethodInterceptor> = Arc::new(RetryInterceptor);
        let advisor = DefaultPointcutAdvisor::new(Advice::Interceptor(Arc::clone(&interceptor)));
        let resolved = registry.get_interceptor(&advisor).unwrap();
        assert!(std::ptr::eq(
            Arc::as_ptr(&interceptor) as *const (),
            Arc::as_ptr(&resolved) as *const ()
        ));
    }

    #[test]
    fn test_custom_adapter_extends_registry() {
        let registry = AdvisorAdapterRegistry::new();
        registry.register_adapter(Arc::new(RetryAdapter));
        assert_eq!(registry.len(), 4);

        let advisor = registry.wrap(Advice::custom(RetryOnce)).unwrap();
        let interceptor = registry.get_interceptor(advisor.as_ref()).unwrap();

        let mut inv = StubInvocation::new(Method::new("Job", "run"), || Ok(Box::new(1u32) as ReturnValue));
        let value = interceptor.invoke(&mut inv).unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&2));
    }

    #[test]
    fn test_throws_adapter_surfaces_configuration_errors() {
        let registry = AdvisorAdapterRegistry::new();
        let advisor = DefaultPointcutAdvisor::new(Advice::Throws(Arc::new(ThrowsHandlers::new("empty"))));
        assert!(matches!(
            registry.get_interceptor(&advisor),
            Err(AopError::NoThrowsHandlers(_))
        ));
    }

    #[test]
    fn test_before_interceptor_from_registry() {
        let registry = AdvisorAdapterRegistry::new();
        let advisor = registry
            .wrap(Advice::before_fn(|_, _, _| Err(Exception::new(&ILLEGAL_STATE, "closed"))))
            .unwrap();
        let interceptor = registry.get_interceptor(advisor.as_ref()).unwrap();
        let mut inv = StubInvocation::new(Method::new("Job", "run"), || -> InvocationResult {
            panic!("target must not run")
        });
        assert_eq!(interceptor.invoke(&mut inv).unwrap_err().message(), "closed");
    }

    #[test]
    fn test_global_registry_loads_submitted_adapters() {
        assert!(get_all_adapter_registrations().any(|r| r.name == "RetryAdapter"));

        let registry = get_global_adapter_registry();
        let names = registry.adapter_names();
        assert_eq!(names[0], "MethodBeforeAdviceAdapter");
        assert!(names.iter().any(|name| name == "RetryAdapter"));
        assert!(registry.wrap(Advice::custom(RetryOnce)).is_ok());
    }
}
