//! 方法拦截器
//!
//! 拦截器是调用链的统一形态，所有通知最终都被适配成 [`MethodInterceptor`]。

use std::sync::Arc;

use crate::advice::{AfterReturningAdvice, MethodBeforeAdvice};
use crate::invocation::{Invocation, InvocationResult};

/// 方法拦截器
///
/// 在 `invoke` 中调用 `invocation.proceed()` 把控制权交给下一环
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationResult;

    /// 拦截器名称（用于日志）
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// 基于闭包的拦截器
pub struct FnInterceptor<F> {
    name: String,
    func: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(&mut dyn Invocation) -> InvocationResult + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> MethodInterceptor for FnInterceptor<F>
where
    F: Fn(&mut dyn Invocation) -> InvocationResult + Send + Sync,
{
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationResult {
        (self.func)(invocation)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 前置通知拦截器
///
/// 先执行通知，通知成功后才继续调用链
pub struct MethodBeforeAdviceInterceptor {
    advice: Arc<dyn MethodBeforeAdvice>,
}

impl MethodBeforeAdviceInterceptor {
    pub fn new(advice: Arc<dyn MethodBeforeAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for MethodBeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationResult {
        self.advice
            .before(invocation.method(), invocation.arguments(), invocation.this())?;
        invocation.proceed()
    }

    fn name(&self) -> &str {
        "MethodBeforeAdviceInterceptor"
    }
}

/// 返回后通知拦截器
///
/// 调用链正常返回后执行通知；通知失败时返回值被丢弃，通知的异常向上传播
pub struct AfterReturningAdviceInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AfterReturningAdviceInterceptor {
    pub fn new(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationResult {
        let return_value = invocation.proceed()?;
        self.advice.after_returning(
            return_value.as_ref(),
            invocation.method(),
            invocation.arguments(),
            invocation.this(),
        )?;
        Ok(return_value)
    }

    fn name(&self) -> &str {
        "AfterReturningAdviceInterceptor"
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::test_support::StubInvocation;
    use super::*;
    use crate::advice::Advice;
    use crate::exception::{Exception, INVALID_ARGUMENT};
    use crate::invocation::{Method, ReturnValue};

    const FIND: Method = Method::new("Repo", "find");

    fn before_interceptor(advice: Advice) -> MethodBeforeAdviceInterceptor {
        match advice {
            Advice::Before(a) => MethodBeforeAdviceInterceptor::new(a),
            other => panic!("unexpected advice {:?}", other),
        }
    }

    fn after_interceptor(advice: Advice) -> AfterReturningAdviceInterceptor {
        match advice {
            Advice::AfterReturning(a) => AfterReturningAdviceInterceptor::new(a),
            other => panic!("unexpected advice {:?}", other),
        }
    }

    #[test]
    fn test_before_runs_then_proceeds() {
        let seen = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&seen);
        let interceptor = before_interceptor(Advice::before_fn(move |method, _, _| {
            assert_eq!(method.name, "find");
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }));

        let observed = Arc::clone(&seen);
        let mut inv = StubInvocation::new(FIND, move || {
            assert!(observed.load(Ordering::SeqCst));
            Ok(Box::new(1u8) as ReturnValue)
        });
        let result = interceptor.invoke(&mut inv).unwrap();
        assert_eq!(result.downcast_ref::<u8>(), Some(&1));
    }

    #[test]
    fn test_before_failure_skips_target() {
        let interceptor = before_interceptor(Advice::before_fn(|_, _, _| {
            Err(Exception::new(&INVALID_ARGUMENT, "rejected"))
        }));
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let mut inv = StubInvocation::new(FIND, move || {
            flag.store(true, Ordering::SeqCst);
            Ok(Box::new(()) as ReturnValue)
        });

        let err = interceptor.invoke(&mut inv).unwrap_err();
        assert_eq!(err.message(), "rejected");
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_after_returning_sees_value_and_skips_on_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let interceptor = after_interceptor(Advice::after_returning_fn(move |value, _, _, _| {
            assert_eq!(value.downcast_ref::<i32>(), Some(&42));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let mut ok = StubInvocation::new(FIND, || Ok(Box::new(42i32) as ReturnValue));
        let value = interceptor.invoke(&mut ok).unwrap();
        assert_eq!(value.downcast_ref::<i32>(), Some(&42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let mut failing = StubInvocation::new(FIND, || Err(Exception::new(&INVALID_ARGUMENT, "boom")));
        assert!(interceptor.invoke(&mut failing).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_after_returning_failure_replaces_result() {
        let interceptor = after_interceptor(Advice::after_returning_fn(|_, _, _, _| {
            Err(Exception::new(&INVALID_ARGUMENT, "audit failed"))
        }));
        let mut inv = StubInvocation::new(FIND, || Ok(Box::new(1u8) as ReturnValue));
        let err = interceptor.invoke(&mut inv).unwrap_err();
        assert_eq!(err.message(), "audit failed");
    }

    #[test]
    fn test_fn_interceptor_can_short_circuit() {
        let interceptor = FnInterceptor::new("cache", |_inv: &mut dyn Invocation| {
            Ok(Box::new("cached") as ReturnValue)
        });
        let mut inv = StubInvocation::new(FIND, || -> InvocationResult { panic!("target must not run") });
        let value = interceptor.invoke(&mut inv).unwrap();
        assert_eq!(value.downcast_ref::<&str>(), Some(&"cached"));
        assert_eq!(interceptor.name(), "cache");
    }
}
