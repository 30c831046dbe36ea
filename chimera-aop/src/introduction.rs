//! 引入（Introduction）
//!
//! 让代理额外具备目标本身没有的能力。属于该能力的方法由拦截器直接应答，
//! 不会到达目标；其余方法照常继续调用链。

use std::fmt;
use std::sync::Arc;

use crate::interceptor::MethodInterceptor;
use crate::invocation::{Arguments, Invocation, InvocationResult, Method};

/// 引入方法的处理函数
pub type IntroducedMethodHandler = Arc<dyn Fn(&Method, &Arguments) -> InvocationResult + Send + Sync>;

/// 引入拦截器
///
/// 声明类型等于 `capability` 的方法由 `handler` 处理
pub struct IntroductionInterceptor {
    capability: &'static str,
    handler: IntroducedMethodHandler,
}

impl IntroductionInterceptor {
    pub fn new<F>(capability: &'static str, handler: F) -> Self
    where
        F: Fn(&Method, &Arguments) -> InvocationResult + Send + Sync + 'static,
    {
        Self {
            capability,
            handler: Arc::new(handler),
        }
    }

    pub fn capability(&self) -> &'static str {
        self.capability
    }

    /// 方法是否属于引入的能力
    pub fn implements(&self, method: &Method) -> bool {
        method.declaring_type == self.capability
    }
}

impl MethodInterceptor for IntroductionInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationResult {
        if self.implements(invocation.method()) {
            tracing::trace!(method = %invocation.method(), "Serving introduced method");
            return (self.handler)(invocation.method(), invocation.arguments());
        }
        invocation.proceed()
    }

    fn name(&self) -> &str {
        self.capability
    }
}

impl fmt::Debug for IntroductionInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntroductionInterceptor")
            .field("capability", &self.capability)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::test_support::StubInvocation;
    use crate::invocation::ReturnValue;

    fn lockable() -> IntroductionInterceptor {
        IntroductionInterceptor::new("Lockable", |method: &Method, _args: &Arguments| {
            Ok(Box::new(format!("introduced {}", method.name)) as ReturnValue)
        })
    }

    #[test]
    fn test_introduced_method_does_not_reach_target() {
        let mut inv = StubInvocation::new(Method::new("Lockable", "locked"), || -> InvocationResult {
            panic!("target must not run")
        });
        let value = lockable().invoke(&mut inv).unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("introduced locked"));
    }

    #[test]
    fn test_other_methods_proceed() {
        let mut inv = StubInvocation::new(Method::new("Account", "balance"), || Ok(Box::new(10i64) as ReturnValue));
        let value = lockable().invoke(&mut inv).unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&10));
    }
}
