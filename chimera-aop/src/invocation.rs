//! 方法调用（Invocation）定义
//!
//! 一次调用穿过拦截器链时携带的上下文：目标方法、参数、接收者以及 `proceed()`

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::exception::{Exception, ILLEGAL_STATE, INVALID_ARGUMENT};
use crate::interceptor::MethodInterceptor;
use crate::target_source::TargetSource;

/// 方法返回值
pub type ReturnValue = Box<dyn Any + Send>;

/// 拦截器链上每一环的结果
pub type InvocationResult = Result<ReturnValue, Exception>;

/// 方法标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method {
    /// 声明该方法的类型名称
    pub declaring_type: &'static str,

    /// 方法名称
    pub name: &'static str,
}

impl Method {
    pub const fn new(declaring_type: &'static str, name: &'static str) -> Self {
        Self {
            declaring_type,
            name,
        }
    }

    /// 获取完整的方法签名
    pub fn signature(&self) -> String {
        format!("{}::{}", self.declaring_type, self.name)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

/// 有序的方法参数
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<Arc<dyn Any + Send + Sync>>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加参数（构建器风格）
    pub fn with<A: Any + Send + Sync>(mut self, value: A) -> Self {
        self.push(value);
        self
    }

    pub fn push<A: Any + Send + Sync>(&mut self, value: A) {
        self.values.push(Arc::new(value));
    }

    /// 替换指定位置的参数，越界时返回 false
    pub fn set<A: Any + Send + Sync>(&mut self, index: usize, value: A) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = Arc::new(value);
                true
            }
            None => false,
        }
    }

    /// 尝试按类型获取参数
    pub fn get<A: Any>(&self, index: usize) -> Option<&A> {
        self.values.get(index)?.downcast_ref::<A>()
    }

    /// 按类型获取参数，缺失或类型不符时返回 `InvalidArgument` 异常
    pub fn require<A: Any>(&self, index: usize) -> Result<&A, Exception> {
        self.get::<A>(index).ok_or_else(|| {
            Exception::new(
                &INVALID_ARGUMENT,
                format!("argument {} is missing or not a {}", index, std::any::type_name::<A>()),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments").field("len", &self.values.len()).finish()
    }
}

/// 调用契约
///
/// 拦截器通过 `proceed()` 把调用交给下一环；链尾的 `proceed()` 调用真实目标。
/// 不调用 `proceed()` 即短路整条链。
pub trait Invocation {
    fn method(&self) -> &Method;

    fn arguments(&self) -> &Arguments;

    fn arguments_mut(&mut self) -> &mut Arguments;

    /// 接收者
    ///
    /// 静态目标源在调用开始时即已解析；非静态目标源只在链尾借出实例，此处为 `None`
    fn this(&self) -> Option<&(dyn Any + Send + Sync)>;

    /// 继续执行下一个拦截器或目标方法
    fn proceed(&mut self) -> InvocationResult;
}

/// 链尾的真实调用
pub type JoinpointCall<'a, T> = Box<dyn FnOnce(&T, &Arguments) -> InvocationResult + 'a>;

/// 默认的调用实现
///
/// 每次调用新建一个实例，游标随 `proceed()` 前进，不可重用，也不跨线程共享
pub struct ReflectiveMethodInvocation<'a, T: Any + Send + Sync> {
    method: &'a Method,
    arguments: Arguments,
    interceptors: &'a [Arc<dyn MethodInterceptor>],
    current: usize,
    target_source: &'a dyn TargetSource<T>,
    static_target: Option<Arc<T>>,
    call: Option<JoinpointCall<'a, T>>,
}

impl<'a, T: Any + Send + Sync> ReflectiveMethodInvocation<'a, T> {
    pub fn new(
        method: &'a Method,
        arguments: Arguments,
        interceptors: &'a [Arc<dyn MethodInterceptor>],
        target_source: &'a dyn TargetSource<T>,
        static_target: Option<Arc<T>>,
        call: JoinpointCall<'a, T>,
    ) -> Self {
        Self {
            method,
            arguments,
            interceptors,
            current: 0,
            target_source,
            static_target,
            call: Some(call),
        }
    }

    /// 链尾：解析目标、调用、归还
    fn invoke_joinpoint(&mut self) -> InvocationResult {
        let call = self.call.take().ok_or_else(|| {
            Exception::new(
                &ILLEGAL_STATE,
                format!("{}: proceed() has already reached the target", self.method),
            )
        })?;

        if let Some(target) = &self.static_target {
            return call(target.as_ref(), &self.arguments);
        }

        let target = self.target_source.get_target()?;
        let result = call(target.as_ref(), &self.arguments);
        match self.target_source.release_target(target) {
            Ok(()) => result,
            Err(e) if result.is_ok() => Err(e.into()),
            Err(e) => {
                tracing::warn!(method = %self.method, error = %e, "Failed to release target after failed call");
                result
            }
        }
    }
}

impl<T: Any + Send + Sync> Invocation for ReflectiveMethodInvocation<'_, T> {
    fn method(&self) -> &Method {
        self.method
    }

    fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    fn this(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.static_target
            .as_deref()
            .map(|target| target as &(dyn Any + Send + Sync))
    }

    fn proceed(&mut self) -> InvocationResult {
        let Some(interceptor) = self.interceptors.get(self.current).cloned() else {
            return self.invoke_joinpoint();
        };
        self.current += 1;
        tracing::trace!(
            method = %self.method,
            position = self.current,
            interceptor = interceptor.name(),
            "Invoking interceptor"
        );
        interceptor.invoke(self)
    }
}

impl<T: Any + Send + Sync> fmt::Debug for ReflectiveMethodInvocation<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectiveMethodInvocation")
            .field("method", self.method)
            .field("arguments", &self.arguments)
            .field("current", &self.current)
            .field("chain_len", &self.interceptors.len())
            .field("target_resolved", &self.static_target.is_some())
            .finish()
    }
}
