//! 通知（Advice）与通知器（Advisor）定义
//!
//! 通知描述“做什么”，通知器把通知和切点绑定在一起，代理只认识通知器。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::exception::Exception;
use crate::interceptor::{FnInterceptor, MethodInterceptor};
use crate::invocation::{Arguments, Invocation, InvocationResult, Method};
use crate::pointcut::PointcutExpression;
use crate::throws::ThrowsAdvice;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceType {
    /// 前置通知
    Before,
    /// 返回后通知（成功返回时执行）
    AfterReturning,
    /// 异常通知（抛出异常时执行）
    Throws,
    /// 环绕通知（直接实现了拦截器）
    Around,
    /// 自定义通知，需要注册对应的适配器
    Custom,
}

/// 前置通知
///
/// 返回 `Err` 时目标方法不会执行，异常直接传播给调用方
pub trait MethodBeforeAdvice: Send + Sync {
    fn before(
        &self,
        method: &Method,
        args: &Arguments,
        target: Option<&(dyn Any + Send + Sync)>,
    ) -> Result<(), Exception>;
}

/// 返回后通知
///
/// 只在目标方法正常返回后执行，不能替换返回值
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(
        &self,
        return_value: &(dyn Any + Send),
        method: &Method,
        args: &Arguments,
        target: Option<&(dyn Any + Send + Sync)>,
    ) -> Result<(), Exception>;
}

/// 通知
///
/// 内置的三种通知由默认适配器转换为拦截器；`Interceptor` 直接参与调用链；
/// `Custom` 只有在注册了能识别它的适配器后才能使用。
#[derive(Clone)]
pub enum Advice {
    Before(Arc<dyn MethodBeforeAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    Throws(Arc<dyn ThrowsAdvice>),
    Interceptor(Arc<dyn MethodInterceptor>),
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Advice {
    /// 由闭包创建前置通知
    pub fn before_fn<F>(f: F) -> Self
    where
        F: Fn(&Method, &Arguments, Option<&(dyn Any + Send + Sync)>) -> Result<(), Exception>
            + Send
            + Sync
            + 'static,
    {
        Advice::Before(Arc::new(FnBeforeAdvice(f)))
    }

    /// 由闭包创建返回后通知
    pub fn after_returning_fn<F>(f: F) -> Self
    where
        F: Fn(&(dyn Any + Send), &Method, &Arguments, Option<&(dyn Any + Send + Sync)>) -> Result<(), Exception>
            + Send
            + Sync
            + 'static,
    {
        Advice::AfterReturning(Arc::new(FnAfterReturningAdvice(f)))
    }

    /// 由闭包创建环绕通知
    pub fn around_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut dyn Invocation) -> InvocationResult + Send + Sync + 'static,
    {
        Advice::Interceptor(Arc::new(FnInterceptor::new(name, f)))
    }

    /// 包装任意对象作为自定义通知
    pub fn custom<A: Any + Send + Sync>(advice: A) -> Self {
        Advice::Custom(Arc::new(advice))
    }

    pub fn advice_type(&self) -> AdviceType {
        match self {
            Advice::Before(_) => AdviceType::Before,
            Advice::AfterReturning(_) => AdviceType::AfterReturning,
            Advice::Throws(_) => AdviceType::Throws,
            Advice::Interceptor(_) => AdviceType::Around,
            Advice::Custom(_) => AdviceType::Custom,
        }
    }

    /// 尝试取出自定义通知的具体类型
    pub fn downcast_custom<A: Any>(&self) -> Option<&A> {
        match self {
            Advice::Custom(inner) => inner.downcast_ref::<A>(),
            _ => None,
        }
    }

    /// 两个通知是否指向同一个对象
    pub fn same_as(&self, other: &Advice) -> bool {
        self.data_ptr() == other.data_ptr()
    }

    fn data_ptr(&self) -> *const () {
        match self {
            Advice::Before(a) => Arc::as_ptr(a) as *const (),
            Advice::AfterReturning(a) => Arc::as_ptr(a) as *const (),
            Advice::Throws(a) => Arc::as_ptr(a) as *const (),
            Advice::Interceptor(a) => Arc::as_ptr(a) as *const (),
            Advice::Custom(a) => Arc::as_ptr(a) as *const (),
        }
    }

    /// 用于日志和错误信息的描述
    pub fn describe(&self) -> String {
        match self {
            Advice::Throws(a) => format!("Throws({})", a.name()),
            Advice::Interceptor(i) => format!("Interceptor({})", i.name()),
            other => format!("{:?}", other.advice_type()),
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice::{}", self.describe())
    }
}

impl From<Arc<dyn MethodInterceptor>> for Advice {
    fn from(interceptor: Arc<dyn MethodInterceptor>) -> Self {
        Advice::Interceptor(interceptor)
    }
}

impl From<Arc<dyn MethodBeforeAdvice>> for Advice {
    fn from(advice: Arc<dyn MethodBeforeAdvice>) -> Self {
        Advice::Before(advice)
    }
}

impl From<Arc<dyn AfterReturningAdvice>> for Advice {
    fn from(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Advice::AfterReturning(advice)
    }
}

impl From<Arc<dyn ThrowsAdvice>> for Advice {
    fn from(advice: Arc<dyn ThrowsAdvice>) -> Self {
        Advice::Throws(advice)
    }
}

struct FnBeforeAdvice<F>(F);

impl<F> MethodBeforeAdvice for FnBeforeAdvice<F>
where
    F: Fn(&Method, &Arguments, Option<&(dyn Any + Send + Sync)>) -> Result<(), Exception> + Send + Sync,
{
    fn before(
        &self,
        method: &Method,
        args: &Arguments,
        target: Option<&(dyn Any + Send + Sync)>,
    ) -> Result<(), Exception> {
        (self.0)(method, args, target)
    }
}

struct FnAfterReturningAdvice<F>(F);

impl<F> AfterReturningAdvice for FnAfterReturningAdvice<F>
where
    F: Fn(&(dyn Any + Send), &Method, &Arguments, Option<&(dyn Any + Send + Sync)>) -> Result<(), Exception>
        + Send
        + Sync,
{
    fn after_returning(
        &self,
        return_value: &(dyn Any + Send),
        method: &Method,
        args: &Arguments,
        target: Option<&(dyn Any + Send + Sync)>,
    ) -> Result<(), Exception> {
        (self.0)(return_value, method, args, target)
    }
}

// ============================================================================
// 通知器
// ============================================================================

/// 通知器：通知 + 切点
pub trait Advisor: Send + Sync {
    fn advice(&self) -> &Advice;

    fn pointcut(&self) -> &PointcutExpression;

    fn name(&self) -> &str {
        "advisor"
    }
}

/// 默认通知器
///
/// 不指定切点时匹配所有方法
#[derive(Debug, Clone)]
pub struct DefaultPointcutAdvisor {
    name: String,
    advice: Advice,
    pointcut: PointcutExpression,
}

impl DefaultPointcutAdvisor {
    pub fn new(advice: Advice) -> Self {
        Self {
            name: advice.describe(),
            advice,
            pointcut: PointcutExpression::All,
        }
    }

    /// 设置切点
    pub fn with_pointcut(mut self, pointcut: PointcutExpression) -> Self {
        self.pointcut = pointcut;
        self
    }

    /// 设置名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Advisor for DefaultPointcutAdvisor {
    fn advice(&self) -> &Advice {
        &self.advice
    }

    fn pointcut(&self) -> &PointcutExpression {
        &self.pointcut
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 可被适配器注册表包装的对象：裸通知或已有的通知器
#[derive(Clone)]
pub enum Advisable {
    Advice(Advice),
    Advisor(Arc<dyn Advisor>),
}

impl From<Advice> for Advisable {
    fn from(advice: Advice) -> Self {
        Advisable::Advice(advice)
    }
}

impl From<Arc<dyn Advisor>> for Advisable {
    fn from(advisor: Arc<dyn Advisor>) -> Self {
        Advisable::Advisor(advisor)
    }
}

impl From<DefaultPointcutAdvisor> for Advisable {
    fn from(advisor: DefaultPointcutAdvisor) -> Self {
        Advisable::Advisor(Arc::new(advisor))
    }
}
