//! 异常通知
//!
//! 异常通知对象声明一组处理器，每个处理器绑定一个异常种类。目标抛出异常时，
//! 拦截器沿异常的继承链由近及远查找处理器，执行后把原异常继续抛出。

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{AopError, AopResult};
use crate::exception::{Exception, ExceptionKind};
use crate::interceptor::MethodInterceptor;
use crate::invocation::{Arguments, Invocation, InvocationResult, Method};

/// 只关心异常本身的处理器
pub type SimpleThrowsCallback = Arc<dyn Fn(&Exception) -> Result<(), Exception> + Send + Sync>;

/// 需要调用上下文的处理器
pub type ContextThrowsCallback = Arc<
    dyn Fn(&Method, &Arguments, Option<&(dyn Any + Send + Sync)>, &Exception) -> Result<(), Exception>
        + Send
        + Sync,
>;

/// 处理器的两种形态
#[derive(Clone)]
pub enum ThrowsCallback {
    Simple(SimpleThrowsCallback),
    WithContext(ContextThrowsCallback),
}

/// 一个异常处理器
#[derive(Clone)]
pub struct ThrowsHandler {
    pub kind: &'static ExceptionKind,
    pub callback: ThrowsCallback,
}

impl ThrowsHandler {
    fn invoke(
        &self,
        method: &Method,
        args: &Arguments,
        target: Option<&(dyn Any + Send + Sync)>,
        ex: &Exception,
    ) -> Result<(), Exception> {
        match &self.callback {
            ThrowsCallback::Simple(callback) => callback(ex),
            ThrowsCallback::WithContext(callback) => callback(method, args, target, ex),
        }
    }
}

impl fmt::Debug for ThrowsHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.callback {
            ThrowsCallback::Simple(_) => "simple",
            ThrowsCallback::WithContext(_) => "with_context",
        };
        f.debug_struct("ThrowsHandler")
            .field("kind", &self.kind.name())
            .field("shape", &shape)
            .finish()
    }
}

/// 异常通知
///
/// 实现者通过 `handlers()` 声明自己能处理的异常种类。
/// 每个种类只能出现一次，且至少声明一个处理器。
pub trait ThrowsAdvice: Send + Sync {
    fn name(&self) -> &str;

    fn handlers(&self) -> Vec<ThrowsHandler>;
}

/// 以构建器方式声明处理器的异常通知
///
/// ```
/// use chimera_aop::exception::INVALID_ARGUMENT;
/// use chimera_aop::throws::ThrowsHandlers;
///
/// let advice = ThrowsHandlers::new("audit")
///     .on(&INVALID_ARGUMENT, |ex| {
///         println!("rejected: {}", ex);
///         Ok(())
///     });
/// ```
#[derive(Clone, Default)]
pub struct ThrowsHandlers {
    name: String,
    handlers: Vec<ThrowsHandler>,
}

impl ThrowsHandlers {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: Vec::new(),
        }
    }

    /// 注册只接收异常的处理器
    pub fn on<F>(mut self, kind: &'static ExceptionKind, handler: F) -> Self
    where
        F: Fn(&Exception) -> Result<(), Exception> + Send + Sync + 'static,
    {
        self.handlers.push(ThrowsHandler {
            kind,
            callback: ThrowsCallback::Simple(Arc::new(handler)),
        });
        self
    }

    /// 注册接收调用上下文的处理器
    pub fn on_with_context<F>(mut self, kind: &'static ExceptionKind, handler: F) -> Self
    where
        F: Fn(&Method, &Arguments, Option<&(dyn Any + Send + Sync)>, &Exception) -> Result<(), Exception>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.push(ThrowsHandler {
            kind,
            callback: ThrowsCallback::WithContext(Arc::new(handler)),
        });
        self
    }
}

impl ThrowsAdvice for ThrowsHandlers {
    fn name(&self) -> &str {
        &self.name
    }

    fn handlers(&self) -> Vec<ThrowsHandler> {
        self.handlers.clone()
    }
}

/// 异常通知拦截器
///
/// 构造时索引处理器，之后只读
pub struct ThrowsAdviceInterceptor {
    name: String,
    handlers: HashMap<&'static ExceptionKind, ThrowsHandler>,
}

impl ThrowsAdviceInterceptor {
    pub fn new(advice: &dyn ThrowsAdvice) -> AopResult<Self> {
        let declared = advice.handlers();
        if declared.is_empty() {
            return Err(AopError::NoThrowsHandlers(advice.name().to_string()));
        }

        let mut handlers = HashMap::with_capacity(declared.len());
        for handler in declared {
            let kind = handler.kind;
            if handlers.insert(kind, handler).is_some() {
                return Err(AopError::DuplicateThrowsHandler {
                    kind: kind.name().to_string(),
                });
            }
            tracing::debug!(advice = advice.name(), kind = kind.name(), "Found exception handler");
        }

        Ok(Self {
            name: advice.name().to_string(),
            handlers,
        })
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// 按继承链查找最近的处理器
    fn handler_for(&self, kind: &ExceptionKind) -> Option<&ThrowsHandler> {
        let found = kind
            .ancestors()
            .find_map(|candidate| self.handlers.get(candidate));
        tracing::trace!(kind = kind.name(), found = found.is_some(), "Looking up exception handler");
        found
    }
}

impl MethodInterceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvocationResult {
        let ex = match invocation.proceed() {
            Ok(value) => return Ok(value),
            Err(ex) => ex,
        };

        if let Some(handler) = self.handler_for(ex.kind()) {
            handler.invoke(invocation.method(), invocation.arguments(), invocation.this(), &ex)?;
        }
        Err(ex)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ThrowsAdviceInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrowsAdviceInterceptor")
            .field("name", &self.name)
            .field("handlers", &self.handlers.keys().map(|kind| kind.name()).collect::<Vec<_>>())
            .finish()
    }
}
