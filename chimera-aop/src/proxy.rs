//! 代理
//!
//! [`ProxyFactory`] 收集通知器和目标源，[`AopProxy`] 在每次调用时构造
//! 调用链：匹配方法的拦截器按注册顺序排列，链尾是目标方法。

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::advice::{Advice, Advisor};
use crate::error::{AopError, AopResult};
use crate::exception::{Exception, INVALID_ARGUMENT};
use crate::interceptor::MethodInterceptor;
use crate::invocation::{Arguments, Invocation, InvocationResult, Method, ReflectiveMethodInvocation, ReturnValue};
use crate::registry::{get_global_adapter_registry, AdvisorAdapterRegistry};
use crate::target_source::{SingletonTargetSource, TargetSource};

/// 代理工厂
///
/// ```
/// use std::sync::Arc;
/// use chimera_aop::{Advice, Arguments, Method, ProxyFactory};
///
/// struct Calculator;
///
/// impl Calculator {
///     fn double(&self, n: i32) -> i32 {
///         n * 2
///     }
/// }
///
/// const DOUBLE: Method = Method::new("Calculator", "double");
///
/// let mut factory = ProxyFactory::for_target(Arc::new(Calculator));
/// factory.add_advice(Advice::before_fn(|method, _, _| {
///     println!("calling {}", method);
///     Ok(())
/// })).unwrap();
///
/// let proxy = factory.get_proxy().unwrap();
/// let result = proxy
///     .invoke(&DOUBLE, Arguments::new().with(21), |calc, args| {
///         Ok(calc.double(*args.require::<i32>(0)?))
///     })
///     .unwrap();
/// assert_eq!(result, 42);
/// ```
pub struct ProxyFactory<T: Any + Send + Sync> {
    advisors: Vec<Arc<dyn Advisor>>,
    target_source: Option<Arc<dyn TargetSource<T>>>,
    registry: Arc<AdvisorAdapterRegistry>,
}

impl<T: Any + Send + Sync> ProxyFactory<T> {
    /// 创建使用全局适配器注册表的代理工厂
    pub fn new() -> Self {
        Self {
            advisors: Vec::new(),
            target_source: None,
            registry: Arc::clone(get_global_adapter_registry()),
        }
    }

    /// 以固定目标创建代理工厂
    pub fn for_target(target: Arc<T>) -> Self {
        let mut factory = Self::new();
        factory.set_target(target);
        factory
    }

    /// 以目标源创建代理工厂
    pub fn for_target_source(target_source: Arc<dyn TargetSource<T>>) -> Self {
        let mut factory = Self::new();
        factory.set_target_source(target_source);
        factory
    }

    /// 指定适配器注册表
    pub fn with_adapter_registry(mut self, registry: Arc<AdvisorAdapterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// 添加通知，包装为匹配所有方法的通知器
    pub fn add_advice(&mut self, advice: Advice) -> AopResult<()> {
        let advisor = self.registry.wrap(advice)?;
        self.add_advisor(advisor);
        Ok(())
    }

    /// 添加通知器
    pub fn add_advisor(&mut self, advisor: Arc<dyn Advisor>) {
        tracing::debug!("Adding advisor: {}", advisor.name());
        self.advisors.push(advisor);
    }

    pub fn set_target(&mut self, target: Arc<T>) {
        self.target_source = Some(Arc::new(SingletonTargetSource::new(target)));
    }

    pub fn set_target_source(&mut self, target_source: Arc<dyn TargetSource<T>>) {
        self.target_source = Some(target_source);
    }

    pub fn advisors(&self) -> &[Arc<dyn Advisor>] {
        &self.advisors
    }

    pub fn target_source(&self) -> Option<&Arc<dyn TargetSource<T>>> {
        self.target_source.as_ref()
    }

    /// 创建代理
    ///
    /// 所有通知器在此时转换为拦截器，配置错误在这里返回
    pub fn get_proxy(&self) -> AopResult<AopProxy<T>> {
        let target_source = self.target_source.clone().ok_or_else(|| {
            AopError::InvalidConfig(format!(
                "no target or target source configured for proxy of {}",
                std::any::type_name::<T>()
            ))
        })?;

        let advisors = self
            .advisors
            .iter()
            .map(|advisor| {
                let interceptor = self.registry.get_interceptor(advisor.as_ref())?;
                Ok(ResolvedAdvisor {
                    advisor: Arc::clone(advisor),
                    interceptor,
                })
            })
            .collect::<AopResult<Vec<_>>>()?;

        tracing::debug!(
            target_type = %target_source.target_type(),
            advisors = advisors.len(),
            static_target = target_source.is_static(),
            "Created AOP proxy"
        );

        Ok(AopProxy {
            advisors,
            target_source,
            chains: RwLock::new(HashMap::new()),
        })
    }
}

impl<T: Any + Send + Sync> Default for ProxyFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct ResolvedAdvisor {
    advisor: Arc<dyn Advisor>,
    interceptor: Arc<dyn MethodInterceptor>,
}

type InterceptorChain = Arc<[Arc<dyn MethodInterceptor>]>;

/// AOP 代理
///
/// 可以在多个线程间共享；每次调用使用独立的调用对象
pub struct AopProxy<T: Any + Send + Sync> {
    advisors: Vec<ResolvedAdvisor>,
    target_source: Arc<dyn TargetSource<T>>,
    chains: RwLock<HashMap<Method, InterceptorChain>>,
}

impl<T: Any + Send + Sync> AopProxy<T> {
    /// 经拦截器链调用目标方法
    ///
    /// `call` 是链尾的真实调用，只在调用链到达目标时执行一次
    pub fn invoke<R, F>(&self, method: &Method, args: Arguments, call: F) -> Result<R, Exception>
    where
        R: Any + Send,
        F: FnOnce(&T, &Arguments) -> Result<R, Exception>,
    {
        let value = self.invoke_dynamic(method, args, move |target, args| {
            call(target, args).map(|value| Box::new(value) as ReturnValue)
        })?;

        value.downcast::<R>().map(|value| *value).map_err(|_| {
            Exception::new(
                &INVALID_ARGUMENT,
                format!("{} returned a value that is not a {}", method, std::any::type_name::<R>()),
            )
        })
    }

    /// 经拦截器链调用目标方法，返回未类型化的结果
    pub fn invoke_dynamic<F>(&self, method: &Method, args: Arguments, call: F) -> InvocationResult
    where
        F: FnOnce(&T, &Arguments) -> InvocationResult,
    {
        let chain = self.interceptor_chain(method);
        let static_target = if self.target_source.is_static() {
            Some(self.target_source.get_target()?)
        } else {
            None
        };

        let result = {
            let mut invocation = ReflectiveMethodInvocation::new(
                method,
                args,
                &chain,
                self.target_source.as_ref(),
                static_target.clone(),
                Box::new(call),
            );
            invocation.proceed()
        };

        match static_target.map(|target| self.target_source.release_target(target)) {
            Some(Err(e)) if result.is_ok() => Err(e.into()),
            Some(Err(e)) => {
                tracing::warn!(method = %method, error = %e, "Failed to release static target");
                result
            }
            _ => result,
        }
    }

    /// 匹配方法的拦截器链（按方法缓存）
    fn interceptor_chain(&self, method: &Method) -> InterceptorChain {
        if let Some(chain) = self.chains.read().get(method) {
            return Arc::clone(chain);
        }

        let chain: InterceptorChain = self
            .advisors
            .iter()
            .filter(|resolved| resolved.advisor.pointcut().matches(method))
            .map(|resolved| Arc::clone(&resolved.interceptor))
            .collect();
        tracing::debug!(method = %method, interceptors = chain.len(), "Built interceptor chain");

        Arc::clone(self.chains.write().entry(*method).or_insert(chain))
    }

    pub fn target_source(&self) -> &Arc<dyn TargetSource<T>> {
        &self.target_source
    }

    /// 通知器名称（按注册顺序）
    pub fn advisor_names(&self) -> Vec<String> {
        self.advisors
            .iter()
            .map(|resolved| resolved.advisor.name().to_string())
            .collect()
    }
}

impl<T: Any + Send + Sync> fmt::Debug for AopProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AopProxy")
            .field("target_type", &self.target_source.target_type().type_name)
            .field("advisors", &self.advisor_names())
            .field("cached_chains", &self.chains.read().len())
            .finish()
    }
}
