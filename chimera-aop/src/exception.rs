//! 运行时异常
//!
//! 目标方法和通知回调的失败统一用 [`Exception`] 表示。每个异常属于一个
//! [`ExceptionKind`]，种类之间通过 parent 构成继承链，异常通知按这条链查找处理器。

use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::AopError;

/// 异常种类
///
/// 种类以 `static` 声明，通过 parent 指向父种类，根种类为 [`EXCEPTION`]。
/// 种类按地址比较：同名但不同的 `static` 是两个不同的种类。
///
/// ```
/// use chimera_aop::exception::{ExceptionKind, INVALID_ARGUMENT};
///
/// static OUT_OF_RANGE: ExceptionKind = ExceptionKind::extends("OutOfRange", &INVALID_ARGUMENT);
///
/// assert!(INVALID_ARGUMENT.is_assignable_from(&OUT_OF_RANGE));
/// ```
#[derive(Debug)]
pub struct ExceptionKind {
    name: &'static str,
    parent: Option<&'static ExceptionKind>,
}

impl ExceptionKind {
    /// 创建根种类
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// 创建继承自 `parent` 的种类
    pub const fn extends(name: &'static str, parent: &'static ExceptionKind) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static ExceptionKind> {
        self.parent
    }

    /// 从自身开始沿继承链向上遍历
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// `other` 是否为自身或自身的子种类
    pub fn is_assignable_from(&self, other: &ExceptionKind) -> bool {
        other.ancestors().any(|kind| kind == self)
    }
}

impl PartialEq for ExceptionKind {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for ExceptionKind {}

impl Hash for ExceptionKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 继承链迭代器
pub struct Ancestors<'a> {
    next: Option<&'a ExceptionKind>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ExceptionKind;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent.map(|parent| parent as &ExceptionKind);
        Some(current)
    }
}

// ============================================================================
// 预定义的异常种类
// ============================================================================

/// 所有异常的根
pub static EXCEPTION: ExceptionKind = ExceptionKind::root("Exception");

/// 参数非法
pub static INVALID_ARGUMENT: ExceptionKind = ExceptionKind::extends("InvalidArgument", &EXCEPTION);

/// 缺少必需参数
pub static NULL_ARGUMENT: ExceptionKind = ExceptionKind::extends("NullArgument", &INVALID_ARGUMENT);

/// 对象状态不允许当前操作
pub static ILLEGAL_STATE: ExceptionKind = ExceptionKind::extends("IllegalState", &EXCEPTION);

/// 对象已被销毁
pub static DISPOSED: ExceptionKind = ExceptionKind::extends("Disposed", &ILLEGAL_STATE);

/// 对象池已耗尽
pub static POOL_EXHAUSTED: ExceptionKind = ExceptionKind::extends("PoolExhausted", &ILLEGAL_STATE);

/// 配置错误
pub static CONFIGURATION: ExceptionKind = ExceptionKind::extends("Configuration", &EXCEPTION);

/// 运行时异常
///
/// 目标方法返回 `Err(Exception)` 即视为“抛出”，异常沿拦截器链向上传播。
pub struct Exception {
    kind: &'static ExceptionKind,
    message: String,
    source: Option<Arc<dyn Error + Send + Sync>>,
}

impl Exception {
    pub fn new(kind: &'static ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// 设置原因
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn kind(&self) -> &'static ExceptionKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 是否属于 `kind`（含子种类）
    pub fn is(&self, kind: &ExceptionKind) -> bool {
        kind.is_assignable_from(self.kind)
    }

    /// 尝试将原因还原为具体错误类型
    pub fn downcast_source<E: Error + 'static>(&self) -> Option<&E> {
        self.source.as_deref()?.downcast_ref::<E>()
    }

    /// 错误源链（cause chain）
    pub fn source_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.source();
        while let Some(source) = current {
            chain.push(source.to_string());
            current = source.source();
        }
        chain
    }

    /// 获取完整的错误描述（包含源链）
    pub fn full_description(&self) -> String {
        let chain = self.source_chain();
        if chain.is_empty() {
            self.to_string()
        } else {
            format!("{}\nCaused by:\n  {}", self, chain.join("\n  "))
        }
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("kind", &self.kind.name)
            .field("message", &self.message)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for Exception {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

impl From<AopError> for Exception {
    fn from(error: AopError) -> Self {
        let kind = match &error {
            AopError::PoolExhausted { .. } => &POOL_EXHAUSTED,
            AopError::PoolClosed => &DISPOSED,
            AopError::NotInitialized(_) => &ILLEGAL_STATE,
            AopError::NullSwapTarget => &NULL_ARGUMENT,
            AopError::TargetTypeMismatch { .. } => &INVALID_ARGUMENT,
            AopError::UnknownAdviceType(_)
            | AopError::NoThrowsHandlers(_)
            | AopError::DuplicateThrowsHandler { .. }
            | AopError::SingletonScopedTarget(_)
            | AopError::InvalidConfig(_) => &CONFIGURATION,
            AopError::Container(_) => &EXCEPTION,
        };
        Exception::new(kind, error.to_string()).with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static NESTED: ExceptionKind = ExceptionKind::extends("Nested", &NULL_ARGUMENT);

    #[test]
    fn test_ancestors_start_with_self() {
        let names: Vec<_> = NESTED.ancestors().map(|k| k.name()).collect();
        assert_eq!(names, vec!["Nested", "NullArgument", "InvalidArgument", "Exception"]);
    }

    #[test]
    fn test_assignability() {
        assert!(EXCEPTION.is_assignable_from(&DISPOSED));
        assert!(ILLEGAL_STATE.is_assignable_from(&POOL_EXHAUSTED));
        assert!(!INVALID_ARGUMENT.is_assignable_from(&ILLEGAL_STATE));
        assert!(NULL_ARGUMENT.is_assignable_from(&NULL_ARGUMENT));
    }

    #[test]
    fn test_same_name_different_kinds() {
        static NET_TIMEOUT: ExceptionKind = ExceptionKind::extends("Timeout", &ILLEGAL_STATE);
        static PARSE_TIMEOUT: ExceptionKind = ExceptionKind::extends("Timeout", &INVALID_ARGUMENT);

        assert_ne!(NET_TIMEOUT, PARSE_TIMEOUT);
        assert!(!NET_TIMEOUT.is_assignable_from(&PARSE_TIMEOUT));
        assert!(!PARSE_TIMEOUT.is_assignable_from(&NET_TIMEOUT));
        assert!(!Exception::new(&PARSE_TIMEOUT, "bad date").is(&NET_TIMEOUT));
        assert!(Exception::new(&PARSE_TIMEOUT, "bad date").is(&INVALID_ARGUMENT));
    }

    #[test]
    fn test_exception_is_kind_or_subkind() {
        let ex = Exception::new(&NULL_ARGUMENT, "name is required");
        assert!(ex.is(&INVALID_ARGUMENT));
        assert!(ex.is(&EXCEPTION));
        assert!(!ex.is(&ILLEGAL_STATE));
        assert_eq!(ex.to_string(), "NullArgument: name is required");
    }

    #[test]
    fn test_from_aop_error_keeps_source() {
        let ex = Exception::from(AopError::PoolExhausted { max_size: 2 });
        assert_eq!(ex.kind(), &POOL_EXHAUSTED);
        assert!(matches!(
            ex.downcast_source::<AopError>(),
            Some(AopError::PoolExhausted { max_size: 2 })
        ));
        assert!(ex.full_description().contains("Caused by"));

        let closed = Exception::from(AopError::PoolClosed);
        assert_eq!(closed.kind(), &DISPOSED);
        assert!(closed.is(&ILLEGAL_STATE));
    }
}
