//! 切点（Pointcut）表达式
//!
//! 决定一个通知器适用于哪些方法。匹配结果只取决于方法本身，
//! 因此代理可以按方法缓存拦截器链。

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{AopError, AopResult};
use crate::Method;

/// 切点表达式
#[derive(Clone)]
pub enum PointcutExpression {
    /// 匹配所有方法
    All,

    /// 按声明类型匹配，支持 `*` 通配符，例如 `*Service`
    TypePattern(String),

    /// 按方法名匹配，支持 `*` 通配符，例如 `get_*`
    MethodPattern(String),

    /// 同时按类型和方法名匹配
    Execution {
        type_pattern: String,
        method_pattern: String,
    },

    TypeRegex(Regex),

    MethodRegex(Regex),

    Custom(Arc<dyn Fn(&Method) -> bool + Send + Sync>),

    And(Box<PointcutExpression>, Box<PointcutExpression>),

    Or(Box<PointcutExpression>, Box<PointcutExpression>),

    Not(Box<PointcutExpression>),
}

impl PointcutExpression {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            PointcutExpression::All => true,
            PointcutExpression::TypePattern(pattern) => glob_matches(pattern, method.declaring_type),
            PointcutExpression::MethodPattern(pattern) => glob_matches(pattern, method.name),
            PointcutExpression::Execution {
                type_pattern,
                method_pattern,
            } => glob_matches(type_pattern, method.declaring_type) && glob_matches(method_pattern, method.name),
            PointcutExpression::TypeRegex(regex) => regex.is_match(method.declaring_type),
            PointcutExpression::MethodRegex(regex) => regex.is_match(method.name),
            PointcutExpression::Custom(func) => func(method),
            PointcutExpression::And(left, right) => left.matches(method) && right.matches(method),
            PointcutExpression::Or(left, right) => left.matches(method) || right.matches(method),
            PointcutExpression::Not(expr) => !expr.matches(method),
        }
    }

    /// 解析 execution 表达式
    ///
    /// 格式：`execution(<类型模式>.<方法模式>(..))`，也接受省略外层的 `<类型>.<方法>`
    /// 或只有方法模式的写法。
    pub fn execution(expression: &str) -> AopResult<Self> {
        let body = expression.trim();
        let body = body
            .strip_prefix("execution(")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(body)
            .trim();
        let body = body.strip_suffix("(..)").unwrap_or(body);

        if body.is_empty() || body.contains(char::is_whitespace) {
            return Err(AopError::InvalidConfig(format!(
                "malformed execution pointcut '{}'",
                expression
            )));
        }

        Ok(match body.rsplit_once('.') {
            Some((type_pattern, method_pattern)) if !type_pattern.is_empty() && !method_pattern.is_empty() => {
                PointcutExpression::Execution {
                    type_pattern: type_pattern.to_string(),
                    method_pattern: method_pattern.to_string(),
                }
            }
            Some(_) => {
                return Err(AopError::InvalidConfig(format!(
                    "malformed execution pointcut '{}'",
                    expression
                )))
            }
            None => PointcutExpression::MethodPattern(body.to_string()),
        })
    }

    /// 由正则表达式创建方法名切点
    pub fn method_regex(pattern: &str) -> AopResult<Self> {
        Regex::new(pattern)
            .map(PointcutExpression::MethodRegex)
            .map_err(|e| AopError::InvalidConfig(format!("invalid method regex '{}': {}", pattern, e)))
    }

    /// 由正则表达式创建类型切点
    pub fn type_regex(pattern: &str) -> AopResult<Self> {
        Regex::new(pattern)
            .map(PointcutExpression::TypeRegex)
            .map_err(|e| AopError::InvalidConfig(format!("invalid type regex '{}': {}", pattern, e)))
    }

    pub fn and(self, other: PointcutExpression) -> Self {
        PointcutExpression::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: PointcutExpression) -> Self {
        PointcutExpression::Or(Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Self {
        PointcutExpression::Not(Box::new(self))
    }
}

impl Default for PointcutExpression {
    fn default() -> Self {
        PointcutExpression::All
    }
}

impl fmt::Debug for PointcutExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointcutExpression::All => write!(f, "All"),
            PointcutExpression::TypePattern(p) => write!(f, "TypePattern({})", p),
            PointcutExpression::MethodPattern(p) => write!(f, "MethodPattern({})", p),
            PointcutExpression::Execution {
                type_pattern,
                method_pattern,
            } => write!(f, "Execution({}.{})", type_pattern, method_pattern),
            PointcutExpression::TypeRegex(r) => write!(f, "TypeRegex({})", r.as_str()),
            PointcutExpression::MethodRegex(r) => write!(f, "MethodRegex({})", r.as_str()),
            PointcutExpression::Custom(_) => write!(f, "Custom(..)"),
            PointcutExpression::And(l, r) => write!(f, "And({:?}, {:?})", l, r),
            PointcutExpression::Or(l, r) => write!(f, "Or({:?}, {:?})", l, r),
            PointcutExpression::Not(e) => write!(f, "Not({:?})", e),
        }
    }
}

/// `*` 通配符匹配，`*` 可以出现在任意位置、任意次数
fn glob_matches(pattern: &str, target: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return target.is_empty();
    };
    let Some(mut rest) = target.strip_prefix(first) else {
        return false;
    };

    let segments: Vec<&str> = parts.collect();
    let Some((last, middle)) = segments.split_last() else {
        // 没有通配符
        return rest.is_empty();
    };

    for segment in middle {
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
