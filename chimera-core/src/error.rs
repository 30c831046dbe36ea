//! 容器错误类型
//!
//! 用户提供的创建/初始化/销毁回调统一返回 `anyhow::Result`，
//! 容器自身的失败则通过 [`ContainerError`] 表达。

use thiserror::Error;

/// 回调使用的统一结果类型
///
/// # 示例
///
/// ```rust,ignore
/// use chimera_core::Result;
///
/// fn create_pool() -> Result<ConnectionPool> {
///     ConnectionPool::open("localhost").context("Failed to open pool")
/// }
/// ```
pub use anyhow::Result;

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Bean 不存在
    #[error("Bean not found: {0}")]
    BeanNotFound(String),

    /// Bean 创建失败（创建函数或初始化回调出错）
    #[error("Bean creation failed: {0}")]
    BeanCreationFailed(String),

    /// Bean 的实际类型与请求的类型不一致
    #[error("Bean '{name}' type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// 重复注册同名 Bean
    #[error("Bean '{0}' is already registered")]
    DuplicateBean(String),

    /// 销毁回调出错
    #[error("Bean destruction failed: {0}")]
    DestroyFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 容器操作结果
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;
