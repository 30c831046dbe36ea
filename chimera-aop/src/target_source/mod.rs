//! 目标源（TargetSource）
//!
//! 代理不直接持有目标对象，而是每次调用向目标源借出目标、调用结束后归还。
//! 不同实现决定目标的生命周期：
//!
//! - [`SingletonTargetSource`]：始终是同一个对象
//! - [`PrototypeTargetSource`]：每次调用新建一个对象
//! - [`PoolingTargetSource`]：从有界对象池借出和归还
//! - [`ThreadLocalTargetSource`]：每个线程一个对象
//! - [`HotSwappableTargetSource`]：可在运行时原子替换的对象

use std::any::Any;
use std::sync::Arc;

use chimera_core::TypeInfo;

use crate::error::AopResult;

mod hot_swap;
mod pooling;
mod prototype;
mod singleton;
mod thread_local;

pub use hot_swap::HotSwappableTargetSource;
pub use pooling::{pooling_config, PoolingConfig, PoolingTargetSource, DEFAULT_MAX_SIZE};
pub use prototype::{PrototypeTargetSource, PrototypeTargetSupport};
pub use singleton::SingletonTargetSource;
pub use thread_local::{thread_local_stats, ThreadLocalTargetSource, ThreadLocalTargetSourceStats};

/// 目标源
///
/// `get_target` 借出的每个实例都必须通过 `release_target` 归还，且只归还一次
pub trait TargetSource<T: Any + Send + Sync>: Send + Sync {
    /// 目标类型
    fn target_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    /// 是否每次都返回同一个实例
    ///
    /// 静态目标源在调用开始时解析一次并对通知可见
    fn is_static(&self) -> bool;

    fn get_target(&self) -> AopResult<Arc<T>>;

    fn release_target(&self, target: Arc<T>) -> AopResult<()>;
}
