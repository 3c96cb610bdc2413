//! 标准绑定
//!
//! | 绑定 | 缓存 |
//! |---|---|
//! | [`ProviderBinding`] / [`FactoryBinding`] | 无，每次调用创建函数 |
//! | [`SingletonBinding`] | 作用域注册表中一个条目 |
//! | [`MultitonBinding`] | 每个参数一个条目 |
//! | [`EagerSingletonBinding`] | 自有单元，容器就绪时创建 |
//! | [`InstanceBinding`] | 绑定时给定的值 |
//! | [`SetBinding`] | 无，聚合元素绑定 |
//! | [`SequenceBinding`] | 生成器状态 |

mod eager;
mod instance;
mod provider;
mod sequence;
mod set;
mod singleton;

pub use eager::EagerSingletonBinding;
pub use instance::InstanceBinding;
pub use provider::{FactoryBinding, ProviderBinding};
pub use sequence::SequenceBinding;
pub use set::SetBinding;
pub use singleton::{MultitonBinding, SingletonBinding};

use di_abstractions::BindingDi;
use infrastructure_common::DependencyResult;
use std::sync::Arc;

/// 无参数创建函数
pub type Creator<T> = Arc<dyn Fn(&dyn BindingDi) -> DependencyResult<Arc<T>> + Send + Sync>;

/// 带参数创建函数
pub type ArgCreator<A, T> =
    Arc<dyn Fn(&dyn BindingDi, A) -> DependencyResult<Arc<T>> + Send + Sync>;
