//! 绑定生命周期
//!
//! 每种绑定对应一种实例缓存策略

use serde::{Deserialize, Serialize};
use std::fmt;

/// 绑定种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    /// 提供者 - 每次请求都调用创建函数
    Provider,
    /// 工厂 - 每次请求都以参数调用创建函数
    Factory,
    /// 单例 - 只创建一个实例
    Singleton,
    /// 多例 - 每个不同的参数创建一个实例
    Multiton,
    /// 预加载单例 - 容器就绪时立即创建
    EagerSingleton,
    /// 实例 - 绑定时给定的值
    Instance,
    /// 作用域单例 - 每个上下文注册表一个实例
    ScopedSingleton,
    /// 引用单例 - 引用失效后重新创建
    ReferencedSingleton,
    /// 引用多例 - 每个参数的引用失效后重新创建
    ReferencedMultiton,
    /// 集合 - 聚合多个元素绑定
    Set,
    /// 序列 - 每次请求产生生成器的下一个值
    Sequence,
}

impl BindingKind {
    /// 展示用的工厂名称
    pub fn factory_name(&self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Factory => "factory",
            Self::Singleton => "singleton",
            Self::Multiton => "multiton",
            Self::EagerSingleton => "eagerSingleton",
            Self::Instance => "instance",
            Self::ScopedSingleton => "scoped singleton",
            Self::ReferencedSingleton => "referenced singleton",
            Self::ReferencedMultiton => "referenced multiton",
            Self::Set => "bindingSet",
            Self::Sequence => "sequence",
        }
    }

    /// 此种类的绑定是否持有缓存状态
    ///
    /// 持有缓存的绑定在扩展容器时默认共享，不会被复制
    pub fn is_cached(&self) -> bool {
        matches!(
            self,
            Self::Singleton
                | Self::Multiton
                | Self::EagerSingleton
                | Self::ScopedSingleton
                | Self::ReferencedSingleton
                | Self::ReferencedMultiton
                | Self::Sequence
        )
    }

    /// 是否接收参数
    pub fn takes_argument(&self) -> bool {
        matches!(
            self,
            Self::Factory | Self::Multiton | Self::ReferencedMultiton
        )
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.factory_name())
    }
}
