//! 注册表抽象
//!
//! 覆盖规则、复制规则和外部来源

use crate::factory::ErasedFactory;
use crate::key::{Key, SearchSpecs};
use crate::resolver::BindingDi;
use std::fmt;
use std::sync::Arc;

/// 单次绑定的覆盖许可
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridePermission {
    /// 必须覆盖已有绑定
    Must,
    /// 不得覆盖已有绑定
    MustNot,
    /// 可以覆盖也可以不覆盖
    May,
}

impl OverridePermission {
    /// 从覆盖声明转换：`Some(true)` 必须覆盖，`Some(false)` 不得覆盖，`None` 不限制
    pub fn from_declaration(overrides: Option<bool>) -> Self {
        match overrides {
            Some(true) => Self::Must,
            Some(false) => Self::MustNot,
            None => Self::May,
        }
    }
}

/// 复制搜索条件
///
/// `all` 为假时要求恰好一个匹配
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySpecs {
    /// 搜索条件
    pub search: SearchSpecs,
    /// 是否允许多个匹配
    pub all: bool,
}

impl CopySpecs {
    /// 恰好匹配一个绑定的条件
    pub fn the(search: SearchSpecs) -> Self {
        Self { search, all: false }
    }

    /// 匹配所有满足条件的绑定
    pub fn all(search: SearchSpecs) -> Self {
        Self { search, all: true }
    }
}

impl fmt::Display for CopySpecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all {
            write!(f, "all {}", self.search)
        } else {
            write!(f, "the {}", self.search)
        }
    }
}

/// 扩展容器时的复制方式
///
/// 被复制的绑定在新容器中拥有独立的缓存，并在新容器中解析依赖；
/// 未被复制的绑定与原容器共享缓存
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CopyMode {
    /// 不复制
    None,
    /// 复制全部绑定
    All,
    /// 复制所有不持有缓存的绑定
    #[default]
    NonCached,
    /// 只复制 `copy` 匹配的绑定，排除 `ignore` 匹配的绑定
    Only {
        copy: Vec<CopySpecs>,
        ignore: Vec<CopySpecs>,
    },
    /// 复制除 `ignore` 匹配之外的全部绑定，`copy` 匹配的绑定总是复制
    AllBut {
        copy: Vec<CopySpecs>,
        ignore: Vec<CopySpecs>,
    },
}

/// 外部来源
///
/// 只有在没有任何绑定匹配时才会被询问
pub trait ExternalSource: Send + Sync {
    /// 为键提供工厂，不能提供时返回 `None`
    fn get_factory(&self, di: Arc<dyn BindingDi>, key: &Key) -> Option<ErasedFactory>;
}

impl<F> ExternalSource for F
where
    F: Fn(Arc<dyn BindingDi>, &Key) -> Option<ErasedFactory> + Send + Sync,
{
    fn get_factory(&self, di: Arc<dyn BindingDi>, key: &Key) -> Option<ErasedFactory> {
        self(di, key)
    }
}
