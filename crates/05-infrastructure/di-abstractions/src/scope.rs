//! 作用域抽象
//!
//! 缓存型绑定把实例存放在作用域注册表中。注册表里保存的是 [`Reference`]，
//! 引用失效后下一次访问会重新创建实例。

use crate::factory::AnyInstance;
use infrastructure_common::DependencyResult;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// 类型擦除的参数键
///
/// 多例绑定以参数值区分缓存条目
#[derive(Clone)]
pub struct ArgKey(Arc<dyn DynValue>);

pub(crate) trait DynValue: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn DynValue) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T> DynValue for T
where
    T: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }

    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl ArgKey {
    /// 包装参数值
    pub fn new<T>(value: T) -> Self
    where
        T: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(value))
    }

    /// 取回参数值
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for ArgKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for ArgKey {}

impl Hash for ArgKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

impl fmt::Debug for ArgKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.dyn_fmt(f)
    }
}

/// 作用域注册表中的缓存键
///
/// `owner` 标识拥有缓存的绑定，复制绑定时会生成新的标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    /// 拥有者标识
    pub owner: Uuid,
    /// 参数（仅多例绑定）
    pub arg: Option<ArgKey>,
}

impl ScopeKey {
    /// 创建新的缓存键
    pub fn new(owner: Uuid, arg: Option<ArgKey>) -> Self {
        Self { owner, arg }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{}({:?})", self.owner, arg),
            None => write!(f, "{}", self.owner),
        }
    }
}

/// 检索上下文值
///
/// 直接保存用户的 `Arc<C>`，以对象地址区分不同的上下文
#[derive(Clone)]
pub struct ContextValue(Arc<dyn Any + Send + Sync>);

impl ContextValue {
    /// 包装上下文对象
    pub fn new<C: Send + Sync + 'static>(context: Arc<C>) -> Self {
        Self(context)
    }

    /// 还原上下文对象
    pub fn downcast<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.0).downcast::<C>().ok()
    }

    /// 上下文对象的身份
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }

    /// 上下文对象的弱引用
    pub fn downgrade(&self) -> Weak<dyn Any + Send + Sync> {
        Arc::downgrade(&self.0)
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextValue({:#x})", self.identity())
    }
}

/// 实例引用
///
/// `get` 在引用失效后返回 `None`
pub trait Reference: Send + Sync {
    /// 当前引用的实例
    fn get(&self) -> Option<AnyInstance>;

    /// 用于还原具体引用类型
    fn as_any(&self) -> &dyn Any;
}

/// 新创建的实例及其引用
///
/// 调用方持有 `value`，注册表保存 `reference`
pub struct Referenced {
    /// 新创建的实例
    pub value: AnyInstance,
    /// 之后访问实例所用的引用
    pub reference: Arc<dyn Reference>,
}

/// 注册表的创建回调，参数是已失效的旧引用（如果有）
pub type ReferenceCreator<'a> =
    &'a dyn Fn(Option<Arc<dyn Reference>>) -> DependencyResult<Referenced>;

/// 作用域注册表
///
/// 所有操作都是线程安全的
pub trait ScopeRegistry: Send + Sync {
    /// 获取缓存实例，不存在或引用已失效时调用 `creator` 创建
    ///
    /// `sync` 为真时，同一个键同时最多只有一个创建过程；
    /// 创建失败时不会缓存任何内容
    fn get_or_create(
        &self,
        key: &ScopeKey,
        sync: bool,
        creator: ReferenceCreator<'_>,
    ) -> DependencyResult<AnyInstance>;

    /// 获取缓存实例
    fn get(&self, key: &ScopeKey) -> Option<AnyInstance>;

    /// 是否存在缓存条目
    fn contains(&self, key: &ScopeKey) -> bool;

    /// 移除缓存条目
    fn remove(&self, key: &ScopeKey) -> bool;

    /// 清空所有缓存条目
    fn clear(&self);

    /// 缓存条目数量
    fn len(&self) -> usize;

    /// 是否没有缓存条目
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 作用域
///
/// 根据上下文值给出对应的注册表
pub trait Scope: Send + Sync {
    /// 获取上下文对应的注册表
    fn registry(&self, context: Option<&ContextValue>) -> DependencyResult<Arc<dyn ScopeRegistry>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_arg_key_equality() {
        assert_eq!(ArgKey::new(1u32), ArgKey::new(1u32));
        assert_ne!(ArgKey::new(1u32), ArgKey::new(2u32));
        assert_ne!(ArgKey::new(1u32), ArgKey::new(1u64));
        assert_eq!(ArgKey::new("a".to_string()).downcast_ref::<String>().unwrap(), "a");
    }

    #[test]
    fn test_context_value_identity() {
        let context = Arc::new(String::from("request"));
        let a = ContextValue::new(Arc::clone(&context));
        let b = ContextValue::new(Arc::clone(&context));
        let other = ContextValue::new(Arc::new(String::from("request")));

        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), other.identity());
        assert_eq!(*a.downcast::<String>().unwrap(), "request");
        assert!(a.downcast::<u32>().is_none());
    }

    #[test]
    fn test_scope_keys_in_set() {
        let owner = Uuid::new_v4();
        let mut keys = HashSet::new();
        keys.insert(ScopeKey::new(owner, Some(ArgKey::new("x".to_string()))));
        keys.insert(ScopeKey::new(owner, Some(ArgKey::new("x".to_string()))));
        keys.insert(ScopeKey::new(owner, Some(ArgKey::new("y".to_string()))));
        keys.insert(ScopeKey::new(owner, None));
        keys.insert(ScopeKey::new(Uuid::new_v4(), None));
        assert_eq!(keys.len(), 4);
    }
}
