//! 单例和多例绑定
//!
//! 实例缓存在作用域注册表中，缓存键的拥有者是绑定自己的标识。
//! 默认作用域是每个绑定独有的 [`UnboundedScope`]。

use super::{ArgCreator, Creator};
use crate::references::RefMaker;
use crate::scopes::UnboundedScope;
use di_abstractions::{
    downcast_arg, ArgKey, Binding, BindingDi, ErasedFactory, Key, Scope, ScopeKey,
};
use infrastructure_common::{BindingKind, DependencyResult, TypeInfo};
use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use uuid::Uuid;

/// 单例绑定
///
/// 在作用域中每个上下文只创建一次实例
pub struct SingletonBinding<T: ?Sized> {
    id: Uuid,
    creator: Creator<T>,
    scope: Arc<dyn Scope>,
    scoped: bool,
    context_type: TypeInfo,
    ref_maker: RefMaker,
    sync: bool,
}

impl<T> SingletonBinding<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// 创建新的单例绑定
    pub fn new<F>(creator: F) -> Self
    where
        F: Fn(&dyn BindingDi) -> DependencyResult<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            creator: Arc::new(creator),
            scope: Arc::new(UnboundedScope::new()),
            scoped: false,
            context_type: TypeInfo::any(),
            ref_maker: RefMaker::Strong,
            sync: true,
        }
    }

    /// 把实例缓存在给定作用域中
    pub fn in_scope(mut self, scope: Arc<dyn Scope>) -> Self {
        self.scope = scope;
        self.scoped = true;
        self
    }

    /// 只在上下文类型 `C` 上可见
    pub fn in_context<C: 'static>(mut self) -> Self {
        self.context_type = TypeInfo::of::<C>();
        self
    }

    /// 使用给定的引用方式
    pub fn with_ref_maker(mut self, ref_maker: RefMaker) -> Self {
        self.ref_maker = ref_maker;
        self
    }

    /// 是否同步创建，默认为真
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// 缓存键的拥有者标识
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl<T> Binding for SingletonBinding<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn kind(&self) -> BindingKind {
        if self.scoped {
            BindingKind::ScopedSingleton
        } else if self.ref_maker != RefMaker::Strong {
            BindingKind::ReferencedSingleton
        } else {
            BindingKind::Singleton
        }
    }

    fn context_type(&self) -> TypeInfo {
        self.context_type
    }

    fn created_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn get_factory(&self, _key: &Key, di: Arc<dyn BindingDi>) -> ErasedFactory {
        let scope = Arc::clone(&self.scope);
        let creator = Arc::clone(&self.creator);
        let scope_key = ScopeKey::new(self.id, None);
        let ref_maker = self.ref_maker;
        let sync = self.sync;

        Arc::new(move |_arg| {
            let registry = scope.registry(di.context_value().as_ref())?;
            registry.get_or_create(&scope_key, sync, &|previous| {
                ref_maker.make(previous, || creator(di.as_ref()))
            })
        })
    }

    fn copy(&self) -> Option<Arc<dyn Binding>> {
        Some(Arc::new(Self {
            id: Uuid::new_v4(),
            creator: Arc::clone(&self.creator),
            scope: Arc::clone(&self.scope),
            scoped: self.scoped,
            context_type: self.context_type,
            ref_maker: self.ref_maker,
            sync: self.sync,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 多例绑定
///
/// 每个不同的参数值对应一个缓存实例
pub struct MultitonBinding<A, T: ?Sized> {
    id: Uuid,
    creator: ArgCreator<A, T>,
    scope: Arc<dyn Scope>,
    context_type: TypeInfo,
    ref_maker: RefMaker,
    sync: bool,
}

impl<A, T> MultitonBinding<A, T>
where
    A: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    /// 创建新的多例绑定
    pub fn new<F>(creator: F) -> Self
    where
        F: Fn(&dyn BindingDi, A) -> DependencyResult<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            creator: Arc::new(creator),
            scope: Arc::new(UnboundedScope::new()),
            context_type: TypeInfo::any(),
            ref_maker: RefMaker::Strong,
            sync: true,
        }
    }

    /// 把实例缓存在给定作用域中
    pub fn in_scope(mut self, scope: Arc<dyn Scope>) -> Self {
        self.scope = scope;
        self
    }

    /// 只在上下文类型 `C` 上可见
    pub fn in_context<C: 'static>(mut self) -> Self {
        self.context_type = TypeInfo::of::<C>();
        self
    }

    /// 使用给定的引用方式
    pub fn with_ref_maker(mut self, ref_maker: RefMaker) -> Self {
        self.ref_maker = ref_maker;
        self
    }

    /// 是否同步创建，默认为真
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

impl<A, T> Binding for MultitonBinding<A, T>
where
    A: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    fn kind(&self) -> BindingKind {
        if self.ref_maker != RefMaker::Strong {
            BindingKind::ReferencedMultiton
        } else {
            BindingKind::Multiton
        }
    }

    fn context_type(&self) -> TypeInfo {
        self.context_type
    }

    fn arg_type(&self) -> TypeInfo {
        TypeInfo::of::<A>()
    }

    fn created_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn get_factory(&self, _key: &Key, di: Arc<dyn BindingDi>) -> ErasedFactory {
        let scope = Arc::clone(&self.scope);
        let creator = Arc::clone(&self.creator);
        let owner = self.id;
        let ref_maker = self.ref_maker;
        let sync = self.sync;

        Arc::new(move |arg| {
            let arg = downcast_arg::<A>(arg)?;
            let scope_key = ScopeKey::new(owner, Some(ArgKey::new(arg.clone())));
            let registry = scope.registry(di.context_value().as_ref())?;
            registry.get_or_create(&scope_key, sync, &|previous| {
                ref_maker.make(previous, || creator(di.as_ref(), arg.clone()))
            })
        })
    }

    fn copy(&self) -> Option<Arc<dyn Binding>> {
        Some(Arc::new(Self {
            id: Uuid::new_v4(),
            creator: Arc::clone(&self.creator),
            scope: Arc::clone(&self.scope),
            context_type: self.context_type,
            ref_maker: self.ref_maker,
            sync: self.sync,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
