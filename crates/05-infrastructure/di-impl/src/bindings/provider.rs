//! 提供者和工厂绑定：不缓存，每次检索都调用创建函数

use super::{ArgCreator, Creator};
use di_abstractions::{downcast_arg, erase, Binding, BindingDi, ErasedFactory, Key};
use infrastructure_common::{BindingKind, DependencyResult, TypeInfo};
use std::any::Any;
use std::sync::Arc;

/// 提供者绑定
pub struct ProviderBinding<T: ?Sized> {
    creator: Creator<T>,
    context_type: TypeInfo,
}

impl<T> ProviderBinding<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// 创建新的提供者绑定
    pub fn new<F>(creator: F) -> Self
    where
        F: Fn(&dyn BindingDi) -> DependencyResult<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            creator: Arc::new(creator),
            context_type: TypeInfo::any(),
        }
    }

    /// 只在上下文类型 `C` 上可见
    pub fn in_context<C: 'static>(mut self) -> Self {
        self.context_type = TypeInfo::of::<C>();
        self
    }
}

impl<T> Binding for ProviderBinding<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn kind(&self) -> BindingKind {
        BindingKind::Provider
    }

    fn context_type(&self) -> TypeInfo {
        self.context_type
    }

    fn created_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn get_factory(&self, _key: &Key, di: Arc<dyn BindingDi>) -> ErasedFactory {
        let creator = Arc::clone(&self.creator);
        Arc::new(move |_arg| creator(di.as_ref()).map(erase))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 工厂绑定
pub struct FactoryBinding<A, T: ?Sized> {
    creator: ArgCreator<A, T>,
    context_type: TypeInfo,
}

impl<A, T> FactoryBinding<A, T>
where
    A: Send + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    /// 创建新的工厂绑定
    pub fn new<F>(creator: F) -> Self
    where
        F: Fn(&dyn BindingDi, A) -> DependencyResult<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            creator: Arc::new(creator),
            context_type: TypeInfo::any(),
        }
    }

    /// 只在上下文类型 `C` 上可见
    pub fn in_context<C: 'static>(mut self) -> Self {
        self.context_type = TypeInfo::of::<C>();
        self
    }
}

impl<A, T> Binding for FactoryBinding<A, T>
where
    A: Send + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    fn kind(&self) -> BindingKind {
        BindingKind::Factory
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
        let creator = Arc::clone(&self.creator);
        Arc::new(move |arg| {
            let arg = downcast_arg::<A>(arg)?;
            creator(di.as_ref(), arg).map(erase)
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
