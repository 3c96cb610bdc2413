//! 依赖解析接口
//!
//! [`DirectDi`] 是对象安全的擦除接口，由解析引擎实现；
//! [`DirectDiExt`] 在其上提供类型化的检索方法。
//! 创建函数收到的 [`BindingDi`] 额外可以访问被覆盖的绑定。

use crate::factory::{ErasedFactory, Factory, Provider};
use crate::key::{Key, SearchSpecs, Tag};
use crate::scope::ContextValue;
use infrastructure_common::{DependencyError, DependencyResult, TypeInfo};
use std::sync::Arc;

/// 直接解析接口
pub trait DirectDi: Send + Sync {
    /// 获取键对应的工厂
    ///
    /// 没有绑定时返回 `NotFound`；循环依赖在获取时返回 `DependencyLoop`
    fn factory_erased(&self, key: &Key, override_level: usize) -> DependencyResult<ErasedFactory>;

    /// 获取键对应的工厂，没有绑定时返回 `None`
    fn factory_or_none_erased(&self, key: &Key) -> DependencyResult<Option<ErasedFactory>>;

    /// 获取所有匹配搜索条件的工厂
    fn all_factories_erased(&self, specs: &SearchSpecs) -> DependencyResult<Vec<ErasedFactory>>;

    /// 为给定键创建绑定解析句柄
    fn binding_di(&self, key: &Key, override_level: usize) -> Arc<dyn BindingDi>;

    /// 当前上下文类型，未设置上下文时为任意类型
    fn context_type(&self) -> TypeInfo;

    /// 当前上下文值
    fn context_value(&self) -> Option<ContextValue>;

    /// 在给定上下文上进行检索的解析器
    fn on_context(&self, context_type: TypeInfo, context: ContextValue) -> Arc<dyn DirectDi>;
}

/// 绑定解析句柄
///
/// 传给创建函数的解析器，绑定在某个键和覆盖层级上
pub trait BindingDi: DirectDi {
    /// 被当前绑定覆盖的绑定的工厂
    ///
    /// 当前绑定没有覆盖任何绑定时返回 `NotFound`
    fn overridden_factory(&self) -> DependencyResult<ErasedFactory>;

    /// 被当前绑定覆盖的绑定的工厂，没有覆盖时返回 `None`
    fn overridden_factory_or_none(&self) -> DependencyResult<Option<ErasedFactory>>;

    /// 当前绑定的键
    fn key(&self) -> &Key;

    /// 当前覆盖层级
    fn override_level(&self) -> usize;
}

/// 类型化的检索方法
pub trait DirectDiExt: DirectDi {
    /// 构造当前上下文中的键
    fn key_of<A: 'static, T: ?Sized + 'static>(&self, tag: Option<Tag>) -> Key {
        Key::new(
            self.context_type(),
            TypeInfo::of::<A>(),
            TypeInfo::of::<T>(),
            tag,
        )
    }

    /// 获取工厂
    fn factory<A, T>(&self) -> DependencyResult<Factory<A, T>>
    where
        A: Send + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.factory_erased(&self.key_of::<A, T>(None), 0)
            .map(Factory::new)
    }

    /// 获取带标签的工厂
    fn factory_tagged<A, T>(&self, tag: impl Into<Tag>) -> DependencyResult<Factory<A, T>>
    where
        A: Send + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.factory_erased(&self.key_of::<A, T>(Some(tag.into())), 0)
            .map(Factory::new)
    }

    /// 获取工厂，没有绑定时返回 `None`
    fn factory_or_none<A, T>(&self) -> DependencyResult<Option<Factory<A, T>>>
    where
        A: Send + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        Ok(self
            .factory_or_none_erased(&self.key_of::<A, T>(None))?
            .map(Factory::new))
    }

    /// 获取提供者
    fn provider<T>(&self) -> DependencyResult<Provider<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.factory_erased(&self.key_of::<(), T>(None), 0)
            .map(Provider::new)
    }

    /// 获取带标签的提供者
    fn provider_tagged<T>(&self, tag: impl Into<Tag>) -> DependencyResult<Provider<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.factory_erased(&self.key_of::<(), T>(Some(tag.into())), 0)
            .map(Provider::new)
    }

    /// 获取实例
    fn instance<T>(&self) -> DependencyResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.provider::<T>()?.get()
    }

    /// 获取带标签的实例
    fn instance_tagged<T>(&self, tag: impl Into<Tag>) -> DependencyResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.provider_tagged::<T>(tag)?.get()
    }

    /// 以参数获取实例
    fn instance_with<A, T>(&self, arg: A) -> DependencyResult<Arc<T>>
    where
        A: Send + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.factory::<A, T>()?.call(arg)
    }

    /// 以参数获取带标签的实例
    fn instance_tagged_with<A, T>(&self, tag: impl Into<Tag>, arg: A) -> DependencyResult<Arc<T>>
    where
        A: Send + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.factory_tagged::<A, T>(tag)?.call(arg)
    }

    /// 获取实例，没有绑定时返回 `None`
    fn instance_or_none<T>(&self) -> DependencyResult<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.factory_or_none_erased(&self.key_of::<(), T>(None))? {
            Some(factory) => Provider::<T>::new(factory).get().map(Some),
            None => Ok(None),
        }
    }

    /// 获取带标签的实例，没有绑定时返回 `None`
    fn instance_tagged_or_none<T>(&self, tag: impl Into<Tag>) -> DependencyResult<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.factory_or_none_erased(&self.key_of::<(), T>(Some(tag.into())))? {
            Some(factory) => Provider::<T>::new(factory).get().map(Some),
            None => Ok(None),
        }
    }

    /// 获取类型 `T` 的所有无参数绑定的实例（任意标签）
    fn all_instances<T>(&self) -> DependencyResult<Vec<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let specs = SearchSpecs::new()
            .with_type::<T>()
            .with_arg_type(TypeInfo::unit())
            .with_context_type(self.context_type());

        self.all_factories_erased(&specs)?
            .into_iter()
            .map(|factory| Provider::<T>::new(factory).get())
            .collect()
    }

    /// 当前上下文值
    fn context<C>(&self) -> Option<Arc<C>>
    where
        C: Send + Sync + 'static,
    {
        self.context_value().and_then(|value| value.downcast::<C>())
    }

    /// 在上下文 `context` 上进行检索的解析器
    ///
    /// 声明了上下文类型 `C` 的绑定只在这样的解析器上可见
    fn on<C>(&self, context: Arc<C>) -> Arc<dyn DirectDi>
    where
        C: Send + Sync + 'static,
    {
        self.on_context(TypeInfo::of::<C>(), ContextValue::new(context))
    }
}

impl<D: DirectDi + ?Sized> DirectDiExt for D {}

/// 类型化的被覆盖绑定访问
pub trait BindingDiExt: BindingDi {
    /// 被覆盖绑定的提供者创建的实例
    fn overridden_instance<T>(&self) -> DependencyResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Provider::<T>::new(self.overridden_factory()?).get()
    }

    /// 被覆盖绑定的提供者创建的实例，没有覆盖时返回 `None`
    fn overridden_instance_or_none<T>(&self) -> DependencyResult<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.overridden_factory_or_none()? {
            Some(factory) => Provider::<T>::new(factory).get().map(Some),
            None => Ok(None),
        }
    }

    /// 被覆盖绑定的工厂
    fn overridden<A, T>(&self) -> DependencyResult<Factory<A, T>>
    where
        A: Send + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.overridden_factory().map(Factory::new)
    }
}

impl<D: BindingDi + ?Sized> BindingDiExt for D {}

/// 把创建函数的普通错误包装为组件创建错误
///
/// 已经是依赖解析错误的失败原样返回
pub fn creation_error<T: ?Sized>(
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> DependencyError {
    let source = source.into();
    match source.downcast::<DependencyError>() {
        Ok(err) => *err,
        Err(source) => DependencyError::creation_failed(std::any::type_name::<T>(), source),
    }
}
