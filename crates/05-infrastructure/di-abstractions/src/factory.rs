//! 工厂抽象
//!
//! 注册表内部的实例和参数都是类型擦除的，类型化的包装只在检索边界出现。
//! 实例以 `Arc<T>` 的形式装入 [`AnyInstance`]，因此 `T` 可以是 trait 对象，
//! 多次检索同一个缓存实例得到的 `Arc<T>` 指向同一块内存。

use crate::resolver::DirectDi;
use infrastructure_common::{DependencyError, DependencyResult};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 类型擦除的实例
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

/// 类型擦除的参数
pub type AnyArg = Box<dyn Any + Send>;

/// 类型擦除的工厂函数
pub type ErasedFactory = Arc<dyn Fn(AnyArg) -> DependencyResult<AnyInstance> + Send + Sync>;

/// 容器就绪时执行的回调
pub type ReadyCallback = Box<dyn FnOnce(&dyn DirectDi) -> DependencyResult<()> + Send>;

/// 擦除实例的具体类型
pub fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyInstance {
    Arc::new(value)
}

/// 还原擦除前的实例
pub fn downcast<T: ?Sized + Send + Sync + 'static>(
    instance: &AnyInstance,
) -> DependencyResult<Arc<T>> {
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| {
            DependencyError::type_mismatch(
                std::any::type_name::<T>(),
                "与绑定声明的类型不一致的实例",
            )
        })
}

/// 还原擦除前的参数
pub fn downcast_arg<A: 'static>(arg: AnyArg) -> DependencyResult<A> {
    arg.downcast::<A>().map(|boxed| *boxed).map_err(|_| {
        DependencyError::type_mismatch(std::any::type_name::<A>(), "与绑定声明的参数类型不一致的参数")
    })
}

/// 类型化的工厂
///
/// 每次调用都会经过绑定的缓存策略，可能返回缓存的实例
pub struct Factory<A, T: ?Sized> {
    inner: ErasedFactory,
    _marker: PhantomData<fn(A) -> Arc<T>>,
}

impl<A, T> Factory<A, T>
where
    A: Send + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    /// 包装擦除的工厂
    pub fn new(inner: ErasedFactory) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// 以参数调用工厂
    pub fn call(&self, arg: A) -> DependencyResult<Arc<T>> {
        let instance = (self.inner)(Box::new(arg))?;
        downcast::<T>(&instance)
    }

    /// 擦除的工厂
    pub fn erased(&self) -> ErasedFactory {
        Arc::clone(&self.inner)
    }
}

impl<A, T: ?Sized> Clone for Factory<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

impl<A, T: ?Sized> fmt::Debug for Factory<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("arg", &std::any::type_name::<A>())
            .field("returns", &std::any::type_name::<T>())
            .finish()
    }
}

/// 类型化的提供者：参数为 `()` 的工厂
pub struct Provider<T: ?Sized> {
    factory: Factory<(), T>,
}

impl<T> Provider<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// 包装擦除的工厂
    pub fn new(inner: ErasedFactory) -> Self {
        Self {
            factory: Factory::new(inner),
        }
    }

    /// 获取实例
    pub fn get(&self) -> DependencyResult<Arc<T>> {
        self.factory.call(())
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("returns", &std::any::type_name::<T>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_erase_keeps_identity() {
        let value = Arc::new(42u32);
        let erased = erase(Arc::clone(&value));
        let restored = downcast::<u32>(&erased).unwrap();
        assert!(Arc::ptr_eq(&value, &restored));
    }

    #[test]
    fn test_erase_trait_object() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let erased = erase(greeter);
        let restored = downcast::<dyn Greeter>(&erased).unwrap();
        assert_eq!(restored.greet(), "hello");
        assert!(matches!(
            downcast::<English>(&erased),
            Err(DependencyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_typed_factory_call() {
        let inner: ErasedFactory = Arc::new(|arg| {
            let n = downcast_arg::<u32>(arg)?;
            Ok(erase(Arc::new(format!("#{n}"))))
        });
        let factory = Factory::<u32, String>::new(inner);
        assert_eq!(*factory.call(7).unwrap(), "#7");
    }
}
