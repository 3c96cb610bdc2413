//! 立即单例绑定：容器就绪时创建实例

use super::Creator;
use di_abstractions::{erase, AnyInstance, Binding, BindingDi, ErasedFactory, Key, ReadyCallback};
use infrastructure_common::{BindingKind, DependencyError, DependencyResult, TypeInfo};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

/// 立即单例绑定
///
/// 实例保存在绑定自己的单元中，容器就绪时通过就绪回调创建
pub struct EagerSingletonBinding<T: ?Sized> {
    creator: Creator<T>,
    cell: Arc<EagerCell>,
}

struct EagerCell {
    value: OnceCell<AnyInstance>,
    creating: Mutex<Option<ThreadId>>,
}

impl EagerCell {
    fn new() -> Self {
        Self {
            value: OnceCell::new(),
            creating: Mutex::new(None),
        }
    }

    fn get_or_try_init(
        &self,
        key: &Key,
        init: impl FnOnce() -> DependencyResult<AnyInstance>,
    ) -> DependencyResult<AnyInstance> {
        if let Some(value) = self.value.get() {
            return Ok(Arc::clone(value));
        }

        let current = thread::current().id();
        if *self.creating.lock() == Some(current) {
            return Err(DependencyError::ReentrantScope {
                key: key.description(),
            });
        }

        self.value
            .get_or_try_init(|| {
                *self.creating.lock() = Some(current);
                let result = init();
                *self.creating.lock() = None;
                result
            })
            .map(Arc::clone)
    }
}

impl<T> EagerSingletonBinding<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// 创建新的立即单例绑定
    pub fn new<F>(creator: F) -> Self
    where
        F: Fn(&dyn BindingDi) -> DependencyResult<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            creator: Arc::new(creator),
            cell: Arc::new(EagerCell::new()),
        }
    }

    /// 实例是否已经创建
    pub fn is_created(&self) -> bool {
        self.cell.value.get().is_some()
    }
}

impl<T> Binding for EagerSingletonBinding<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn kind(&self) -> BindingKind {
        BindingKind::EagerSingleton
    }

    fn created_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn get_factory(&self, key: &Key, di: Arc<dyn BindingDi>) -> ErasedFactory {
        let cell = Arc::clone(&self.cell);
        let creator = Arc::clone(&self.creator);
        let key = key.clone();

        Arc::new(move |_arg| cell.get_or_try_init(&key, || creator(di.as_ref()).map(erase)))
    }

    fn copy(&self) -> Option<Arc<dyn Binding>> {
        Some(Arc::new(Self {
            creator: Arc::clone(&self.creator),
            cell: Arc::new(EagerCell::new()),
        }))
    }

    fn ready_callback(self: Arc<Self>, key: &Key) -> Option<ReadyCallback> {
        let key = key.clone();
        Some(Box::new(move |di| {
            debug!("创建立即单例: {}", key);
            let factory = self.get_factory(&key, di.binding_di(&key, 0));
            factory(Box::new(())).map(|_| ())
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
