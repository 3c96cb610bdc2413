//! 实例绑定

use di_abstractions::{erase, AnyInstance, Binding, BindingDi, ErasedFactory, Key};
use infrastructure_common::{BindingKind, TypeInfo};
use std::any::Any;
use std::sync::Arc;

/// 实例绑定：总是返回绑定时给定的值
pub struct InstanceBinding {
    value: AnyInstance,
    created_type: TypeInfo,
}

impl InstanceBinding {
    /// 绑定给定的值
    pub fn new<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            value: erase(value),
            created_type: TypeInfo::of::<T>(),
        }
    }
}

impl Binding for InstanceBinding {
    fn kind(&self) -> BindingKind {
        BindingKind::Instance
    }

    fn created_type(&self) -> TypeInfo {
        self.created_type
    }

    fn get_factory(&self, _key: &Key, _di: Arc<dyn BindingDi>) -> ErasedFactory {
        let value = Arc::clone(&self.value);
        Arc::new(move |_arg| Ok(Arc::clone(&value)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
