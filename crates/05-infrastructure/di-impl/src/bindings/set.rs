//! 集合绑定
//!
//! 把多个元素绑定聚合为一个 `Vec<Arc<T>>`，元素顺序即声明顺序

use di_abstractions::{
    downcast, erase, Binding, BindingDi, ContextValue, DirectDi, ErasedFactory, Key, SearchSpecs,
};
use infrastructure_common::{BindingKind, DependencyError, DependencyResult, TypeInfo};
use parking_lot::RwLock;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// 集合绑定
pub struct SetBinding<T: ?Sized> {
    elements: RwLock<Vec<Arc<dyn Binding>>>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T> SetBinding<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// 创建空集合绑定
    pub fn new() -> Self {
        Self {
            elements: RwLock::new(Vec::new()),
            _marker: PhantomData,
        }
    }

    /// 添加元素绑定
    ///
    /// 元素必须创建 `T` 且不接受参数
    pub fn add(&self, element: Arc<dyn Binding>) -> DependencyResult<()> {
        if element.created_type() != TypeInfo::of::<T>() || !element.arg_type().is_unit() {
            return Err(DependencyError::RegistrationError {
                type_name: std::any::type_name::<T>().to_string(),
                message: format!("集合元素 {} 与集合类型不一致", element.description()),
            });
        }
        self.elements.write().push(element);
        Ok(())
    }

    /// 元素数量
    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    /// 是否没有元素
    pub fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }
}

impl<T> Default for SetBinding<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Binding for SetBinding<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn kind(&self) -> BindingKind {
        BindingKind::Set
    }

    fn created_type(&self) -> TypeInfo {
        TypeInfo::of::<Vec<Arc<T>>>()
    }

    fn get_factory(&self, key: &Key, di: Arc<dyn BindingDi>) -> ErasedFactory {
        let element_di: Arc<dyn BindingDi> = Arc::new(SetElementDi { inner: di });
        let factories: Vec<ErasedFactory> = self
            .elements
            .read()
            .iter()
            .map(|element| element.get_factory(key, Arc::clone(&element_di)))
            .collect();

        Arc::new(move |_arg| {
            let values = factories
                .iter()
                .map(|factory| downcast::<T>(&factory(Box::new(()))?))
                .collect::<DependencyResult<Vec<Arc<T>>>>()?;
            Ok(erase(Arc::new(values)))
        })
    }

    fn copy(&self) -> Option<Arc<dyn Binding>> {
        let elements = self
            .elements
            .read()
            .iter()
            .map(|element| element.copy().unwrap_or_else(|| Arc::clone(element)))
            .collect();
        Some(Arc::new(Self {
            elements: RwLock::new(elements),
            _marker: PhantomData,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn description(&self) -> String {
        let elements: Vec<String> = self
            .elements
            .read()
            .iter()
            .map(|element| element.description())
            .collect();
        format!(
            "{} {{ {} }} [{}]",
            self.kind().factory_name(),
            TypeInfo::of::<T>().simple_name(),
            elements.join(", ")
        )
    }
}

/// 元素绑定使用的解析句柄，不能访问被覆盖的绑定
struct SetElementDi {
    inner: Arc<dyn BindingDi>,
}

impl SetElementDi {
    fn no_overrides() -> DependencyError {
        DependencyError::overriding("集合元素绑定不能访问被覆盖的绑定")
    }
}

impl DirectDi for SetElementDi {
    fn factory_erased(&self, key: &Key, override_level: usize) -> DependencyResult<ErasedFactory> {
        self.inner.factory_erased(key, override_level)
    }

    fn factory_or_none_erased(&self, key: &Key) -> DependencyResult<Option<ErasedFactory>> {
        self.inner.factory_or_none_erased(key)
    }

    fn all_factories_erased(&self, specs: &SearchSpecs) -> DependencyResult<Vec<ErasedFactory>> {
        self.inner.all_factories_erased(specs)
    }

    fn binding_di(&self, key: &Key, override_level: usize) -> Arc<dyn BindingDi> {
        self.inner.binding_di(key, override_level)
    }

    fn context_type(&self) -> TypeInfo {
        self.inner.context_type()
    }

    fn context_value(&self) -> Option<ContextValue> {
        self.inner.context_value()
    }

    fn on_context(&self, context_type: TypeInfo, context: ContextValue) -> Arc<dyn DirectDi> {
        self.inner.on_context(context_type, context)
    }
}

impl BindingDi for SetElementDi {
    fn overridden_factory(&self) -> DependencyResult<ErasedFactory> {
        Err(Self::no_overrides())
    }

    fn overridden_factory_or_none(&self) -> DependencyResult<Option<ErasedFactory>> {
        Err(Self::no_overrides())
    }

    fn key(&self) -> &Key {
        self.inner.key()
    }

    fn override_level(&self) -> usize {
        self.inner.override_level()
    }
}
