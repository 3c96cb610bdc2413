//! 作用域和作用域注册表实现

use dashmap::DashMap;
use di_abstractions::{
    AnyInstance, ContextValue, Reference, ReferenceCreator, Scope, ScopeKey, ScopeRegistry,
};
use infrastructure_common::{DependencyError, DependencyResult};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, trace, warn};

/// 多条目作用域注册表
///
/// 每个键一把创建锁，双重检查保证同一个键同时最多只有一个创建过程。
/// 同一线程在创建过程中再次请求同一个键会立即失败而不是死锁。
pub struct MultiItemScopeRegistry {
    entries: DashMap<ScopeKey, Arc<dyn Reference>>,
    locks: DashMap<ScopeKey, Arc<Mutex<()>>>,
    in_flight: DashMap<ScopeKey, ThreadId>,
}

impl MultiItemScopeRegistry {
    /// 创建新的注册表
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            locks: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    fn lookup(&self, key: &ScopeKey) -> (Option<AnyInstance>, Option<Arc<dyn Reference>>) {
        let reference = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        match reference {
            Some(reference) => match reference.get() {
                Some(value) => (Some(value), None),
                None => (None, Some(reference)),
            },
            None => (None, None),
        }
    }
}

impl Default for MultiItemScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 创建期间登记的线程，离开作用域时注销
struct InFlight<'a> {
    registry: &'a DashMap<ScopeKey, ThreadId>,
    key: ScopeKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}

impl ScopeRegistry for MultiItemScopeRegistry {
    fn get_or_create(
        &self,
        key: &ScopeKey,
        sync: bool,
        creator: ReferenceCreator<'_>,
    ) -> DependencyResult<AnyInstance> {
        let (value, previous) = self.lookup(key);
        if let Some(value) = value {
            trace!("作用域缓存命中: {}", key);
            return Ok(value);
        }

        if !sync {
            let created = creator(previous)?;
            self.entries.insert(key.clone(), created.reference);
            return Ok(created.value);
        }

        let current = thread::current().id();
        if self.in_flight.get(key).map(|owner| *owner) == Some(current) {
            warn!("作用域重入: {}", key);
            return Err(DependencyError::ReentrantScope {
                key: key.to_string(),
            });
        }

        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let _guard = lock.lock();

        let (value, previous) = self.lookup(key);
        if let Some(value) = value {
            return Ok(value);
        }

        self.in_flight.insert(key.clone(), current);
        let _in_flight = InFlight {
            registry: &self.in_flight,
            key: key.clone(),
        };

        let created = creator(previous)?;
        self.entries.insert(key.clone(), created.reference);
        debug!("作用域实例已创建: {}", key);
        Ok(created.value)
    }

    fn get(&self, key: &ScopeKey) -> Option<AnyInstance> {
        self.lookup(key).0
    }

    fn contains(&self, key: &ScopeKey) -> bool {
        self.entries.contains_key(key)
    }

    fn remove(&self, key: &ScopeKey) -> bool {
        self.locks.remove(key);
        self.entries.remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.clear();
        self.locks.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// 单条目作用域注册表
///
/// 只保存最近一次使用的键，以不同的键请求时替换已有条目
pub struct SingleItemScopeRegistry {
    entry: Mutex<Option<(ScopeKey, Arc<dyn Reference>)>>,
    creation: Mutex<()>,
    creating: Mutex<Option<ThreadId>>,
}

impl SingleItemScopeRegistry {
    /// 创建新的注册表
    pub fn new() -> Self {
        Self {
            entry: Mutex::new(None),
            creation: Mutex::new(()),
            creating: Mutex::new(None),
        }
    }

    fn lookup(&self, key: &ScopeKey) -> (Option<AnyInstance>, Option<Arc<dyn Reference>>) {
        let entry = self.entry.lock();
        match entry.as_ref() {
            Some((current, reference)) if current == key => match reference.get() {
                Some(value) => (Some(value), None),
                None => (None, Some(Arc::clone(reference))),
            },
            _ => (None, None),
        }
    }
}

impl Default for SingleItemScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeRegistry for SingleItemScopeRegistry {
    fn get_or_create(
        &self,
        key: &ScopeKey,
        sync: bool,
        creator: ReferenceCreator<'_>,
    ) -> DependencyResult<AnyInstance> {
        let (value, previous) = self.lookup(key);
        if let Some(value) = value {
            return Ok(value);
        }

        if !sync {
            let created = creator(previous)?;
            *self.entry.lock() = Some((key.clone(), created.reference));
            return Ok(created.value);
        }

        let current = thread::current().id();
        if *self.creating.lock() == Some(current) {
            return Err(DependencyError::ReentrantScope {
                key: key.to_string(),
            });
        }

        let _guard = self.creation.lock();
        let (value, previous) = self.lookup(key);
        if let Some(value) = value {
            return Ok(value);
        }

        *self.creating.lock() = Some(current);
        let created = creator(previous);
        *self.creating.lock() = None;

        let created = created?;
        *self.entry.lock() = Some((key.clone(), created.reference));
        Ok(created.value)
    }

    fn get(&self, key: &ScopeKey) -> Option<AnyInstance> {
        self.lookup(key).0
    }

    fn contains(&self, key: &ScopeKey) -> bool {
        matches!(self.entry.lock().as_ref(), Some((current, _)) if current == key)
    }

    fn remove(&self, key: &ScopeKey) -> bool {
        let mut entry = self.entry.lock();
        if matches!(entry.as_ref(), Some((current, _)) if current == key) {
            *entry = None;
            true
        } else {
            false
        }
    }

    fn clear(&self) {
        *self.entry.lock() = None;
    }

    fn len(&self) -> usize {
        usize::from(self.entry.lock().is_some())
    }
}

/// 无界作用域
///
/// 不区分上下文，所有请求共享同一个注册表
pub struct UnboundedScope {
    registry: Arc<MultiItemScopeRegistry>,
}

impl UnboundedScope {
    /// 创建新的作用域
    pub fn new() -> Self {
        Self {
            registry: Arc::new(MultiItemScopeRegistry::new()),
        }
    }

    /// 清空注册表
    pub fn clear(&self) {
        self.registry.clear();
    }
}

impl Default for UnboundedScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for UnboundedScope {
    fn registry(&self, _context: Option<&ContextValue>) -> DependencyResult<Arc<dyn ScopeRegistry>> {
        Ok(self.registry.clone())
    }
}

/// 上下文作用域
///
/// 每个存活的上下文对象一个注册表，上下文对象释放后对应注册表随之清除。
/// 上下文按对象身份区分。
pub struct WeakContextScope {
    registries: DashMap<usize, (Weak<dyn std::any::Any + Send + Sync>, Arc<dyn ScopeRegistry>)>,
    single_item: bool,
}

impl WeakContextScope {
    /// 每个上下文使用多条目注册表
    pub fn new() -> Self {
        Self {
            registries: DashMap::new(),
            single_item: false,
        }
    }

    /// 每个上下文使用单条目注册表
    pub fn single_item() -> Self {
        Self {
            registries: DashMap::new(),
            single_item: true,
        }
    }

    /// 存活的上下文数量
    pub fn context_count(&self) -> usize {
        self.purge();
        self.registries.len()
    }

    fn purge(&self) {
        self.registries
            .retain(|_, (context, _)| context.strong_count() > 0);
    }

    fn new_registry(&self) -> Arc<dyn ScopeRegistry> {
        if self.single_item {
            Arc::new(SingleItemScopeRegistry::new())
        } else {
            Arc::new(MultiItemScopeRegistry::new())
        }
    }
}

impl Default for WeakContextScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for WeakContextScope {
    fn registry(&self, context: Option<&ContextValue>) -> DependencyResult<Arc<dyn ScopeRegistry>> {
        let context = context.ok_or_else(|| {
            DependencyError::type_mismatch("上下文对象", "检索时没有提供上下文")
        })?;

        let identity = context.identity();
        if let Some(entry) = self.registries.get(&identity) {
            if entry.0.strong_count() > 0 {
                return Ok(Arc::clone(&entry.1));
            }
        }

        self.purge();
        let registry = self
            .registries
            .entry(identity)
            .or_insert_with(|| (context.downgrade(), self.new_registry()))
            .1
            .clone();
        debug!("上下文注册表已创建, 当前上下文数量: {}", self.registries.len());
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::RefMaker;
    use di_abstractions::{downcast, ArgKey, Referenced};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn strong(value: u32) -> impl Fn(Option<Arc<dyn Reference>>) -> DependencyResult<Referenced> {
        move |previous| RefMaker::Strong.make(previous, || Ok(Arc::new(value)))
    }

    #[test]
    fn test_multi_item_caches_per_key() {
        let registry = MultiItemScopeRegistry::new();
        let a = ScopeKey::new(Uuid::new_v4(), None);
        let b = ScopeKey::new(Uuid::new_v4(), None);

        let first = registry.get_or_create(&a, true, &strong(1)).unwrap();
        let again = registry.get_or_create(&a, true, &strong(2)).unwrap();
        let other = registry.get_or_create(&b, true, &strong(3)).unwrap();

        assert_eq!(*downcast::<u32>(&again).unwrap(), 1);
        assert_eq!(*downcast::<u32>(&other).unwrap(), 3);
        assert!(Arc::ptr_eq(&downcast::<u32>(&first).unwrap(), &downcast::<u32>(&again).unwrap()));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(&a));
        assert!(!registry.contains(&a));
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_creation_is_not_cached() {
        let registry = MultiItemScopeRegistry::new();
        let key = ScopeKey::new(Uuid::new_v4(), None);

        let failing = |_previous: Option<Arc<dyn Reference>>| -> DependencyResult<Referenced> {
            Err(DependencyError::creation_failed("u32", "暂时不可用"))
        };
        assert!(registry.get_or_create(&key, true, &failing).is_err());
        assert!(!registry.contains(&key));

        let value = registry.get_or_create(&key, true, &strong(9)).unwrap();
        assert_eq!(*downcast::<u32>(&value).unwrap(), 9);
    }

    #[test]
    fn test_same_thread_reentry_fails_fast() {
        let registry = Arc::new(MultiItemScopeRegistry::new());
        let key = ScopeKey::new(Uuid::new_v4(), None);

        let inner_registry = Arc::clone(&registry);
        let inner_key = key.clone();
        let reentrant = move |_previous: Option<Arc<dyn Reference>>| -> DependencyResult<Referenced> {
            inner_registry.get_or_create(&inner_key, true, &strong(1))?;
            unreachable!("重入应当失败")
        };

        let result = registry.get_or_create(&key, true, &reentrant);
        assert!(matches!(result, Err(DependencyError::ReentrantScope { .. })));
        assert!(!registry.contains(&key));
    }

    #[test]
    fn test_concurrent_creation_runs_once() {
        let registry = Arc::new(MultiItemScopeRegistry::new());
        let key = ScopeKey::new(Uuid::new_v4(), None);
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let key = key.clone();
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    let creator = |previous: Option<Arc<dyn Reference>>| {
                        RefMaker::Strong.make(previous, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(10));
                            Ok(Arc::new(7u32))
                        })
                    };
                    downcast::<u32>(&registry.get_or_create(&key, true, &creator).unwrap()).unwrap()
                })
            })
            .collect();

        let values: Vec<Arc<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_single_item_replaces_on_key_change() {
        let registry = SingleItemScopeRegistry::new();
        let owner = Uuid::new_v4();
        let a = ScopeKey::new(owner, Some(ArgKey::new(1u8)));
        let b = ScopeKey::new(owner, Some(ArgKey::new(2u8)));

        registry.get_or_create(&a, true, &strong(1)).unwrap();
        assert!(registry.contains(&a));
        registry.get_or_create(&b, true, &strong(2)).unwrap();
        assert!(!registry.contains(&a));
        assert!(registry.contains(&b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_weak_context_scope_per_context() {
        let scope = WeakContextScope::new();
        let first = ContextValue::new(Arc::new(String::from("request-1")));
        let second = ContextValue::new(Arc::new(String::from("request-2")));

        let r1 = scope.registry(Some(&first)).unwrap();
        let r1_again = scope.registry(Some(&first)).unwrap();
        let r2 = scope.registry(Some(&second)).unwrap();

        assert!(Arc::ptr_eq(&r1, &r1_again));
        assert!(!Arc::ptr_eq(&r1, &r2));
        assert_eq!(scope.context_count(), 2);

        drop(first);
        assert_eq!(scope.context_count(), 1);
        assert!(scope.registry(None).is_err());
    }
}
