//! 实例引用
//!
//! 引用决定缓存实例的有效期：强引用一直有效，弱引用在外部不再持有实例后失效，
//! 线程局部引用只对创建它的线程有效，线程退出时释放该线程的实例

use dashmap::DashMap;
use di_abstractions::{erase, AnyInstance, Reference, Referenced};
use infrastructure_common::DependencyResult;
use std::any::Any;
use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::debug;

thread_local! {
    static THREAD_EXIT: ThreadExitGuard = ThreadExitGuard::default();
}

/// 线程退出时执行的清理动作
#[derive(Default)]
struct ThreadExitGuard {
    releases: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl Drop for ThreadExitGuard {
    fn drop(&mut self) {
        for release in self.releases.get_mut().drain(..) {
            release();
        }
    }
}

type Slots<T> = DashMap<ThreadId, Arc<T>>;

/// 把实例放入当前线程的槽位，线程退出时移除
fn insert_for_current_thread<T>(slots: &Arc<Slots<T>>, value: Arc<T>)
where
    T: ?Sized + Send + Sync + 'static,
{
    let id = thread::current().id();
    if slots.insert(id, value).is_some() {
        return;
    }

    let weak = Arc::downgrade(slots);
    let registered = THREAD_EXIT.try_with(|guard| {
        guard.releases.borrow_mut().push(Box::new(move || {
            if let Some(slots) = weak.upgrade() {
                slots.remove(&id);
            }
        }));
    });
    if registered.is_err() {
        // 线程正在退出，槽位立即失效
        debug!("线程 {:?} 正在退出，不保留线程局部实例", id);
        slots.remove(&id);
    }
}

/// 引用生成方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefMaker {
    /// 强引用
    #[default]
    Strong,
    /// 弱引用，外部不再持有实例后重新创建
    Weak,
    /// 软引用
    ///
    /// 没有内存压力信号可用，软引用与强引用一样一直持有实例，
    /// 直到缓存条目被移除或注册表被清空
    Soft,
    /// 线程局部引用，每个线程拥有自己的实例
    ThreadLocal,
}

impl RefMaker {
    /// 调用 `creator` 创建实例并生成引用
    ///
    /// `previous` 是注册表中已失效的旧引用。线程局部引用会复用旧引用的线程表，
    /// 使其他线程的实例继续有效
    pub fn make<T, F>(
        &self,
        previous: Option<Arc<dyn Reference>>,
        creator: F,
    ) -> DependencyResult<Referenced>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> DependencyResult<Arc<T>>,
    {
        let value = creator()?;

        let reference: Arc<dyn Reference> = match self {
            Self::Strong | Self::Soft => Arc::new(StrongRef {
                value: erase(Arc::clone(&value)),
            }),
            Self::Weak => Arc::new(WeakRef {
                value: Arc::downgrade(&value),
            }),
            Self::ThreadLocal => {
                let slots = previous
                    .as_ref()
                    .and_then(|previous| previous.as_any().downcast_ref::<ThreadLocalRef<T>>())
                    .map(|previous| Arc::clone(&previous.slots))
                    .unwrap_or_default();
                insert_for_current_thread(&slots, Arc::clone(&value));
                Arc::new(ThreadLocalRef { slots })
            }
        };

        Ok(Referenced {
            value: erase(value),
            reference,
        })
    }
}

/// 强引用
pub struct StrongRef {
    value: AnyInstance,
}

impl Reference for StrongRef {
    fn get(&self) -> Option<AnyInstance> {
        Some(Arc::clone(&self.value))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 弱引用
pub struct WeakRef<T: ?Sized> {
    value: Weak<T>,
}

impl<T> Reference for WeakRef<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn get(&self) -> Option<AnyInstance> {
        self.value.upgrade().map(erase)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 线程局部引用
pub struct ThreadLocalRef<T: ?Sized> {
    slots: Arc<Slots<T>>,
}

impl<T> Reference for ThreadLocalRef<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn get(&self) -> Option<AnyInstance> {
        self.slots
            .get(&thread::current().id())
            .map(|value| erase(Arc::clone(value.value())))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::downcast;

    #[test]
    fn test_strong_reference_keeps_value() {
        let made = RefMaker::Strong.make(None, || Ok(Arc::new(5u32))).unwrap();
        let first = downcast::<u32>(&made.value).unwrap();
        drop(made.value);
        let again = downcast::<u32>(&made.reference.get().unwrap()).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_weak_reference_expires() {
        let made = RefMaker::Weak.make(None, || Ok(Arc::new(5u32))).unwrap();
        assert!(made.reference.get().is_some());
        drop(made.value);
        assert!(made.reference.get().is_none());
    }

    #[test]
    fn test_thread_local_reference_is_per_thread() {
        let made = RefMaker::ThreadLocal
            .make(None, || Ok(Arc::new(String::from("main"))))
            .unwrap();
        assert!(made.reference.get().is_some());

        let reference = Arc::clone(&made.reference);
        let seen = thread::spawn(move || reference.get().is_none()).join().unwrap();
        assert!(seen);
    }

    #[test]
    fn test_thread_local_reuses_previous_slots() {
        let first = RefMaker::ThreadLocal
            .make(None, || Ok(Arc::new(1u32)))
            .unwrap();
        let previous = Arc::clone(&first.reference);

        let second = thread::spawn(move || {
            RefMaker::ThreadLocal
                .make(Some(previous), || Ok(Arc::new(2u32)))
                .map(|made| made.reference)
        })
        .join()
        .unwrap()
        .unwrap();

        // 新引用仍然能看到主线程的实例
        let value = downcast::<u32>(&second.get().unwrap()).unwrap();
        assert_eq!(*value, 1);
    }

    #[test]
    fn test_thread_local_value_released_on_thread_exit() {
        let (reference, weak) = thread::spawn(|| {
            let made = RefMaker::ThreadLocal
                .make(None, || Ok(Arc::new(String::from("worker"))))
                .unwrap();
            let value = downcast::<String>(&made.value).unwrap();
            (made.reference, Arc::downgrade(&value))
        })
        .join()
        .unwrap();

        assert!(weak.upgrade().is_none());
        assert!(reference.get().is_none());
        let slots = &reference
            .as_any()
            .downcast_ref::<ThreadLocalRef<String>>()
            .unwrap()
            .slots;
        assert!(slots.is_empty());
    }
}
