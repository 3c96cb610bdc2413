//! 序列绑定
//!
//! 每次检索返回生成器的下一个值，生成器耗尽后重新开始

use di_abstractions::{erase, Binding, BindingDi, ErasedFactory, Key};
use infrastructure_common::{BindingKind, DependencyError, DependencyResult, TypeInfo};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

type Generator<T> = Arc<dyn Fn() -> Box<dyn Iterator<Item = T> + Send> + Send + Sync>;

enum SequenceState<T> {
    /// 还没有开始，或上一轮已耗尽
    Fresh,
    Running(Box<dyn Iterator<Item = T> + Send>),
}

struct Sequence<T> {
    generator: Generator<T>,
    state: Mutex<SequenceState<T>>,
}

impl<T> Sequence<T>
where
    T: Send + Sync + 'static,
{
    fn next(&self) -> DependencyResult<Arc<T>> {
        let mut state = self.state.lock();
        // 最多重启一次：重启后仍然没有值说明生成器为空
        for _ in 0..2 {
            if let SequenceState::Fresh = *state {
                *state = SequenceState::Running((self.generator)());
            }
            if let SequenceState::Running(iter) = &mut *state {
                match iter.next() {
                    Some(value) => return Ok(Arc::new(value)),
                    None => *state = SequenceState::Fresh,
                }
            }
        }
        Err(DependencyError::creation_failed(
            std::any::type_name::<T>(),
            "序列生成器没有产生任何值",
        ))
    }
}

/// 序列绑定
pub struct SequenceBinding<T> {
    sequence: Arc<Sequence<T>>,
}

impl<T> SequenceBinding<T>
where
    T: Send + Sync + 'static,
{
    /// 以生成器创建序列绑定
    ///
    /// `generator` 每次调用返回一个新的迭代器
    pub fn new<F, I>(generator: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let generator: Generator<T> = Arc::new(move || Box::new(generator().into_iter()));
        Self::from_generator(generator)
    }

    fn from_generator(generator: Generator<T>) -> Self {
        Self {
            sequence: Arc::new(Sequence {
                generator,
                state: Mutex::new(SequenceState::Fresh),
            }),
        }
    }
}

impl<T> Binding for SequenceBinding<T>
where
    T: Send + Sync + 'static,
{
    fn kind(&self) -> BindingKind {
        BindingKind::Sequence
    }

    fn created_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn get_factory(&self, _key: &Key, _di: Arc<dyn BindingDi>) -> ErasedFactory {
        let sequence = Arc::clone(&self.sequence);
        Arc::new(move |_arg| sequence.next().map(erase))
    }

    fn copy(&self) -> Option<Arc<dyn Binding>> {
        Some(Arc::new(Self::from_generator(Arc::clone(
            &self.sequence.generator,
        ))))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
