//! 解析引擎和容器
//!
//! 每次检索都创建一个新的解析器，解析器持有调用链上的节点。
//! 创建函数通过 [`BindingDi`] 解析传递依赖时，新节点以当前节点为父节点，
//! 检查调用链即可发现循环依赖，不需要任何全局锁。

use crate::tree::BindingTree;
use di_abstractions::{
    BindingDi, ContextValue, DirectDi, ErasedFactory, Key, ReadyCallback, SearchSpecs,
};
use infrastructure_common::{ContainerConfig, DependencyError, DependencyResult, TypeInfo};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// 调用链节点：正在构建的键
struct Node {
    key: Key,
    override_level: usize,
    parent: Option<Arc<Node>>,
}

impl Node {
    /// 检查键不在调用链上
    fn check(
        node: Option<&Node>,
        key: &Key,
        override_level: usize,
        full: bool,
    ) -> DependencyResult<()> {
        let is_repeat = |n: &Node| n.key == *key && n.override_level == override_level;

        let mut chain = Vec::new();
        let mut current = node;
        while let Some(n) = current {
            chain.push(display(&n.key, n.override_level, full));
            if is_repeat(n) {
                chain.reverse();
                chain.push(display(key, override_level, full));
                warn!("检测到循环依赖: {}", key);
                return Err(DependencyError::dependency_loop(render_loop(&chain)));
            }
            current = n.parent.as_deref();
        }
        Ok(())
    }
}

fn display(key: &Key, override_level: usize, full: bool) -> String {
    let bind = if full {
        key.bind_full_description()
    } else {
        key.bind_description()
    };
    if override_level != 0 {
        format!("overridden {bind}")
    } else {
        bind
    }
}

/// ```text
///      bind<A>()
///     ╔╩>bind<B>()
///     ║  ╚>bind<A>()
///     ╚════╝
/// ```
fn render_loop(chain: &[String]) -> String {
    let mut out = String::new();
    for (index, entry) in chain.iter().enumerate() {
        out.push_str("  ");
        match index {
            0 => out.push_str("   "),
            1 => out.push_str("  ╔╩>"),
            _ => {
                out.push_str("  ║");
                out.push_str(&"  ".repeat(index - 1));
                out.push_str("╚>");
            }
        }
        out.push_str(entry);
        out.push('\n');
    }
    out.push_str("    ╚");
    out.push_str(&"══".repeat(chain.len().saturating_sub(1)));
    out.push('╝');
    out
}

/// 延迟执行的就绪回调
///
/// 第一次检索或显式调用 [`Container::init`] 时执行一次
struct ReadyGate {
    callbacks: Mutex<Vec<ReadyCallback>>,
    done: OnceCell<()>,
    tree: Arc<BindingTree>,
    full_description_on_error: bool,
}

impl ReadyGate {
    fn ensure(&self) -> DependencyResult<()> {
        self.done
            .get_or_try_init(|| {
                let callbacks = std::mem::take(&mut *self.callbacks.lock());
                let root = DirectDiImpl::root(
                    Arc::clone(&self.tree),
                    self.full_description_on_error,
                    None,
                );
                let mut remaining = callbacks.into_iter();
                while let Some(callback) = remaining.next() {
                    if let Err(err) = callback(&root) {
                        // 失败的回调已经消耗，其余的留到下一次
                        self.callbacks.lock().extend(remaining);
                        return Err(err);
                    }
                }
                debug!("就绪回调执行完成");
                Ok(())
            })
            .map(|_| ())
    }
}

/// 直接解析器
#[derive(Clone)]
pub(crate) struct DirectDiImpl {
    tree: Arc<BindingTree>,
    node: Option<Arc<Node>>,
    context_type: TypeInfo,
    context: Option<ContextValue>,
    full_description_on_error: bool,
    gate: Option<Arc<ReadyGate>>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").finish_non_exhaustive()
    }
}

impl DirectDiImpl {
    fn root(
        tree: Arc<BindingTree>,
        full_description_on_error: bool,
        gate: Option<Arc<ReadyGate>>,
    ) -> Self {
        Self {
            tree,
            node: None,
            context_type: TypeInfo::any(),
            context: None,
            full_description_on_error,
            gate,
        }
    }

    fn ready(&self) -> DependencyResult<()> {
        match &self.gate {
            Some(gate) => gate.ensure(),
            None => Ok(()),
        }
    }

    fn binding_di_on(&self, key: &Key, override_level: usize) -> Arc<BindingDiImpl> {
        let node = Node {
            key: key.clone(),
            override_level,
            parent: self.node.clone(),
        };
        Arc::new(BindingDiImpl {
            direct: DirectDiImpl {
                tree: Arc::clone(&self.tree),
                node: Some(Arc::new(node)),
                context_type: self.context_type,
                context: self.context.clone(),
                full_description_on_error: self.full_description_on_error,
                gate: None,
            },
            key: key.clone(),
            override_level,
        })
    }

    fn lookup(&self, key: &Key, override_level: usize) -> DependencyResult<Option<ErasedFactory>> {
        self.ready()?;

        if let Some((found, definition)) = self.tree.find(key, override_level) {
            Node::check(
                self.node.as_deref(),
                &found,
                override_level,
                self.full_description_on_error,
            )?;
            trace!("解析绑定: {} (覆盖层级 {})", found, override_level);
            let di = self.binding_di_on(&found, override_level);
            return Ok(Some(definition.binding.get_factory(&found, di)));
        }

        let di: Arc<dyn BindingDi> = self.binding_di_on(key, override_level);
        for source in self.tree.external_sources() {
            if let Some(factory) = source.get_factory(Arc::clone(&di), key) {
                Node::check(
                    self.node.as_deref(),
                    key,
                    override_level,
                    self.full_description_on_error,
                )?;
                trace!("外部来源提供: {}", key);
                return Ok(Some(factory));
            }
        }

        Ok(None)
    }

    fn not_found(&self, key: &Key, override_level: usize) -> DependencyError {
        let full = self.full_description_on_error;
        let with_overrides = override_level != 0;
        let description = if full {
            key.full_description()
        } else {
            key.description()
        };

        let mut message = format!("没有找到 {description} 的绑定\n");
        let for_type = self
            .tree
            .find_by_specs(&SearchSpecs::new().with_return_type(key.return_type()));
        if !for_type.is_empty() {
            message.push_str("该类型可用的绑定:\n");
            message.push_str(&self.tree.describe_keys(&for_type, with_overrides, full, 8));
        }
        if full {
            message.push_str("容器中注册的绑定:\n");
            message.push_str(&self.tree.description(with_overrides, full, 8));
        }

        debug!("没有找到绑定: {}", description);
        DependencyError::not_found(description, message)
    }
}

impl DirectDi for DirectDiImpl {
    fn factory_erased(&self, key: &Key, override_level: usize) -> DependencyResult<ErasedFactory> {
        self.lookup(key, override_level)?
            .ok_or_else(|| self.not_found(key, override_level))
    }

    fn factory_or_none_erased(&self, key: &Key) -> DependencyResult<Option<ErasedFactory>> {
        self.lookup(key, 0)
    }

    fn all_factories_erased(&self, specs: &SearchSpecs) -> DependencyResult<Vec<ErasedFactory>> {
        self.ready()?;

        let mut factories = Vec::new();
        for key in self.tree.find_by_specs(specs) {
            let Some(definition) = self.tree.definitions(&key).first() else {
                continue;
            };
            Node::check(self.node.as_deref(), &key, 0, self.full_description_on_error)?;
            let di = self.binding_di_on(&key, 0);
            factories.push(definition.binding.get_factory(&key, di));
        }
        Ok(factories)
    }

    fn binding_di(&self, key: &Key, override_level: usize) -> Arc<dyn BindingDi> {
        self.binding_di_on(key, override_level)
    }

    fn context_type(&self) -> TypeInfo {
        self.context_type
    }

    fn context_value(&self) -> Option<ContextValue> {
        self.context.clone()
    }

    fn on_context(&self, context_type: TypeInfo, context: ContextValue) -> Arc<dyn DirectDi> {
        Arc::new(DirectDiImpl {
            context_type,
            context: Some(context),
            ..self.clone()
        })
    }
}

/// 绑定解析句柄
pub(crate) struct BindingDiImpl {
    direct: DirectDiImpl,
    key: Key,
    override_level: usize,
}

impl DirectDi for BindingDiImpl {
    fn factory_erased(&self, key: &Key, override_level: usize) -> DependencyResult<ErasedFactory> {
        self.direct.factory_erased(key, override_level)
    }

    fn factory_or_none_erased(&self, key: &Key) -> DependencyResult<Option<ErasedFactory>> {
        self.direct.factory_or_none_erased(key)
    }

    fn all_factories_erased(&self, specs: &SearchSpecs) -> DependencyResult<Vec<ErasedFactory>> {
        self.direct.all_factories_erased(specs)
    }

    fn binding_di(&self, key: &Key, override_level: usize) -> Arc<dyn BindingDi> {
        self.direct.binding_di(key, override_level)
    }

    fn context_type(&self) -> TypeInfo {
        self.direct.context_type()
    }

    fn context_value(&self) -> Option<ContextValue> {
        self.direct.context_value()
    }

    fn on_context(&self, context_type: TypeInfo, context: ContextValue) -> Arc<dyn DirectDi> {
        self.direct.on_context(context_type, context)
    }
}

impl BindingDi for BindingDiImpl {
    fn overridden_factory(&self) -> DependencyResult<ErasedFactory> {
        self.direct
            .factory_erased(&self.key, self.override_level + 1)
    }

    fn overridden_factory_or_none(&self) -> DependencyResult<Option<ErasedFactory>> {
        self.direct.lookup(&self.key, self.override_level + 1)
    }

    fn key(&self) -> &Key {
        &self.key
    }

    fn override_level(&self) -> usize {
        self.override_level
    }
}

/// 依赖容器
///
/// 构建完成后只读，可以在多个线程中同时检索
pub struct Container {
    direct: DirectDiImpl,
    gate: Option<Arc<ReadyGate>>,
}

impl Container {
    /// 由查找树和就绪回调创建容器
    ///
    /// `run_ready_callbacks` 为真时立即执行回调，回调失败即构建失败
    pub(crate) fn new(
        tree: Arc<BindingTree>,
        callbacks: Vec<ReadyCallback>,
        config: &ContainerConfig,
    ) -> DependencyResult<Self> {
        let full = config.full_description_on_error;

        let gate = if config.run_ready_callbacks {
            let root = DirectDiImpl::root(Arc::clone(&tree), full, None);
            for callback in callbacks {
                callback(&root)?;
            }
            None
        } else {
            debug!("延迟执行 {} 个就绪回调", callbacks.len());
            Some(Arc::new(ReadyGate {
                callbacks: Mutex::new(callbacks),
                done: OnceCell::new(),
                tree: Arc::clone(&tree),
                full_description_on_error: full,
            }))
        };

        info!("容器构建完成: {} 个绑定", tree.len());
        Ok(Self {
            direct: DirectDiImpl::root(tree, full, gate.clone()),
            gate,
        })
    }

    /// 执行尚未执行的就绪回调
    ///
    /// 构建时已经执行过回调的容器直接返回
    pub fn init(&self) -> DependencyResult<()> {
        match &self.gate {
            Some(gate) => gate.ensure(),
            None => Ok(()),
        }
    }

    /// 查找树
    pub fn tree(&self) -> &Arc<BindingTree> {
        &self.direct.tree
    }

    /// 按模块分组的绑定列表，使用简短类型名称
    pub fn description(&self) -> String {
        self.tree().description(false, false, 0)
    }

    /// 按模块分组的绑定列表，使用完整类型名称
    pub fn full_description(&self) -> String {
        self.tree().description(false, true, 0)
    }

    /// 包含被覆盖定义的绑定列表
    pub fn description_with_overrides(&self, full: bool) -> String {
        self.tree().description(true, full, 0)
    }
}

impl DirectDi for Container {
    fn factory_erased(&self, key: &Key, override_level: usize) -> DependencyResult<ErasedFactory> {
        self.direct.factory_erased(key, override_level)
    }

    fn factory_or_none_erased(&self, key: &Key) -> DependencyResult<Option<ErasedFactory>> {
        self.direct.factory_or_none_erased(key)
    }

    fn all_factories_erased(&self, specs: &SearchSpecs) -> DependencyResult<Vec<ErasedFactory>> {
        self.direct.all_factories_erased(specs)
    }

    fn binding_di(&self, key: &Key, override_level: usize) -> Arc<dyn BindingDi> {
        self.direct.binding_di(key, override_level)
    }

    fn context_type(&self) -> TypeInfo {
        self.direct.context_type()
    }

    fn context_value(&self) -> Option<ContextValue> {
        self.direct.context_value()
    }

    fn on_context(&self, context_type: TypeInfo, context: ContextValue) -> Arc<dyn DirectDi> {
        self.direct.on_context(context_type, context)
    }
}
