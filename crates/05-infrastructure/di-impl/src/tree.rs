//! 只读查找树
//!
//! 构建完成后的绑定映射，按 返回类型 → 上下文类型 → 参数类型 → 标签 分层索引，
//! 附带一个并发的查找缓存

use crate::description::describe_bindings;
use crate::registry::{BindingRegistry, Definition};
use dashmap::DashMap;
use di_abstractions::{ExternalSource, Key, SearchSpecs, Tag, TagSpec};
use infrastructure_common::TypeInfo;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

type TagTree = Vec<(Option<Tag>, Key)>;
type ArgTree = HashMap<TypeInfo, TagTree>;
type ContextTree = HashMap<TypeInfo, ArgTree>;

/// 查找树
pub struct BindingTree {
    bindings: HashMap<Key, Vec<Definition>>,
    order: Vec<Key>,
    positions: HashMap<Key, usize>,
    type_tree: HashMap<TypeInfo, ContextTree>,
    cache: DashMap<Key, Key>,
    external_sources: Vec<Arc<dyn ExternalSource>>,
}

impl BindingTree {
    /// 由注册表构建查找树
    pub fn new(registry: BindingRegistry, external_sources: Vec<Arc<dyn ExternalSource>>) -> Self {
        let (bindings, order) = registry.into_parts();

        let mut type_tree: HashMap<TypeInfo, ContextTree> = HashMap::new();
        let mut positions = HashMap::with_capacity(order.len());
        for (position, key) in order.iter().enumerate() {
            positions.insert(key.clone(), position);
            type_tree
                .entry(key.return_type())
                .or_default()
                .entry(key.context_type())
                .or_default()
                .entry(key.arg_type())
                .or_default()
                .push((key.tag().cloned(), key.clone()));
        }

        Self {
            bindings,
            order,
            positions,
            type_tree,
            cache: DashMap::new(),
            external_sources,
        }
    }

    /// 查找键在覆盖层级 `override_level` 的定义
    ///
    /// 带上下文类型的键没有绑定时回退到同一个键的任意上下文版本，
    /// 回退结果记入查找缓存。返回实际找到的键和定义。
    pub fn find(&self, key: &Key, override_level: usize) -> Option<(Key, Definition)> {
        let found = self.resolve_key(key)?;
        let definition = self.bindings.get(&found)?.get(override_level)?.clone();
        Some((found, definition))
    }

    fn resolve_key(&self, key: &Key) -> Option<Key> {
        if let Some(cached) = self.cache.get(key) {
            return Some(cached.value().clone());
        }

        if self.bindings.contains_key(key) {
            self.cache.insert(key.clone(), key.clone());
            return Some(key.clone());
        }

        if !key.context_type().is_any() {
            let any_context = key.with_context_type(TypeInfo::any());
            if self.bindings.contains_key(&any_context) {
                trace!("上下文回退: {} -> {}", key, any_context);
                self.cache.insert(key.clone(), any_context.clone());
                return Some(any_context);
            }
        }

        None
    }

    /// 查找所有匹配搜索条件的键，按注册顺序返回
    pub fn find_by_specs(&self, specs: &SearchSpecs) -> Vec<Key> {
        let return_types: Vec<&ContextTree> = match specs.return_type {
            Some(return_type) if !return_type.is_any() => {
                self.type_tree.get(&return_type).into_iter().collect()
            }
            _ => self.type_tree.values().collect(),
        };

        let mut found: Vec<Key> = return_types
            .into_iter()
            .flat_map(|contexts| contexts.iter())
            .filter(|(context_type, _)| match specs.context_type {
                Some(wanted) => context_type.is_any() || **context_type == wanted,
                None => true,
            })
            .flat_map(|(_, args)| args.iter())
            .filter(|(arg_type, _)| specs.arg_type.map_or(true, |wanted| **arg_type == wanted))
            .flat_map(|(_, tags)| tags.iter())
            .filter(|(tag, _)| match &specs.tag {
                TagSpec::Any => true,
                TagSpec::Exactly(wanted) => tag == wanted,
            })
            .map(|(_, key)| key.clone())
            .collect();

        found.sort_by_key(|key| self.positions.get(key).copied().unwrap_or(usize::MAX));
        found
    }

    /// 键的完整覆盖链
    pub fn definitions(&self, key: &Key) -> &[Definition] {
        self.bindings
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// 所有键，按注册顺序
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.order.iter()
    }

    /// 是否包含键
    pub fn contains(&self, key: &Key) -> bool {
        self.bindings.contains_key(key)
    }

    /// 键的数量
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// 是否没有任何绑定
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 外部来源
    pub fn external_sources(&self) -> &[Arc<dyn ExternalSource>] {
        &self.external_sources
    }

    /// 全部绑定的描述
    pub fn description(&self, with_overrides: bool, full: bool, indent: usize) -> String {
        self.describe_keys(self.order.iter(), with_overrides, full, indent)
    }

    /// 给定键的描述
    pub fn describe_keys<'a>(
        &'a self,
        keys: impl IntoIterator<Item = &'a Key>,
        with_overrides: bool,
        full: bool,
        indent: usize,
    ) -> String {
        let entries: Vec<(&Key, &[Definition])> = keys
            .into_iter()
            .map(|key| (key, self.definitions(key)))
            .filter(|(_, definitions)| !definitions.is_empty())
            .collect();
        describe_bindings(&entries, with_overrides, full, indent)
    }
}
