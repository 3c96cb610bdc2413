//! 绑定注册表
//!
//! 构建期间使用的可变注册表。每个键对应一条覆盖链，下标 0 是当前生效的定义，
//! 下标 L 是覆盖层级 L 的定义。构建完成后注册表转换为只读的 [`BindingTree`]。

use crate::tree::BindingTree;
use di_abstractions::{Binding, Key, OverridePermission, SearchSpecs};
use infrastructure_common::{DependencyError, DependencyResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// 绑定定义
#[derive(Clone)]
pub struct Definition {
    /// 绑定
    pub binding: Arc<dyn Binding>,
    /// 声明绑定的模块名称
    pub from_module: Option<String>,
    /// 是否与父容器共享同一个绑定
    pub shared: bool,
}

impl Definition {
    /// 当前容器中声明的定义
    pub fn new(binding: Arc<dyn Binding>, from_module: Option<String>) -> Self {
        Self {
            binding,
            from_module,
            shared: false,
        }
    }
}

/// 可变绑定注册表
#[derive(Default)]
pub struct BindingRegistry {
    map: HashMap<Key, Vec<Definition>>,
    order: Vec<Key>,
}

impl BindingRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册绑定
    ///
    /// 覆盖许可满足时把定义放到覆盖链最前面
    pub fn bind(
        &mut self,
        key: Key,
        definition: Definition,
        permission: OverridePermission,
    ) -> DependencyResult<()> {
        self.check_overrides(&key, permission)?;
        debug!("注册绑定: {} with {}", key, definition.binding.description());

        match self.map.get_mut(&key) {
            Some(definitions) => definitions.insert(0, definition),
            None => {
                self.order.push(key.clone());
                self.map.insert(key, vec![definition]);
            }
        }
        Ok(())
    }

    /// 检查覆盖许可
    pub fn check_overrides(&self, key: &Key, permission: OverridePermission) -> DependencyResult<()> {
        let exists = self.map.contains_key(key);
        match permission {
            OverridePermission::Must if !exists => {
                warn!("拒绝绑定 {}: 没有可覆盖的绑定", key);
                Err(DependencyError::overriding(format!(
                    "绑定 {key} 必须覆盖已有的绑定"
                )))
            }
            OverridePermission::MustNot if exists => {
                warn!("拒绝绑定 {}: 不允许覆盖已有的绑定", key);
                Err(DependencyError::overriding(format!(
                    "绑定 {key} 不得覆盖已有的绑定"
                )))
            }
            _ => Ok(()),
        }
    }

    /// 查找覆盖层级 `override_level` 的定义
    pub fn find(&self, key: &Key, override_level: usize) -> DependencyResult<&Definition> {
        self.map
            .get(key)
            .and_then(|definitions| definitions.get(override_level))
            .ok_or_else(|| {
                DependencyError::not_found(
                    key.description(),
                    format!("没有找到 {} 的绑定 (覆盖层级 {override_level})", key.description()),
                )
            })
    }

    /// 查找所有匹配搜索条件的键及其覆盖链，按注册顺序返回
    pub fn find_by_specs(&self, specs: &SearchSpecs) -> Vec<(&Key, &[Definition])> {
        self.order
            .iter()
            .filter(|key| specs.matches(key))
            .filter_map(|key| self.map.get(key).map(|definitions| (key, definitions.as_slice())))
            .collect()
    }

    /// 是否注册了键
    pub fn contains(&self, key: &Key) -> bool {
        self.map.contains_key(key)
    }

    /// 当前生效的定义
    pub fn active(&self, key: &Key) -> Option<&Definition> {
        self.map.get(key).and_then(|definitions| definitions.first())
    }

    /// 已注册的键的数量
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// 是否没有任何绑定
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// 合并父容器的全部绑定
    ///
    /// `copy` 中的键得到复制的定义（独立的缓存），其他键共享父容器的绑定。
    /// 所有定义都在新容器中解析依赖。`check` 不为 `None` 时每个键都要满足该覆盖许可。
    /// 返回复制出的绑定，用于收集就绪回调。
    pub fn extend(
        &mut self,
        parent: &Arc<BindingTree>,
        copy: &HashSet<Key>,
        check: Option<OverridePermission>,
    ) -> DependencyResult<Vec<(Key, Arc<dyn Binding>)>> {
        let mut copied = Vec::new();

        for key in parent.keys() {
            if let Some(permission) = check {
                self.check_overrides(key, permission)?;
            }

            let definitions = parent.definitions(key);
            let merged: Vec<Definition> = if copy.contains(key) {
                definitions
                    .iter()
                    .map(|definition| {
                        let binding = definition
                            .binding
                            .copy()
                            .unwrap_or_else(|| Arc::clone(&definition.binding));
                        copied.push((key.clone(), Arc::clone(&binding)));
                        Definition::new(binding, definition.from_module.clone())
                    })
                    .collect()
            } else {
                definitions
                    .iter()
                    .map(|definition| Definition {
                        shared: true,
                        ..definition.clone()
                    })
                    .collect()
            };

            if !self.map.contains_key(key) {
                self.order.push(key.clone());
            }
            self.map.insert(key.clone(), merged);
        }

        Ok(copied)
    }

    /// 拆分为映射和注册顺序
    pub(crate) fn into_parts(self) -> (HashMap<Key, Vec<Definition>>, Vec<Key>) {
        (self.map, self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{InstanceBinding, ProviderBinding};
    use di_abstractions::TagSpec;

    struct Service(&'static str);

    fn instance(name: &'static str) -> Definition {
        Definition::new(Arc::new(InstanceBinding::new(Arc::new(Service(name)))), None)
    }

    #[test]
    fn test_bind_prepends_overrides() {
        let key = Key::provider::<Service>(None);
        let mut registry = BindingRegistry::new();
        registry.bind(key.clone(), instance("a"), OverridePermission::MustNot).unwrap();
        registry.bind(key.clone(), instance("b"), OverridePermission::Must).unwrap();
        registry.bind(key.clone(), instance("c"), OverridePermission::May).unwrap();

        assert_eq!(registry.len(), 1);
        for level in 0..3 {
            assert!(registry.find(&key, level).is_ok());
        }
        assert!(registry.find(&key, 3).err().unwrap().is_not_found());
    }

    #[test]
    fn test_override_permission_enforced() {
        let key = Key::provider::<Service>(None);
        let mut registry = BindingRegistry::new();

        let err = registry
            .bind(key.clone(), instance("a"), OverridePermission::Must)
            .unwrap_err();
        assert!(matches!(err, DependencyError::Overriding { .. }));
        assert!(!registry.contains(&key));

        registry.bind(key.clone(), instance("a"), OverridePermission::May).unwrap();
        let err = registry
            .bind(key.clone(), instance("b"), OverridePermission::MustNot)
            .unwrap_err();
        assert!(matches!(err, DependencyError::Overriding { .. }));

        // 失败的绑定不影响已有绑定
        assert!(registry.find(&key, 1).is_err());
        assert!(registry.active(&key).is_some());
    }

    #[test]
    fn test_find_by_specs_in_registration_order() {
        let mut registry = BindingRegistry::new();
        for tag in ["x", "y", "z"] {
            registry
                .bind(
                    Key::provider::<Service>(Some(tag.into())),
                    instance(tag),
                    OverridePermission::May,
                )
                .unwrap();
        }
        registry
            .bind(
                Key::provider::<String>(None),
                Definition::new(
                    Arc::new(ProviderBinding::new(|_| Ok(Arc::new(String::new())))),
                    None,
                ),
                OverridePermission::May,
            )
            .unwrap();

        let found = registry.find_by_specs(&SearchSpecs::new().with_type::<Service>());
        let tags: Vec<_> = found
            .iter()
            .map(|(key, _)| key.tag().map(|tag| tag.to_string()))
            .collect();
        assert_eq!(
            tags,
            vec![Some("x".to_string()), Some("y".to_string()), Some("z".to_string())]
        );

        let specs = SearchSpecs {
            tag: TagSpec::Exactly(Some("y".into())),
            ..SearchSpecs::new()
        };
        assert_eq!(registry.find_by_specs(&specs).len(), 1);
    }
}
