//! 扩展容器时要复制的键

use crate::tree::BindingTree;
use di_abstractions::{CopyMode, CopySpecs, Key};
use infrastructure_common::{DependencyError, DependencyResult};
use std::collections::HashSet;

/// 计算复制方式在给定查找树中选中的键
pub fn key_set(mode: &CopyMode, tree: &BindingTree) -> DependencyResult<HashSet<Key>> {
    let keys = match mode {
        CopyMode::None => HashSet::new(),
        CopyMode::All => tree.keys().cloned().collect(),
        CopyMode::NonCached => tree
            .keys()
            .filter(|key| {
                tree.definitions(key)
                    .first()
                    .map_or(false, |definition| !definition.binding.kind().is_cached())
            })
            .cloned()
            .collect(),
        CopyMode::Only { copy, ignore } => {
            let ignored = specs_to_keys(tree, ignore)?;
            specs_to_keys(tree, copy)?
                .into_iter()
                .filter(|key| !ignored.contains(key))
                .collect()
        }
        CopyMode::AllBut { copy, ignore } => {
            let kept = specs_to_keys(tree, copy)?;
            let ignored: HashSet<Key> = specs_to_keys(tree, ignore)?
                .into_iter()
                .filter(|key| !kept.contains(key))
                .collect();
            tree.keys()
                .filter(|key| !ignored.contains(*key))
                .cloned()
                .collect()
        }
    };
    Ok(keys)
}

fn specs_to_keys(tree: &BindingTree, specs: &[CopySpecs]) -> DependencyResult<HashSet<Key>> {
    let mut keys = HashSet::new();
    for spec in specs {
        let found = tree.find_by_specs(&spec.search);
        if found.is_empty() {
            return Err(DependencyError::no_match(
                spec.to_string(),
                format!("没有匹配 {spec} 的绑定"),
            ));
        }
        if !spec.all && found.len() > 1 {
            return Err(DependencyError::no_match(
                spec.to_string(),
                format!(
                    "{spec} 匹配了 {} 个绑定:\n{}",
                    found.len(),
                    tree.describe_keys(&found, false, false, 8)
                ),
            ));
        }
        keys.extend(found);
    }
    Ok(keys)
}
