//! 绑定列表描述
//!
//! ```text
//! bind<Config>() with instance { Config }
//! module storage {
//!     bind<dyn Store>() with singleton { dyn Store }
//!         overrides provider { dyn Store }
//! }
//! ```

use crate::registry::Definition;
use di_abstractions::Key;
use std::collections::BTreeMap;

/// 描述绑定列表，按声明模块分组
///
/// 没有模块的绑定在前，模块按名称排序；`with_overrides` 为真时列出被覆盖的定义
pub fn describe_bindings(
    entries: &[(&Key, &[Definition])],
    with_overrides: bool,
    full: bool,
    indent: usize,
) -> String {
    let mut root = Vec::new();
    let mut modules: BTreeMap<&str, Vec<(&Key, &[Definition])>> = BTreeMap::new();

    for &(key, definitions) in entries {
        let Some(active) = definitions.first() else {
            continue;
        };
        match active.from_module.as_deref() {
            Some(module) => modules.entry(module).or_default().push((key, definitions)),
            None => root.push((key, definitions)),
        }
    }

    let mut out = String::new();
    append_bindings(&mut out, &root, with_overrides, full, indent);
    for (module, bindings) in &modules {
        out.push_str(&format!("{}module {} {{\n", " ".repeat(indent), module));
        append_bindings(&mut out, bindings, with_overrides, full, indent + 4);
        out.push_str(&format!("{}}}\n", " ".repeat(indent)));
    }
    out
}

fn append_bindings(
    out: &mut String,
    entries: &[(&Key, &[Definition])],
    with_overrides: bool,
    full: bool,
    indent: usize,
) {
    for (key, definitions) in entries {
        let (bind, context) = if full {
            (key.bind_full_description(), key.context_type().qualified_name.to_string())
        } else {
            (key.bind_description(), key.context_type().simple_name())
        };
        let context = if key.context_type().is_any() {
            String::new()
        } else {
            format!("?<{context}>().")
        };
        let binding = |definition: &Definition| {
            if full {
                definition.binding.full_description()
            } else {
                definition.binding.description()
            }
        };

        out.push_str(&format!(
            "{}{} with {}{}\n",
            " ".repeat(indent),
            bind,
            context,
            binding(&definitions[0])
        ));
        if with_overrides {
            for overridden in &definitions[1..] {
                out.push_str(&format!(
                    "{}overrides {}\n",
                    " ".repeat(indent + 4),
                    binding(overridden)
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{InstanceBinding, ProviderBinding};
    use std::sync::Arc;

    struct Service;
    struct Request;

    #[test]
    fn test_grouped_by_module() {
        let service = Key::provider::<Service>(None);
        let tagged = Key::provider::<Service>(Some("db".into()))
            .with_context_type(infrastructure_common::TypeInfo::of::<Request>());
        let service_defs = vec![
            Definition::new(
                Arc::new(ProviderBinding::new(|_| Ok(Arc::new(Service)))),
                None,
            ),
            Definition::new(Arc::new(InstanceBinding::new(Arc::new(Service))), None),
        ];
        let tagged_defs = vec![Definition::new(
            Arc::new(InstanceBinding::new(Arc::new(Service))),
            Some("storage".to_string()),
        )];
        let entries = vec![
            (&service, service_defs.as_slice()),
            (&tagged, tagged_defs.as_slice()),
        ];

        let plain = describe_bindings(&entries, false, false, 0);
        assert_eq!(
            plain,
            "bind<Service>() with provider { Service }\n\
             module storage {\n    \
             bind<Service>(tag = \"db\") with ?<Request>().instance { Service }\n\
             }\n"
        );

        let with_overrides = describe_bindings(&entries, true, false, 0);
        assert!(with_overrides.contains("    overrides instance { Service }\n"));

        let full = describe_bindings(&entries, false, true, 0);
        assert!(full.contains("::Service>()"));
    }
}
