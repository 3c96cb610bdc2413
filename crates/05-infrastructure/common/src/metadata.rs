//! 类型元数据
//!
//! 提供绑定键所使用的类型描述符

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 任意上下文类型的标记，不会与用户类型重合
struct AnyContext;

/// 类型信息
///
/// 绑定键中的类型描述符。两个 `TypeInfo` 相等当且仅当它们描述同一个运行时类型
/// （包括泛型参数），名称仅用于展示。
#[derive(Clone, Copy)]
pub struct TypeInfo {
    /// 类型ID
    pub id: TypeId,
    /// 完整类型名称（包含模块路径）
    pub qualified_name: &'static str,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            qualified_name: std::any::type_name::<T>(),
        }
    }

    /// 任意上下文类型
    ///
    /// 未声明上下文的绑定使用此类型作为上下文类型
    pub fn any() -> Self {
        Self {
            id: TypeId::of::<AnyContext>(),
            qualified_name: "Any",
        }
    }

    /// 无参数类型
    pub fn unit() -> Self {
        Self::of::<()>()
    }

    /// 是否为任意上下文类型
    pub fn is_any(&self) -> bool {
        self.id == TypeId::of::<AnyContext>()
    }

    /// 是否为无参数类型
    pub fn is_unit(&self) -> bool {
        self.id == TypeId::of::<()>()
    }

    /// 获取简短的类型名称（不包含模块路径，泛型参数同样简化）
    pub fn simple_name(&self) -> String {
        simplify_type_name(self.qualified_name)
    }
}

/// 去掉类型名称中的模块路径
///
/// `alloc::vec::Vec<alloc::sync::Arc<app::Service>>` -> `Vec<Arc<Service>>`
fn simplify_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                out.truncate(segment_start);
            }
            '<' | '>' | ',' | '(' | ')' | '[' | ']' | '&' | ' ' | ';' => {
                out.push(c);
                segment_start = out.len();
            }
            _ => out.push(c),
        }
    }

    out
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.qualified_name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.simple_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Service;

    #[test]
    fn test_equality_follows_runtime_type() {
        assert_eq!(TypeInfo::of::<String>(), TypeInfo::of::<String>());
        assert_ne!(TypeInfo::of::<Vec<u8>>(), TypeInfo::of::<Vec<u16>>());
        assert_ne!(TypeInfo::any(), TypeInfo::unit());
        assert!(TypeInfo::any().is_any());
        assert!(TypeInfo::unit().is_unit());
    }

    #[test]
    fn test_any_context_differs_from_trait_object() {
        let erased = TypeInfo::of::<dyn std::any::Any + Send + Sync>();
        assert_ne!(erased, TypeInfo::any());
        assert!(!erased.is_any());
    }

    #[test]
    fn test_simple_name_strips_paths() {
        let info = TypeInfo::of::<Vec<Arc<Service>>>();
        assert_eq!(info.simple_name(), "Vec<Arc<Service>>");
        assert_eq!(TypeInfo::of::<(u8, String)>().simple_name(), "(u8, String)");
        assert_eq!(TypeInfo::any().to_string(), "Any");
    }
}
