//! 绑定键定义
//!
//! 绑定键由上下文类型、参数类型、返回类型和可选标签组成，
//! 是注册表和查找树的索引

use crate::scope::DynValue;
use infrastructure_common::TypeInfo;
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 绑定标签
///
/// 同一类型的多个绑定通过标签区分。标签可以是任意可哈希的值，
/// 按值和类型比较，因此 `1u32`、`1u64` 和 `"1"` 是三个不同的标签。
/// 字符串标签统一保存为 `String`。
#[derive(Clone)]
pub struct Tag(Arc<dyn DynValue>);

impl Tag {
    /// 创建新的标签
    pub fn new<T>(value: T) -> Self
    where
        T: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        match (&value as &dyn Any).downcast_ref::<&'static str>() {
            Some(name) => Self(Arc::new(name.to_string())),
            None => Self(Arc::new(value)),
        }
    }

    /// 字符串标签的内容
    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }

    /// 取回标签值
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self(Arc::new(value.to_string()))
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Self(Arc::new(value))
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

/// 字符串标签带引号，其他标签使用值的 `Debug` 格式
impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.dyn_fmt(f)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(name) => f.write_str(name),
            None => self.0.dyn_fmt(f),
        }
    }
}

/// 绑定目标：返回类型和标签
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bind {
    /// 绑定的类型
    pub return_type: TypeInfo,
    /// 标签
    pub tag: Option<Tag>,
}

impl Bind {
    /// 创建新的绑定目标
    pub fn new(return_type: TypeInfo, tag: Option<Tag>) -> Self {
        Self { return_type, tag }
    }

    /// 使用简短类型名称的描述，如 `bind<Service>(tag = "main")`
    pub fn description(&self) -> String {
        bind_display(&self.return_type.simple_name(), self.tag.as_ref())
    }

    /// 使用完整类型名称的描述
    pub fn full_description(&self) -> String {
        bind_display(self.return_type.qualified_name, self.tag.as_ref())
    }
}

impl fmt::Display for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

fn bind_display(type_name: &str, tag: Option<&Tag>) -> String {
    match tag {
        Some(tag) => format!("bind<{type_name}>(tag = {tag:?})"),
        None => format!("bind<{type_name}>()"),
    }
}

/// 绑定键
///
/// 相等性比较全部四个字段；哈希值在构造时计算并缓存
#[derive(Clone)]
pub struct Key {
    context_type: TypeInfo,
    arg_type: TypeInfo,
    return_type: TypeInfo,
    tag: Option<Tag>,
    hash: u64,
}

impl Key {
    /// 创建新的绑定键
    pub fn new(
        context_type: TypeInfo,
        arg_type: TypeInfo,
        return_type: TypeInfo,
        tag: Option<Tag>,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        context_type.hash(&mut hasher);
        arg_type.hash(&mut hasher);
        return_type.hash(&mut hasher);
        tag.hash(&mut hasher);

        Self {
            context_type,
            arg_type,
            return_type,
            tag,
            hash: hasher.finish(),
        }
    }

    /// 任意上下文、无参数的键
    pub fn provider<T: ?Sized + 'static>(tag: Option<Tag>) -> Self {
        Self::new(TypeInfo::any(), TypeInfo::unit(), TypeInfo::of::<T>(), tag)
    }

    /// 任意上下文、参数类型为 `A` 的键
    pub fn factory<A: 'static, T: ?Sized + 'static>(tag: Option<Tag>) -> Self {
        Self::new(TypeInfo::any(), TypeInfo::of::<A>(), TypeInfo::of::<T>(), tag)
    }

    /// 替换上下文类型后的键
    pub fn with_context_type(&self, context_type: TypeInfo) -> Self {
        Self::new(
            context_type,
            self.arg_type,
            self.return_type,
            self.tag.clone(),
        )
    }

    /// 上下文类型
    pub fn context_type(&self) -> TypeInfo {
        self.context_type
    }

    /// 参数类型
    pub fn arg_type(&self) -> TypeInfo {
        self.arg_type
    }

    /// 返回类型
    pub fn return_type(&self) -> TypeInfo {
        self.return_type
    }

    /// 标签
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// 对应的绑定目标
    pub fn bind(&self) -> Bind {
        Bind::new(self.return_type, self.tag.clone())
    }

    /// 绑定部分的描述，如 `bind<Service>(tag = "main")`
    pub fn bind_description(&self) -> String {
        bind_display(&self.return_type.simple_name(), self.tag.as_ref())
    }

    /// 绑定部分的完整描述
    pub fn bind_full_description(&self) -> String {
        bind_display(self.return_type.qualified_name, self.tag.as_ref())
    }

    /// 键的描述，如 `bind<Service>() with ?<Request>().? { u32 -> ? }`
    pub fn description(&self) -> String {
        let mut out = self.bind_description();
        self.append_description(&mut out, |t| t.simple_name());
        out
    }

    /// 使用完整类型名称的键描述
    pub fn full_description(&self) -> String {
        let mut out = self.bind_full_description();
        self.append_description(&mut out, |t| t.qualified_name.to_string());
        out
    }

    fn append_description(&self, out: &mut String, display: impl Fn(&TypeInfo) -> String) {
        out.push_str(" with ");
        if !self.context_type.is_any() {
            out.push_str(&format!("?<{}>().", display(&self.context_type)));
        }
        out.push_str("? { ");
        if !self.arg_type.is_unit() {
            out.push_str(&display(&self.arg_type));
            out.push_str(" -> ");
        }
        out.push_str("? }");
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.return_type == other.return_type
            && self.arg_type == other.arg_type
            && self.context_type == other.context_type
            && self.tag == other.tag
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_description())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// 标签搜索条件
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagSpec {
    /// 不限制标签
    #[default]
    Any,
    /// 只匹配给定标签（`None` 表示无标签）
    Exactly(Option<Tag>),
}

/// 部分搜索条件
///
/// 未设置的字段是通配符
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchSpecs {
    /// 上下文类型
    pub context_type: Option<TypeInfo>,
    /// 参数类型
    pub arg_type: Option<TypeInfo>,
    /// 返回类型
    pub return_type: Option<TypeInfo>,
    /// 标签
    pub tag: TagSpec,
}

impl SearchSpecs {
    /// 创建不限制任何字段的搜索条件
    pub fn new() -> Self {
        Self::default()
    }

    /// 限制返回类型
    pub fn with_type<T: ?Sized + 'static>(mut self) -> Self {
        self.return_type = Some(TypeInfo::of::<T>());
        self
    }

    /// 限制返回类型
    pub fn with_return_type(mut self, return_type: TypeInfo) -> Self {
        self.return_type = Some(return_type);
        self
    }

    /// 限制上下文类型
    pub fn with_context_type(mut self, context_type: TypeInfo) -> Self {
        self.context_type = Some(context_type);
        self
    }

    /// 限制参数类型
    pub fn with_arg_type(mut self, arg_type: TypeInfo) -> Self {
        self.arg_type = Some(arg_type);
        self
    }

    /// 只匹配给定标签
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = TagSpec::Exactly(Some(tag.into()));
        self
    }

    /// 只匹配无标签的绑定
    pub fn untagged(mut self) -> Self {
        self.tag = TagSpec::Exactly(None);
        self
    }

    /// 搜索条件是否匹配给定键
    ///
    /// 上下文条件同时匹配声明为任意上下文的绑定
    pub fn matches(&self, key: &Key) -> bool {
        if let Some(return_type) = self.return_type {
            if !return_type.is_any() && key.return_type() != return_type {
                return false;
            }
        }
        if let Some(context_type) = self.context_type {
            if !key.context_type().is_any() && key.context_type() != context_type {
                return false;
            }
        }
        if let Some(arg_type) = self.arg_type {
            if key.arg_type() != arg_type {
                return false;
            }
        }
        match &self.tag {
            TagSpec::Any => true,
            TagSpec::Exactly(tag) => key.tag() == tag.as_ref(),
        }
    }
}

impl fmt::Display for SearchSpecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(return_type) = &self.return_type {
            parts.push(format!("type = {return_type}"));
        }
        if let Some(context_type) = &self.context_type {
            parts.push(format!("contextType = {context_type}"));
        }
        if let Some(arg_type) = &self.arg_type {
            parts.push(format!("argType = {arg_type}"));
        }
        match &self.tag {
            TagSpec::Any => {}
            TagSpec::Exactly(Some(tag)) => parts.push(format!("tag = {tag:?}")),
            TagSpec::Exactly(None) => parts.push("tag = null".to_string()),
        }
        write!(f, "[{}]", parts.join(", "))
    }
}
