//! 绑定抽象接口
//!
//! 绑定是"如何得到某个类型的实例"的声明，注册表以 [`Key`] 为索引保存绑定

use crate::factory::{ErasedFactory, ReadyCallback};
use crate::key::Key;
use crate::resolver::BindingDi;
use infrastructure_common::{BindingKind, TypeInfo};
use std::any::Any;
use std::sync::Arc;

/// 绑定 trait
pub trait Binding: Send + Sync + 'static {
    /// 绑定种类
    fn kind(&self) -> BindingKind;

    /// 绑定声明的上下文类型
    fn context_type(&self) -> TypeInfo {
        TypeInfo::any()
    }

    /// 绑定声明的参数类型
    fn arg_type(&self) -> TypeInfo {
        TypeInfo::unit()
    }

    /// 创建的实例类型
    fn created_type(&self) -> TypeInfo;

    /// 获取工厂
    ///
    /// `di` 绑定在 `key` 上，创建函数通过它解析传递依赖
    fn get_factory(&self, key: &Key, di: Arc<dyn BindingDi>) -> ErasedFactory;

    /// 复制绑定
    ///
    /// 持有缓存的绑定返回一个缓存为空的新绑定，其他绑定返回 `None`，
    /// 此时复制即为原样共享绑定对象
    fn copy(&self) -> Option<Arc<dyn Binding>> {
        None
    }

    /// 绑定到 `key` 之后需要在容器就绪时执行的回调
    fn ready_callback(self: Arc<Self>, _key: &Key) -> Option<ReadyCallback> {
        None
    }

    /// 用于还原具体绑定类型
    fn as_any(&self) -> &dyn Any;

    /// 使用简短类型名称的描述，如 `singleton { Service }`
    fn description(&self) -> String {
        describe(self.kind(), self.arg_type(), self.created_type(), |t| {
            t.simple_name()
        })
    }

    /// 使用完整类型名称的描述
    fn full_description(&self) -> String {
        describe(self.kind(), self.arg_type(), self.created_type(), |t| {
            t.qualified_name.to_string()
        })
    }
}

fn describe(
    kind: BindingKind,
    arg_type: TypeInfo,
    created_type: TypeInfo,
    display: impl Fn(&TypeInfo) -> String,
) -> String {
    if arg_type.is_unit() {
        format!("{} {{ {} }}", kind.factory_name(), display(&created_type))
    } else {
        format!(
            "{} {{ {} -> {} }}",
            kind.factory_name(),
            display(&arg_type),
            display(&created_type)
        )
    }
}
