//! # Dependency Injection Abstractions
//!
//! 依赖解析抽象层，定义绑定、解析和作用域的核心接口。
//!
//! ## 核心接口
//!
//! - [`Key`] - 绑定键（上下文类型、参数类型、返回类型、标签）
//! - [`Binding`] - 绑定接口
//! - [`DirectDi`] / [`DirectDiExt`] - 依赖解析接口
//! - [`BindingDi`] - 传给创建函数的解析句柄
//! - [`Scope`] / [`ScopeRegistry`] - 作用域和实例缓存接口
//! - [`ExternalSource`] - 外部来源接口

pub mod binding;
pub mod factory;
pub mod key;
pub mod registry;
pub mod resolver;
pub mod scope;

pub use binding::*;
pub use factory::*;
pub use key::*;
pub use registry::*;
pub use resolver::*;
pub use scope::*;
