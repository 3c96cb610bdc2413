//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn DI 容器各层共享的基础类型。
//!
//! ## 核心内容
//!
//! - [`TypeInfo`] - 不透明的类型描述符，绑定键的组成部分
//! - [`BindingKind`] - 绑定种类及其缓存策略
//! - [`DependencyError`] - 依赖解析错误体系
//! - [`ContainerConfig`] - 容器配置
//!
//! ## 设计原则
//!
//! - 基于 Rust 类型系统的编译时安全
//! - 类型擦除只发生在注册表边界
//! - 错误信息包含足够的键描述以定位绑定声明

pub mod configuration;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
