//! # 依赖解析容器实现
//!
//! 提供绑定注册表、查找树、解析引擎、标准绑定、作用域和容器构建器
//!
//! ```
//! use di_impl::{ContainerBuilder, ProviderBinding, SingletonBinding};
//! use di_impl::DirectDiExt;
//! use std::sync::Arc;
//!
//! struct Config {
//!     url: String,
//! }
//!
//! struct Client {
//!     config: Arc<Config>,
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder
//!     .bind(SingletonBinding::new(|_| {
//!         Ok(Arc::new(Config { url: "db://local".to_string() }))
//!     }))?
//!     .bind(ProviderBinding::new(|di| {
//!         Ok(Arc::new(Client { config: di.instance::<Config>()? }))
//!     }))?;
//! let container = builder.build()?;
//!
//! let client = container.instance::<Client>()?;
//! assert_eq!(client.config.url, "db://local");
//! # Ok::<(), infrastructure_common::DependencyError>(())
//! ```

pub mod bindings;
pub mod builder;
pub mod container;
pub mod copy;
pub mod description;
pub mod module;
pub mod references;
pub mod registry;
pub mod scopes;
pub mod tree;

pub use bindings::{
    EagerSingletonBinding, FactoryBinding, InstanceBinding, MultitonBinding, ProviderBinding,
    SequenceBinding, SetBinding, SingletonBinding,
};
pub use builder::{Binder, ContainerBuilder, OverrideMode};
pub use container::Container;
pub use module::Module;
pub use references::RefMaker;
pub use registry::{BindingRegistry, Definition};
pub use scopes::{MultiItemScopeRegistry, SingleItemScopeRegistry, UnboundedScope, WeakContextScope};
pub use tree::BindingTree;

pub use di_abstractions::{BindingDi, BindingDiExt, DirectDi, DirectDiExt};
