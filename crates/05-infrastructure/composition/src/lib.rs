//! # 容器组合层
//!
//! 把配置加载、日志初始化和容器构建组合为一次启动过程。
//!
//! ## 主要功能
//!
//! - **配置加载**: 从 TOML 文件和 `LORN_DI` 前缀的环境变量读取 [`ContainerConfig`]
//! - **日志初始化**: 开发和生产环境的 `tracing-subscriber` 预设
//! - **容器启动**: 导入模块、继承父容器并构建容器
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use di_impl::{DirectDiExt, InstanceBinding, Module};
//! use infrastructure_composition::{ContainerBootstrapper, LoggingConfig};
//! use std::sync::Arc;
//!
//! let module = Module::new("app", |binder| {
//!     binder.constant("name", String::from("lorn"))?;
//!     Ok(())
//! });
//!
//! let container = ContainerBootstrapper::new()
//!     .with_config_file("config/di.toml")
//!     .with_logging(LoggingConfig::development())
//!     .add_module(module)
//!     .bootstrap()?;
//!
//! let name = container.instance_tagged::<String>("name")?;
//! println!("应用名称: {}", name);
//! # Ok::<(), infrastructure_common::InfrastructureError>(())
//! ```

pub mod bootstrapper;
pub mod logging;
pub mod settings;

pub use bootstrapper::ContainerBootstrapper;
pub use logging::{init_logging, LoggingConfig};
pub use settings::{ConfigLoader, DEFAULT_ENV_PREFIX, ENV_SEPARATOR};

pub use infrastructure_common::{ContainerConfig, InfrastructureError};
