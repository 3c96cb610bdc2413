//! 容器启动器
//!
//! 协调配置加载、日志初始化和容器构建的顺序

use crate::logging::{init_logging, LoggingConfig};
use crate::settings::ConfigLoader;
use di_abstractions::CopyMode;
use di_impl::{Container, ContainerBuilder, Module};
use infrastructure_common::{ContainerConfig, InfrastructureError, InfrastructureResult};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// 容器启动器
#[derive(Default)]
pub struct ContainerBootstrapper {
    loader: ConfigLoader,
    config: Option<ContainerConfig>,
    logging: Option<LoggingConfig>,
    modules: Vec<(Module, bool)>,
    parent: Option<(Arc<Container>, CopyMode)>,
}

impl ContainerBootstrapper {
    /// 创建新的启动器
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 TOML 文件加载容器配置
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.loader = self.loader.with_file(path);
        self
    }

    /// 设置读取容器配置的环境变量前缀
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.loader = self.loader.with_env_prefix(prefix);
        self
    }

    /// 直接给出容器配置，不再读取配置文件和环境变量
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 启动时初始化日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// 添加要导入的模块
    pub fn add_module(mut self, module: Module) -> Self {
        self.modules.push((module, false));
        self
    }

    /// 添加允许覆盖已有绑定的模块
    pub fn add_overriding_module(mut self, module: Module) -> Self {
        self.modules.push((module, true));
        self
    }

    /// 继承已有容器的绑定
    pub fn extending(mut self, parent: Arc<Container>, copy: CopyMode) -> Self {
        self.parent = Some((parent, copy));
        self
    }

    /// 启动并返回构建完成的容器
    pub fn bootstrap(self) -> InfrastructureResult<Container> {
        if let Some(logging) = &self.logging {
            init_logging(logging);
        }
        info!("开始启动容器");

        let config = match self.config {
            Some(config) => config,
            None => self.loader.load()?,
        };

        let mut builder = ContainerBuilder::with_config(config);
        if let Some((parent, copy)) = &self.parent {
            builder.extend(parent, true, copy)?;
        }
        for (module, allow_override) in &self.modules {
            builder.import(module, *allow_override).map_err(|e| {
                error!("导入模块 {} 失败: {}", module.name(), e);
                InfrastructureError::BootstrapFailed {
                    message: format!("导入模块 {} 失败: {}", module.name(), e),
                }
            })?;
        }

        let container = builder.build()?;
        info!("容器启动完成");
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_impl::{DirectDiExt, InstanceBinding, ProviderBinding};
    use std::io::Write;

    struct Greeting(String);

    fn greeting_module(text: &'static str) -> Module {
        Module::new(format!("greeting-{text}"), move |binder| {
            binder.bind(InstanceBinding::new(Arc::new(Greeting(text.to_string()))))?;
            Ok(())
        })
    }

    #[test]
    fn test_bootstrap_with_modules() {
        let container = ContainerBootstrapper::new()
            .with_config(ContainerConfig::default())
            .add_module(greeting_module("hello"))
            .bootstrap()
            .unwrap();

        assert_eq!(container.instance::<Greeting>().unwrap().0, "hello");
    }

    #[test]
    fn test_module_conflict_is_bootstrap_failure() {
        let err = ContainerBootstrapper::new()
            .with_config(ContainerConfig::default())
            .add_module(greeting_module("hello"))
            .add_module(greeting_module("bye"))
            .bootstrap()
            .unwrap_err();

        assert!(matches!(err, InfrastructureError::BootstrapFailed { .. }));
    }

    #[test]
    fn test_config_file_applied() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "full_description_on_error = true").unwrap();

        let container = ContainerBootstrapper::new()
            .with_config_file(file.path())
            .with_env_prefix("LORN_DI_BOOTSTRAP_TEST")
            .add_module(greeting_module("hello"))
            .bootstrap()
            .unwrap();

        let err = container.instance::<String>().unwrap_err();
        assert!(err.to_string().contains("bootstrapper::tests::Greeting"));
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContainerBootstrapper::new()
            .with_config_file(dir.path().join("absent.toml"))
            .bootstrap()
            .unwrap_err();

        assert!(matches!(err, InfrastructureError::ConfigError { .. }));
    }

    #[test]
    fn test_extending_parent() {
        let mut builder = ContainerBuilder::new();
        builder
            .bind(ProviderBinding::new(|_| Ok(Arc::new(Greeting("parent".to_string())))))
            .unwrap();
        let parent = Arc::new(builder.build().unwrap());

        let container = ContainerBootstrapper::new()
            .with_config(ContainerConfig::default())
            .extending(parent, CopyMode::NonCached)
            .bootstrap()
            .unwrap();

        assert_eq!(container.instance::<Greeting>().unwrap().0, "parent");
    }
}
