//! 容器配置加载
//!
//! 配置来源按优先级从低到高：默认值、TOML 配置文件、环境变量

use infrastructure_common::{ConfigError, ConfigResult, ContainerConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// 默认环境变量前缀
pub const DEFAULT_ENV_PREFIX: &str = "LORN_DI";

/// 环境变量中嵌套键的分隔符
pub const ENV_SEPARATOR: &str = "__";

/// 容器配置加载器
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// 创建只读取环境变量的加载器
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// 添加 TOML 配置文件
    ///
    /// 文件必须存在，否则加载时返回 `FileNotFound`
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// 设置环境变量前缀
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// 环境变量前缀
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// 加载容器配置
    pub fn load(&self) -> ConfigResult<ContainerConfig> {
        let mut builder = config::Config::builder();

        if let Some(path) = &self.file {
            if !path.exists() {
                error!("配置文件不存在: {}", path.display());
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            debug!("加载配置文件: {}", path.display());
            builder = builder.add_source(
                config::File::from(path.as_path()).format(config::FileFormat::Toml),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(&self.env_prefix)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                error!("配置构建失败: {}", e);
                ConfigError::parse_error(e)
            })?;

        let config: ContainerConfig = settings.try_deserialize().map_err(|e| {
            error!("容器配置解析失败: {}", e);
            ConfigError::parse_error(e)
        })?;

        info!(
            "容器配置加载完成: allow_silent_override={}, full_description_on_error={}, run_ready_callbacks={}",
            config.allow_silent_override,
            config.full_description_on_error,
            config.run_ready_callbacks
        );
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let config = ConfigLoader::new()
            .with_env_prefix("LORN_DI_TEST_EMPTY")
            .load()
            .unwrap();
        assert_eq!(config, ContainerConfig::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "allow_silent_override = true").unwrap();
        writeln!(file, "run_ready_callbacks = false").unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .with_env_prefix("LORN_DI_TEST_FILE")
            .load()
            .unwrap();
        assert!(config.allow_silent_override);
        assert!(!config.full_description_on_error);
        assert!(!config.run_ready_callbacks);
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "full_description_on_error = false").unwrap();
        std::env::set_var("LORN_DI_TEST_ENV__FULL_DESCRIPTION_ON_ERROR", "true");

        let config = ConfigLoader::new()
            .with_file(file.path())
            .with_env_prefix("LORN_DI_TEST_ENV")
            .load()
            .unwrap();
        std::env::remove_var("LORN_DI_TEST_ENV__FULL_DESCRIPTION_ON_ERROR");

        assert!(config.full_description_on_error);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::new()
            .with_file(dir.path().join("missing.toml"))
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_invalid_value() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "run_ready_callbacks = \"sometimes\"").unwrap();

        let err = ConfigLoader::new()
            .with_file(file.path())
            .with_env_prefix("LORN_DI_TEST_INVALID")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
