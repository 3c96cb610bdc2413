//! 容器配置定义

use serde::{Deserialize, Serialize};

/// 容器配置
///
/// 所有字段都有默认值，配置文件中可以只给出需要修改的部分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 是否允许在未显式声明的情况下覆盖已有绑定
    pub allow_silent_override: bool,
    /// 未找到错误中是否列出所有已注册的绑定
    pub full_description_on_error: bool,
    /// 构建完成时是否立即执行就绪回调（包括预加载单例）
    ///
    /// 为 `false` 时回调延迟到 `Container::init()` 或第一次检索时执行
    pub run_ready_callbacks: bool,
}

impl ContainerConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self {
            allow_silent_override: false,
            full_description_on_error: false,
            run_ready_callbacks: true,
        }
    }

    /// 开发环境配置
    ///
    /// 允许静默覆盖并在错误中输出完整的绑定列表
    pub fn development() -> Self {
        Self {
            allow_silent_override: true,
            full_description_on_error: true,
            run_ready_callbacks: true,
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ContainerConfig::default();
        assert!(!config.allow_silent_override);
        assert!(!config.full_description_on_error);
        assert!(config.run_ready_callbacks);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ContainerConfig = toml::from_str("full_description_on_error = true").unwrap();
        assert!(config.full_description_on_error);
        assert!(config.run_ready_callbacks);
    }
}
