//! 错误类型定义

use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ConfigError {
    /// 创建解析错误
    pub fn parse_error(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::ParseError {
            source: Box::new(source),
        }
    }
}

/// 依赖解析错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    /// 请求的键没有对应的绑定
    #[error("{message}")]
    NotFound { key: String, message: String },

    /// 解析路径上出现了重复的键
    #[error("检测到循环依赖:\n{chain}")]
    DependencyLoop { chain: String },

    /// 覆盖规则不满足，只在构建时产生
    #[error("绑定覆盖错误: {message}")]
    Overriding { message: String },

    /// 搜索条件没有匹配，或要求唯一匹配时匹配了多个
    #[error("{message}")]
    NoMatch { search: String, message: String },

    #[error("组件创建失败: {type_name}, 原因: {source}")]
    ComponentCreationFailed {
        type_name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// 同一线程在创建过程中再次进入同一个作用域键
    #[error("作用域重入: {key} 正在当前线程上创建")]
    ReentrantScope { key: String },

    #[error("组件注册失败: {type_name}, 原因: {message}")]
    RegistrationError { type_name: String, message: String },

    #[error("模块错误: {module}, 原因: {message}")]
    ModuleError { module: String, message: String },
}

impl DependencyError {
    /// 创建未找到错误
    pub fn not_found(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            key: key.into(),
            message: message.into(),
        }
    }

    /// 创建循环依赖错误
    pub fn dependency_loop(chain: impl Into<String>) -> Self {
        Self::DependencyLoop {
            chain: chain.into(),
        }
    }

    /// 创建覆盖错误
    pub fn overriding(message: impl Into<String>) -> Self {
        Self::Overriding {
            message: message.into(),
        }
    }

    /// 创建无匹配错误
    pub fn no_match(search: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NoMatch {
            search: search.into(),
            message: message.into(),
        }
    }

    /// 把创建函数的失败包装为组件创建错误
    pub fn creation_failed(
        type_name: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ComponentCreationFailed {
            type_name: type_name.into(),
            source: source.into(),
        }
    }

    /// 创建类型不匹配错误
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// 创建模块错误
    pub fn module_error(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModuleError {
            module: module.into(),
            message: message.into(),
        }
    }

    /// 是否为未找到错误
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// 是否为循环依赖错误
    pub fn is_dependency_loop(&self) -> bool {
        matches!(self, Self::DependencyLoop { .. })
    }
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("依赖注入错误: {source}")]
    DependencyError {
        #[from]
        source: DependencyError,
    },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_displays_message_only() {
        let err = DependencyError::not_found("bind<String>()", "没有找到 bind<String>() 的绑定");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "没有找到 bind<String>() 的绑定");
    }

    #[test]
    fn test_creation_failed_keeps_source() {
        let err = DependencyError::creation_failed("Service", "连接被拒绝");
        let message = err.to_string();
        assert!(message.contains("Service"));
        assert!(message.contains("连接被拒绝"));
    }

    #[test]
    fn test_infrastructure_error_from_dependency_error() {
        let err: InfrastructureError = DependencyError::dependency_loop("A -> B -> A").into();
        assert!(matches!(err, InfrastructureError::DependencyError { .. }));
    }
}
