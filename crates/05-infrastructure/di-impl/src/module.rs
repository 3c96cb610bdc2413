//! 模块：可重复导入的具名绑定声明集合

use crate::builder::Binder;
use infrastructure_common::DependencyResult;
use std::fmt;
use std::sync::Arc;

type ModuleInit = Arc<dyn Fn(&mut Binder<'_>) -> DependencyResult<()> + Send + Sync>;

/// 绑定模块
///
/// 每次导入都会重新执行声明函数
#[derive(Clone)]
pub struct Module {
    name: String,
    allow_silent_override: bool,
    prefix: String,
    init: ModuleInit,
}

impl Module {
    /// 创建具名模块
    pub fn new<F>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn(&mut Binder<'_>) -> DependencyResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            allow_silent_override: false,
            prefix: String::new(),
            init: Arc::new(init),
        }
    }

    /// 创建匿名模块，匿名模块可以导入多次
    pub fn anonymous<F>(init: F) -> Self
    where
        F: Fn(&mut Binder<'_>) -> DependencyResult<()> + Send + Sync + 'static,
    {
        Self::new(String::new(), init)
    }

    /// 允许模块中的绑定静默覆盖已有绑定
    pub fn with_silent_override(mut self, allow: bool) -> Self {
        self.allow_silent_override = allow;
        self
    }

    /// 模块中导入的子模块名称前缀
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// 模块名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否允许静默覆盖
    pub fn allow_silent_override(&self) -> bool {
        self.allow_silent_override
    }

    /// 子模块名称前缀
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn configure(&self, binder: &mut Binder<'_>) -> DependencyResult<()> {
        (self.init)(binder)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("allow_silent_override", &self.allow_silent_override)
            .field("prefix", &self.prefix)
            .finish()
    }
}
