//! 容器构建器
//!
//! [`ContainerBuilder`] 持有构建状态；[`Binder`] 是声明绑定的入口，
//! 每个导入的模块得到一个带自己覆盖方式和名称前缀的子 `Binder`，
//! 所有 `Binder` 共享同一个构建状态。

use crate::bindings::{InstanceBinding, SetBinding};
use crate::container::Container;
use crate::copy::key_set;
use crate::module::Module;
use crate::registry::{BindingRegistry, Definition};
use crate::tree::BindingTree;
use di_abstractions::{
    Binding, CopyMode, DirectDi, ExternalSource, Key, OverridePermission, ReadyCallback, Tag,
};
use infrastructure_common::{ContainerConfig, DependencyError, DependencyResult, TypeInfo};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 覆盖方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideMode {
    /// 允许不声明就覆盖
    AllowSilent,
    /// 只允许显式声明的覆盖
    AllowExplicit,
    /// 禁止覆盖
    Forbid,
}

impl OverrideMode {
    /// 由覆盖许可得到覆盖方式
    pub fn get(allow: bool, silent: bool) -> Self {
        if !allow {
            Self::Forbid
        } else if silent {
            Self::AllowSilent
        } else {
            Self::AllowExplicit
        }
    }

    /// 是否允许覆盖
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Forbid)
    }

    /// 把绑定的覆盖声明转换为是否必须覆盖
    ///
    /// `Some(true)` 必须覆盖，`Some(false)` 不得覆盖，`None` 不限制
    pub fn must(&self, overrides: Option<bool>) -> DependencyResult<Option<bool>> {
        match self {
            Self::AllowSilent => Ok(overrides),
            Self::AllowExplicit => Ok(Some(overrides.unwrap_or(false))),
            Self::Forbid if overrides == Some(true) => {
                Err(DependencyError::overriding("覆盖已被禁止"))
            }
            Self::Forbid => Ok(Some(false)),
        }
    }

    /// 覆盖声明对应的覆盖许可
    pub fn permission(&self, overrides: Option<bool>) -> DependencyResult<OverridePermission> {
        self.must(overrides)
            .map(OverridePermission::from_declaration)
    }

    /// 检查是否可以授予覆盖许可
    pub fn check_match(&self, allow_override: bool) -> DependencyResult<()> {
        if !self.is_allowed() && allow_override {
            warn!("覆盖已被禁止，不能授予覆盖许可");
            return Err(DependencyError::overriding("覆盖已被禁止"));
        }
        Ok(())
    }
}

/// 构建状态
#[derive(Default)]
struct BuildState {
    registry: BindingRegistry,
    callbacks: Vec<ReadyCallback>,
    imported_modules: HashSet<String>,
    external_sources: Vec<Arc<dyn ExternalSource>>,
}

/// 绑定声明入口
pub struct Binder<'a> {
    state: &'a mut BuildState,
    module_name: Option<String>,
    prefix: String,
    mode: OverrideMode,
}

impl<'a> Binder<'a> {
    /// 声明绑定，键的类型是绑定创建的类型
    pub fn bind(&mut self, binding: impl Binding) -> DependencyResult<&mut Self> {
        self.bind_with(None, None, Arc::new(binding))
    }

    /// 声明带标签的绑定
    pub fn bind_tagged(
        &mut self,
        tag: impl Into<Tag>,
        binding: impl Binding,
    ) -> DependencyResult<&mut Self> {
        self.bind_with(Some(tag.into()), None, Arc::new(binding))
    }

    /// 声明覆盖已有绑定的绑定
    pub fn bind_overriding(&mut self, binding: impl Binding) -> DependencyResult<&mut Self> {
        self.bind_with(None, Some(true), Arc::new(binding))
    }

    /// 以完整参数声明绑定
    ///
    /// `overrides` 为 `Some(true)` 必须覆盖，`Some(false)` 不得覆盖，
    /// `None` 由当前覆盖方式决定
    pub fn bind_with(
        &mut self,
        tag: Option<Tag>,
        overrides: Option<bool>,
        binding: Arc<dyn Binding>,
    ) -> DependencyResult<&mut Self> {
        let key = Key::new(
            binding.context_type(),
            binding.arg_type(),
            binding.created_type(),
            tag,
        );
        let permission = self.mode.permission(overrides).map_err(|err| {
            warn!("拒绝绑定 {}: {}", key, err);
            err
        })?;

        let callback = Arc::clone(&binding).ready_callback(&key);
        self.state.registry.bind(
            key,
            Definition::new(binding, self.module_name.clone()),
            permission,
        )?;
        if let Some(callback) = callback {
            self.state.callbacks.push(callback);
        }
        Ok(self)
    }

    /// 声明常量：带标签的实例绑定
    pub fn constant<T>(&mut self, tag: impl Into<Tag>, value: T) -> DependencyResult<&mut Self>
    where
        T: Send + Sync + 'static,
    {
        self.bind_tagged(tag, InstanceBinding::new(Arc::new(value)))
    }

    /// 声明元素类型为 `T` 的集合绑定，检索类型为 `Vec<Arc<T>>`
    pub fn bind_set<T>(
        &mut self,
        tag: Option<Tag>,
        overrides: Option<bool>,
    ) -> DependencyResult<&mut Self>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.bind_with(tag, overrides, Arc::new(SetBinding::<T>::new()))
    }

    /// 向已声明的集合绑定添加元素
    pub fn add_in_set<T>(
        &mut self,
        tag: Option<Tag>,
        element: impl Binding,
    ) -> DependencyResult<&mut Self>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let set_key = Key::new(
            TypeInfo::any(),
            TypeInfo::unit(),
            TypeInfo::of::<Vec<Arc<T>>>(),
            tag,
        );
        let type_name = std::any::type_name::<T>();

        let definition = self.state.registry.active(&set_key).ok_or_else(|| {
            DependencyError::RegistrationError {
                type_name: type_name.to_string(),
                message: format!("没有找到集合绑定 {set_key}"),
            }
        })?;
        let set = definition
            .binding
            .as_any()
            .downcast_ref::<SetBinding<T>>()
            .ok_or_else(|| DependencyError::RegistrationError {
                type_name: type_name.to_string(),
                message: format!(
                    "{set_key} 绑定的是 {}，不是集合绑定",
                    definition.binding.kind().factory_name()
                ),
            })?;
        if definition.shared {
            warn!("拒绝向继承的集合 {} 添加元素", set_key);
            return Err(DependencyError::RegistrationError {
                type_name: type_name.to_string(),
                message: format!("集合绑定 {set_key} 与父容器共享，需要复制后才能添加元素"),
            });
        }

        set.add(Arc::new(element))?;
        debug!("集合 {} 添加元素", set_key);
        Ok(self)
    }

    /// 导入模块
    ///
    /// 具名模块在一次构建中只能导入一次
    pub fn import(&mut self, module: &Module, allow_override: bool) -> DependencyResult<&mut Self> {
        let name = format!("{}{}", self.prefix, module.name());
        if !name.is_empty() && self.state.imported_modules.contains(&name) {
            return Err(DependencyError::module_error(name, "模块已经导入过"));
        }
        self.mode.check_match(allow_override)?;
        self.state.imported_modules.insert(name.clone());

        info!("导入模块: {}", if name.is_empty() { "<匿名>" } else { name.as_str() });
        let mut sub = Binder {
            state: &mut *self.state,
            module_name: (!name.is_empty()).then_some(name),
            prefix: format!("{}{}", self.prefix, module.prefix()),
            mode: OverrideMode::get(allow_override, module.allow_silent_override()),
        };
        module.configure(&mut sub)?;
        Ok(self)
    }

    /// 依次导入多个模块
    pub fn import_all<'m>(
        &mut self,
        modules: impl IntoIterator<Item = &'m Module>,
        allow_override: bool,
    ) -> DependencyResult<&mut Self> {
        for module in modules {
            self.import(module, allow_override)?;
        }
        Ok(self)
    }

    /// 导入模块，已经导入过时什么也不做
    ///
    /// 只接受具名模块
    pub fn import_once(
        &mut self,
        module: &Module,
        allow_override: bool,
    ) -> DependencyResult<&mut Self> {
        if module.name().is_empty() {
            return Err(DependencyError::module_error(
                "<匿名>",
                "import_once 只接受具名模块",
            ));
        }
        let name = format!("{}{}", self.prefix, module.name());
        if self.state.imported_modules.contains(&name) {
            debug!("模块已导入，跳过: {}", name);
            return Ok(self);
        }
        self.import(module, allow_override)
    }

    /// 注册容器就绪时执行的回调
    pub fn on_ready<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&dyn DirectDi) -> DependencyResult<()> + Send + 'static,
    {
        self.state.callbacks.push(Box::new(callback));
        self
    }

    /// 当前模块名称
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// 当前覆盖方式
    pub fn override_mode(&self) -> OverrideMode {
        self.mode
    }
}

/// 容器构建器
pub struct ContainerBuilder {
    state: BuildState,
    config: ContainerConfig,
}

impl ContainerBuilder {
    /// 使用默认配置创建构建器
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// 使用给定配置创建构建器
    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            state: BuildState::default(),
            config,
        }
    }

    /// 构建配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 顶层绑定声明入口
    pub fn binder(&mut self) -> Binder<'_> {
        let mode = OverrideMode::get(true, self.config.allow_silent_override);
        Binder {
            state: &mut self.state,
            module_name: None,
            prefix: String::new(),
            mode,
        }
    }

    /// 见 [`Binder::bind`]
    pub fn bind(&mut self, binding: impl Binding) -> DependencyResult<&mut Self> {
        self.binder().bind(binding)?;
        Ok(self)
    }

    /// 见 [`Binder::bind_tagged`]
    pub fn bind_tagged(
        &mut self,
        tag: impl Into<Tag>,
        binding: impl Binding,
    ) -> DependencyResult<&mut Self> {
        self.binder().bind_tagged(tag, binding)?;
        Ok(self)
    }

    /// 见 [`Binder::bind_overriding`]
    pub fn bind_overriding(&mut self, binding: impl Binding) -> DependencyResult<&mut Self> {
        self.binder().bind_overriding(binding)?;
        Ok(self)
    }

    /// 见 [`Binder::bind_with`]
    pub fn bind_with(
        &mut self,
        tag: Option<Tag>,
        overrides: Option<bool>,
        binding: Arc<dyn Binding>,
    ) -> DependencyResult<&mut Self> {
        self.binder().bind_with(tag, overrides, binding)?;
        Ok(self)
    }

    /// 见 [`Binder::constant`]
    pub fn constant<T>(&mut self, tag: impl Into<Tag>, value: T) -> DependencyResult<&mut Self>
    where
        T: Send + Sync + 'static,
    {
        self.binder().constant(tag, value)?;
        Ok(self)
    }

    /// 见 [`Binder::bind_set`]
    pub fn bind_set<T>(
        &mut self,
        tag: Option<Tag>,
        overrides: Option<bool>,
    ) -> DependencyResult<&mut Self>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.binder().bind_set::<T>(tag, overrides)?;
        Ok(self)
    }

    /// 见 [`Binder::add_in_set`]
    pub fn add_in_set<T>(
        &mut self,
        tag: Option<Tag>,
        element: impl Binding,
    ) -> DependencyResult<&mut Self>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.binder().add_in_set::<T>(tag, element)?;
        Ok(self)
    }

    /// 见 [`Binder::import`]
    pub fn import(&mut self, module: &Module, allow_override: bool) -> DependencyResult<&mut Self> {
        self.binder().import(module, allow_override)?;
        Ok(self)
    }

    /// 见 [`Binder::import_all`]
    pub fn import_all<'m>(
        &mut self,
        modules: impl IntoIterator<Item = &'m Module>,
        allow_override: bool,
    ) -> DependencyResult<&mut Self> {
        self.binder().import_all(modules, allow_override)?;
        Ok(self)
    }

    /// 见 [`Binder::import_once`]
    pub fn import_once(
        &mut self,
        module: &Module,
        allow_override: bool,
    ) -> DependencyResult<&mut Self> {
        self.binder().import_once(module, allow_override)?;
        Ok(self)
    }

    /// 见 [`Binder::on_ready`]
    pub fn on_ready<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&dyn DirectDi) -> DependencyResult<()> + Send + 'static,
    {
        self.binder().on_ready(callback);
        self
    }

    /// 注册外部来源，只有在没有任何绑定匹配时才会被询问
    pub fn register_external_source(&mut self, source: impl ExternalSource + 'static) -> &mut Self {
        self.state.external_sources.push(Arc::new(source));
        self
    }

    /// 继承已有容器的全部绑定
    ///
    /// 未被复制的绑定与原容器共享缓存实例；`allow_override` 为假时
    /// 原容器的绑定不能与已声明的绑定冲突
    pub fn extend(
        &mut self,
        container: &Container,
        allow_override: bool,
        copy: &CopyMode,
    ) -> DependencyResult<&mut Self> {
        let mode = OverrideMode::get(true, self.config.allow_silent_override);
        mode.check_match(allow_override)?;

        let tree = container.tree();
        let keys = key_set(copy, tree)?;
        let check = if allow_override {
            None
        } else {
            mode.must(None)?
                .map(|must| OverridePermission::from_declaration(Some(must)))
        };

        let copied = self.state.registry.extend(tree, &keys, check)?;
        for (key, binding) in &copied {
            if let Some(callback) = Arc::clone(binding).ready_callback(key) {
                self.state.callbacks.push(callback);
            }
        }

        self.state
            .external_sources
            .extend(tree.external_sources().iter().cloned());
        for key in tree.keys() {
            self.state.imported_modules.extend(
                tree.definitions(key)
                    .iter()
                    .filter_map(|definition| definition.from_module.clone()),
            );
        }

        info!(
            "扩展容器: 继承 {} 个绑定, 复制 {} 个",
            tree.len(),
            keys.len()
        );
        Ok(self)
    }

    /// 构建容器
    pub fn build(self) -> DependencyResult<Container> {
        let state = self.state;
        info!(
            "开始构建容器: {} 个绑定, {} 个就绪回调",
            state.registry.len(),
            state.callbacks.len()
        );
        let tree = Arc::new(BindingTree::new(state.registry, state.external_sources));
        Container::new(tree, state.callbacks, &self.config)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
