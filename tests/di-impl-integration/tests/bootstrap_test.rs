//! 通过组合层启动完整应用容器的集成测试

use di_impl::{
    BindingDiExt, DirectDiExt, InstanceBinding, Module, ProviderBinding, SingletonBinding,
};
use infrastructure_common::{ContainerConfig, DependencyError};
use infrastructure_composition::ContainerBootstrapper;
use std::sync::Arc;

trait Storage: Send + Sync {
    fn kind(&self) -> String;
}

struct MemoryStorage;

impl Storage for MemoryStorage {
    fn kind(&self) -> String {
        "memory".to_string()
    }
}

struct CachedStorage {
    inner: Arc<dyn Storage>,
}

impl Storage for CachedStorage {
    fn kind(&self) -> String {
        format!("cached({})", self.inner.kind())
    }
}

trait Handler: Send + Sync {
    fn route(&self) -> &'static str;
}

struct Health;
struct Users;

impl Handler for Health {
    fn route(&self) -> &'static str {
        "/health"
    }
}

impl Handler for Users {
    fn route(&self) -> &'static str {
        "/users"
    }
}

struct RequestContext {
    user: String,
}

#[derive(Debug)]
struct Greeting(String);

fn storage_module() -> Module {
    Module::new("storage", |binder| {
        binder.bind(SingletonBinding::<dyn Storage>::new(|_| {
            Ok(Arc::new(MemoryStorage) as Arc<dyn Storage>)
        }))?;
        Ok(())
    })
}

fn cache_module() -> Module {
    Module::new("cache", |binder| {
        binder.bind_overriding(SingletonBinding::<dyn Storage>::new(|di| {
            let inner = di.overridden_instance::<dyn Storage>()?;
            Ok(Arc::new(CachedStorage { inner }) as Arc<dyn Storage>)
        }))?;
        Ok(())
    })
}

fn web_module() -> Module {
    Module::new("web", |binder| {
        binder
            .bind_set::<dyn Handler>(None, None)?
            .add_in_set::<dyn Handler>(
                None,
                ProviderBinding::new(|_| Ok(Arc::new(Health) as Arc<dyn Handler>)),
            )?
            .add_in_set::<dyn Handler>(
                None,
                ProviderBinding::new(|_| Ok(Arc::new(Users) as Arc<dyn Handler>)),
            )?
            .bind(
                ProviderBinding::new(|di| {
                    let context = di.context::<RequestContext>().ok_or_else(|| {
                        DependencyError::not_found("RequestContext", "缺少请求上下文")
                    })?;
                    let storage = di.instance::<dyn Storage>()?;
                    Ok(Arc::new(Greeting(format!(
                        "{} via {}",
                        context.user,
                        storage.kind()
                    ))))
                })
                .in_context::<RequestContext>(),
            )?;
        Ok(())
    })
}

#[test]
fn test_application_container() {
    let container = ContainerBootstrapper::new()
        .with_config(ContainerConfig::default())
        .add_module(storage_module())
        .add_overriding_module(cache_module())
        .add_module(web_module())
        .bootstrap()
        .unwrap();

    let storage = container.instance::<dyn Storage>().unwrap();
    assert_eq!(storage.kind(), "cached(memory)");
    assert!(Arc::ptr_eq(
        &storage,
        &container.instance::<dyn Storage>().unwrap()
    ));

    let handlers = container.instance::<Vec<Arc<dyn Handler>>>().unwrap();
    let routes: Vec<&str> = handlers.iter().map(|handler| handler.route()).collect();
    assert_eq!(routes, vec!["/health", "/users"]);

    let request = Arc::new(RequestContext {
        user: "alice".to_string(),
    });
    let greeting = container.on(request).instance::<Greeting>().unwrap();
    assert_eq!(greeting.0, "alice via cached(memory)");
    assert!(container.instance::<Greeting>().unwrap_err().is_not_found());

    let description = container.description();
    assert!(description.contains("module cache {"));
    assert!(description.contains("module web {"));
}

#[test]
fn test_cache_module_requires_override_permission() {
    let err = ContainerBootstrapper::new()
        .with_config(ContainerConfig::default())
        .add_module(storage_module())
        .add_module(cache_module())
        .bootstrap()
        .err()
        .unwrap();
    assert!(err.to_string().contains("cache"));
}

#[test]
fn test_cache_module_alone_has_nothing_to_override() {
    let err = ContainerBootstrapper::new()
        .with_config(ContainerConfig::default())
        .add_overriding_module(cache_module())
        .bootstrap()
        .err()
        .unwrap();
    assert!(err.to_string().contains("必须覆盖"));
}

#[test]
fn test_constants_from_module() {
    let module = Module::new("settings", |binder| {
        binder
            .constant("host", String::from("localhost"))?
            .constant("port", 8080u16)?
            .bind(InstanceBinding::new(Arc::new(Greeting("hi".to_string()))))?;
        Ok(())
    });

    let container = ContainerBootstrapper::new()
        .with_config(ContainerConfig::default())
        .add_module(module)
        .bootstrap()
        .unwrap();

    assert_eq!(*container.instance_tagged::<String>("host").unwrap(), "localhost");
    assert_eq!(*container.instance_tagged::<u16>("port").unwrap(), 8080);
    assert_eq!(container.instance::<Greeting>().unwrap().0, "hi");
}
