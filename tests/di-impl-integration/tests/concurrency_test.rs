//! 多线程解析的集成测试

use di_abstractions::CopyMode;
use di_impl::{
    Container, ContainerBuilder, DirectDiExt, EagerSingletonBinding, MultitonBinding,
    ProviderBinding, RefMaker, SingletonBinding, WeakContextScope,
};
use infrastructure_common::DependencyResult;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;

struct Database {
    id: usize,
}

struct Repository {
    database: Arc<Database>,
}

struct Session {
    user: String,
}

/// 在 `THREADS` 个阻塞线程上同时执行 `task`
async fn run_concurrently<R, F>(container: Arc<Container>, task: F) -> Vec<R>
where
    R: Send + 'static,
    F: Fn(&Container, usize) -> R + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(THREADS));
    let task = Arc::new(task);

    let handles: Vec<_> = (0..THREADS)
        .map(|index| {
            let barrier = Arc::clone(&barrier);
            let container = Arc::clone(&container);
            let task = Arc::clone(&task);
            tokio::task::spawn_blocking(move || {
                barrier.wait();
                task(&container, index)
            })
        })
        .collect();

    let mut results = Vec::with_capacity(THREADS);
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

fn slow_database(calls: Arc<AtomicUsize>) -> SingletonBinding<Database> {
    SingletonBinding::new(move |_| {
        let id = calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(Arc::new(Database { id }))
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn test_singleton_created_once_across_threads() {
    let calls = Arc::new(AtomicUsize::new(0));

    let mut builder = ContainerBuilder::new();
    builder
        .bind(slow_database(Arc::clone(&calls)))
        .unwrap()
        .bind(ProviderBinding::new(|di| {
            Ok(Arc::new(Repository {
                database: di.instance::<Database>()?,
            }))
        }))
        .unwrap();
    let container = Arc::new(builder.build().unwrap());

    let repositories = run_concurrently(container, |container, _| {
        container.instance::<Repository>().unwrap()
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first = &repositories[0].database;
    assert!(repositories
        .iter()
        .all(|repository| Arc::ptr_eq(&repository.database, first)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_multiton_created_once_per_argument() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut builder = ContainerBuilder::new();
    builder
        .bind(MultitonBinding::new(move |_, user: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            Ok(Arc::new(Session { user }))
        }))
        .unwrap();
    let container = Arc::new(builder.build().unwrap());

    let sessions = run_concurrently(container, |container, index| {
        let user = format!("user-{}", index % 2);
        container.instance_with::<String, Session>(user).unwrap()
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    for (index, session) in sessions.iter().enumerate() {
        assert_eq!(session.user, format!("user-{}", index % 2));
        assert!(Arc::ptr_eq(session, &sessions[index % 2]));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_thread_local_singleton_per_thread() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut builder = ContainerBuilder::new();
    builder
        .bind(
            SingletonBinding::new(move |_| {
                let id = counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Database { id }))
            })
            .with_ref_maker(RefMaker::ThreadLocal),
        )
        .unwrap();
    let container = Arc::new(builder.build().unwrap());

    let pairs = run_concurrently(container, |container, _| {
        let first = container.instance::<Database>().unwrap();
        let second = container.instance::<Database>().unwrap();
        (first, second)
    })
    .await;

    for (first, second) in &pairs {
        assert!(Arc::ptr_eq(first, second));
    }
    let mut ids: Vec<usize> = pairs.iter().map(|(first, _)| first.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), THREADS);
    assert_eq!(calls.load(Ordering::SeqCst), THREADS);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_context_scope_isolated_per_thread() {
    let scope = Arc::new(WeakContextScope::new());

    let mut builder = ContainerBuilder::new();
    builder
        .bind(
            SingletonBinding::new(|di| {
                let session = di.context::<Session>().map(|session| session.user.clone());
                Ok(Arc::new(Repository {
                    database: Arc::new(Database {
                        id: session.map_or(0, |user| user.len()),
                    }),
                }))
            })
            .in_scope(scope.clone())
            .in_context::<Session>(),
        )
        .unwrap();
    let container = Arc::new(builder.build().unwrap());

    let results = run_concurrently(container, |container, index| {
        let session = Arc::new(Session {
            user: "u".repeat(index + 1),
        });
        let on_session = container.on(Arc::clone(&session));
        let first = on_session.instance::<Repository>().unwrap();
        let second = on_session.instance::<Repository>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        first.database.id
    })
    .await;

    let mut ids = results;
    ids.sort_unstable();
    assert_eq!(ids, (1..=THREADS).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dependency_loop_detected_on_every_thread() {
    struct Left;
    struct Right;

    let mut builder = ContainerBuilder::new();
    builder
        .bind(ProviderBinding::new(|di| {
            di.instance::<Right>()?;
            Ok(Arc::new(Left))
        }))
        .unwrap()
        .bind(ProviderBinding::new(|di| {
            di.instance::<Left>()?;
            Ok(Arc::new(Right))
        }))
        .unwrap();
    let container = Arc::new(builder.build().unwrap());

    let results = run_concurrently(container, |container, index| {
        if index % 2 == 0 {
            container.instance::<Left>().map(|_| ())
        } else {
            container.instance::<Right>().map(|_| ())
        }
    })
    .await;

    assert!(results
        .into_iter()
        .all(|result: DependencyResult<()>| result.unwrap_err().is_dependency_loop()));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_eager_singleton_shared_with_extended_container() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut builder = ContainerBuilder::new();
    builder
        .bind(EagerSingletonBinding::new(move |_| {
            let id = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Database { id }))
        }))
        .unwrap();
    let parent = builder.build().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let mut builder = ContainerBuilder::new();
    builder.extend(&parent, true, &CopyMode::NonCached).unwrap();
    let child = Arc::new(builder.build().unwrap());

    let databases = run_concurrently(child, |container, _| {
        container.instance::<Database>().unwrap()
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let from_parent = parent.instance::<Database>().unwrap();
    assert!(databases
        .iter()
        .all(|database| Arc::ptr_eq(database, &from_parent)));
}
