use async_trait::async_trait;
use ferrous_wire::{
    AnyArc, AsyncDispose, ComponentDefinition, ComponentRegistry, DestructionHook, DiError,
    DiResult, Dispose, InstanceHook, LifecycleState, Lifetime, Param, TypeMetadata, Value,
};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

// ===== Test Components =====

struct Step {
    label: String,
    log: Log,
}

impl Dispose for Step {
    fn dispose(&self) {
        self.log.lock().unwrap().push(self.label.clone());
    }
}

fn step_meta(log: &Log) -> TypeMetadata {
    let log = log.clone();
    TypeMetadata::builder::<Step>()
        .constructor(vec![Param::of::<String>()], move |args| {
            Ok(Step {
                label: args.value::<String>(0)?,
                log: log.clone(),
            })
        })
        .disposable()
        .build()
}

fn step(name: &str) -> ComponentDefinition {
    ComponentDefinition::of::<Step>(name).constructor_arg(0, Value::text(name))
}

struct Pool {
    log: Log,
}

#[async_trait]
impl AsyncDispose for Pool {
    async fn dispose(&self) {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push("async".to_string());
    }
}

fn pool_meta(log: &Log) -> TypeMetadata {
    let log = log.clone();
    TypeMetadata::builder::<Pool>()
        .constructor(vec![], move |_| Ok(Pool { log: log.clone() }))
        .async_disposable()
        .on_destroy(|p: &Pool| {
            p.log.lock().unwrap().push("sync".to_string());
            Ok(())
        })
        .build()
}

struct Counter {
    value: u32,
}

fn counter_meta() -> TypeMetadata {
    TypeMetadata::builder::<Counter>()
        .constructor(vec![], |_| Ok(Counter { value: 1 }))
        .build()
}

// ===== Teardown order =====

#[test]
fn test_singletons_are_destroyed_in_reverse_creation_order() {
    let log: Log = Arc::default();
    let mut registry = ComponentRegistry::new();
    registry.register_type(step_meta(&log));
    registry.register_definition(step("first")).unwrap();
    registry
        .register_definition(step("second").depends_on("first"))
        .unwrap();
    registry
        .register_definition(step("third").depends_on("second"))
        .unwrap();
    let container = registry.build().unwrap();

    container.get_named::<Step>("third").unwrap();
    assert_eq!(container.singleton_count(), 3);

    container.destroy_singletons();
    assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
    assert_eq!(container.singleton_count(), 0);
    assert_eq!(container.lifecycle_state("first").unwrap(), LifecycleState::Destroyed);
}

#[test]
fn test_failing_destroy_callback_does_not_stop_teardown() {
    let log: Log = Arc::default();
    let mut registry = ComponentRegistry::new();
    registry.register_type(step_meta(&log));
    registry.register_type(
        TypeMetadata::builder::<Counter>()
            .constructor(vec![], |_| Ok(Counter { value: 0 }))
            .on_destroy(|_: &Counter| Err(DiError::Scope("disk gone".to_string())))
            .build(),
    );
    registry.register_definition(step("a")).unwrap();
    registry
        .register_definition(ComponentDefinition::of::<Counter>("fragile").depends_on("a"))
        .unwrap();
    registry.register_definition(step("b")).unwrap();
    let container = registry.build().unwrap();

    container.get::<Counter>().unwrap();
    container.get_named::<Step>("b").unwrap();

    container.destroy_singletons();
    assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    assert_eq!(container.lifecycle_state("fragile").unwrap(), LifecycleState::Destroyed);
}

#[test]
fn test_second_teardown_is_a_no_op() {
    let log: Log = Arc::default();
    let mut registry = ComponentRegistry::new();
    registry.register_type(step_meta(&log));
    registry.register_definition(step("only")).unwrap();
    let container = registry.build().unwrap();

    container.get::<Step>().unwrap();
    container.destroy_singletons();
    container.destroy_singletons();
    assert_eq!(log.lock().unwrap().len(), 1);
}

// ===== Destruction hooks =====

struct StepAuditor {
    seen: Log,
}

impl DestructionHook for StepAuditor {
    fn applies_to(&self, instance: &AnyArc) -> bool {
        instance.is::<Step>()
    }

    fn before_destroy(&self, name: &str, _instance: &AnyArc) -> DiResult<()> {
        self.seen.lock().unwrap().push(format!("hook:{}", name));
        Ok(())
    }
}

#[test]
fn test_destruction_hooks_run_before_callbacks_for_applicable_instances() {
    let log: Log = Arc::default();
    let mut registry = ComponentRegistry::new();
    registry.register_type(step_meta(&log));
    registry.register_type(counter_meta());
    registry.register_definition(step("step")).unwrap();
    registry
        .register_definition(ComponentDefinition::of::<Counter>("counter"))
        .unwrap();
    registry.add_destruction_hook(Arc::new(StepAuditor { seen: log.clone() }));
    let container = registry.build().unwrap();

    container.get::<Step>().unwrap();
    container.get::<Counter>().unwrap();
    container.destroy_singletons();

    assert_eq!(*log.lock().unwrap(), vec!["hook:step", "step"]);
}

#[test]
fn test_prototype_instances_are_destroyed_on_request() {
    let log: Log = Arc::default();
    let mut registry = ComponentRegistry::new();
    registry.register_type(step_meta(&log));
    registry
        .register_definition(step("job").lifetime(Lifetime::Prototype))
        .unwrap();
    let container = registry.build().unwrap();

    let job = container.get::<Step>().unwrap();
    container.destroy_singletons();
    assert!(log.lock().unwrap().is_empty());

    let any: AnyArc = job;
    container.destroy_instance("job", &any).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["job"]);
    assert!(matches!(
        container.destroy_instance("nothing", &any),
        Err(DiError::NoSuchComponent(_))
    ));
}

// ===== Instance hooks =====

struct Override;

impl InstanceHook for Override {
    fn after_init(&self, name: &str, instance: AnyArc) -> DiResult<AnyArc> {
        if name == "counter" {
            return Ok(Arc::new(Counter { value: 42 }));
        }
        Ok(instance)
    }
}

struct Swapper;

impl InstanceHook for Swapper {
    fn before_init(&self, _name: &str, _instance: AnyArc) -> DiResult<AnyArc> {
        Ok(Arc::new("not a counter".to_string()))
    }
}

struct Trace {
    tag: &'static str,
    priority: i32,
    log: Log,
}

impl InstanceHook for Trace {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn before_init(&self, name: &str, instance: AnyArc) -> DiResult<AnyArc> {
        self.log.lock().unwrap().push(format!("{}:before:{}", self.tag, name));
        Ok(instance)
    }

    fn after_init(&self, name: &str, instance: AnyArc) -> DiResult<AnyArc> {
        self.log.lock().unwrap().push(format!("{}:after:{}", self.tag, name));
        Ok(instance)
    }
}

#[test]
fn test_instance_hook_may_replace_with_same_type() {
    let mut registry = ComponentRegistry::new();
    registry.register_type(counter_meta());
    registry
        .register_definition(ComponentDefinition::of::<Counter>("counter"))
        .unwrap();
    registry.add_hook(Arc::new(Override));
    let container = registry.build().unwrap();

    assert_eq!(container.get::<Counter>().unwrap().value, 42);
}

#[test]
fn test_instance_hook_changing_the_type_is_rejected() {
    let mut registry = ComponentRegistry::new();
    registry.register_type(counter_meta());
    registry
        .register_definition(ComponentDefinition::of::<Counter>("counter"))
        .unwrap();
    registry.add_hook(Arc::new(Swapper));
    let container = registry.build().unwrap();

    let err = container.get::<Counter>().err().unwrap();
    assert!(err.is_configuration(), "unexpected error: {}", err);
    assert!(!container.is_singleton_created("counter"));
}

#[test]
fn test_hooks_wrap_init_callbacks_in_priority_order() {
    let log: Log = Arc::default();
    let init_log = log.clone();

    let mut registry = ComponentRegistry::new();
    registry.register_type(
        TypeMetadata::builder::<Counter>()
            .constructor(vec![], |_| Ok(Counter { value: 0 }))
            .on_init(move |_: &Counter| {
                init_log.lock().unwrap().push("init".to_string());
                Ok(())
            })
            .build(),
    );
    registry
        .register_definition(ComponentDefinition::of::<Counter>("c"))
        .unwrap();
    registry.add_hook(Arc::new(Trace { tag: "late", priority: 10, log: log.clone() }));
    registry.add_hook(Arc::new(Trace { tag: "early", priority: -5, log: log.clone() }));
    let container = registry.build().unwrap();

    container.get::<Counter>().unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["early:before:c", "late:before:c", "init", "early:after:c", "late:after:c"]
    );
}

// ===== Async teardown =====

#[tokio::test]
async fn test_async_disposal_runs_before_sync_callbacks() {
    let log: Log = Arc::default();
    let mut registry = ComponentRegistry::new();
    registry.register_type(pool_meta(&log));
    registry
        .register_definition(ComponentDefinition::of::<Pool>("pool"))
        .unwrap();
    let container = registry.build().unwrap();

    container.get::<Pool>().unwrap();
    container.destroy_singletons_async().await;

    assert_eq!(*log.lock().unwrap(), vec!["async", "sync"]);
    assert_eq!(container.lifecycle_state("pool").unwrap(), LifecycleState::Destroyed);
}

#[tokio::test]
async fn test_sync_teardown_skips_async_disposers() {
    let log: Log = Arc::default();
    let mut registry = ComponentRegistry::new();
    registry.register_type(pool_meta(&log));
    registry
        .register_definition(ComponentDefinition::of::<Pool>("pool"))
        .unwrap();
    let container = registry.build().unwrap();

    container.get::<Pool>().unwrap();
    container.destroy_singletons();

    assert_eq!(*log.lock().unwrap(), vec!["sync"]);
}

#[tokio::test]
async fn test_ancestor_disposers_run_during_async_teardown() {
    struct Service {
        pool: Pool,
    }

    let log: Log = Arc::default();
    let own = log.clone();
    let pool_log = log.clone();
    let mut registry = ComponentRegistry::new();
    registry.register_type(
        TypeMetadata::builder::<Service>()
            .constructor(vec![], move |_| {
                Ok(Service {
                    pool: Pool { log: pool_log.clone() },
                })
            })
            .on_destroy(move |_| {
                own.lock().unwrap().push("service".to_string());
                Ok(())
            })
            .parent::<Pool>(pool_meta(&log), |s| &s.pool, |s| &mut s.pool)
            .build(),
    );
    registry
        .register_definition(ComponentDefinition::of::<Service>("service"))
        .unwrap();
    let container = registry.build().unwrap();

    container.get::<Service>().unwrap();
    container.destroy_singletons_async().await;

    // async disposal of every level first, then sync callbacks most derived first
    assert_eq!(*log.lock().unwrap(), vec!["async", "service", "sync"]);
}
