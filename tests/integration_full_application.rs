/// Full application integration tests
///
/// These tests wire a small user-management application with ferrous-wire to make
/// sure producers, views, constructor/field/method injection, collections, config
/// loading and ordered teardown work together end-to-end.
use ferrous_wire::{
    ComponentDefinition, ComponentRegistry, ConfigProvider, ConfigValue, Container,
    ContainerConfig, DiError, FnProducer, Lifetime, MapConfigSource, Param, TracingObserver,
    TypeMetadata,
};
use std::sync::{Arc, Mutex};

type Shutdown = Arc<Mutex<Vec<&'static str>>>;

// ===== Logging Infrastructure =====

pub trait Logger: Send + Sync {
    fn log(&self, level: &str, message: &str);
    fn lines(&self) -> Vec<String>;
}

#[derive(Default)]
pub struct InMemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl Logger for InMemoryLogger {
    fn log(&self, level: &str, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("[{}] {}", level, message));
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

// ===== Data Layer =====

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

pub struct Database {
    pub url: String,
    rows: Mutex<Vec<User>>,
}

pub struct UserRepository {
    db: Arc<Database>,
    logger: Arc<dyn Logger>,
}

impl UserRepository {
    fn save(&self, name: &str, email: &str) -> u64 {
        let mut rows = self.db.rows.lock().unwrap();
        let id = rows.len() as u64 + 1;
        rows.push(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
        });
        self.logger.log("DEBUG", &format!("saved user {}", id));
        id
    }

    fn find(&self, id: u64) -> Option<User> {
        self.db.rows.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }
}

// ===== Business Layer =====

pub trait Validator: Send + Sync {
    fn check(&self, name: &str, email: &str) -> Result<(), String>;
}

pub struct EmailValidator;
pub struct NameValidator;

impl Validator for EmailValidator {
    fn check(&self, _name: &str, email: &str) -> Result<(), String> {
        if email.contains('@') {
            Ok(())
        } else {
            Err(format!("invalid email '{}'", email))
        }
    }
}

impl Validator for NameValidator {
    fn check(&self, name: &str, _email: &str) -> Result<(), String> {
        if name.trim().is_empty() {
            Err("empty name".to_string())
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct UserService {
    repository: Option<Arc<UserRepository>>,
    logger: Option<Arc<dyn Logger>>,
    validators: Vec<Arc<dyn Validator>>,
}

impl UserService {
    fn register(&self, name: &str, email: &str) -> Result<u64, String> {
        let logger = self.logger.as_ref().ok_or("logger missing")?;
        for validator in &self.validators {
            if let Err(reason) = validator.check(name, email) {
                logger.log("WARN", &reason);
                return Err(reason);
            }
        }
        let repository = self.repository.as_ref().ok_or("repository missing")?;
        Ok(repository.save(name, email))
    }
}

/// Per-request handler; a fresh one per lookup.
pub struct RegistrationHandler {
    service: Arc<UserService>,
}

// ===== Application Wiring =====

fn application(config: ContainerConfig, shutdown: &Shutdown) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();

    let log = shutdown.clone();
    registry.register_type(
        TypeMetadata::builder::<InMemoryLogger>()
            .constructor(vec![], |_| Ok(InMemoryLogger::default()))
            .view::<dyn Logger, _>(|l: Arc<InMemoryLogger>| -> Arc<dyn Logger> { l })
            .on_destroy(move |_| {
                log.lock().unwrap().push("logger");
                Ok(())
            })
            .build(),
    );

    let log = shutdown.clone();
    registry.register_type(
        TypeMetadata::builder::<Database>()
            .on_destroy(move |_| {
                log.lock().unwrap().push("database");
                Ok(())
            })
            .build(),
    );

    let log = shutdown.clone();
    registry.register_type(
        TypeMetadata::builder::<UserRepository>()
            .constructor(
                vec![Param::of::<Database>(), Param::of::<dyn Logger>()],
                |args| {
                    Ok(UserRepository {
                        db: args.get::<Database>(0)?,
                        logger: args.get_trait::<dyn Logger>(1)?,
                    })
                },
            )
            .on_destroy(move |_| {
                log.lock().unwrap().push("repository");
                Ok(())
            })
            .build(),
    );

    registry.register_type(
        TypeMetadata::builder::<EmailValidator>()
            .constructor(vec![], |_| Ok(EmailValidator))
            .view::<dyn Validator, _>(|v: Arc<EmailValidator>| -> Arc<dyn Validator> { v })
            .build(),
    );
    registry.register_type(
        TypeMetadata::builder::<NameValidator>()
            .constructor(vec![], |_| Ok(NameValidator))
            .view::<dyn Validator, _>(|v: Arc<NameValidator>| -> Arc<dyn Validator> { v })
            .build(),
    );

    let log = shutdown.clone();
    registry.register_type(
        TypeMetadata::builder::<UserService>()
            .constructor(vec![], |_| Ok(UserService::default()))
            .autowired_field(
                "repository",
                Param::of::<UserRepository>(),
                |s: &mut UserService, args| {
                    s.repository = Some(args.get::<UserRepository>(0)?);
                    Ok(())
                },
            )
            .autowired_field(
                "validators",
                Param::collection_of::<dyn Validator>(),
                |s: &mut UserService, args| {
                    s.validators = args.all_traits::<dyn Validator>(0)?;
                    Ok(())
                },
            )
            .autowired_method(
                "set_logger",
                vec![Param::of::<dyn Logger>()],
                |s: &mut UserService, args| {
                    s.logger = Some(args.get_trait::<dyn Logger>(0)?);
                    Ok(())
                },
            )
            .on_init(|s: &UserService| match &s.logger {
                Some(logger) => {
                    logger.log("INFO", "user service ready");
                    Ok(())
                }
                None => Err(DiError::Configuration {
                    component: "userService".to_string(),
                    message: "logger was not injected".to_string(),
                }),
            })
            .on_destroy(move |_| {
                log.lock().unwrap().push("service");
                Ok(())
            })
            .build(),
    );

    registry.register_type(
        TypeMetadata::builder::<RegistrationHandler>()
            .constructor(vec![Param::of::<UserService>()], |args| {
                Ok(RegistrationHandler {
                    service: args.get::<UserService>(0)?,
                })
            })
            .build(),
    );

    registry
        .register_definition(ComponentDefinition::of::<InMemoryLogger>("logger"))
        .unwrap();
    registry
        .register_definition(
            ComponentDefinition::produced_by(
                "database",
                Arc::new(FnProducer::new(|c: &Container| {
                    c.get_trait::<dyn Logger>()?.log("INFO", "opening database");
                    Ok(Database {
                        url: "postgres://localhost/app".to_string(),
                        rows: Mutex::new(Vec::new()),
                    })
                })),
            )
            .depends_on("logger"),
        )
        .unwrap();
    registry
        .register_definition(ComponentDefinition::of::<UserRepository>("userRepository"))
        .unwrap();
    registry
        .register_definition(ComponentDefinition::of::<EmailValidator>("emailValidator"))
        .unwrap();
    registry
        .register_definition(ComponentDefinition::of::<NameValidator>("nameValidator"))
        .unwrap();
    registry
        .register_definition(ComponentDefinition::of::<UserService>("userService"))
        .unwrap();
    registry
        .register_definition(
            ComponentDefinition::of::<RegistrationHandler>("handler").lifetime(Lifetime::Prototype),
        )
        .unwrap();

    registry.add_observer(Arc::new(TracingObserver::with_prefix("app")));
    registry.with_config(config);
    registry
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ===== End-to-end flow =====

#[test]
fn test_full_application_flow() {
    init_tracing();
    let shutdown = Shutdown::default();
    let container = application(ContainerConfig::default(), &shutdown)
        .build()
        .unwrap();

    let service = container.get::<UserService>().unwrap();
    let id = service.register("Ada", "ada@example.org").unwrap();
    assert_eq!(id, 1);

    let repository = container.get::<UserRepository>().unwrap();
    assert!(Arc::ptr_eq(service.repository.as_ref().unwrap(), &repository));
    assert_eq!(repository.find(1).unwrap().name, "Ada");
    assert_eq!(repository.db.url, "postgres://localhost/app");
    assert_eq!(service.validators.len(), 2);

    let logger = container.get_trait::<dyn Logger>().unwrap();
    assert_eq!(
        logger.lines(),
        vec![
            "[INFO] opening database".to_string(),
            "[INFO] user service ready".to_string(),
            "[DEBUG] saved user 1".to_string(),
        ]
    );
}

#[test]
fn test_validation_failures_do_not_touch_the_repository() {
    init_tracing();
    let shutdown = Shutdown::default();
    let container = application(ContainerConfig::default(), &shutdown)
        .build()
        .unwrap();

    let service = container.get::<UserService>().unwrap();
    assert_eq!(
        service.register("Bob", "bob.example.org").unwrap_err(),
        "invalid email 'bob.example.org'"
    );
    assert_eq!(service.register(" ", "x@y").unwrap_err(), "empty name");

    let repository = container.get::<UserRepository>().unwrap();
    assert!(repository.find(1).is_none());
    let lines = container.get_trait::<dyn Logger>().unwrap().lines();
    assert!(lines.contains(&"[WARN] empty name".to_string()));
}

#[test]
fn test_request_handlers_share_application_singletons() {
    init_tracing();
    let shutdown = Shutdown::default();
    let container = application(ContainerConfig::default(), &shutdown)
        .build()
        .unwrap();

    let first = container.get::<RegistrationHandler>().unwrap();
    let second = container.get::<RegistrationHandler>().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.service, &second.service));

    first.service.register("Ada", "ada@example.org").unwrap();
    assert_eq!(second.service.register("Grace", "grace@example.org").unwrap(), 2);
    assert!(container.is_prototype("handler").unwrap());
    assert!(!container.is_singleton_created("handler"));
}

// ===== Configuration =====

#[test]
fn test_configuration_propagation() {
    init_tracing();
    let mut provider = ConfigProvider::new();
    provider.add_source(Box::new(
        MapConfigSource::new()
            .set("singletons.pre_instantiate", ConfigValue::Boolean(true))
            .set("circular.allow", ConfigValue::Boolean(false))
            .set("creation.max_depth", ConfigValue::Integer(32)),
    ));
    let config = ContainerConfig::load(&provider);
    assert!(config.pre_instantiate_on_build);
    assert!(!config.allow_circular_references);
    assert_eq!(config.max_creation_depth, 32);
    assert!(config.allow_eager_type_check);

    let shutdown = Shutdown::default();
    let container = application(config.clone(), &shutdown).build().unwrap();
    assert_eq!(container.config(), &config);

    // every non-lazy singleton exists before the first lookup
    for name in ["logger", "database", "userRepository", "userService"] {
        assert!(container.is_singleton_created(name), "{} was not created", name);
    }
    assert!(!container.is_singleton_created("handler"));
}

// ===== Shutdown =====

#[test]
fn test_shutdown_runs_dependents_first() {
    init_tracing();
    let shutdown = Shutdown::default();
    let container = application(ContainerConfig::default(), &shutdown)
        .build()
        .unwrap();

    container.get::<UserService>().unwrap();
    container.destroy_singletons();

    assert_eq!(
        *shutdown.lock().unwrap(),
        vec!["service", "repository", "database", "logger"]
    );
    assert_eq!(container.singleton_count(), 0);
}
