//! Service container
//!
//! String-token registry with singleton and transient lifetimes. Factories
//! receive a [`Resolver`] and pull their dependencies through it, so the
//! resolver sees the whole dependency chain and can refuse cycles instead of
//! recursing forever.
//!
//! ```rust,ignore
//! let container = ServiceContainer::new();
//! container.register_instance("settings", Arc::new(settings));
//! container.register("cache", Lifetime::Singleton, |r| {
//!     let settings: Arc<Settings> = r.resolve("settings")?;
//!     Ok(Arc::new(CacheStore::<String>::new(settings.cache.max_entries)))
//! });
//! let cache: Arc<CacheStore<String>> = container.resolve("cache")?;
//! ```
//!
//! Services are stored type-erased and cloned out on resolve, so register
//! `Arc<T>` or `Arc<dyn Trait>` values.

use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn(&mut Resolver<'_>) -> Result<Instance> + Send + Sync>;
type Teardown = Box<dyn Fn(&Instance) + Send + Sync>;

/// How long a resolved service lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Created on first resolve, reused afterwards
    Singleton,
    /// Created on every resolve
    Transient,
}

struct Registration {
    lifetime: Lifetime,
    factory: Factory,
    instance: Mutex<Option<Instance>>,
    teardown: Option<Teardown>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("lifetime", &self.lifetime)
            .field("instantiated", &self.instance.lock().is_some())
            .field("teardown", &self.teardown.is_some())
            .finish()
    }
}

/// Dependency injection registry
#[derive(Debug, Default)]
pub struct ServiceContainer {
    registrations: RwLock<HashMap<String, Arc<Registration>>>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. Re-registering a token replaces it.
    pub fn register<T, F>(&self, token: impl Into<String>, lifetime: Lifetime, factory: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&mut Resolver<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.insert(token.into(), lifetime, erase(factory), None, None);
    }

    /// Register a factory whose singleton instance needs cleanup on
    /// [`ServiceContainer::dispose`]
    pub fn register_with_teardown<T, F, D>(
        &self,
        token: impl Into<String>,
        lifetime: Lifetime,
        factory: F,
        teardown: D,
    ) where
        T: Clone + Send + Sync + 'static,
        F: Fn(&mut Resolver<'_>) -> Result<T> + Send + Sync + 'static,
        D: Fn(&T) + Send + Sync + 'static,
    {
        let teardown: Teardown = Box::new(move |instance: &Instance| {
            if let Some(value) = instance.downcast_ref::<T>() {
                teardown(value);
            }
        });
        self.insert(token.into(), lifetime, erase(factory), None, Some(teardown));
    }

    /// Register an already-built value as a singleton
    pub fn register_instance<T>(&self, token: impl Into<String>, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let instance: Instance = Arc::new(value.clone());
        let factory = erase(move |_: &mut Resolver<'_>| Ok(value.clone()));
        self.insert(
            token.into(),
            Lifetime::Singleton,
            factory,
            Some(instance),
            None,
        );
    }

    fn insert(
        &self,
        token: String,
        lifetime: Lifetime,
        factory: Factory,
        instance: Option<Instance>,
        teardown: Option<Teardown>,
    ) {
        let registration = Arc::new(Registration {
            lifetime,
            factory,
            instance: Mutex::new(instance),
            teardown,
        });
        if self
            .registrations
            .write()
            .insert(token.clone(), registration)
            .is_some()
        {
            warn!(token = %token, "Service re-registered, previous registration replaced");
        } else {
            debug!(token = %token, ?lifetime, "Service registered");
        }
    }

    pub fn is_registered(&self, token: &str) -> bool {
        self.registrations.read().contains_key(token)
    }

    /// Registered tokens, sorted
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.registrations.read().keys().cloned().collect();
        tokens.sort();
        tokens
    }

    /// Resolve a service by token
    pub fn resolve<T>(&self, token: &str) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Resolver::new(self).resolve(token)
    }

    fn registration(&self, token: &str) -> Option<Arc<Registration>> {
        self.registrations.read().get(token).cloned()
    }

    /// Run teardown hooks on every instantiated singleton and forget all
    /// registrations.
    pub fn dispose(&self) {
        let registrations: Vec<(String, Arc<Registration>)> =
            self.registrations.write().drain().collect();

        for (token, registration) in registrations {
            let instance = registration.instance.lock().take();
            if let (Some(instance), Some(teardown)) = (instance, registration.teardown.as_ref()) {
                debug!(token = %token, "Tearing down service");
                teardown(&instance);
            }
        }
    }
}

fn erase<T, F>(factory: F) -> Factory
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&mut Resolver<'_>) -> Result<T> + Send + Sync + 'static,
{
    Box::new(move |resolver: &mut Resolver<'_>| {
        factory(resolver).map(|value| Arc::new(value) as Instance)
    })
}

/// Per-resolve handle passed to factories
///
/// Tracks the chain of tokens currently being built.
pub struct Resolver<'a> {
    container: &'a ServiceContainer,
    stack: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(container: &'a ServiceContainer) -> Self {
        Self {
            container,
            stack: Vec::new(),
        }
    }

    /// Resolve a dependency from inside a factory
    pub fn resolve<T>(&mut self, token: &str) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let instance = self.resolve_erased(token)?;
        instance
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| Error::service_type::<T>(token))
    }

    /// Tokens currently under construction, outermost first
    pub fn chain(&self) -> &[String] {
        &self.stack
    }

    fn resolve_erased(&mut self, token: &str) -> Result<Instance> {
        if self.stack.iter().any(|t| t == token) {
            let mut chain = self.stack.clone();
            chain.push(token.to_string());
            return Err(Error::CircularDependency { chain });
        }

        let registration = self
            .container
            .registration(token)
            .ok_or_else(|| Error::NotRegistered(token.to_string()))?;

        self.stack.push(token.to_string());
        let result = self.instantiate(token, &registration);
        self.stack.pop();
        result
    }

    fn instantiate(&mut self, token: &str, registration: &Registration) -> Result<Instance> {
        match registration.lifetime {
            Lifetime::Transient => (registration.factory)(self),
            Lifetime::Singleton => {
                // Held across the factory call so concurrent first resolves
                // build the instance once
                let mut slot = registration.instance.lock();
                if let Some(instance) = slot.as_ref() {
                    return Ok(instance.clone());
                }
                let instance = (registration.factory)(self)?;
                debug!(token, "Singleton instantiated");
                *slot = Some(instance.clone());
                Ok(instance)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Config {
        name: String,
    }

    #[derive(Debug)]
    struct Service {
        config: Arc<Config>,
    }

    #[test]
    fn test_register_instance_and_resolve() {
        let container = ServiceContainer::new();
        container.register_instance(
            "config",
            Arc::new(Config {
                name: "test".into(),
            }),
        );

        let config: Arc<Config> = container.resolve("config").unwrap();
        assert_eq!(config.name, "test");
        assert!(container.is_registered("config"));
        assert!(!container.is_registered("missing"));
    }

    #[test]
    fn test_singleton_is_reused() {
        let container = ServiceContainer::new();
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();

        container.register_instance("config", Arc::new(Config { name: "a".into() }));
        container.register("service", Lifetime::Singleton, move |r| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Service {
                config: r.resolve("config")?,
            }))
        });

        let first: Arc<Service> = container.resolve("service").unwrap();
        let second: Arc<Service> = container.resolve("service").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(first.config.name, "a");
    }

    #[test]
    fn test_transient_creates_new_instances() {
        let container = ServiceContainer::new();
        container.register("config", Lifetime::Transient, |_| {
            Ok(Arc::new(Config { name: "t".into() }))
        });

        let first: Arc<Config> = container.resolve("config").unwrap();
        let second: Arc<Config> = container.resolve("config").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_circular_dependency_is_detected() {
        let container = ServiceContainer::new();
        container.register("a", Lifetime::Singleton, |r| {
            let b: Arc<String> = r.resolve("b")?;
            Ok(b)
        });
        container.register("b", Lifetime::Singleton, |r| {
            let a: Arc<String> = r.resolve("a")?;
            Ok(a)
        });

        let err = container.resolve::<Arc<String>>("a").unwrap_err();
        match &err {
            Error::CircularDependency { chain } => {
                assert_eq!(chain, &vec!["a".to_string(), "b".into(), "a".into()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains('a') && message.contains('b'));
    }

    #[test]
    fn test_failed_resolve_can_be_retried() {
        let container = ServiceContainer::new();
        container.register("a", Lifetime::Singleton, |r| {
            let dep: Arc<String> = r.resolve("dep")?;
            Ok(dep)
        });

        assert!(matches!(
            container.resolve::<Arc<String>>("a"),
            Err(Error::NotRegistered(token)) if token == "dep"
        ));

        container.register_instance("dep", Arc::new("ready".to_string()));
        let resolved: Arc<String> = container.resolve("a").unwrap();
        assert_eq!(resolved.as_str(), "ready");
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let container = ServiceContainer::new();
        container.register_instance("config", Arc::new(Config { name: "x".into() }));
        let err = container.resolve::<Arc<String>>("config").unwrap_err();
        assert!(matches!(err, Error::ServiceType { .. }));
    }

    #[test]
    fn test_dispose_runs_teardown_for_built_singletons() {
        let container = ServiceContainer::new();
        let torn_down = Arc::new(AtomicUsize::new(0));

        let counter = torn_down.clone();
        container.register_with_teardown(
            "built",
            Lifetime::Singleton,
            |_| Ok(Arc::new(Config { name: "b".into() })),
            move |_: &Arc<Config>| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        let counter = torn_down.clone();
        container.register_with_teardown(
            "never_built",
            Lifetime::Singleton,
            |_| Ok(Arc::new(Config { name: "n".into() })),
            move |_: &Arc<Config>| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        let _: Arc<Config> = container.resolve("built").unwrap();
        container.dispose();

        assert_eq!(torn_down.load(Ordering::SeqCst), 1);
        assert!(!container.is_registered("built"));
        assert!(container.tokens().is_empty());
    }
}
