//! Endpoint module loading and dependency substitution.
//!
//! An endpoint is registered as a *module factory*: a function that builds
//! the endpoint from the dependencies it `require`s. Loading runs the factory
//! again for every invocation, so there is no module cache and a [`MockMap`]
//! only affects the instance built for the call it was passed to.
//!
//! ```rust,ignore
//! registry.provide("postcodes", Arc::new(HttpPostcodes::default()) as Arc<dyn Postcodes>);
//! registry.register("search", |scope| {
//!     let postcodes: Arc<dyn Postcodes> = scope.require("postcodes")?;
//!     Ok(Box::new(Search { postcodes }))
//! });
//! ```

use crate::runtime::invoker::Invocation;
use crate::runtime::response::Response;
use crate::{HarnessError, Result};
use futures_util::future::BoxFuture;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Future returned by an endpoint. `Ok(None)` means the endpoint settled (or
/// will settle) its result through [`Invocation::set_response`].
pub type EndpointFuture = BoxFuture<'static, anyhow::Result<Option<Response>>>;

type Dependency = Arc<dyn Any + Send + Sync>;

type ModuleFactory =
    Arc<dyn Fn(&ModuleScope<'_>) -> anyhow::Result<Box<dyn Endpoint>> + Send + Sync>;

/// The calling convention every endpoint implements.
pub trait Endpoint: Send + Sync {
    fn call(&self, invocation: Invocation) -> EndpointFuture;
}

impl<F, Fut> Endpoint for F
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<Response>>> + Send + 'static,
{
    fn call(&self, invocation: Invocation) -> EndpointFuture {
        Box::pin((self)(invocation))
    }
}

/// Resolves an endpoint name to a ready-to-call instance.
pub trait ModuleLoader: Send + Sync {
    /// Build the endpoint, substituting every entry of `mocks` for the
    /// dependency with the same identifier.
    fn load(&self, endpoint: &str, mocks: Option<&MockMap>) -> Result<Box<dyn Endpoint>>;
}

/// Replacement dependencies for a single invocation.
#[derive(Clone, Default)]
pub struct MockMap {
    entries: BTreeMap<String, Dependency>,
}

impl MockMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, dependency: impl Into<String>, value: T) -> Self {
        self.insert(dependency, value);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, dependency: impl Into<String>, value: T) {
        self.entries.insert(dependency.into(), Arc::new(value));
    }

    pub fn contains(&self, dependency: &str) -> bool {
        self.entries.contains_key(dependency)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get(&self, dependency: &str) -> Option<&Dependency> {
        self.entries.get(dependency)
    }
}

impl fmt::Debug for MockMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// What a module factory sees while an endpoint is being loaded.
pub struct ModuleScope<'a> {
    endpoint: &'a str,
    dependencies: &'a HashMap<String, Dependency>,
    mocks: Option<&'a MockMap>,
}

impl ModuleScope<'_> {
    pub fn endpoint(&self) -> &str {
        self.endpoint
    }

    /// Resolve a dependency, preferring the mock registered for this call.
    pub fn require<T: Any + Clone + Send + Sync>(&self, dependency: &str) -> Result<T> {
        let value = self
            .mocks
            .and_then(|mocks| mocks.get(dependency))
            .or_else(|| self.dependencies.get(dependency))
            .ok_or_else(|| HarnessError::MissingDependency {
                endpoint: self.endpoint.to_string(),
                dependency: dependency.to_string(),
            })?;

        (**value)
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| HarnessError::DependencyType {
                endpoint: self.endpoint.to_string(),
                dependency: dependency.to_string(),
            })
    }

    pub fn is_mocked(&self, dependency: &str) -> bool {
        self.mocks.is_some_and(|mocks| mocks.contains(dependency))
    }
}

/// In-process registry of endpoint modules and the real dependencies they
/// are built from.
#[derive(Clone, Default)]
pub struct EndpointRegistry {
    modules: HashMap<String, ModuleFactory>,
    dependencies: HashMap<String, Dependency>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module factory for `endpoint`.
    pub fn register<F>(&mut self, endpoint: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ModuleScope<'_>) -> anyhow::Result<Box<dyn Endpoint>> + Send + Sync + 'static,
    {
        self.modules.insert(endpoint.into(), Arc::new(factory));
        self
    }

    /// Register an endpoint that needs no dependencies.
    pub fn register_fn<E>(&mut self, endpoint: impl Into<String>, function: E) -> &mut Self
    where
        E: Endpoint + Clone + 'static,
    {
        self.register(endpoint, move |_| Ok(Box::new(function.clone()) as Box<dyn Endpoint>))
    }

    /// Make a real dependency available under `dependency`.
    pub fn provide<T: Any + Send + Sync>(
        &mut self,
        dependency: impl Into<String>,
        value: T,
    ) -> &mut Self {
        self.dependencies.insert(dependency.into(), Arc::new(value));
        self
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.modules.contains_key(endpoint)
    }
}

impl ModuleLoader for EndpointRegistry {
    fn load(&self, endpoint: &str, mocks: Option<&MockMap>) -> Result<Box<dyn Endpoint>> {
        let factory = self
            .modules
            .get(endpoint)
            .ok_or_else(|| HarnessError::ModuleNotFound(endpoint.to_string()))?;

        if let Some(mocks) = mocks {
            if let Some(unknown) = mocks.ids().find(|id| !self.dependencies.contains_key(*id)) {
                return Err(HarnessError::MockTargetNotFound {
                    endpoint: endpoint.to_string(),
                    dependency: unknown.to_string(),
                });
            }
        }

        debug!(
            endpoint,
            mocks = ?mocks.map(|m| m.ids().collect::<Vec<_>>()),
            "Loading endpoint module"
        );

        let scope = ModuleScope {
            endpoint,
            dependencies: &self.dependencies,
            mocks,
        };

        factory(&scope).map_err(|source| match source.downcast::<HarnessError>() {
            Ok(error) => error,
            Err(source) => HarnessError::Load {
                endpoint: endpoint.to_string(),
                source,
            },
        })
    }
}

impl fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut endpoints: Vec<_> = self.modules.keys().collect();
        endpoints.sort();
        let mut dependencies: Vec<_> = self.dependencies.keys().collect();
        dependencies.sort();
        f.debug_struct("EndpointRegistry")
            .field("endpoints", &endpoints)
            .field("dependencies", &dependencies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Real;
    impl Greeter for Real {
        fn greet(&self) -> String {
            "real".into()
        }
    }

    struct Fake;
    impl Greeter for Fake {
        fn greet(&self) -> String {
            "fake".into()
        }
    }

    async fn noop(_invocation: Invocation) -> anyhow::Result<Option<Response>> {
        Ok(None)
    }

    fn scope<'a>(
        dependencies: &'a HashMap<String, Dependency>,
        mocks: Option<&'a MockMap>,
    ) -> ModuleScope<'a> {
        ModuleScope {
            endpoint: "hello",
            dependencies,
            mocks,
        }
    }

    fn dependencies() -> HashMap<String, Dependency> {
        let mut deps: HashMap<String, Dependency> = HashMap::new();
        let greeter: Arc<dyn Greeter> = Arc::new(Real);
        deps.insert("greeter".into(), Arc::new(greeter));
        deps
    }

    #[test]
    fn require_prefers_mock() {
        let deps = dependencies();
        let mocks = MockMap::new().with("greeter", Arc::new(Fake) as Arc<dyn Greeter>);

        let real: Arc<dyn Greeter> = scope(&deps, None).require("greeter").unwrap();
        let mocked: Arc<dyn Greeter> = scope(&deps, Some(&mocks)).require("greeter").unwrap();

        assert_eq!(real.greet(), "real");
        assert_eq!(mocked.greet(), "fake");
        assert!(scope(&deps, Some(&mocks)).is_mocked("greeter"));
    }

    #[test]
    fn require_reports_missing_and_mistyped() {
        let deps = dependencies();
        assert!(matches!(
            scope(&deps, None).require::<Arc<dyn Greeter>>("nope"),
            Err(HarnessError::MissingDependency { dependency, .. }) if dependency == "nope"
        ));
        assert!(matches!(
            scope(&deps, None).require::<String>("greeter"),
            Err(HarnessError::DependencyType { .. })
        ));
    }

    #[test]
    fn unknown_endpoint_is_not_found() {
        let registry = EndpointRegistry::new();
        assert!(matches!(
            registry.load("missing", None),
            Err(HarnessError::ModuleNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn mock_for_unknown_dependency_is_rejected() {
        let mut registry = EndpointRegistry::new();
        registry.register_fn("hello", noop);

        let mocks = MockMap::new().with("database", 1u8);
        assert!(matches!(
            registry.load("hello", Some(&mocks)),
            Err(HarnessError::MockTargetNotFound { dependency, .. }) if dependency == "database"
        ));
    }

    #[test]
    fn factory_errors_keep_their_type() {
        let mut registry = EndpointRegistry::new();
        registry.register("hello", |scope| {
            let _: Arc<dyn Greeter> = scope.require("greeter")?;
            unreachable!()
        });
        registry.register("broken", |_| Err(anyhow::anyhow!("syntax error")));

        assert!(matches!(
            registry.load("hello", None),
            Err(HarnessError::MissingDependency { .. })
        ));
        match registry.load("broken", None) {
            Err(HarnessError::Load { endpoint, source }) => {
                assert_eq!(endpoint, "broken");
                assert_eq!(source.to_string(), "syntax error");
            }
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[test]
    fn mock_map_lists_ids_in_order() {
        let mocks = MockMap::new().with("b", 1u8).with("a", 2u8);
        assert_eq!(mocks.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(mocks.len(), 2);
        assert_eq!(format!("{:?}", mocks), r#"{"a", "b"}"#);
    }
}
