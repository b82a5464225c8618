//! Ability and transformation registries
//!
//! The engine never performs business actions itself; it resolves named
//! abilities and transform operations through these seams. Hosts supply
//! their own implementations; the in-memory registries here make the crate
//! usable and testable standalone.

use crate::error::EngineError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A named external capability invocable by an `ability` step
#[async_trait]
pub trait Ability: Send + Sync {
    /// Invoke the ability with an already-resolved input record
    async fn invoke(&self, input: Value) -> Result<Value, EngineError>;
}

/// Lookup of abilities by name.
///
/// Absence of a matching name is a lookup miss, not an error; the caller
/// decides what a miss means.
pub trait AbilityRegistry: Send + Sync {
    /// Find an ability by name
    fn lookup(&self, name: &str) -> Option<Arc<dyn Ability>>;

    /// Check whether an ability with this name is registered
    fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

/// Named data transformations consumed by `transform` steps
pub trait TransformRegistry: Send + Sync {
    /// Apply a named operation to an input value
    fn apply(&self, operation: &str, input: Value) -> Result<Value, EngineError>;

    /// Check whether an operation with this name is registered
    fn has_operation(&self, operation: &str) -> bool;
}

/// An ability backed by an async function
struct FnAbility<F> {
    func: F,
}

#[async_trait]
impl<F> Ability for FnAbility<F>
where
    F: Fn(Value) -> Result<Value, EngineError> + Send + Sync,
{
    async fn invoke(&self, input: Value) -> Result<Value, EngineError> {
        (self.func)(input)
    }
}

/// Simple map-backed ability registry
#[derive(Default)]
pub struct InMemoryAbilityRegistry {
    abilities: HashMap<String, Arc<dyn Ability>>,
}

impl InMemoryAbilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ability under a name, replacing any previous entry
    pub fn register(&mut self, name: &str, ability: Arc<dyn Ability>) {
        self.abilities.insert(name.to_string(), ability);
    }

    /// Register a plain function as an ability
    pub fn register_fn<F>(&mut self, name: &str, func: F)
    where
        F: Fn(Value) -> Result<Value, EngineError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnAbility { func }));
    }
}

impl AbilityRegistry for InMemoryAbilityRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<dyn Ability>> {
        self.abilities.get(name).cloned()
    }
}

type TransformFn = Box<dyn Fn(Value) -> Result<Value, EngineError> + Send + Sync>;

/// Simple map-backed transform registry
#[derive(Default)]
pub struct InMemoryTransformRegistry {
    operations: HashMap<String, TransformFn>,
}

impl InMemoryTransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with small general-purpose string/collection ops
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register("upper", |input| {
            Ok(map_string(input, |s| s.to_uppercase()))
        });
        registry.register("lower", |input| {
            Ok(map_string(input, |s| s.to_lowercase()))
        });
        registry.register("trim", |input| {
            Ok(map_string(input, |s| s.trim().to_string()))
        });
        registry.register("length", |input| {
            let len = match &input {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                _ => 0,
            };
            Ok(Value::from(len))
        });
        registry.register("first", |input| match input {
            Value::Array(items) => Ok(items.into_iter().next().unwrap_or(Value::Null)),
            other => Ok(other),
        });
        registry.register("last", |input| match input {
            Value::Array(items) => Ok(items.into_iter().next_back().unwrap_or(Value::Null)),
            other => Ok(other),
        });
        registry.register("keys", |input| match input {
            Value::Object(map) => Ok(Value::Array(
                map.keys().cloned().map(Value::String).collect(),
            )),
            _ => Ok(Value::Array(Vec::new())),
        });

        registry
    }

    /// Register an operation under a name, replacing any previous entry
    pub fn register<F>(&mut self, name: &str, func: F)
    where
        F: Fn(Value) -> Result<Value, EngineError> + Send + Sync + 'static,
    {
        self.operations.insert(name.to_string(), Box::new(func));
    }
}

impl TransformRegistry for InMemoryTransformRegistry {
    fn apply(&self, operation: &str, input: Value) -> Result<Value, EngineError> {
        match self.operations.get(operation) {
            Some(func) => func(input),
            None => Err(EngineError::UnknownOperation(operation.to_string())),
        }
    }

    fn has_operation(&self, operation: &str) -> bool {
        self.operations.contains_key(operation)
    }
}

/// Apply a string function, passing non-strings through unchanged
fn map_string(input: Value, f: impl Fn(&str) -> String) -> Value {
    match input {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_ability_lookup_and_invoke() {
        let mut registry = InMemoryAbilityRegistry::new();
        registry.register_fn("echo", Ok);

        assert!(registry.has("echo"));
        assert!(!registry.has("missing"));

        let ability = registry.lookup("echo").unwrap();
        let result = ability.invoke(json!({"a": 1})).await.unwrap();
        assert_eq!(result, json!({"a": 1}));
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let registry = InMemoryAbilityRegistry::new();
        assert!(registry.lookup("anything").is_none());
    }

    #[test]
    fn test_builtin_transforms() {
        let registry = InMemoryTransformRegistry::with_builtins();

        assert_eq!(
            registry.apply("upper", json!("world")).unwrap(),
            json!("WORLD")
        );
        assert_eq!(
            registry.apply("lower", json!("LOUD")).unwrap(),
            json!("loud")
        );
        assert_eq!(
            registry.apply("trim", json!("  x  ")).unwrap(),
            json!("x")
        );
        assert_eq!(
            registry.apply("length", json!([1, 2, 3])).unwrap(),
            json!(3)
        );
        assert_eq!(
            registry.apply("first", json!(["a", "b"])).unwrap(),
            json!("a")
        );
        assert_eq!(
            registry.apply("last", json!(["a", "b"])).unwrap(),
            json!("b")
        );
        assert_eq!(
            registry.apply("keys", json!({"x": 1})).unwrap(),
            json!(["x"])
        );
    }

    #[test]
    fn test_unknown_operation() {
        let registry = InMemoryTransformRegistry::with_builtins();
        let err = registry.apply("reverse", json!("x")).unwrap_err();
        assert!(matches!(err, EngineError::UnknownOperation(_)));
    }

    #[test]
    fn test_custom_operation_overrides() {
        let mut registry = InMemoryTransformRegistry::with_builtins();
        registry.register("upper", |_| Ok(json!("overridden")));
        assert_eq!(
            registry.apply("upper", json!("x")).unwrap(),
            json!("overridden")
        );
    }
}
