//! Pipeline context - scoped variables and path resolution
//!
//! The context is a stack of flat variable scopes. Scope 0 (the root) always
//! exists and can never be popped. Lookup walks from the innermost scope out
//! to the root and returns the first match, so a child scope's variable of
//! the same name shadows the parent's. Popping a scope restores exactly the
//! previous visible variable set; child writes never leak upward.

use crate::core::path::{is_reference, parse_path, REFERENCE_SIGIL};
use crate::error::ContextError;
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

/// Scoped variable store for a single pipeline run
#[derive(Debug, Clone)]
pub struct ContextManager {
    /// Scope stack; index 0 is the root scope
    scopes: Vec<HashMap<String, Value>>,
}

impl ContextManager {
    /// Create a context with an empty root scope
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    /// Create a context seeded with initial variables in the root scope
    pub fn with_variables(initial: HashMap<String, Value>) -> Self {
        Self {
            scopes: vec![initial],
        }
    }

    /// Set a variable in the current scope.
    ///
    /// A leading `$` sigil is stripped so step authors can use the same
    /// spelling on both sides of an assignment. Parent scopes are untouched.
    pub fn set(&mut self, name: &str, value: Value) {
        let name = name.strip_prefix(REFERENCE_SIGIL).unwrap_or(name);
        trace!("set {} in scope {}", name, self.scopes.len() - 1);
        self.scopes
            .last_mut()
            .expect("root scope always exists")
            .insert(name.to_string(), value);
    }

    /// Get a variable, searching from the current scope up to the root.
    ///
    /// Returns `default` when the name is not bound anywhere; never fails.
    pub fn get(&self, name: &str, default: Option<Value>) -> Option<Value> {
        let name = name.strip_prefix(REFERENCE_SIGIL).unwrap_or(name);
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value.clone());
            }
        }
        default
    }

    /// Check whether a variable is bound in any visible scope
    pub fn has(&self, name: &str) -> bool {
        let name = name.strip_prefix(REFERENCE_SIGIL).unwrap_or(name);
        self.scopes.iter().rev().any(|scope| scope.contains_key(name))
    }

    /// Resolve a sigil-prefixed path reference like `$post.meta[0].value`.
    ///
    /// The base variable must exist; each following segment is applied as a
    /// key, index, or property lookup on the current value. Resolution
    /// fails loudly rather than silently yielding null.
    pub fn resolve(&self, reference: &str) -> Result<Value, ContextError> {
        let segments = parse_path(reference);
        let base = &segments[0];

        if !self.has(base) {
            return Err(ContextError::UndefinedVariable(base.clone()));
        }
        let mut current = self
            .get(base, None)
            .expect("has() just confirmed the variable exists");

        for segment in &segments[1..] {
            current = match &current {
                Value::Object(map) => map.get(segment).cloned().ok_or_else(|| {
                    ContextError::UndefinedProperty {
                        property: segment.clone(),
                        reference: reference.to_string(),
                    }
                })?,
                Value::Array(items) => {
                    let index = segment.parse::<usize>().map_err(|_| {
                        ContextError::UndefinedKey {
                            key: segment.clone(),
                            reference: reference.to_string(),
                        }
                    })?;
                    items.get(index).cloned().ok_or_else(|| {
                        ContextError::UndefinedKey {
                            key: segment.clone(),
                            reference: reference.to_string(),
                        }
                    })?
                }
                other => {
                    return Err(ContextError::NotIndexable {
                        value_kind: value_kind(other),
                        segment: segment.clone(),
                        reference: reference.to_string(),
                    });
                }
            };
        }

        Ok(current)
    }

    /// Deep-resolve `$` references inside an arbitrary value.
    ///
    /// Reference strings are replaced by their resolved values; arrays and
    /// objects are recursed into; everything else passes through unchanged.
    pub fn resolve_value(&self, value: &Value) -> Result<Value, ContextError> {
        match value {
            Value::String(s) if is_reference(s) => self.resolve(s),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(key, val)| Ok((key.clone(), self.resolve_value(val)?)))
                .collect::<Result<serde_json::Map<_, _>, _>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    /// Push a new scope, optionally seeded with initial variables
    pub fn push_scope(&mut self, initial: HashMap<String, Value>) {
        trace!("push scope {}", self.scopes.len());
        self.scopes.push(initial);
    }

    /// Pop the current scope, discarding its variables.
    ///
    /// Popping the root scope is a programmer error in the calling control
    /// flow and fails rather than corrupting the stack.
    pub fn pop_scope(&mut self) -> Result<(), ContextError> {
        if self.scopes.len() == 1 {
            return Err(ContextError::CannotPopRoot);
        }
        self.scopes.pop();
        trace!("popped to scope {}", self.scopes.len() - 1);
        Ok(())
    }

    /// Number of scopes on the stack (root counts as one)
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Flattened snapshot of visible variables.
    ///
    /// Child scopes override parents on name collision. With
    /// `include_parent` false, only the current scope is returned.
    pub fn get_all(&self, include_parent: bool) -> HashMap<String, Value> {
        if include_parent {
            let mut flat = HashMap::new();
            for scope in &self.scopes {
                for (name, value) in scope {
                    flat.insert(name.clone(), value.clone());
                }
            }
            flat
        } else {
            self.scopes
                .last()
                .expect("root scope always exists")
                .clone()
        }
    }

    /// Empty the current scope only
    pub fn clear(&mut self) {
        self.scopes
            .last_mut()
            .expect("root scope always exists")
            .clear();
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
