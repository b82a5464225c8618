//! Static pipeline validation
//!
//! Validates a raw (untyped JSON) pipeline definition before execution:
//! structural checks per step kind, recursion into nested step lists with
//! path-qualified labels, and cycle detection over the declared
//! output -> input variable dependency graph. Errors are collected, not
//! thrown — pipeline authors edit large definitions and need every defect
//! surfaced in one pass.

use crate::core::path::{is_reference, parse_path};
use crate::core::pipeline::StepType;
use crate::registry::AbilityRegistry;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Single-pass structural validator for pipeline definitions
#[derive(Default)]
pub struct PipelineValidator {
    errors: Vec<String>,
    ability_registry: Option<Arc<dyn AbilityRegistry>>,
}

impl PipelineValidator {
    /// Create a validator with no ability registry attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an ability registry so `ability` names are checked for
    /// existence. Without one, validation is structural only.
    pub fn with_ability_registry(mut self, registry: Arc<dyn AbilityRegistry>) -> Self {
        self.ability_registry = Some(registry);
        self
    }

    /// Whether the last `validate` call could check ability existence.
    ///
    /// Structural-only validation passing does not guarantee that the
    /// abilities a pipeline names actually exist; callers should surface
    /// this distinction rather than conflate the two levels.
    pub fn was_structural_only(&self) -> bool {
        self.ability_registry.is_none()
    }

    /// Validate a pipeline definition. Returns true iff no errors were
    /// collected; the full list is available via `get_errors`.
    pub fn validate(&mut self, pipeline: &Value) -> bool {
        self.errors.clear();

        let Some(steps) = pipeline.get("steps").and_then(Value::as_array) else {
            self.errors
                .push("pipeline must have a `steps` list".to_string());
            return false;
        };
        if steps.is_empty() {
            self.errors
                .push("pipeline must have at least one step".to_string());
            return false;
        }

        self.validate_steps(steps, "steps");
        self.detect_cycles(&build_dependency_graph(steps));

        debug!(
            "validation finished with {} error(s), structural_only={}",
            self.errors.len(),
            self.was_structural_only()
        );
        self.errors.is_empty()
    }

    /// Collected error messages from the last `validate` call
    pub fn get_errors(&self) -> &[String] {
        &self.errors
    }

    /// All errors joined into one printable string
    pub fn get_errors_string(&self) -> String {
        self.errors.join("; ")
    }

    fn validate_steps(&mut self, steps: &[Value], path: &str) {
        for (index, step) in steps.iter().enumerate() {
            self.validate_step(step, &format!("{}[{}]", path, index));
        }
    }

    fn validate_step(&mut self, step: &Value, label: &str) {
        let Some(map) = step.as_object() else {
            self.errors.push(format!("{}: step must be an object", label));
            return;
        };

        let Some(type_tag) = map.get("type").and_then(Value::as_str) else {
            self.errors
                .push(format!("{}: step is missing a `type` field", label));
            return;
        };

        let Some(step_type) = StepType::ALL
            .iter()
            .find(|candidate| candidate.as_str() == type_tag)
        else {
            self.errors
                .push(format!("{}: unknown step type `{}`", label, type_tag));
            return;
        };

        match step_type {
            StepType::Ability => self.validate_ability(map, label),
            StepType::Transform => self.validate_transform(map, label),
            StepType::Conditional => self.validate_conditional(map, label),
            StepType::Loop => self.validate_loop(map, label),
            StepType::Parallel => self.validate_parallel(map, label),
            StepType::TryCatch => self.validate_try_catch(map, label),
            StepType::SubPipeline => self.validate_sub_pipeline(map, label),
        }
    }

    fn validate_ability(&mut self, map: &serde_json::Map<String, Value>, label: &str) {
        match map.get("ability").and_then(Value::as_str) {
            Some(name) => {
                if let Some(registry) = &self.ability_registry {
                    if !registry.has(name) {
                        self.errors
                            .push(format!("{}: ability `{}` is not registered", label, name));
                    }
                }
            }
            None => self
                .errors
                .push(format!("{}: ability step needs a string `ability` name", label)),
        }
    }

    fn validate_transform(&mut self, map: &serde_json::Map<String, Value>, label: &str) {
        if map.get("operation").and_then(Value::as_str).is_none() {
            self.errors.push(format!(
                "{}: transform step needs a string `operation`",
                label
            ));
        }
        if !map.contains_key("input") {
            self.errors
                .push(format!("{}: transform step needs an `input`", label));
        }
    }

    fn validate_conditional(&mut self, map: &serde_json::Map<String, Value>, label: &str) {
        if !map.get("condition").is_some_and(Value::is_object) {
            self.errors.push(format!(
                "{}: conditional step needs a structured `condition`",
                label
            ));
        }
        for branch in ["then", "else"] {
            if let Some(value) = map.get(branch) {
                match value.as_array() {
                    Some(steps) => {
                        self.validate_steps(steps, &format!("{}.{}", label, branch))
                    }
                    None => self.errors.push(format!(
                        "{}: `{}` must be a list of steps",
                        label, branch
                    )),
                }
            }
        }
    }

    fn validate_loop(&mut self, map: &serde_json::Map<String, Value>, label: &str) {
        if !map.contains_key("input") {
            self.errors
                .push(format!("{}: loop step needs an `input` collection", label));
        }
        self.require_step_list(map, "steps", label, true);
    }

    fn validate_parallel(&mut self, map: &serde_json::Map<String, Value>, label: &str) {
        self.require_step_list(map, "steps", label, true);
    }

    fn validate_try_catch(&mut self, map: &serde_json::Map<String, Value>, label: &str) {
        self.require_step_list(map, "try", label, false);
        for branch in ["catch", "finally"] {
            if let Some(value) = map.get(branch) {
                match value.as_array() {
                    Some(steps) => {
                        self.validate_steps(steps, &format!("{}.{}", label, branch))
                    }
                    None => self.errors.push(format!(
                        "{}: `{}` must be a list of steps",
                        label, branch
                    )),
                }
            }
        }
    }

    fn validate_sub_pipeline(&mut self, map: &serde_json::Map<String, Value>, label: &str) {
        match map.get("pipeline") {
            Some(Value::Object(pipeline)) => {
                match pipeline.get("steps").and_then(Value::as_array) {
                    Some(steps) if !steps.is_empty() => {
                        self.validate_steps(steps, &format!("{}.pipeline.steps", label))
                    }
                    _ => self.errors.push(format!(
                        "{}: nested pipeline must have a non-empty `steps` list",
                        label
                    )),
                }
            }
            _ => self.errors.push(format!(
                "{}: sub_pipeline step needs a `pipeline` object",
                label
            )),
        }
    }

    fn require_step_list(
        &mut self,
        map: &serde_json::Map<String, Value>,
        field: &str,
        label: &str,
        non_empty: bool,
    ) {
        match map.get(field).and_then(Value::as_array) {
            Some(steps) => {
                if non_empty && steps.is_empty() {
                    self.errors
                        .push(format!("{}: `{}` must not be empty", label, field));
                } else {
                    self.validate_steps(steps, &format!("{}.{}", label, field));
                }
            }
            None => self.errors.push(format!(
                "{}: step needs a `{}` list of steps",
                label, field
            )),
        }
    }

    /// Depth-first cycle search over the declared dependency graph.
    ///
    /// Revisiting a variable already on the visiting stack is a circular
    /// declared dependency; each is reported without stopping the walk for
    /// other roots.
    fn detect_cycles(&mut self, graph: &HashMap<String, HashSet<String>>) {
        let mut finished: HashSet<String> = HashSet::new();

        let mut roots: Vec<&String> = graph.keys().collect();
        roots.sort();

        for root in roots {
            if finished.contains(root) {
                continue;
            }
            let mut visiting = Vec::new();
            self.visit(root, graph, &mut visiting, &mut finished);
        }
    }

    fn visit(
        &mut self,
        node: &str,
        graph: &HashMap<String, HashSet<String>>,
        visiting: &mut Vec<String>,
        finished: &mut HashSet<String>,
    ) {
        if visiting.iter().any(|on_stack| on_stack == node) {
            self.errors.push(format!(
                "circular dependency detected involving variable `{}`",
                node
            ));
            return;
        }
        if finished.contains(node) {
            return;
        }

        visiting.push(node.to_string());
        if let Some(deps) = graph.get(node) {
            let mut deps: Vec<&String> = deps.iter().collect();
            deps.sort();
            for dep in deps {
                self.visit(dep, graph, visiting, finished);
            }
        }
        visiting.pop();
        finished.insert(node.to_string());
    }
}

/// Map each declared output variable to the variables referenced anywhere
/// in its step's configuration, nested branches included.
fn build_dependency_graph(steps: &[Value]) -> HashMap<String, HashSet<String>> {
    let mut graph = HashMap::new();
    collect_outputs(steps, &mut graph);
    graph
}

fn collect_outputs(steps: &[Value], graph: &mut HashMap<String, HashSet<String>>) {
    for step in steps {
        let Some(map) = step.as_object() else { continue };

        if let Some(output) = map.get("output").and_then(Value::as_str) {
            let mut references = HashSet::new();
            collect_references(step, &mut references);
            graph
                .entry(output.to_string())
                .or_insert_with(HashSet::new)
                .extend(references);
        }

        // nested steps may declare outputs of their own
        for field in ["steps", "then", "else", "try", "catch", "finally"] {
            if let Some(nested) = map.get(field).and_then(Value::as_array) {
                collect_outputs(nested, graph);
            }
        }
        if let Some(nested) = map
            .get("pipeline")
            .and_then(|p| p.get("steps"))
            .and_then(Value::as_array)
        {
            collect_outputs(nested, graph);
        }
    }
}

/// Scan all string leaves for `$` references, taking only the base name
fn collect_references(value: &Value, out: &mut HashSet<String>) {
    match value {
        Value::String(s) if is_reference(s) => {
            let base = parse_path(s).remove(0);
            if !base.is_empty() {
                out.insert(base);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        Value::Object(map) => {
            for nested in map.values() {
                collect_references(nested, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryAbilityRegistry;
    use serde_json::json;

    #[test]
    fn test_missing_steps_rejected() {
        let mut validator = PipelineValidator::new();
        assert!(!validator.validate(&json!({"name": "x"})));
        assert!(!validator.get_errors().is_empty());

        assert!(!validator.validate(&json!({"steps": "not a list"})));
    }

    #[test]
    fn test_empty_steps_rejected() {
        let mut validator = PipelineValidator::new();
        assert!(!validator.validate(&json!({"steps": []})));
        assert!(!validator.get_errors().is_empty());
    }

    #[test]
    fn test_valid_pipeline_passes() {
        let mut validator = PipelineValidator::new();
        let pipeline = json!({"steps": [
            {"type": "ability", "ability": "create_post", "output": "post"},
            {"type": "transform", "operation": "upper", "input": "$post.title"}
        ]});
        assert!(validator.validate(&pipeline), "{:?}", validator.get_errors());
    }

    #[test]
    fn test_unknown_type_collected_without_aborting_siblings() {
        let mut validator = PipelineValidator::new();
        let pipeline = json!({"steps": [
            {"type": "teleport"},
            {"type": "transform"},
            {"ability": "no type at all"}
        ]});

        assert!(!validator.validate(&pipeline));
        let errors = validator.get_errors();
        // one error for the unknown type, two for the transform, one for
        // the missing type — all collected in a single pass
        assert!(errors.iter().any(|e| e.contains("unknown step type")));
        assert!(errors.iter().any(|e| e.contains("operation")));
        assert!(errors.iter().any(|e| e.contains("missing a `type`")));
        assert!(errors.len() >= 4);
    }

    #[test]
    fn test_nested_errors_carry_path_labels() {
        let mut validator = PipelineValidator::new();
        let pipeline = json!({"steps": [
            {"type": "ability", "ability": "ok"},
            {
                "type": "conditional",
                "condition": {"left": "$x", "op": "truthy"},
                "then": [{"type": "transform", "input": 1}]
            }
        ]});

        assert!(!validator.validate(&pipeline));
        assert!(validator
            .get_errors()
            .iter()
            .any(|e| e.starts_with("steps[1].then[0]")));
    }

    #[test]
    fn test_loop_requires_input_and_nonempty_body() {
        let mut validator = PipelineValidator::new();
        let pipeline = json!({"steps": [
            {"type": "loop", "steps": []},
        ]});

        assert!(!validator.validate(&pipeline));
        let errors = validator.get_errors();
        assert!(errors.iter().any(|e| e.contains("`input`")));
        assert!(errors.iter().any(|e| e.contains("must not be empty")));
    }

    #[test]
    fn test_try_catch_requires_try() {
        let mut validator = PipelineValidator::new();
        let pipeline = json!({"steps": [
            {"type": "try_catch", "catch": [{"type": "ability", "ability": "a"}]}
        ]});

        assert!(!validator.validate(&pipeline));
        assert!(validator
            .get_errors()
            .iter()
            .any(|e| e.contains("`try`")));
    }

    #[test]
    fn test_sub_pipeline_recursed() {
        let mut validator = PipelineValidator::new();
        let pipeline = json!({"steps": [{
            "type": "sub_pipeline",
            "pipeline": {"steps": [{"type": "transform"}]}
        }]});

        assert!(!validator.validate(&pipeline));
        assert!(validator
            .get_errors()
            .iter()
            .any(|e| e.starts_with("steps[0].pipeline.steps[0]")));
    }

    #[test]
    fn test_cycle_detection() {
        let mut validator = PipelineValidator::new();
        let pipeline = json!({"steps": [
            {"type": "transform", "operation": "upper", "input": "$y", "output": "x"},
            {"type": "transform", "operation": "upper", "input": "$x", "output": "y"}
        ]});

        assert!(!validator.validate(&pipeline));
        assert!(validator
            .get_errors()
            .iter()
            .any(|e| e.contains("circular dependency")));
    }

    #[test]
    fn test_self_cycle_detected() {
        let mut validator = PipelineValidator::new();
        let pipeline = json!({"steps": [
            {"type": "transform", "operation": "upper", "input": "$x", "output": "x"}
        ]});

        assert!(!validator.validate(&pipeline));
        assert!(validator
            .get_errors()
            .iter()
            .any(|e| e.contains("`x`")));
    }

    #[test]
    fn test_acyclic_chain_passes() {
        let mut validator = PipelineValidator::new();
        let pipeline = json!({"steps": [
            {"type": "ability", "ability": "fetch", "output": "raw"},
            {"type": "transform", "operation": "upper", "input": "$raw", "output": "shouting"},
            {"type": "transform", "operation": "trim", "input": "$shouting", "output": "final"}
        ]});

        assert!(validator.validate(&pipeline), "{:?}", validator.get_errors());
    }

    #[test]
    fn test_references_in_nested_branches_count() {
        let mut validator = PipelineValidator::new();
        // the conditional's own output depends on a reference inside its
        // then-branch, which closes a cycle with the second step
        let pipeline = json!({"steps": [
            {
                "type": "conditional",
                "condition": {"left": "$flag", "op": "truthy"},
                "then": [{"type": "transform", "operation": "upper", "input": "$b"}],
                "output": "a"
            },
            {"type": "transform", "operation": "upper", "input": "$a", "output": "b"}
        ]});

        assert!(!validator.validate(&pipeline));
        assert!(validator
            .get_errors()
            .iter()
            .any(|e| e.contains("circular dependency")));
    }

    #[test]
    fn test_ability_existence_checked_with_registry() {
        let mut abilities = InMemoryAbilityRegistry::new();
        abilities.register_fn("known", Ok);

        let mut validator =
            PipelineValidator::new().with_ability_registry(Arc::new(abilities));
        assert!(!validator.was_structural_only());

        let pipeline = json!({"steps": [
            {"type": "ability", "ability": "known"},
            {"type": "ability", "ability": "unknown"}
        ]});

        assert!(!validator.validate(&pipeline));
        assert!(validator
            .get_errors()
            .iter()
            .any(|e| e.contains("`unknown` is not registered")));
    }

    #[test]
    fn test_structural_only_without_registry() {
        let mut validator = PipelineValidator::new();
        assert!(validator.was_structural_only());

        // unknown ability name passes structurally
        let pipeline = json!({"steps": [
            {"type": "ability", "ability": "whatever"}
        ]});
        assert!(validator.validate(&pipeline));
    }

    #[test]
    fn test_errors_string_joins() {
        let mut validator = PipelineValidator::new();
        validator.validate(&json!({"steps": [{"type": "transform"}]}));
        let joined = validator.get_errors_string();
        assert!(joined.contains("operation"));
        assert!(joined.contains("input"));
        assert!(joined.contains("; "));
    }
}
