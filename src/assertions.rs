//! Structural queries over a synthesized template, for use in tests.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::synth::CloudAssembly;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct AssertionError(String);

/// A synthesized template viewed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    json: Value,
}

impl Template {
    pub fn from_stack(assembly: &CloudAssembly, stack_name: &str) -> Result<Self, AssertionError> {
        let stack = assembly
            .stack(stack_name)
            .ok_or_else(|| AssertionError(format!("no stack named `{stack_name}`")))?;
        let json = serde_json::to_value(&stack.template)
            .map_err(|err| AssertionError(format!("template is not valid json: {err}")))?;
        Ok(Template { json })
    }

    pub fn from_json(json: Value) -> Self {
        Template { json }
    }

    pub fn to_json(&self) -> &Value {
        &self.json
    }

    /// Resources of `resource_type`, keyed by logical id.
    pub fn find_resources(&self, resource_type: &str) -> BTreeMap<String, Value> {
        self.json["Resources"]
            .as_object()
            .into_iter()
            .flatten()
            .filter(|(_, resource)| resource["Type"] == resource_type)
            .map(|(id, resource)| (id.clone(), resource.clone()))
            .collect()
    }

    pub fn resource_count_is(&self, resource_type: &str, count: usize) -> Result<(), AssertionError> {
        let found = self.find_resources(resource_type).len();
        if found != count {
            return Err(AssertionError(format!(
                "expected {count} resource(s) of type {resource_type}, found {found}"
            )));
        }
        Ok(())
    }

    /// Passes when at least one resource of `resource_type` has properties
    /// that contain `expected`.
    pub fn has_resource_properties(
        &self,
        resource_type: &str,
        expected: &Value,
    ) -> Result<(), AssertionError> {
        let resources = self.find_resources(resource_type);
        if resources
            .values()
            .any(|resource| object_like(&resource["Properties"], expected))
        {
            return Ok(());
        }
        Err(AssertionError(format!(
            "no {resource_type} among {} candidate(s) has properties matching {expected}",
            resources.len()
        )))
    }

    /// Passes when an output whose logical id starts with `id_prefix` has a
    /// value matching `expected`.
    pub fn has_output(&self, id_prefix: &str, expected: &Value) -> Result<(), AssertionError> {
        let matched = self.json["Outputs"]
            .as_object()
            .into_iter()
            .flatten()
            .any(|(id, output)| id.starts_with(id_prefix) && object_like(&output["Value"], expected));
        if matched {
            Ok(())
        } else {
            Err(AssertionError(format!(
                "no output starting with `{id_prefix}` matches {expected}"
            )))
        }
    }
}

/// Objects match when every expected key matches; anything else must match
/// exactly, arrays element by element.
pub fn object_like(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected.iter().all(|(key, value)| {
            actual
                .get(key)
                .is_some_and(|candidate| object_like(candidate, value))
        }),
        (Value::Array(actual), Value::Array(expected)) => {
            actual.len() == expected.len()
                && actual
                    .iter()
                    .zip(expected)
                    .all(|(candidate, value)| object_like(candidate, value))
        }
        (actual, expected) => actual == expected,
    }
}
