//! CloudFormation template document and the intrinsic-function helpers used
//! while rendering constructs into it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const BOOTSTRAP_VERSION_PARAMETER: &str = "/cdk-bootstrap/hnb659fds/version";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub resources: BTreeMap<String, CfnResource>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, CfnOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnResource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl CfnResource {
    pub fn new(resource_type: &str, properties: Value) -> Self {
        CfnResource {
            resource_type: resource_type.to_string(),
            properties,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, logical_ids: impl IntoIterator<Item = String>) -> Self {
        self.depends_on.extend(logical_ids);
        self.depends_on.sort();
        self.depends_on.dedup();
        self
    }

    /// Adds `Tags` as a key-sorted list. Nothing is added for an empty map.
    pub fn tagged(mut self, tags: &BTreeMap<String, String>) -> Self {
        if tags.is_empty() {
            return self;
        }
        let tags: Vec<Value> = tags
            .iter()
            .map(|(key, value)| json!({ "Key": key, "Value": value }))
            .collect();
        if let Value::Object(properties) = &mut self.properties {
            properties.insert("Tags".to_string(), Value::Array(tags));
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnOutput {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Template {
    /// Template skeleton every stack starts from.
    pub fn for_stack() -> Self {
        let mut template = Template::default();
        template.parameters.insert(
            "BootstrapVersion".to_string(),
            json!({
                "Type": "AWS::SSM::Parameter::Value<String>",
                "Default": BOOTSTRAP_VERSION_PARAMETER,
                "Description": "Version of the CDK Bootstrap resources in this environment, automatically retrieved from SSM Parameter Store. [cdk:skip]",
            }),
        );
        template
    }

    pub fn add_resource(&mut self, logical_id: String, resource: CfnResource) {
        self.resources.insert(logical_id, resource);
    }

    pub fn add_output(&mut self, logical_id: String, value: Value) {
        self.outputs.insert(
            logical_id,
            CfnOutput {
                value,
                description: None,
            },
        );
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `Fn::Join` with an empty delimiter.
pub fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}
