//! Lambda function declarations.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{json, Value};

use crate::assets::{StagedAsset, ASSETS_BUCKET};
use crate::construct::logical_id;
use crate::error::{Error, Result};
use crate::stack::Stack;
use crate::template::{get_att, join, reference, CfnResource, Template};

const BASIC_EXECUTION_POLICY: &str = "service-role/AWSLambdaBasicExecutionRole";

/// Execution environment of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Runtime {
    Nodejs18X,
    Nodejs20X,
    Nodejs22X,
    Python312,
    Python313,
    Java21,
    ProvidedAl2023,
}

impl Runtime {
    pub const ALL: [Runtime; 7] = [
        Runtime::Nodejs18X,
        Runtime::Nodejs20X,
        Runtime::Nodejs22X,
        Runtime::Python312,
        Runtime::Python313,
        Runtime::Java21,
        Runtime::ProvidedAl2023,
    ];

    /// Identifier used by the Lambda service.
    pub fn name(self) -> &'static str {
        match self {
            Runtime::Nodejs18X => "nodejs18.x",
            Runtime::Nodejs20X => "nodejs20.x",
            Runtime::Nodejs22X => "nodejs22.x",
            Runtime::Python312 => "python3.12",
            Runtime::Python313 => "python3.13",
            Runtime::Java21 => "java21",
            Runtime::ProvidedAl2023 => "provided.al2023",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Runtime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Runtime::ALL
            .into_iter()
            .find(|runtime| runtime.name() == s)
            .ok_or_else(|| Error::UnknownRuntime(s.to_string()))
    }
}

/// Where the function's code comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Code {
    /// A local directory, zipped and uploaded at deploy time.
    Asset(PathBuf),
    /// Source embedded directly in the template.
    Inline(String),
}

impl Code {
    pub fn from_asset(path: impl Into<PathBuf>) -> Self {
        Code::Asset(path.into())
    }

    pub fn from_inline(source: impl Into<String>) -> Self {
        Code::Inline(source.into())
    }

    pub fn asset_path(&self) -> Option<&Path> {
        match self {
            Code::Asset(path) => Some(path),
            Code::Inline(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionProps {
    pub runtime: Runtime,
    pub code: Code,
    /// `<module>.<exported function>`
    pub handler: String,
}

/// Handle to a function declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub(crate) stack: String,
    pub(crate) token: u64,
    pub(crate) id: String,
    pub(crate) index: usize,
}

impl FunctionRef {
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    id: String,
    props: FunctionProps,
}

impl Function {
    /// Declares a function in `stack`.
    pub fn new(stack: &mut Stack, id: &str, props: FunctionProps) -> Result<FunctionRef> {
        stack.claim_id(id)?;
        log::debug!(
            "declared function {}/{id} ({}, {})",
            stack.id(),
            props.runtime,
            props.handler
        );
        stack.functions.push(Function {
            id: id.to_string(),
            props,
        });
        Ok(FunctionRef {
            stack: stack.id().to_string(),
            token: stack.token(),
            id: id.to_string(),
            index: stack.functions.len() - 1,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn runtime(&self) -> Runtime {
        self.props.runtime
    }

    pub fn code(&self) -> &Code {
        &self.props.code
    }

    pub fn handler(&self) -> &str {
        &self.props.handler
    }

    pub fn logical_id(&self) -> String {
        logical_id(&[self.id.as_str(), "Resource"])
    }

    pub fn role_logical_id(&self) -> String {
        logical_id(&[self.id.as_str(), "ServiceRole", "Resource"])
    }

    /// `Fn::GetAtt` of the function ARN.
    pub fn arn(&self) -> Value {
        get_att(&self.logical_id(), "Arn")
    }

    pub(crate) fn render(
        &self,
        tags: &BTreeMap<String, String>,
        assets: &BTreeMap<&Path, StagedAsset>,
        template: &mut Template,
    ) -> Result<()> {
        let role_id = self.role_logical_id();
        let role = CfnResource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                    }],
                    "Version": "2012-10-17",
                },
                "ManagedPolicyArns": [join(vec![
                    json!("arn:"),
                    reference("AWS::Partition"),
                    json!(format!(":iam::aws:policy/{BASIC_EXECUTION_POLICY}")),
                ])],
            }),
        )
        .tagged(tags);
        template.add_resource(role_id.clone(), role);

        let code = match &self.props.code {
            Code::Asset(path) => {
                let asset = assets
                    .get(path.as_path())
                    .ok_or_else(|| Error::AssetNotFound(path.clone()))?;
                json!({
                    "S3Bucket": { "Fn::Sub": ASSETS_BUCKET },
                    "S3Key": asset.object_key(),
                })
            }
            Code::Inline(source) => json!({ "ZipFile": source }),
        };

        let function = CfnResource::new(
            "AWS::Lambda::Function",
            json!({
                "Code": code,
                "Handler": self.props.handler,
                "Role": get_att(&role_id, "Arn"),
                "Runtime": self.props.runtime.name(),
            }),
        )
        .tagged(tags)
        .depends_on([role_id]);
        template.add_resource(self.logical_id(), function);
        Ok(())
    }
}
