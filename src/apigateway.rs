//! REST API declarations backed by a Lambda function.
//!
//! A [`LambdaRestApi`] owns a tree of path segments rooted at `/`. Every
//! method on the tree is a proxy integration that invokes the API's handler
//! function. Rendering adds the invoke permissions, a deployment, a stage and
//! an `Endpoint` output for the stage URL.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::construct::{logical_id, short_hash, validate_id};
use crate::error::{Error, Result};
use crate::lambda::FunctionRef;
use crate::stack::Stack;
use crate::template::{get_att, join, reference, CfnResource, Template};

const PROXY_PATH_PART: &str = "{proxy+}";
const DEFAULT_STAGE: &str = "prod";
const TEST_INVOKE_STAGE: &str = "test-invoke-stage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Any,
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Any,
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Any => "ANY",
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Verb as it appears in an `execute-api` source ARN.
    fn arn_verb(self) -> &'static str {
        match self {
            HttpMethod::Any => "*",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        HttpMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == upper)
            .ok_or_else(|| format!("unsupported http method `{s}`"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaRestApiProps {
    /// Function invoked by every method of the API.
    pub handler: FunctionRef,
    /// Route every path and method to the handler through `{proxy+}`.
    pub proxy: bool,
    pub rest_api_name: Option<String>,
    pub stage_name: String,
}

impl LambdaRestApiProps {
    pub fn new(handler: FunctionRef) -> Self {
        LambdaRestApiProps {
            handler,
            proxy: true,
            rest_api_name: None,
            stage_name: DEFAULT_STAGE.to_string(),
        }
    }

    pub fn proxy(mut self, proxy: bool) -> Self {
        self.proxy = proxy;
        self
    }
}

/// A path and verb pair served by an API.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Route {
    pub path: String,
    pub method: HttpMethod,
}

#[derive(Debug, Clone)]
struct ApiNode {
    path_part: Option<String>,
    parent: Option<usize>,
    methods: Vec<HttpMethod>,
}

#[derive(Debug, Clone)]
pub struct LambdaRestApi {
    id: String,
    props: LambdaRestApiProps,
    nodes: Vec<ApiNode>,
}

/// Handle to a REST API declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestApiRef {
    stack: String,
    token: u64,
    id: String,
    index: usize,
}

/// Handle to one path segment of a REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    stack: String,
    token: u64,
    api_id: String,
    api: usize,
    node: usize,
}

impl LambdaRestApi {
    /// Declares an API whose methods invoke `props.handler`. The handler must
    /// already be declared in the same stack.
    pub fn new(stack: &mut Stack, id: &str, props: LambdaRestApiProps) -> Result<RestApiRef> {
        stack.function(&props.handler)?;
        stack.claim_id(id)?;

        let mut api = LambdaRestApi {
            id: id.to_string(),
            props,
            nodes: vec![ApiNode {
                path_part: None,
                parent: None,
                methods: Vec::new(),
            }],
        };
        if api.props.proxy {
            api.add_method(0, HttpMethod::Any)?;
            let proxy = api.add_child(0, PROXY_PATH_PART)?;
            api.add_method(proxy, HttpMethod::Any)?;
        }
        log::debug!(
            "declared rest api {}/{id} -> {} (proxy: {})",
            stack.id(),
            api.props.handler.id(),
            api.props.proxy
        );

        stack.rest_apis.push(api);
        Ok(RestApiRef {
            stack: stack.id().to_string(),
            token: stack.token(),
            id: id.to_string(),
            index: stack.rest_apis.len() - 1,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handler(&self) -> &FunctionRef {
        &self.props.handler
    }

    pub fn is_proxy(&self) -> bool {
        self.props.proxy
    }

    /// Paths below the root, in declaration order.
    pub fn paths(&self) -> Vec<String> {
        (1..self.nodes.len()).map(|node| self.path(node)).collect()
    }

    /// Every path/method pair, sorted.
    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self
            .nodes
            .iter()
            .enumerate()
            .flat_map(|(index, node)| {
                node.methods.iter().map(move |method| Route {
                    path: self.path(index),
                    method: *method,
                })
            })
            .collect();
        routes.sort();
        routes
    }

    pub fn logical_id(&self) -> String {
        logical_id(&[self.id.as_str(), "Resource"])
    }

    /// The suffix follows the route set, so changing routes yields a new
    /// deployment and the stage picks up the change.
    pub fn deployment_logical_id(&self) -> String {
        let mut config: Vec<String> = self.paths();
        config.extend(
            self.routes()
                .into_iter()
                .map(|route| format!("{} {}", route.method, route.path)),
        );
        format!(
            "{}{}",
            logical_id(&[self.id.as_str(), "Deployment", "Resource"]),
            short_hash(&config.join("\n"))
        )
    }

    fn add_child(&mut self, parent: usize, path_part: &str) -> Result<usize> {
        validate_path_part(path_part)?;
        let taken = self.nodes.iter().any(|node| {
            node.parent == Some(parent) && node.path_part.as_deref() == Some(path_part)
        });
        if taken {
            return Err(Error::DuplicateConstruct {
                scope: format!("{}{}", self.id, self.path(parent)),
                id: path_part.to_string(),
            });
        }
        self.nodes.push(ApiNode {
            path_part: Some(path_part.to_string()),
            parent: Some(parent),
            methods: Vec::new(),
        });
        Ok(self.nodes.len() - 1)
    }

    fn add_method(&mut self, node: usize, method: HttpMethod) -> Result<()> {
        if self.nodes[node].methods.contains(&method) {
            return Err(Error::DuplicateMethod {
                path: self.path(node),
                method: method.to_string(),
            });
        }
        self.nodes[node].methods.push(method);
        Ok(())
    }

    fn path(&self, node: usize) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(node);
        while let Some(index) = cursor {
            if let Some(part) = &self.nodes[index].path_part {
                parts.push(part.as_str());
            }
            cursor = self.nodes[index].parent;
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Construct path of a node, relative to the stack.
    fn components(&self, node: usize) -> Vec<String> {
        let mut parts = Vec::new();
        let mut cursor = Some(node);
        while let Some(index) = cursor {
            if let Some(part) = &self.nodes[index].path_part {
                parts.push(part.clone());
            }
            cursor = self.nodes[index].parent;
        }
        parts.push("Default".to_string());
        parts.push(self.id.clone());
        parts.reverse();
        parts
    }

    fn node_logical_id(&self, node: usize, suffix: &[&str]) -> String {
        let components = self.components(node);
        let path: Vec<&str> = components
            .iter()
            .map(String::as_str)
            .chain(suffix.iter().copied())
            .collect();
        logical_id(&path)
    }

    /// Reference usable as a `ParentId`/`ResourceId` for `node`.
    fn node_ref(&self, node: usize) -> Value {
        if node == 0 {
            get_att(&self.logical_id(), "RootResourceId")
        } else {
            reference(&self.node_logical_id(node, &["Resource"]))
        }
    }

    pub(crate) fn render(&self, stack: &Stack, template: &mut Template) -> Result<()> {
        let function = stack.function(&self.props.handler)?;
        let tags = &stack.props().tags;
        let api_id = self.logical_id();
        let stage_name = &self.props.stage_name;

        template.add_resource(
            api_id.clone(),
            CfnResource::new(
                "AWS::ApiGateway::RestApi",
                json!({ "Name": self.props.rest_api_name.as_deref().unwrap_or(&self.id) }),
            )
            .tagged(tags),
        );

        let deployment_id = self.deployment_logical_id();
        let stage_component = format!("DeploymentStage.{stage_name}");
        let stage_id = logical_id(&[self.id.as_str(), stage_component.as_str(), "Resource"]);
        let mut deployment_deps = Vec::new();

        for (index, node) in self.nodes.iter().enumerate() {
            if let (Some(path_part), Some(parent)) = (&node.path_part, node.parent) {
                let resource_id = self.node_logical_id(index, &["Resource"]);
                template.add_resource(
                    resource_id.clone(),
                    CfnResource::new(
                        "AWS::ApiGateway::Resource",
                        json!({
                            "ParentId": self.node_ref(parent),
                            "PathPart": path_part,
                            "RestApiId": reference(&api_id),
                        }),
                    ),
                );
                deployment_deps.push(resource_id);
            }

            let path = self.path(index);
            for method in &node.methods {
                let verb = method.as_str();
                let method_id = self.node_logical_id(index, &[verb, "Resource"]);
                let integration_uri = join(vec![
                    json!("arn:"),
                    reference("AWS::Partition"),
                    json!(":apigateway:"),
                    reference("AWS::Region"),
                    json!(":lambda:path/2015-03-31/functions/"),
                    function.arn(),
                    json!("/invocations"),
                ]);
                template.add_resource(
                    method_id.clone(),
                    CfnResource::new(
                        "AWS::ApiGateway::Method",
                        json!({
                            "AuthorizationType": "NONE",
                            "HttpMethod": verb,
                            "Integration": {
                                "IntegrationHttpMethod": "POST",
                                "Type": "AWS_PROXY",
                                "Uri": integration_uri,
                            },
                            "ResourceId": self.node_ref(index),
                            "RestApiId": reference(&api_id),
                        }),
                    ),
                );
                deployment_deps.push(method_id);

                let arn_suffix = format!("/{}{}", method.arn_verb(), path);
                let permission_tail = path.replace('/', ".");
                let permissions = [
                    (
                        format!("ApiPermission.{}.{verb}.{permission_tail}", self.id),
                        reference(&stage_id),
                    ),
                    (
                        format!("ApiPermission.Test.{}.{verb}.{permission_tail}", self.id),
                        json!(TEST_INVOKE_STAGE),
                    ),
                ];
                for (component, stage) in permissions {
                    let permission_id = self.node_logical_id(index, &[verb, component.as_str()]);
                    let source_arn = join(vec![
                        json!("arn:"),
                        reference("AWS::Partition"),
                        json!(":execute-api:"),
                        reference("AWS::Region"),
                        json!(":"),
                        reference("AWS::AccountId"),
                        json!(":"),
                        reference(&api_id),
                        json!("/"),
                        stage,
                        json!(arn_suffix),
                    ]);
                    template.add_resource(
                        permission_id,
                        CfnResource::new(
                            "AWS::Lambda::Permission",
                            json!({
                                "Action": "lambda:InvokeFunction",
                                "FunctionName": function.arn(),
                                "Principal": "apigateway.amazonaws.com",
                                "SourceArn": source_arn,
                            }),
                        ),
                    );
                }
            }
        }

        template.add_resource(
            deployment_id.clone(),
            CfnResource::new(
                "AWS::ApiGateway::Deployment",
                json!({
                    "Description": "Automatically created by the RestApi construct",
                    "RestApiId": reference(&api_id),
                }),
            )
            .depends_on(deployment_deps),
        );
        template.add_resource(
            stage_id.clone(),
            CfnResource::new(
                "AWS::ApiGateway::Stage",
                json!({
                    "DeploymentId": reference(&deployment_id),
                    "RestApiId": reference(&api_id),
                    "StageName": stage_name,
                }),
            )
            .tagged(tags),
        );
        template.add_output(
            logical_id(&[self.id.as_str(), "Endpoint"]),
            join(vec![
                json!("https://"),
                reference(&api_id),
                json!(".execute-api."),
                reference("AWS::Region"),
                json!("."),
                reference("AWS::URLSuffix"),
                json!("/"),
                reference(&stage_id),
                json!("/"),
            ]),
        );
        Ok(())
    }
}

fn validate_path_part(path_part: &str) -> Result<()> {
    validate_id(path_part)?;
    let plain = path_part
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    let variable = path_part
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .map(|name| name.strip_suffix('+').unwrap_or(name))
        .is_some_and(|name| {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if plain || variable {
        Ok(())
    } else {
        Err(Error::InvalidId(path_part.to_string()))
    }
}

impl RestApiRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> ResourceRef {
        ResourceRef {
            stack: self.stack.clone(),
            token: self.token,
            api_id: self.id.clone(),
            api: self.index,
            node: 0,
        }
    }
}

impl ResourceRef {
    /// Adds a child path segment below this one.
    pub fn add_resource(&self, stack: &mut Stack, path_part: &str) -> Result<ResourceRef> {
        let api = self.unlocked_api(stack)?;
        let node = api.add_child(self.node, path_part)?;
        Ok(ResourceRef {
            node,
            ..self.clone()
        })
    }

    /// Routes `method` on this segment to the API's handler.
    pub fn add_method(&self, stack: &mut Stack, method: HttpMethod) -> Result<()> {
        let api = self.unlocked_api(stack)?;
        api.add_method(self.node, method)
    }

    pub fn path(&self, stack: &Stack) -> Result<String> {
        stack.owns(self.token, &self.stack, &self.api_id)?;
        let api = stack
            .rest_apis
            .get(self.api)
            .filter(|api| self.resolves_in(api))
            .ok_or_else(|| self.foreign())?;
        Ok(api.path(self.node))
    }

    fn unlocked_api<'a>(&self, stack: &'a mut Stack) -> Result<&'a mut LambdaRestApi> {
        stack.owns(self.token, &self.stack, &self.api_id)?;
        let foreign = self.foreign();
        let api = stack
            .rest_apis
            .get_mut(self.api)
            .filter(|api| self.resolves_in(api))
            .ok_or(foreign)?;
        if api.props.proxy {
            return Err(Error::ProxyApi(api.id.clone()));
        }
        Ok(api)
    }

    fn resolves_in(&self, api: &LambdaRestApi) -> bool {
        api.id == self.api_id && self.node < api.nodes.len()
    }

    fn foreign(&self) -> Error {
        Error::ForeignConstruct(format!("{}/{}", self.stack, self.api_id))
    }
}
