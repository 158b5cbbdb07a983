use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use apigw_lambda_base::assertions::Template;
use apigw_lambda_base::apigateway::HttpMethod;
use apigw_lambda_base::lambda::{Code, Runtime};
use apigw_lambda_base::{
    App, CloudAssembly, Environment, Error, ProjectStack, ProjectStackProps, StackProps,
};
use serde_json::{json, Value};
use tempfile::TempDir;

const STACK: &str = "ProjectStack";

fn project_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("lambda")).unwrap();
    fs::write(
        dir.path().join("lambda/hello.js"),
        "exports.handler = async () => ({ statusCode: 200, body: 'hello' });",
    )
    .unwrap();
    dir
}

fn synth(base: &Path, props: ProjectStackProps) -> CloudAssembly {
    let mut app = App::new();
    ProjectStack::new(&mut app, STACK, props).unwrap();
    app.synth(base).unwrap()
}

fn template(base: &Path, props: ProjectStackProps) -> Template {
    Template::from_stack(&synth(base, props), STACK).unwrap()
}

fn only(template: &Template, resource_type: &str) -> (String, Value) {
    let mut found = template.find_resources(resource_type);
    assert_eq!(found.len(), 1, "expected a single {resource_type}");
    found.pop_first().unwrap()
}

#[test]
fn declares_one_function_with_runtime_and_handler() {
    let dir = project_dir();
    let template = template(dir.path(), ProjectStackProps::default());

    template.resource_count_is("AWS::Lambda::Function", 1).unwrap();
    template
        .has_resource_properties(
            "AWS::Lambda::Function",
            &json!({ "Runtime": "nodejs20.x", "Handler": "hello.handler" }),
        )
        .unwrap();
}

#[test]
fn declares_one_api_that_invokes_the_function() {
    let dir = project_dir();
    let template = template(dir.path(), ProjectStackProps::default());

    template.resource_count_is("AWS::ApiGateway::RestApi", 1).unwrap();
    let (function_id, _) = only(&template, "AWS::Lambda::Function");
    let (api_id, api) = only(&template, "AWS::ApiGateway::RestApi");
    assert_eq!(api["Properties"]["Name"], "HelloWorldApi");

    let (_, method) = only(&template, "AWS::ApiGateway::Method");
    assert_eq!(method["Properties"]["RestApiId"], json!({ "Ref": api_id }));
    let uri = method["Properties"]["Integration"]["Uri"].to_string();
    assert!(uri.contains(&format!(r#"{{"Fn::GetAtt":["{function_id}","Arn"]}}"#)));

    for (_, permission) in template.find_resources("AWS::Lambda::Permission") {
        assert_eq!(
            permission["Properties"]["FunctionName"],
            json!({ "Fn::GetAtt": [function_id, "Arn"] })
        );
    }
}

#[test]
fn resource_tree_has_a_single_hello_segment() {
    let dir = project_dir();
    let template = template(dir.path(), ProjectStackProps::default());

    template.resource_count_is("AWS::ApiGateway::Resource", 1).unwrap();
    let (api_id, _) = only(&template, "AWS::ApiGateway::RestApi");
    template
        .has_resource_properties(
            "AWS::ApiGateway::Resource",
            &json!({
                "PathPart": "hello",
                "ParentId": { "Fn::GetAtt": [api_id, "RootResourceId"] },
            }),
        )
        .unwrap();
}

#[test]
fn hello_segment_allows_only_get() {
    let dir = project_dir();
    let template = template(dir.path(), ProjectStackProps::default());

    template.resource_count_is("AWS::ApiGateway::Method", 1).unwrap();
    let (resource_id, _) = only(&template, "AWS::ApiGateway::Resource");
    template
        .has_resource_properties(
            "AWS::ApiGateway::Method",
            &json!({
                "HttpMethod": "GET",
                "AuthorizationType": "NONE",
                "ResourceId": { "Ref": resource_id },
                "Integration": { "Type": "AWS_PROXY", "IntegrationHttpMethod": "POST" },
            }),
        )
        .unwrap();
}

#[test]
fn synthesis_is_deterministic() {
    let dir = project_dir();
    let first = synth(dir.path(), ProjectStackProps::default());
    let second = synth(dir.path(), ProjectStackProps::default());
    assert_eq!(first, second);
    assert_eq!(first.manifest(), second.manifest());

    let a = first.stacks[0].template.to_json_pretty().unwrap();
    let b = second.stacks[0].template.to_json_pretty().unwrap();
    assert_eq!(a, b);
}

#[test]
fn runtime_change_touches_only_the_runtime_property() {
    let dir = project_dir();
    let before = template(dir.path(), ProjectStackProps::default());
    let after = template(
        dir.path(),
        ProjectStackProps {
            runtime: Runtime::Nodejs22X,
            ..ProjectStackProps::default()
        },
    );
    assert_ne!(before, after);

    let (function_id, _) = only(&after, "AWS::Lambda::Function");
    let mut patched = after.to_json().clone();
    let runtime = &mut patched["Resources"][&function_id]["Properties"]["Runtime"];
    assert_eq!(*runtime, "nodejs22.x");
    *runtime = json!("nodejs20.x");

    assert_eq!(&patched, before.to_json());
}

#[test]
fn exposes_the_stage_endpoint() {
    let dir = project_dir();
    let template = template(dir.path(), ProjectStackProps::default());

    template.resource_count_is("AWS::ApiGateway::Deployment", 1).unwrap();
    template
        .has_resource_properties("AWS::ApiGateway::Stage", &json!({ "StageName": "prod" }))
        .unwrap();
    let (stage_id, _) = only(&template, "AWS::ApiGateway::Stage");
    let (api_id, _) = only(&template, "AWS::ApiGateway::RestApi");
    template
        .has_output(
            "HelloWorldApiEndpoint",
            &json!({ "Fn::Join": ["", [
                "https://",
                { "Ref": api_id },
                ".execute-api.",
                { "Ref": "AWS::Region" },
                ".",
                { "Ref": "AWS::URLSuffix" },
                "/",
                { "Ref": stage_id },
                "/",
            ]] }),
        )
        .unwrap();
}

#[test]
fn tags_reach_every_taggable_resource() {
    let dir = project_dir();
    let props = ProjectStackProps {
        stack: StackProps {
            tags: BTreeMap::from([("team".to_string(), "platform".to_string())]),
            ..StackProps::default()
        },
        ..ProjectStackProps::default()
    };
    let template = template(dir.path(), props);

    let tags = json!({ "Tags": [{ "Key": "team", "Value": "platform" }] });
    for resource_type in [
        "AWS::Lambda::Function",
        "AWS::IAM::Role",
        "AWS::ApiGateway::RestApi",
        "AWS::ApiGateway::Stage",
    ] {
        template
            .has_resource_properties(resource_type, &tags)
            .unwrap();
    }
    let (_, method) = only(&template, "AWS::ApiGateway::Method");
    assert!(method["Properties"].get("Tags").is_none());
}

#[test]
fn manifest_records_environment_and_termination_protection() {
    let dir = project_dir();
    let props = ProjectStackProps {
        stack: StackProps {
            env: Environment {
                account: Some("111111111111".to_string()),
                region: Some("ap-northeast-2".to_string()),
            },
            termination_protection: true,
            ..StackProps::default()
        },
        ..ProjectStackProps::default()
    };
    let manifest = synth(dir.path(), props).manifest();
    let stack = &manifest["artifacts"][STACK];
    assert_eq!(stack["type"], "aws:cloudformation:stack");
    assert_eq!(stack["environment"], "aws://111111111111/ap-northeast-2");
    assert_eq!(stack["properties"]["terminationProtection"], true);
    assert_eq!(stack["dependencies"], json!(["ProjectStack.assets"]));
}

#[test]
fn code_asset_is_staged_by_content_hash() {
    let dir = project_dir();
    let assembly = synth(dir.path(), ProjectStackProps::default());
    let asset = &assembly.stacks[0].assets[0];

    let template = Template::from_stack(&assembly, STACK).unwrap();
    template
        .has_resource_properties(
            "AWS::Lambda::Function",
            &json!({ "Code": { "S3Key": format!("{}.zip", asset.hash) } }),
        )
        .unwrap();

    let out = dir.path().join("cdk.out");
    assembly.write_to(&out).unwrap();
    assert!(out
        .join(format!("asset.{}", asset.hash))
        .join("hello.js")
        .is_file());
}

#[test]
fn inline_code_needs_no_asset_directory() {
    let dir = tempfile::tempdir().unwrap();
    let props = ProjectStackProps {
        code: Code::from_inline("exports.handler = async () => ({ statusCode: 200 });"),
        ..ProjectStackProps::default()
    };
    let assembly = synth(dir.path(), props);
    assert!(assembly.stacks[0].assets.is_empty());
}

#[test]
fn missing_code_directory_fails_synthesis() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = App::new();
    ProjectStack::new(&mut app, STACK, ProjectStackProps::default()).unwrap();
    let err = app.synth(dir.path()).unwrap_err();
    assert!(err.to_string().starts_with("cannot find asset directory"));
}

#[test]
fn logical_ids_keep_readable_prefixes() {
    let dir = project_dir();
    let template = template(dir.path(), ProjectStackProps::default());

    let (function_id, _) = only(&template, "AWS::Lambda::Function");
    let (role_id, _) = only(&template, "AWS::IAM::Role");
    let (resource_id, _) = only(&template, "AWS::ApiGateway::Resource");
    let (method_id, _) = only(&template, "AWS::ApiGateway::Method");
    assert!(function_id.starts_with("HelloWorldFunction"));
    assert!(role_id.starts_with("HelloWorldFunctionServiceRole"));
    assert!(resource_id.starts_with("HelloWorldApihello"));
    assert!(method_id.starts_with("HelloWorldApihelloGET"));
}

#[test]
fn handles_stay_with_their_own_app() {
    let dir = project_dir();
    let mut first = App::new();
    let mut second = App::new();
    let ours = ProjectStack::new(&mut first, STACK, ProjectStackProps::default()).unwrap();
    let theirs = ProjectStack::new(&mut second, STACK, ProjectStackProps::default()).unwrap();

    let nested = ours
        .hello
        .add_resource(first.stack_named_mut(STACK).unwrap(), "nested")
        .unwrap();
    let other_stack = second.stack_named_mut(STACK).unwrap();
    assert!(matches!(
        nested.add_resource(other_stack, "deeper"),
        Err(Error::ForeignConstruct(_))
    ));
    assert!(matches!(
        nested.add_method(other_stack, HttpMethod::Post),
        Err(Error::ForeignConstruct(_))
    ));
    assert!(matches!(
        other_stack.function(&ours.function),
        Err(Error::ForeignConstruct(_))
    ));
    assert!(other_stack.function(&theirs.function).is_ok());

    let template = Template::from_stack(&second.synth(dir.path()).unwrap(), STACK).unwrap();
    template.resource_count_is("AWS::ApiGateway::Resource", 1).unwrap();
    template.resource_count_is("AWS::ApiGateway::Method", 1).unwrap();
}

