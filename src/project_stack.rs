//! The deployed topology: one function behind `GET /hello`.

use crate::apigateway::{HttpMethod, LambdaRestApi, LambdaRestApiProps, ResourceRef, RestApiRef};
use crate::construct::App;
use crate::error::{Error, Result};
use crate::lambda::{Code, Function, FunctionProps, FunctionRef, Runtime};
use crate::settings::Settings;
use crate::stack::{Environment, Stack, StackProps};

pub const FUNCTION_ID: &str = "HelloWorldFunction";
pub const API_ID: &str = "HelloWorldApi";
pub const HANDLER: &str = "hello.handler";
pub const HELLO_PATH_PART: &str = "hello";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStackProps {
    pub stack: StackProps,
    pub runtime: Runtime,
    pub code: Code,
}

impl Default for ProjectStackProps {
    fn default() -> Self {
        ProjectStackProps {
            stack: StackProps::default(),
            runtime: Runtime::Nodejs20X,
            code: Code::from_asset("lambda"),
        }
    }
}

impl ProjectStackProps {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(ProjectStackProps {
            stack: StackProps {
                env: Environment {
                    account: settings.account.clone(),
                    region: settings.region.clone(),
                },
                tags: settings.tags.clone(),
                termination_protection: settings.termination_protection,
            },
            runtime: settings.runtime.parse()?,
            code: Code::from_asset(settings.code_dir.clone()),
        })
    }
}

/// Handles to the constructs declared by [`ProjectStack::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStack {
    pub stack_id: String,
    pub function: FunctionRef,
    pub api: RestApiRef,
    pub hello: ResourceRef,
}

impl ProjectStack {
    pub fn new(app: &mut App, id: &str, props: ProjectStackProps) -> Result<Self> {
        let stack = app.stack(id, props.stack)?;

        let function = Function::new(
            stack,
            FUNCTION_ID,
            FunctionProps {
                runtime: props.runtime,
                code: props.code,
                handler: HANDLER.to_string(),
            },
        )?;

        let api = LambdaRestApi::new(
            stack,
            API_ID,
            LambdaRestApiProps::new(function.clone()).proxy(false),
        )?;

        let hello = api.root().add_resource(stack, HELLO_PATH_PART)?;
        hello.add_method(stack, HttpMethod::Get)?;

        Ok(ProjectStack {
            stack_id: id.to_string(),
            function,
            api,
            hello,
        })
    }

    pub fn stack<'a>(&self, app: &'a App) -> Result<&'a Stack> {
        app.stack_named(&self.stack_id)
            .ok_or_else(|| Error::ForeignConstruct(self.stack_id.clone()))
    }
}

/// Builds the app for the given settings.
pub fn build_app(settings: &Settings) -> Result<App> {
    let mut app = App::new();
    let props = ProjectStackProps::from_settings(settings)?;
    ProjectStack::new(&mut app, &settings.stack_name, props)?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apigateway::Route;

    #[test]
    fn declares_one_function_and_one_route() {
        let mut app = App::new();
        let project = ProjectStack::new(&mut app, "ProjectStack", ProjectStackProps::default())
            .unwrap();
        let stack = project.stack(&app).unwrap();

        assert_eq!(stack.functions().len(), 1);
        let function = stack.function(&project.function).unwrap();
        assert_eq!(function.runtime(), Runtime::Nodejs20X);
        assert_eq!(function.handler(), "hello.handler");
        assert_eq!(function.code(), &Code::from_asset("lambda"));

        assert_eq!(stack.rest_apis().len(), 1);
        let api = &stack.rest_apis()[0];
        assert_eq!(api.handler(), &project.function);
        assert!(!api.is_proxy());
        assert_eq!(api.paths(), vec!["/hello"]);
        assert_eq!(
            api.routes(),
            vec![Route {
                path: "/hello".to_string(),
                method: HttpMethod::Get
            }]
        );
        assert_eq!(project.hello.path(stack).unwrap(), "/hello");
    }

    fn settings(runtime: &str) -> Settings {
        Settings {
            stack_name: "HelloStack".to_string(),
            account: Some("123456789012".to_string()),
            region: None,
            tags: Default::default(),
            termination_protection: true,
            runtime: runtime.to_string(),
            code_dir: "functions".into(),
            out_dir: "cdk.out".into(),
        }
    }

    #[test]
    fn builds_app_from_settings() {
        let app = build_app(&settings("python3.12")).unwrap();
        let stack = app.stack_named("HelloStack").unwrap();
        assert!(stack.props().termination_protection);
        assert_eq!(stack.props().env.name(), "aws://123456789012/unknown-region");

        let function = &stack.functions()[0];
        assert_eq!(function.runtime(), Runtime::Python312);
        assert_eq!(function.code(), &Code::from_asset("functions"));
    }

    #[test]
    fn unknown_runtime_is_rejected() {
        assert!(matches!(
            build_app(&settings("nodejs4.3")),
            Err(Error::UnknownRuntime(_))
        ));
    }

    #[test]
    fn stack_name_must_be_unique() {
        let mut app = App::new();
        ProjectStack::new(&mut app, "ProjectStack", ProjectStackProps::default()).unwrap();
        assert!(matches!(
            ProjectStack::new(&mut app, "ProjectStack", ProjectStackProps::default()),
            Err(Error::DuplicateConstruct { .. })
        ));
    }
}
