//! Declares one Lambda function behind an API Gateway REST API at
//! `GET /hello`, and synthesizes it into a cloud assembly that a deployment
//! tool can apply.

pub mod apigateway;
pub mod assertions;
pub mod assets;
pub mod construct;
pub mod error;
pub mod lambda;
pub mod project_stack;
pub mod settings;
pub mod stack;
pub mod synth;
pub mod template;

pub use construct::App;
pub use error::{Error, Result};
pub use project_stack::{build_app, ProjectStack, ProjectStackProps};
pub use settings::Settings;
pub use stack::{Environment, Stack, StackProps};
pub use synth::CloudAssembly;
