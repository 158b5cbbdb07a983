use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::apigateway::LambdaRestApi;
use crate::assets::StagedAsset;
use crate::construct::validate_id;
use crate::error::{Error, Result};
use crate::lambda::{Function, FunctionRef};
use crate::template::Template;

/// Target account and region. Unset values are resolved at deploy time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    /// `aws://<account>/<region>`, with placeholders for unset parts.
    pub fn name(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region"),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackProps {
    pub env: Environment,
    /// Labels attached to every taggable resource in the stack.
    pub tags: BTreeMap<String, String>,
    pub termination_protection: bool,
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// A named collection of declarations that is deployed and destroyed as a unit.
#[derive(Debug)]
pub struct Stack {
    id: String,
    /// Distinguishes this stack from same-named stacks in other apps.
    token: u64,
    props: StackProps,
    children: BTreeSet<String>,
    pub(crate) functions: Vec<Function>,
    pub(crate) rest_apis: Vec<LambdaRestApi>,
}

impl Stack {
    pub(crate) fn new(id: &str, props: StackProps) -> Self {
        Stack {
            id: id.to_string(),
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            props,
            children: BTreeSet::new(),
            functions: Vec::new(),
            rest_apis: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn props(&self) -> &StackProps {
        &self.props
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn rest_apis(&self) -> &[LambdaRestApi] {
        &self.rest_apis
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    pub fn function(&self, handle: &FunctionRef) -> Result<&Function> {
        self.owns(handle.token, &handle.stack, &handle.id)?;
        self.functions
            .get(handle.index)
            .filter(|function| function.id() == handle.id)
            .ok_or_else(|| Error::ForeignConstruct(format!("{}/{}", handle.stack, handle.id)))
    }

    /// Reserves a top-level construct id inside this stack.
    pub(crate) fn claim_id(&mut self, id: &str) -> Result<()> {
        validate_id(id)?;
        if !self.children.insert(id.to_string()) {
            return Err(Error::DuplicateConstruct {
                scope: self.id.clone(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn owns(&self, token: u64, stack: &str, id: &str) -> Result<()> {
        if token != self.token || stack != self.id {
            return Err(Error::ForeignConstruct(format!("{stack}/{id}")));
        }
        Ok(())
    }

    /// Local code directories referenced by functions in this stack.
    pub fn asset_paths(&self) -> BTreeSet<&Path> {
        self.functions
            .iter()
            .filter_map(|function| function.code().asset_path())
            .collect()
    }

    /// Renders every declaration into a template. `assets` maps each declared
    /// code directory to its staged fingerprint.
    pub fn render(&self, assets: &BTreeMap<&Path, StagedAsset>) -> Result<Template> {
        let mut template = Template::for_stack();
        for function in &self.functions {
            function.render(&self.props.tags, assets, &mut template)?;
        }
        for api in &self.rest_apis {
            api.render(self, &mut template)?;
        }
        Ok(template)
    }
}
