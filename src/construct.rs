//! The construct tree root and the naming rules shared by every construct.
//!
//! Constructs are registered explicitly: the [`App`] owns its stacks, and a
//! stack owns the declarations made into it. Handles returned by the
//! declaring functions are the only way to refer to another construct, so a
//! reference can never point at something that has not been declared yet.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::stack::{Stack, StackProps};

const HASH_LEN: usize = 8;
const MAX_HUMAN_LEN: usize = 240;

/// Root scope. Holds every stack declared for one synthesis run.
#[derive(Debug, Default)]
pub struct App {
    stacks: Vec<Stack>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new stack under the app.
    pub fn stack(&mut self, id: &str, props: StackProps) -> Result<&mut Stack> {
        validate_id(id)?;
        if self.stacks.iter().any(|stack| stack.id() == id) {
            return Err(Error::DuplicateConstruct {
                scope: "App".to_string(),
                id: id.to_string(),
            });
        }

        log::debug!("declared stack {id}");
        self.stacks.push(Stack::new(id, props));
        let index = self.stacks.len() - 1;
        Ok(&mut self.stacks[index])
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn stack_named(&self, id: &str) -> Option<&Stack> {
        self.stacks.iter().find(|stack| stack.id() == id)
    }

    pub fn stack_named_mut(&mut self, id: &str) -> Option<&mut Stack> {
        self.stacks.iter_mut().find(|stack| stack.id() == id)
    }
}

pub(crate) fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains('/') {
        return Err(Error::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Allocates the template logical id for a construct path inside a stack.
///
/// `Default` components are dropped everywhere and a trailing `Resource` is
/// dropped from the readable part. The suffix is derived from the full path,
/// so two paths that read the same still get distinct ids.
pub fn logical_id(components: &[&str]) -> String {
    if components.len() == 1 {
        let candidate = alphanumeric(components[0]);
        if candidate.len() <= MAX_HUMAN_LEN {
            return candidate;
        }
    }

    let mut human: Vec<&str> = components
        .iter()
        .copied()
        .filter(|component| *component != "Default")
        .collect();
    if human.last() == Some(&"Resource") {
        human.pop();
    }
    human.dedup();

    let mut readable = alphanumeric(&human.concat());
    readable.truncate(MAX_HUMAN_LEN);
    format!("{readable}{}", path_hash(components))
}

fn path_hash(components: &[&str]) -> String {
    short_hash(&components.join("/"))
}

/// First 8 upper-case hex digits of the SHA-256 of `data`.
pub(crate) fn short_hash(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    let digest = format!("{:X}", hasher.finalize());
    digest[..HASH_LEN].to_string()
}

fn alphanumeric(value: &str) -> String {
    value.chars().filter(char::is_ascii_alphanumeric).collect()
}
