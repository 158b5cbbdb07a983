use std::collections::BTreeMap;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "PROJECT";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub stack_name: String,
    pub account: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub termination_protection: bool,
    pub runtime: String,
    pub code_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl Settings {
    /// Reads `<name>.json` when present, then `PROJECT_*` variables.
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("stack_name", "ProjectStack")?
            .set_default("termination_protection", false)?
            .set_default("runtime", "nodejs20.x")?
            .set_default("code_dir", "lambda")?
            .set_default("out_dir", "cdk.out")?
            .add_source(File::with_name(name).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        s.try_deserialize()
    }
}
