//! Synthesis: from a construct tree to a cloud assembly.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::assets::{copy_dir, fingerprint, AssetManifest, StagedAsset};
use crate::construct::App;
use crate::error::{Error, Result};
use crate::template::Template;

pub const CLOUD_ASSEMBLY_VERSION: &str = "36.0.0";

/// Rendered form of one stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackArtifact {
    pub stack_name: String,
    pub environment: String,
    pub termination_protection: bool,
    pub tags: BTreeMap<String, String>,
    pub template: Template,
    pub assets: Vec<StagedAsset>,
}

impl StackArtifact {
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.stack_name)
    }

    pub fn assets_file(&self) -> String {
        format!("{}.assets.json", self.stack_name)
    }

    fn assets_artifact(&self) -> String {
        format!("{}.assets", self.stack_name)
    }

    pub fn asset_manifest(&self) -> AssetManifest {
        AssetManifest::new(&self.assets)
    }
}

/// Everything a deployment tool needs, held in memory until written.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudAssembly {
    pub stacks: Vec<StackArtifact>,
}

impl App {
    /// Renders every stack. Relative asset paths resolve against `base_dir`.
    pub fn synth(&self, base_dir: &Path) -> Result<CloudAssembly> {
        let mut stacks = Vec::with_capacity(self.stacks().len());
        for stack in self.stacks() {
            let mut staged = BTreeMap::new();
            for path in stack.asset_paths() {
                let asset = StagedAsset::stage(&base_dir.join(path))?;
                staged.insert(path, asset);
            }

            let template = stack.render(&staged)?;
            log::info!(
                "synthesized {} ({} resources, {} assets)",
                stack.id(),
                template.resources.len(),
                staged.len()
            );

            let mut assets: Vec<StagedAsset> = staged.into_values().collect();
            assets.sort_by(|a, b| a.hash.cmp(&b.hash));
            assets.dedup_by(|a, b| a.hash == b.hash);

            let props = stack.props();
            stacks.push(StackArtifact {
                stack_name: stack.id().to_string(),
                environment: props.env.name(),
                termination_protection: props.termination_protection,
                tags: props.tags.clone(),
                template,
                assets,
            });
        }
        Ok(CloudAssembly { stacks })
    }
}

impl CloudAssembly {
    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|stack| stack.stack_name == name)
    }

    /// Contents of `manifest.json`.
    pub fn manifest(&self) -> Value {
        let mut artifacts = serde_json::Map::new();
        for stack in &self.stacks {
            artifacts.insert(
                stack.assets_artifact(),
                json!({
                    "type": "cdk:asset-manifest",
                    "properties": { "file": stack.assets_file() },
                }),
            );

            let mut properties = json!({
                "templateFile": stack.template_file(),
                "terminationProtection": stack.termination_protection,
            });
            if !stack.tags.is_empty() {
                properties["tags"] = json!(stack.tags);
            }
            artifacts.insert(
                stack.stack_name.clone(),
                json!({
                    "type": "aws:cloudformation:stack",
                    "environment": stack.environment,
                    "properties": properties,
                    "dependencies": [stack.assets_artifact()],
                }),
            );
        }
        json!({
            "version": CLOUD_ASSEMBLY_VERSION,
            "artifacts": artifacts,
        })
    }

    /// Writes the manifest, templates, asset manifests and staged asset
    /// directories into `out_dir`.
    pub fn write_to(&self, out_dir: &Path) -> Result<()> {
        fs::create_dir_all(out_dir)?;
        for stack in &self.stacks {
            let template = stack.template.to_json_pretty()?;
            fs::write(out_dir.join(stack.template_file()), template)?;

            let manifest = serde_json::to_string_pretty(&stack.asset_manifest())?;
            fs::write(out_dir.join(stack.assets_file()), manifest)?;

            for asset in &stack.assets {
                let target = out_dir.join(asset.staged_dir_name());
                if target.is_dir() {
                    if fingerprint(&target)? == asset.hash {
                        continue;
                    }
                    log::warn!("restaging {}, contents changed", target.display());
                    fs::remove_dir_all(&target)?;
                } else if target.exists() {
                    fs::remove_file(&target)?;
                }
                if !asset.source.is_dir() {
                    return Err(Error::AssetNotFound(asset.source.clone()));
                }
                copy_dir(&asset.source, &target)?;
            }
        }

        let manifest = serde_json::to_string_pretty(&self.manifest())?;
        fs::write(out_dir.join("manifest.json"), manifest)?;
        log::info!(
            "wrote cloud assembly with {} stack(s) to {}",
            self.stacks.len(),
            out_dir.display()
        );
        Ok(())
    }
}
