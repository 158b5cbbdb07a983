//! Local code assets: fingerprinting, staging and the asset manifest.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const ASSETS_BUCKET: &str = "cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}";
pub const ASSET_MANIFEST_VERSION: &str = "36.0.0";

/// A code directory with its content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub hash: String,
    pub source: PathBuf,
}

impl StagedAsset {
    /// Fingerprints the directory at `source`.
    pub fn stage(source: &Path) -> Result<Self> {
        let hash = fingerprint(source)?;
        log::debug!("fingerprinted {} -> {hash}", source.display());
        Ok(StagedAsset {
            hash,
            source: source.to_path_buf(),
        })
    }

    pub fn object_key(&self) -> String {
        format!("{}.zip", self.hash)
    }

    /// Directory name of the staged copy inside the assembly.
    pub fn staged_dir_name(&self) -> String {
        format!("asset.{}", self.hash)
    }
}

/// SHA-256 over the relative name and contents of every file below `dir`,
/// visited in sorted order.
pub fn fingerprint(dir: &Path) -> Result<String> {
    if !dir.is_dir() {
        return Err(Error::AssetNotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for relative in files {
        let contents = fs::read(dir.join(&relative))?;
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update((contents.len() as u64).to_be_bytes());
        hasher.update(&contents);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(relative);
        }
    }
    Ok(())
}

pub(crate) fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetManifest {
    pub version: String,
    pub files: BTreeMap<String, FileAsset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAsset {
    pub source: FileSource,
    pub destinations: BTreeMap<String, FileDestination>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSource {
    pub path: String,
    pub packaging: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDestination {
    pub bucket_name: String,
    pub object_key: String,
}

impl AssetManifest {
    pub fn new<'a>(assets: impl IntoIterator<Item = &'a StagedAsset>) -> Self {
        let files = assets
            .into_iter()
            .map(|asset| {
                let file = FileAsset {
                    source: FileSource {
                        path: asset.staged_dir_name(),
                        packaging: "zip".to_string(),
                    },
                    destinations: BTreeMap::from([(
                        "current_account-current_region".to_string(),
                        FileDestination {
                            bucket_name: ASSETS_BUCKET.to_string(),
                            object_key: asset.object_key(),
                        },
                    )]),
                };
                (asset.hash.clone(), file)
            })
            .collect();
        AssetManifest {
            version: ASSET_MANIFEST_VERSION.to_string(),
            files,
        }
    }
}
