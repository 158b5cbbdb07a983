use std::path::PathBuf;

/// Errors raised while declaring constructs or synthesizing a cloud assembly.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("construct id `{0}` must be non-empty and must not contain '/'")]
    InvalidId(String),
    #[error("there is already a construct named `{id}` in `{scope}`")]
    DuplicateConstruct { scope: String, id: String },
    #[error("method {method} is already defined on `{path}`")]
    DuplicateMethod { path: String, method: String },
    #[error("`{0}` belongs to a different stack")]
    ForeignConstruct(String),
    #[error("cannot add resources or methods to proxying api `{0}`; set proxy to false")]
    ProxyApi(String),
    #[error("unknown lambda runtime `{0}`")]
    UnknownRuntime(String),
    #[error("cannot find asset directory `{}`", .0.display())]
    AssetNotFound(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
