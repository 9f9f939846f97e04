use thiserror::Error;

/// Everything that can go wrong between the host, the vault and the view.
///
/// None of these are fatal: the controller logs them and leaves the
/// presentation stale rather than propagating to the host.
#[derive(Debug, Error)]
pub enum ChiselError {
    #[error("note \"{0}\" not found")]
    NoteNotFound(String),

    #[error("\"{0}\" is not a valid CSS class name")]
    InvalidClass(String),

    #[error("vault is not ready yet")]
    VaultUnavailable,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid settings data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("host error: {0}")]
    Host(String),
}

pub type Result<T, E = ChiselError> = std::result::Result<T, E>;
