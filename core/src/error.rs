use thiserror::Error;

/// Failure categories surfaced by the core.
///
/// Fallible functions return `anyhow::Result`; these values travel inside the
/// `anyhow::Error` so callers can branch with `downcast_ref::<BrewError>()`.
#[derive(Debug, Error)]
pub enum BrewError {
    /// Input rejected before any write (empty bean name, empty taste set, ...).
    #[error("{0}")]
    Validation(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Unknown brew method '{0}'")]
    UnknownMethod(String),

    /// Remote suggestion could not be used. Always handled by falling back to
    /// the local rules; never shown to the user.
    #[error("Remote suggestion failed: {0}")]
    RemoteSuggestion(String),

    #[error("Failed to write '{key}' to the store")]
    StoreWrite {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BrewError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        BrewError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
