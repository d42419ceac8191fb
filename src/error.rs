use event_catalog_core::resolve::ConflictError;
use std::path::PathBuf;

use crate::loader::LoadError;
use crate::openapi::OpenApiError;

/// A fatal build failure.
///
/// Everything except [`BuildError::Persist`] and
/// [`BuildError::Fingerprint`] is raised before the database is touched.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("catalog root does not exist: {0}")]
    MissingRoot(PathBuf),
    #[error("failed to scan catalog")]
    Scan(#[source] anyhow::Error),
    #[error("failed to set up OpenAPI resolution")]
    OpenApiSetup(#[source] OpenApiError),
    #[error("failed to load {dir}")]
    Load {
        dir: String,
        #[source]
        source: LoadError,
    },
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("failed to write catalog database")]
    Persist(#[source] anyhow::Error),
    #[error("failed to update catalog fingerprint")]
    Fingerprint(#[source] anyhow::Error),
}
