//! run level error
use crate::backend::ProvisioningError;
use crate::builder::{BuildError, NameCollisionError};
use crate::discovery::DiscoveryError;
use crate::graph::{AssembleError, CycleError};
use crate::manifest::ManifestError;
use crate::parameter_store::{StoreError, UnresolvedParameterError};
use crate::rendered_config::MissingFieldError;
use crate::run::RunParametersError;
use crate::template::RenderError;

/// Any failure that aborts a run
///
/// Nothing is retried. When one of these is returned no descriptor has been handed to the
/// provisioning backend, except for [Error::Provisioning] and [Error::Publish].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    RunParameters(#[from] RunParametersError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Render(RenderError),
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),
    #[error(transparent)]
    UnresolvedParameter(#[from] UnresolvedParameterError),
    #[error(transparent)]
    NameCollision(#[from] NameCollisionError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
    #[error("Unable to publish {path}")]
    Publish {
        path: String,
        #[source]
        source: StoreError,
    },
}

impl From<RenderError> for Error {
    fn from(value: RenderError) -> Self {
        match value {
            RenderError::MissingField(missing) => Error::MissingField(missing),
            malformed => Error::Render(malformed),
        }
    }
}

impl From<BuildError> for Error {
    fn from(value: BuildError) -> Self {
        match value {
            BuildError::NameCollision(collision) => Error::NameCollision(collision),
            BuildError::MissingField(missing) => Error::MissingField(missing),
        }
    }
}
