//! run parameters and everything derived from them before building
use crate::builder::{storage_root_uri, BuildContext};
use crate::descriptor::StorageTarget;
use crate::manifest::Manifest;
use crate::parameter_store::{ParameterReference, ParameterStore, UnresolvedParameterError};
use crate::template::SubstitutionMap;
use indexmap::IndexMap;

/// Tokens every run defines
pub const ENV_NAME_TOKEN: &str = "env_name";
pub const PRIMARY_ACCOUNT_TOKEN: &str = "ds_account_number";
pub const SECONDARY_ACCOUNT_TOKEN: &str = "is_account_number";
pub const SERVICE_NAME_TOKEN: &str = "service_name";

/// Identity of one provisioning run
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct RunParameters {
    pub env_name: String,
    /// account holding the data services
    pub primary_account: String,
    /// account holding the integration services
    pub secondary_account: String,
    pub service_name: String,
}

impl RunParameters {
    pub fn validate(&self) -> Result<(), RunParametersError> {
        for (field, value) in self.fields() {
            if value.trim().is_empty() {
                return Err(RunParametersError::Empty(field));
            }
        }

        Ok(())
    }

    /// Substitution map of this run plus `extra` tokens
    ///
    /// Extra tokens can not replace the run's own tokens.
    pub fn substitutions<'a>(
        &self,
        extra: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<SubstitutionMap, RunParametersError> {
        self.validate()?;

        let mut substitutions: SubstitutionMap = self.fields().into_iter().collect();
        for (token, value) in extra {
            if substitutions.contains(token) {
                return Err(RunParametersError::ReservedToken(token.to_owned()));
            }
            substitutions.insert(token, value);
        }

        Ok(substitutions)
    }

    /// Arguments handed to every job
    pub fn default_arguments(&self) -> IndexMap<String, String> {
        self.fields()
            .into_iter()
            .filter(|(token, _)| *token != SERVICE_NAME_TOKEN)
            .map(|(token, value)| (format!("--{token}"), value.to_owned()))
            .collect()
    }

    fn fields(&self) -> [(&'static str, &str); 4] {
        [
            (ENV_NAME_TOKEN, self.env_name.as_str()),
            (PRIMARY_ACCOUNT_TOKEN, self.primary_account.as_str()),
            (SECONDARY_ACCOUNT_TOKEN, self.secondary_account.as_str()),
            (SERVICE_NAME_TOKEN, self.service_name.as_str()),
        ]
    }
}

/// Resolve the build context through the parameter store
pub fn resolve_context(
    params: &RunParameters,
    manifest: &Manifest,
    store: &dyn ParameterStore,
) -> Result<BuildContext, UnresolvedParameterError> {
    let resolve = |reference: &ParameterReference| {
        store.resolve(&reference.path(&manifest.namespace, &params.env_name))
    };

    let references = &manifest.parameters;
    let role_arn = resolve(&references.role_arn)?;
    let storage_root = storage_root_uri(&resolve(&references.storage_root)?);
    let security_configuration = resolve(&references.security_configuration)?;
    let connections = resolve(&references.connections)?
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect();

    Ok(BuildContext {
        env_name: params.env_name.clone(),
        service_name: params.service_name.clone(),
        job_kind: manifest.job_kind.clone(),
        role_arn,
        storage_root,
        security_configuration,
        connections,
        default_arguments: params.default_arguments(),
        policy: manifest.policy.clone(),
    })
}

/// Resolve the manifest's storage targets through the parameter store
pub fn resolve_storage(
    params: &RunParameters,
    manifest: &Manifest,
    store: &dyn ParameterStore,
) -> Result<Vec<StorageTarget>, UnresolvedParameterError> {
    manifest
        .storage
        .iter()
        .map(|config| -> Result<StorageTarget, UnresolvedParameterError> {
            let encryption_key_arn = store.resolve(
                &config
                    .encryption_key
                    .path(&manifest.namespace, &params.env_name),
            )?;

            Ok(StorageTarget {
                name: config.name.clone(),
                encryption_key_arn,
                versioned: config.versioned,
                block_public_access: config.block_public_access,
                enforce_tls: config.enforce_tls,
                access_log_target: config.access_log_target.clone(),
                grants: config.grants.clone(),
            })
        })
        .collect()
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RunParametersError {
    #[error("Run parameter `{0}` must not be empty")]
    Empty(&'static str),
    #[error("Token `{0}` is reserved for run parameters")]
    ReservedToken(String),
}
