//! provisioning backend boundary
use crate::descriptor::{Descriptor, ResourceId};
use crate::graph::Plan;
use indexmap::IndexMap;
use serde::Serialize;

/// Materializes a [Plan]
///
/// Descriptors arrive in dependency order. Implementations create them in that order and may use
/// handles of earlier descriptors to wire later ones.
pub trait ProvisioningBackend {
    fn provision(&mut self, plan: &Plan) -> Result<Vec<Handle>, ProvisioningError>;
}

/// Identifier of a created resource
///
/// For grants this is the comma separated list of resource scopes the grant applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handle {
    pub id: ResourceId,
    pub arn: String,
}

/// Creating a descriptor failed
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Provisioning {failed} failed: {message}")]
pub struct ProvisioningError {
    pub failed: ResourceId,
    pub message: String,
}

/// Backend that creates nothing and returns the identifiers resources would get
#[derive(Debug, Clone, derive_new::new)]
pub struct DryRunBackend {
    region: String,
    account: String,
}

impl DryRunBackend {
    fn arn_for(
        &self,
        descriptor: &Descriptor,
        created: &IndexMap<ResourceId, String>,
    ) -> Result<String, String> {
        let dependency = |id: &ResourceId| {
            created
                .get(id)
                .cloned()
                .ok_or_else(|| format!("{id} has not been created yet"))
        };

        let DryRunBackend { region, account } = self;
        Ok(match descriptor {
            Descriptor::Job(job) => format!("arn:aws:glue:{region}:{account}:job/{}", job.name),
            Descriptor::Schedule(schedule) => {
                dependency(&schedule.job)?;
                format!("arn:aws:glue:{region}:{account}:trigger/{}", schedule.name)
            }
            Descriptor::Storage(storage) => format!("arn:aws:s3:::{}", storage.name),
            Descriptor::Grant(grant) => {
                let bucket_arn = dependency(&grant.storage)?;
                grant
                    .grant
                    .resources
                    .iter()
                    .map(|scope| format!("{bucket_arn}{scope}"))
                    .collect::<Vec<_>>()
                    .join(",")
            }
            Descriptor::ExternalStack { name } => {
                format!("arn:aws:cloudformation:{region}:{account}:stack/{name}")
            }
        })
    }
}

impl ProvisioningBackend for DryRunBackend {
    fn provision(&mut self, plan: &Plan) -> Result<Vec<Handle>, ProvisioningError> {
        let mut created: IndexMap<ResourceId, String> = IndexMap::default();

        for descriptor in &plan.descriptors {
            let id = descriptor.id();
            let arn = self
                .arn_for(descriptor, &created)
                .map_err(|message| ProvisioningError {
                    failed: id.clone(),
                    message,
                })?;

            tracing::info!(%id, arn = %arn, "provisioned (dry run)");
            created.insert(id, arn);
        }

        Ok(created
            .into_iter()
            .map(|(id, arn)| Handle { id, arn })
            .collect())
    }
}
