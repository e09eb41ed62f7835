//! one provisioning run from discovery to publishing
use crate::backend::{Handle, ProvisioningBackend};
use crate::builder::build_all;
use crate::descriptor::ResourceKind;
use crate::discovery;
use crate::error::Error;
use crate::graph::{Assembler, Plan};
use crate::manifest::Manifest;
use crate::parameter_store::{parameter_path, ParameterStore};
use crate::rendered_config::RenderedConfig;
use crate::run::{resolve_context, resolve_storage, RunParameters};
use crate::template::{render, SubstitutionMap};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Engine {
    params: RunParameters,
    manifest: Manifest,
    substitutions: SubstitutionMap,
}

/// Result of [Engine::apply]
#[derive(Debug, Serialize)]
pub struct Applied {
    pub plan: Plan,
    pub handles: Vec<Handle>,
    /// parameter path -> published value
    pub published: IndexMap<String, String>,
}

impl Engine {
    pub fn new(params: RunParameters, manifest: Manifest) -> Result<Self, Error> {
        Self::with_variables(params, manifest, std::iter::empty())
    }

    /// Like [Engine::new] with additional substitution tokens
    pub fn with_variables<'a>(
        params: RunParameters,
        manifest: Manifest,
        variables: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, Error> {
        let substitutions = params.substitutions(variables)?;
        Ok(Self {
            params,
            manifest,
            substitutions,
        })
    }

    pub fn substitutions(&self) -> &SubstitutionMap {
        &self.substitutions
    }

    pub fn discover(&self) -> Result<Vec<PathBuf>, Error> {
        Ok(discovery::discover(
            &self.manifest.config_root,
            &self.manifest.suffix,
        )?)
    }

    /// Render every discovered document. The first bad document aborts.
    pub fn render_all(&self) -> Result<Vec<RenderedConfig>, Error> {
        discovery::load_all(&self.manifest.config_root, &self.manifest.suffix)?
            .iter()
            .map(|document| render(document, &self.substitutions).map_err(Error::from))
            .collect()
    }

    /// Resolve, build and order all descriptors without provisioning anything
    pub fn plan(&self, store: &dyn ParameterStore) -> Result<Plan, Error> {
        let rendered = self.render_all()?;

        let context = resolve_context(&self.params, &self.manifest, store)?;
        let storage = resolve_storage(&self.params, &self.manifest, store)?;
        let jobs = build_all(&rendered, &context)?;

        let mut assembler = Assembler::new();
        for target in storage {
            assembler.add_storage(target)?;
        }
        for job in jobs {
            assembler.add_job(job)?;
        }
        for stack in &self.manifest.depends_on_stacks {
            assembler.depend_on_stack(stack);
        }
        for edge in &self.manifest.dependencies {
            assembler.add_edge(edge.clone())?;
        }

        let plan = assembler.assemble()?;
        tracing::info!(
            descriptors = plan.descriptors.len(),
            edges = plan.edges.len(),
            "plan assembled"
        );
        Ok(plan)
    }

    /// Plan, provision and publish the identifiers of created resources
    ///
    /// Nothing reaches the backend unless the whole plan could be assembled.
    pub fn apply(
        &self,
        store: &mut dyn ParameterStore,
        backend: &mut dyn ProvisioningBackend,
    ) -> Result<Applied, Error> {
        let plan = self.plan(&*store)?;
        let handles = backend.provision(&plan)?;

        let mut published = IndexMap::default();
        for handle in &handles {
            let Some(path) = self.publish_path(handle) else {
                continue;
            };

            store
                .publish(&path, &handle.arn)
                .map_err(|source| Error::Publish {
                    path: path.clone(),
                    source,
                })?;
            published.insert(path, handle.arn.clone());
        }

        Ok(Applied {
            plan,
            handles,
            published,
        })
    }

    fn publish_path(&self, handle: &Handle) -> Option<String> {
        let field = match handle.id.kind {
            ResourceKind::Storage => format!("{}-bucket-arn", handle.id.name),
            ResourceKind::Job => format!("{}-job-arn", handle.id.name),
            _ => return None,
        };

        let component = self
            .manifest
            .publish_component
            .as_deref()
            .unwrap_or(&self.params.service_name);

        Some(parameter_path(
            &self.manifest.namespace,
            &self.params.env_name,
            component,
            &field,
        ))
    }
}
