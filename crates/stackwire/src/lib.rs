//! # stackwire - configuration driven provisioning
//!
//! `stackwire` turns a directory of job documents into an ordered plan of resources (batch jobs,
//! schedule triggers, storage targets and their access grants) and hands that plan to a
//! provisioning backend.
//!
//! ## Introduction for developers
//!
//! Read this to understand how a run works internally.
//!
//! ### Job documents
//!
//! One document describes one job. It may be yaml, json or hcl (picked by extension):
//! ```yaml
//! jobConfig:
//!   name: "{service_name}-cms-export"
//!   scriptLocationPrefix: admissions/outbound
//!   scriptName: transformation.py
//!   assetFolderLocation: assets
//!   jobParameters:
//!     tenant_code: UNIVERSITY
//!   schedule:
//!     dev: "cron(0 * * * ? *)"
//!     prod: ""
//! ```
//!
//! ### Loading files
//!
//! see [discovery::discover]
//!
//! The config root is walked depth-first and every file ending in the configured suffix is read as
//! a [discovery::ConfigDocument]. Directory order is kept, nothing is sorted.
//!
//! ### Rendering
//!
//! see [template::render]
//!
//! Tokens like `{env_name}` are replaced in the raw text before parsing. Substitution is a single
//! pass; replacement values are never scanned again. The result is parsed into a
//! [rendered_config::RenderedConfig]. A missing `jobConfig.name` is an error at this point.
//!
//! The tokens of a run:
//!
//! | **token**           | **value**                 |
//! |---------------------|---------------------------|
//! | `env_name`          | environment name          |
//! | `ds_account_number` | primary account           |
//! | `is_account_number` | secondary account         |
//! | `service_name`      | service name              |
//!
//! ### Context
//!
//! see [run::resolve_context]
//!
//! Role, storage root, security configuration and connections are never written into documents.
//! They are read from the [parameter_store::ParameterStore] at
//! `/{namespace}/{env_name}/{component}/{field}`. A missing or empty value aborts the run.
//!
//! ### Building
//!
//! see [builder::build]
//!
//! Each document becomes a [descriptor::JobDescriptor] and, if the document has a non-empty
//! schedule for the current environment, a [descriptor::ScheduleDescriptor]. Sizing comes from the
//! [policy::JobPolicy] table. Job names must be unique across the run.
//!
//! ### Ordering
//!
//! see [graph::Assembler]
//!
//! Descriptors become nodes of a dependency graph. Edges that follow from structure (schedule after
//! job, grant after storage) are added by the assembler itself, so a caller can not get them
//! wrong. External stacks and explicit edges from the manifest are merged into the same graph.
//! A cycle aborts the run and names its members.
//!
//! ### Provisioning
//!
//! see [engine::Engine::apply]
//!
//! Only a complete [graph::Plan] reaches the [backend::ProvisioningBackend]. The handles it returns
//! for storage targets and jobs are published back to the parameter store for other stacks.
//!
pub mod backend;
pub mod builder;
pub mod descriptor;
pub mod discovery;
pub mod engine;
mod error;
pub mod graph;
pub mod manifest;
pub mod parameter_store;
pub mod policy;
pub mod rendered_config;
pub mod run;
pub mod template;

pub use error::Error;
