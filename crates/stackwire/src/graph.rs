//! dependency graph of one run
//!
//! [Assembler] collects descriptors and adds the edges that follow from their structure:
//! - a schedule depends on the job it triggers
//! - a grant depends on the storage target it applies to
//! - a storage target depends on the storage target it writes access logs to (if part of the run)
//! - every descriptor depends on the external stacks registered via [Assembler::depend_on_stack]
//!
//! Callers may add explicit [DependencyEdge]s on top. [Assembler::assemble] linearizes the graph.
//! Among descriptors that are ready at the same time the one added first is emitted first, so the
//! result is deterministic for a given input order.
use crate::builder::BuiltJob;
use crate::descriptor::{Descriptor, GrantDescriptor, ResourceId, ResourceKind, StorageTarget};
use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// `from` must only be provisioned after `to` exists
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: ResourceId,
    pub to: ResourceId,
}

impl DependencyEdge {
    pub fn new(from: ResourceId, to: ResourceId) -> Self {
        Self { from, to }
    }
}

impl std::fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Descriptors in emission order plus the edges that justify it
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub descriptors: Vec<Descriptor>,
    pub edges: Vec<DependencyEdge>,
}

impl Plan {
    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.descriptors
            .iter()
            .position(|descriptor| &descriptor.id() == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.descriptors.iter().map(Descriptor::id)
    }
}

#[derive(Debug, Default)]
pub struct Assembler {
    /// edges point from prerequisite to dependent
    graph: DiGraph<ResourceId, ()>,
    nodes: IndexMap<ResourceId, (NodeIndex, Descriptor)>,
    edges: Vec<DependencyEdge>,
    stacks: Vec<ResourceId>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job and, if present, its schedule
    pub fn add_job(&mut self, built: BuiltJob) -> Result<(), AssembleError> {
        let job_id = built.job.id();
        self.insert(Descriptor::Job(built.job))?;

        if let Some(schedule) = built.schedule {
            let schedule_id = schedule.id();
            self.insert(Descriptor::Schedule(schedule))?;
            self.connect(schedule_id, job_id);
        }

        Ok(())
    }

    /// Add a storage target and one grant descriptor per access grant
    pub fn add_storage(&mut self, target: StorageTarget) -> Result<(), AssembleError> {
        let storage_id = target.id();
        let grants: Vec<_> = target
            .grants
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, grant)| GrantDescriptor {
                storage: storage_id.clone(),
                index,
                grant,
            })
            .collect();

        self.insert(Descriptor::Storage(target))?;

        for grant in grants {
            let grant_id = grant.id();
            self.insert(Descriptor::Grant(grant))?;
            self.connect(grant_id, storage_id.clone());
        }

        Ok(())
    }

    /// Register an external stack. Adding the same stack twice is a no-op.
    pub fn add_external_stack(&mut self, name: &str) {
        let id = ResourceId::stack(name);
        if !self.nodes.contains_key(&id) {
            self.insert_unchecked(Descriptor::ExternalStack {
                name: name.to_owned(),
            });
        }
    }

    /// Every descriptor of this run depends on the external stack `name`
    pub fn depend_on_stack(&mut self, name: &str) {
        self.add_external_stack(name);

        let id = ResourceId::stack(name);
        if !self.stacks.contains(&id) {
            self.stacks.push(id);
        }
    }

    /// Add an explicit edge
    ///
    /// Unknown `stack:` ids are added as external stacks, any other unknown id is an error.
    pub fn add_edge(&mut self, edge: DependencyEdge) -> Result<(), AssembleError> {
        for id in [&edge.from, &edge.to] {
            if self.nodes.contains_key(id) {
                continue;
            }

            if id.kind != ResourceKind::Stack {
                return Err(AssembleError::UnknownResource {
                    id: id.clone(),
                    edge: edge.clone(),
                });
            }

            self.add_external_stack(&id.name);
        }

        self.connect(edge.from, edge.to);
        Ok(())
    }

    pub fn assemble(mut self) -> Result<Plan, CycleError> {
        self.apply_implicit_edges();

        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|node| {
                self.graph
                    .neighbors_directed(node, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .graph
            .node_indices()
            .filter(|node| in_degree[node.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for dependent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[dependent.index()] -= 1;
                if in_degree[dependent.index()] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() < self.graph.node_count() {
            return Err(self.cycle());
        }

        let mut descriptors: Vec<Option<Descriptor>> = self
            .nodes
            .into_values()
            .map(|(_, descriptor)| Some(descriptor))
            .collect();

        let descriptors = order
            .into_iter()
            .filter_map(|node| descriptors[node.index()].take())
            .collect();

        Ok(Plan {
            descriptors,
            edges: self.edges,
        })
    }

    fn apply_implicit_edges(&mut self) {
        let access_log_edges: Vec<_> = self
            .nodes
            .values()
            .filter_map(|(_, descriptor)| match descriptor {
                Descriptor::Storage(storage) => storage
                    .access_log_target
                    .as_deref()
                    .map(ResourceId::storage)
                    .filter(|target| target != &storage.id() && self.nodes.contains_key(target))
                    .map(|target| (storage.id(), target)),
                _ => None,
            })
            .collect();

        for (from, to) in access_log_edges {
            self.connect(from, to);
        }

        let own: Vec<_> = self
            .nodes
            .keys()
            .filter(|id| id.kind != ResourceKind::Stack)
            .cloned()
            .collect();

        for stack in self.stacks.clone() {
            for id in &own {
                self.connect(id.clone(), stack.clone());
            }
        }
    }

    /// Find the members of one cycle, in insertion order
    fn cycle(&self) -> CycleError {
        let mut members: Vec<NodeIndex> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self.graph.contains_edge(component[0], component[0])
            })
            .min_by_key(|component| component.iter().min().copied())
            .unwrap_or_default();
        members.sort();

        CycleError {
            members: members
                .into_iter()
                .map(|node| self.graph[node].clone())
                .collect(),
        }
    }

    fn insert(&mut self, descriptor: Descriptor) -> Result<(), AssembleError> {
        let id = descriptor.id();
        if self.nodes.contains_key(&id) {
            return Err(AssembleError::DuplicateResource(id));
        }

        self.insert_unchecked(descriptor);
        Ok(())
    }

    fn insert_unchecked(&mut self, descriptor: Descriptor) {
        let id = descriptor.id();
        tracing::trace!(%id, "add node");

        let node = self.graph.add_node(id.clone());
        debug_assert_eq!(node.index(), self.nodes.len());
        self.nodes.insert(id, (node, descriptor));
    }

    /// Both ends must already be nodes
    fn connect(&mut self, from: ResourceId, to: ResourceId) {
        let from_node = self.nodes[&from].0;
        let to_node = self.nodes[&to].0;

        if self.graph.find_edge(to_node, from_node).is_some() {
            return;
        }

        self.graph.add_edge(to_node, from_node, ());
        self.edges.push(DependencyEdge::new(from, to));
    }
}

/// The graph can not be linearized
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Dependency cycle between {}", display_ids(.members))]
pub struct CycleError {
    pub members: Vec<ResourceId>,
}

fn display_ids(ids: &[ResourceId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AssembleError {
    #[error("Resource {0} is declared more than once")]
    DuplicateResource(ResourceId),
    #[error("Dependency {edge} refers to unknown resource {id}")]
    UnknownResource { id: ResourceId, edge: DependencyEdge },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builder::test::{context, rendered};
    use crate::builder::build;
    use crate::descriptor::AccessGrant;
    use pretty_assertions::assert_eq;

    fn storage(name: &str, grants: usize, access_log_target: Option<&str>) -> StorageTarget {
        StorageTarget {
            name: name.into(),
            encryption_key_arn: "arn:aws:kms:us-east-1:111:key/abc".into(),
            versioned: true,
            block_public_access: true,
            enforce_tls: true,
            access_log_target: access_log_target.map(str::to_owned),
            grants: (0..grants)
                .map(|_| AccessGrant {
                    principal: "arn:aws:iam::222:root".into(),
                    actions: vec!["s3:GetObject".into()],
                    resources: vec!["/*".into()],
                    source_account: None,
                })
                .collect(),
        }
    }

    fn order(plan: &Plan) -> Vec<String> {
        plan.ids().map(|id| id.to_string()).collect()
    }

    #[test]
    fn schedule_after_job() {
        let mut assembler = Assembler::new();
        assembler
            .add_job(build(&rendered("jobA", Some("cron(0 * * * ? *)")), &context()).unwrap())
            .unwrap();
        assembler
            .add_job(build(&rendered("jobB", Some("")), &context()).unwrap())
            .unwrap();

        let plan = assembler.assemble().unwrap();
        assert_eq!(order(&plan), vec!["job:jobA", "schedule:jobA", "job:jobB"]);
        assert_eq!(
            plan.edges,
            vec![DependencyEdge::new(
                ResourceId::schedule("jobA"),
                ResourceId::job("jobA")
            )]
        );
    }

    #[test]
    fn grants_after_storage_and_log_target_first() {
        let mut assembler = Assembler::new();
        assembler
            .add_storage(storage("raw", 2, Some("access-logs")))
            .unwrap();
        assembler.add_storage(storage("access-logs", 0, None)).unwrap();

        let plan = assembler.assemble().unwrap();
        assert_eq!(
            order(&plan),
            vec![
                "storage:access-logs",
                "storage:raw",
                "grant:raw/0",
                "grant:raw/1"
            ]
        );
    }

    #[test]
    fn everything_waits_for_external_stacks() {
        let mut assembler = Assembler::new();
        assembler
            .add_job(build(&rendered("jobA", None), &context()).unwrap())
            .unwrap();
        assembler.depend_on_stack("common-orchestration");

        let plan = assembler.assemble().unwrap();
        assert_eq!(order(&plan), vec!["stack:common-orchestration", "job:jobA"]);
    }

    #[test]
    fn explicit_edges_reorder() {
        let mut assembler = Assembler::new();
        for name in ["jobA", "jobB"] {
            assembler
                .add_job(build(&rendered(name, None), &context()).unwrap())
                .unwrap();
        }
        assembler
            .add_edge(DependencyEdge::new(ResourceId::job("jobA"), ResourceId::job("jobB")))
            .unwrap();

        let plan = assembler.assemble().unwrap();
        assert_eq!(order(&plan), vec!["job:jobB", "job:jobA"]);
    }

    #[test]
    fn unknown_resource_in_edge() {
        let mut assembler = Assembler::new();
        let edge = DependencyEdge::new(ResourceId::job("ghost"), ResourceId::stack("common"));

        assert_eq!(
            assembler.add_edge(edge.clone()),
            Err(AssembleError::UnknownResource {
                id: ResourceId::job("ghost"),
                edge
            })
        );
    }

    #[test]
    fn duplicate_storage() {
        let mut assembler = Assembler::new();
        assembler.add_storage(storage("raw", 0, None)).unwrap();
        assert_eq!(
            assembler.add_storage(storage("raw", 0, None)),
            Err(AssembleError::DuplicateResource(ResourceId::storage("raw")))
        );
    }

    #[test]
    fn cycle_lists_members() {
        let mut assembler = Assembler::new();
        assembler.add_external_stack("unrelated");
        for (from, to) in [("A", "B"), ("B", "C"), ("C", "A")] {
            assembler
                .add_edge(DependencyEdge::new(ResourceId::stack(from), ResourceId::stack(to)))
                .unwrap();
        }

        let err = assembler.assemble().unwrap_err();
        assert_eq!(
            err.members,
            vec![
                ResourceId::stack("A"),
                ResourceId::stack("B"),
                ResourceId::stack("C")
            ]
        );
        assert_eq!(
            err.to_string(),
            "Dependency cycle between stack:A, stack:B, stack:C"
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut assembler = Assembler::new();
        assembler
            .add_edge(DependencyEdge::new(ResourceId::stack("A"), ResourceId::stack("A")))
            .unwrap();

        let err = assembler.assemble().unwrap_err();
        assert_eq!(err.members, vec![ResourceId::stack("A")]);
    }
}
