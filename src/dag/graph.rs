// src/dag/graph.rs

//! Concurrent dependency graph shared by every producer in a run.
//!
//! Two independent maps live behind one `RwLock`:
//! - `edges`: identifier to the identifiers it depends on,
//! - `groups`: generator identifier to the child identifiers it produced.
//!
//! Both are union-merged and never shrink. Structural correctness is not
//! enforced on insert; callers ask for it with [`DependencyGraph::validate`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;
use serde::ser::Serializer;
use tracing::debug;

use crate::errors::{GraphProblem, GraphValidationError};
use crate::types::Identifier;

#[derive(Debug, Default)]
struct GraphState {
    edges: HashMap<Identifier, HashSet<Identifier>>,
    groups: HashMap<Identifier, HashSet<Identifier>>,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    state: RwLock<GraphState>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // The guarded maps are only ever extended with whole sets, so a panic in
    // another holder cannot leave them half-written.
    fn read(&self) -> RwLockReadGuard<'_, GraphState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record that `id` depends on every entry of `deps`.
    ///
    /// No-op when `deps` is empty. Repeated calls union their sets.
    pub fn add<I, S>(&self, id: &str, deps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Identifier>,
    {
        let mut deps = deps.into_iter().peekable();
        if deps.peek().is_none() {
            return;
        }

        let mut state = self.write();
        state.edges.entry(id.to_string()).or_default().extend(deps.map(Into::into));
    }

    /// Make `id` a known key even if it has no dependencies.
    pub fn add_node(&self, id: &str) {
        self.write().edges.entry(id.to_string()).or_default();
    }

    /// Dependencies of `id`; empty when unknown.
    pub fn resolve(&self, id: &str) -> Vec<Identifier> {
        let state = self.read();
        state
            .edges
            .get(id)
            .map(|deps| sorted(deps.iter().cloned()))
            .unwrap_or_default()
    }

    /// Every identifier with a dependency entry.
    pub fn all(&self) -> Vec<Identifier> {
        sorted(self.read().edges.keys().cloned())
    }

    /// Snapshot of the whole edge relation.
    pub fn network(&self) -> HashMap<Identifier, Vec<Identifier>> {
        let state = self.read();
        Self::network_unlocked(&state)
    }

    // Callers must already hold the lock.
    fn network_unlocked(state: &GraphState) -> HashMap<Identifier, Vec<Identifier>> {
        state
            .edges
            .iter()
            .map(|(id, deps)| (id.clone(), sorted(deps.iter().cloned())))
            .collect()
    }

    /// Record `members` as children of the group `id`. No-op when empty.
    pub fn add_group<I, S>(&self, id: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Identifier>,
    {
        let mut members = members.into_iter().peekable();
        if members.peek().is_none() {
            return;
        }

        let mut state = self.write();
        state
            .groups
            .entry(id.to_string())
            .or_default()
            .extend(members.map(Into::into));
    }

    /// Members of group `id`; empty when unknown.
    pub fn get_group(&self, id: &str) -> Vec<Identifier> {
        let state = self.read();
        state
            .groups
            .get(id)
            .map(|members| sorted(members.iter().cloned()))
            .unwrap_or_default()
    }

    /// Check referential integrity and acyclicity in one pass.
    ///
    /// Every problem is collected before returning. Cycles are the strongly
    /// connected components with more than one member, plus nodes that list
    /// themselves as a dependency.
    pub fn validate(&self) -> Result<(), GraphValidationError> {
        let state = self.read();
        let network = Self::network_unlocked(&state);
        drop(state);

        let mut problems = Vec::new();

        let missing: BTreeSet<&Identifier> = network
            .values()
            .flatten()
            .filter(|dep| !network.contains_key(*dep))
            .collect();
        problems.extend(
            missing
                .into_iter()
                .map(|dep| GraphProblem::MissingDependency(dep.clone())),
        );

        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (id, deps) in &network {
            graph.add_node(id.as_str());
            for dep in deps {
                graph.add_edge(id.as_str(), dep.as_str(), ());
            }
        }

        let mut cycles: Vec<Vec<Identifier>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|node| graph.contains_edge(*node, *node))
            })
            .map(|component| sorted(component.into_iter().map(str::to_string)))
            .collect();
        cycles.sort();
        problems.extend(cycles.into_iter().map(GraphProblem::Cycle));

        if problems.is_empty() {
            debug!(nodes = network.len(), "dependency graph validated");
            Ok(())
        } else {
            Err(GraphValidationError { problems })
        }
    }

    /// Render the network as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn ordered_network(&self) -> BTreeMap<Identifier, Vec<Identifier>> {
        self.network().into_iter().collect()
    }
}

fn sorted(ids: impl Iterator<Item = Identifier>) -> Vec<Identifier> {
    let mut out: Vec<Identifier> = ids.collect();
    out.sort();
    out
}

impl Serialize for DependencyGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.ordered_network().serialize(serializer)
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let network = self.ordered_network();
        writeln!(f, "dependency network ({} nodes):", network.len())?;
        for (id, deps) in network {
            if deps.is_empty() {
                writeln!(f, "  {id}")?;
            } else {
                writeln!(f, "  {id} <- {}", deps.join(", "))?;
            }
        }
        Ok(())
    }
}
